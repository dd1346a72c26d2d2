//! Dashing widget handler for the dispatch loop
//!
//! Each widget is its own target key: a timed post to one widget expires
//! independently of posts to any other widget.

use async_trait::async_trait;
use tracing::warn;

use super::{DashingClient, WidgetPostArgs};
use crate::engine::{
    decode_args, Arguments, EffectHandler, Outcome, PendingOperation, Registry, TargetKey,
    CLEAR_COMMAND,
};
use crate::error::{HandlerError, RegistryError};

/// Command used when a payload only names a widget
pub const WIDGET_POST: &str = "widget_post";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DashingCommand {
    WidgetPost,
    Clear,
}

pub fn registry() -> Result<Registry<DashingCommand>, RegistryError> {
    Registry::builder()
        .register(WIDGET_POST, DashingCommand::WidgetPost)
        .register(CLEAR_COMMAND, DashingCommand::Clear)
        .build()
}

pub struct DashingHandler {
    client: DashingClient,
    registry: Registry<DashingCommand>,
}

impl DashingHandler {
    pub fn new(client: DashingClient) -> Result<Self, RegistryError> {
        Ok(Self {
            client,
            registry: registry()?,
        })
    }

    async fn post(&self, args: &WidgetPostArgs) -> Result<Option<String>, HandlerError> {
        let response = self
            .client
            .widget_post(
                args.dashing_url.as_deref(),
                args.token.as_deref(),
                &args.widget,
                &args.widget_data,
            )
            .await?;

        if response.res {
            Ok(None)
        } else {
            Ok(Some(
                response
                    .message
                    .unwrap_or_else(|| format!("Failed to post to widget {}", args.widget)),
            ))
        }
    }
}

#[async_trait]
impl EffectHandler for DashingHandler {
    type Kind = DashingCommand;

    fn name(&self) -> &'static str {
        "dashing"
    }

    fn registry(&self) -> &Registry<DashingCommand> {
        &self.registry
    }

    fn default_command(&self) -> Option<&'static str> {
        Some(WIDGET_POST)
    }

    fn target_field(&self) -> Option<&'static str> {
        Some("widget")
    }

    async fn invoke(
        &self,
        kind: DashingCommand,
        arguments: &Arguments,
    ) -> Result<Outcome, HandlerError> {
        let args: WidgetPostArgs = decode_args(arguments)?;
        let target = vec![TargetKey::Widget(args.widget.clone())];

        let outcome = match kind {
            DashingCommand::WidgetPost => match self.post(&args).await? {
                None => Outcome::applied(target, format!("Posted to widget {}", args.widget)),
                Some(message) => Outcome::rejected(message),
            },
            DashingCommand::Clear => match self.post(&args.neutral()).await? {
                None => Outcome::cleared(target, format!("Reset widget {}", args.widget)),
                Some(message) => Outcome::rejected(message),
            },
        };
        Ok(outcome)
    }

    async fn revert(&self, expired: &[PendingOperation]) -> Result<(), HandlerError> {
        let mut first_error = None;

        for op in expired {
            let args = match decode_args::<WidgetPostArgs>(&op.command.arguments) {
                Ok(args) => args,
                Err(e) => {
                    warn!(key = %op.key, "Cannot reset widget: {}", e);
                    first_error = first_error.or(Some(e));
                    continue;
                }
            };

            match self.post(&args.neutral()).await {
                Ok(None) => {}
                Ok(Some(message)) => warn!(widget = %args.widget, "Widget reset failed: {}", message),
                Err(e) => {
                    warn!(widget = %args.widget, "Widget reset failed: {}", e);
                    first_error = first_error.or(Some(e));
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
