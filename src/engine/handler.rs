//! The seam between the dispatch loop and a concrete device

use async_trait::async_trait;
use minion_events::CallResult;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;

use super::command::Arguments;
use super::pending::{PendingOperation, PendingTable, TargetKey};
use super::registry::Registry;
use crate::error::HandlerError;

/// What a handler did with a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The effect is now visible on these targets
    Applied {
        targets: Vec<TargetKey>,
        comment: String,
    },
    /// These targets were reset to their neutral state
    Cleared {
        targets: Vec<TargetKey>,
        comment: String,
    },
    /// Validation failed, nothing changed
    Rejected { comment: String },
}

impl Outcome {
    pub fn applied(targets: Vec<TargetKey>, comment: impl Into<String>) -> Self {
        Self::Applied {
            targets,
            comment: comment.into(),
        }
    }

    pub fn cleared(targets: Vec<TargetKey>, comment: impl Into<String>) -> Self {
        Self::Cleared {
            targets,
            comment: comment.into(),
        }
    }

    pub fn rejected(comment: impl Into<String>) -> Self {
        Self::Rejected {
            comment: comment.into(),
        }
    }

    pub fn comment(&self) -> &str {
        match self {
            Self::Applied { comment, .. }
            | Self::Cleared { comment, .. }
            | Self::Rejected { comment } => comment,
        }
    }

    /// The `(success, message)` pair handed back to direct callers
    pub fn to_result(&self) -> CallResult {
        match self {
            Self::Rejected { comment } => CallResult::failed(comment.clone()),
            _ => CallResult::ok(self.comment()),
        }
    }
}

/// A device the dispatch loop can drive.
///
/// Implementations own the device collaborator (LED driver, HTTP client)
/// and expose a fixed [`Registry`] of command kinds.
#[async_trait]
pub trait EffectHandler: Send + Sync + 'static {
    type Kind: Copy + fmt::Debug + Send + Sync + 'static;

    /// Engine name used in logs
    fn name(&self) -> &'static str;

    fn registry(&self) -> &Registry<Self::Kind>;

    /// Command used when a payload has no `mode`
    fn default_command(&self) -> Option<&'static str> {
        None
    }

    /// Top-level payload field naming the target, copied into the arguments
    fn target_field(&self) -> Option<&'static str> {
        None
    }

    /// Apply a command
    async fn invoke(&self, kind: Self::Kind, arguments: &Arguments)
        -> Result<Outcome, HandlerError>;

    /// Put expired targets back into their neutral state
    async fn revert(&self, expired: &[PendingOperation]) -> Result<(), HandlerError>;

    /// Called once per loop iteration with the live operations
    async fn refresh(&self, _pending: &PendingTable) -> Result<(), HandlerError> {
        Ok(())
    }
}

/// Deserialize typed arguments from a keyword map
pub fn decode_args<T: DeserializeOwned>(arguments: &Arguments) -> Result<T, HandlerError> {
    Ok(serde_json::from_value(Value::Object(arguments.clone()))?)
}
