//! Dashing command sender

use minion_events::{CallResult, CommandPayload, DASHING_TAG};
use serde_json::Value;
use tracing::{debug, warn};

use super::engine::WIDGET_POST;
use super::WidgetPostArgs;
use crate::bus::{EventSink, NO_EVENT_MODULE};
use crate::engine::CLEAR_COMMAND;

pub struct DashingModule<S: EventSink> {
    sink: Option<S>,
    tag: String,
}

impl<S: EventSink> DashingModule<S> {
    pub fn new(sink: Option<S>) -> Self {
        Self {
            sink,
            tag: DASHING_TAG.to_string(),
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    /// Fire a widget post; with a timeout the widget is reset when it expires
    pub async fn widget_post(&self, args: WidgetPostArgs, timeout: Option<f64>) -> CallResult {
        self.fire(WIDGET_POST, args, timeout).await
    }

    /// Fire an immediate reset of the widget's fields
    pub async fn clear(&self, args: WidgetPostArgs) -> CallResult {
        self.fire(CLEAR_COMMAND, args, None).await
    }

    async fn fire(&self, mode: &str, args: WidgetPostArgs, timeout: Option<f64>) -> CallResult {
        let Some(sink) = &self.sink else {
            return CallResult::ok(NO_EVENT_MODULE);
        };
        if args.widget.is_empty() {
            return CallResult::failed("Invalid widget");
        }

        let widget = args.widget.clone();
        let mut payload = CommandPayload::new(mode);
        payload.widget = Some(widget.clone());
        if let Ok(Value::Object(kwargs)) = serde_json::to_value(&args) {
            payload.kwargs = kwargs;
        }
        let payload = payload.timeout(timeout);

        match sink.fire(payload.into_value(), &self.tag).await {
            Ok(()) => {
                debug!(%widget, mode, "Fired Dashing command");
                CallResult::ok(format!("Fired {} for widget {}", mode, widget))
            }
            Err(e) => {
                warn!(%widget, "Failed to fire Dashing command: {}", e);
                CallResult::failed(e.to_string())
            }
        }
    }
}
