//! Command payloads fired by senders.
//!
//! The payload selects a handler by `mode` and carries its arguments in
//! `kwargs`. Dashing payloads may name their target widget at the top level.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Payload of a command event.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CommandPayload {
    /// Command name (e.g. "one_rgb", "widget_post")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,

    /// Target widget, for engines addressed per widget
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub widget: Option<String>,

    /// Keyword arguments, optionally including `timeout` in seconds
    #[serde(default)]
    pub kwargs: Map<String, Value>,
}

impl CommandPayload {
    /// Create a payload for the named command
    pub fn new(mode: impl Into<String>) -> Self {
        Self {
            mode: Some(mode.into()),
            ..Default::default()
        }
    }

    /// Add a keyword argument
    pub fn arg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.kwargs.insert(key.into(), value.into());
        self
    }

    /// Set `timeout` (seconds). `None` is sent as null, which means no timeout.
    pub fn timeout(self, timeout: Option<f64>) -> Self {
        self.arg("timeout", timeout)
    }

    /// Convert into the JSON value fired onto the bus
    pub fn into_value(self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_shape() {
        let payload = CommandPayload::new("one_rgb")
            .arg("pixel", 3)
            .arg("red", 255)
            .timeout(Some(10.0))
            .into_value();

        assert_eq!(payload["mode"], "one_rgb");
        assert_eq!(payload["kwargs"]["pixel"], 3);
        assert_eq!(payload["kwargs"]["timeout"], 10.0);
        assert!(payload.get("widget").is_none());
    }

    #[test]
    fn test_missing_timeout_is_null() {
        let payload = CommandPayload::new("rainbow").timeout(None).into_value();
        assert!(payload["kwargs"]["timeout"].is_null());
    }

    #[test]
    fn test_parse_without_mode() {
        let payload: CommandPayload =
            serde_json::from_str(r#"{"widget": "karma", "kwargs": {"current": 5}}"#).unwrap();
        assert_eq!(payload.mode, None);
        assert_eq!(payload.widget.as_deref(), Some("karma"));
        assert_eq!(payload.kwargs["current"], 5);
    }
}
