//! Dashing dashboard: HTTP client, widget engine handler and sender

pub mod client;
pub mod engine;
pub mod module;

pub use client::{DashingClient, DashingResponse, NO_DASHING_URL};
pub use engine::DashingHandler;
pub use module::DashingModule;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Value every widget field is reset to when a post expires or is cleared
pub const NEUTRAL_VALUE: i64 = 1;

/// Arguments of `widget_post`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WidgetPostArgs {
    /// Falls back to the configured dashboard URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dashing_url: Option<String>,

    /// Falls back to the configured auth token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    pub widget: String,

    #[serde(default)]
    pub widget_data: Map<String, Value>,
}

impl WidgetPostArgs {
    pub fn new(widget: impl Into<String>) -> Self {
        Self {
            widget: widget.into(),
            ..Self::default()
        }
    }

    pub fn data(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.widget_data.insert(key.into(), value.into());
        self
    }

    /// Same post with every widget field set to [`NEUTRAL_VALUE`]
    pub fn neutral(&self) -> Self {
        let widget_data = self
            .widget_data
            .keys()
            .map(|key| (key.clone(), Value::from(NEUTRAL_VALUE)))
            .collect();
        Self {
            widget_data,
            ..self.clone()
        }
    }
}
