//! Tagged events as they travel over the bus.
//!
//! Every event carries a topic-like `tag` (e.g. `/salt/minion/blinkt`), a
//! JSON `data` payload and the UTC time it was fired.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Namespace used by the stock topics
pub const DEFAULT_NAMESPACE: &str = "salt";

/// Default tag consumed by the Blinkt engine
pub const BLINKT_TAG: &str = "/salt/minion/blinkt";

/// Default tag consumed by the Dashing engine
pub const DASHING_TAG: &str = "/salt/minion/dashing";

/// Build a minion device tag: `/<namespace>/minion/<device>`
pub fn minion_tag(namespace: &str, device: &str) -> String {
    format!("/{}/minion/{}", namespace.trim_matches('/'), device.trim_matches('/'))
}

/// An event fired onto the bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventEnvelope {
    /// Topic the event was fired under
    pub tag: String,

    /// Event payload, usually a JSON object
    pub data: serde_json::Value,

    /// When the event was fired
    #[serde(rename = "_stamp")]
    pub stamp: DateTime<Utc>,
}

impl EventEnvelope {
    /// Create an envelope stamped with the current time
    pub fn new(tag: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            tag: tag.into(),
            data,
            stamp: Utc::now(),
        }
    }

    /// Whether this event's tag falls under `prefix`
    pub fn matches_prefix(&self, prefix: &str) -> bool {
        self.tag.starts_with(prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minion_tag() {
        assert_eq!(minion_tag("salt", "blinkt"), BLINKT_TAG);
        assert_eq!(minion_tag("/salt/", "/dashing"), DASHING_TAG);
        assert_eq!(minion_tag("lab", "strip"), "/lab/minion/strip");
    }

    #[test]
    fn test_matches_prefix() {
        let event = EventEnvelope::new("/salt/minion/blinkt/kitchen", serde_json::json!({}));
        assert!(event.matches_prefix(BLINKT_TAG));
        assert!(!event.matches_prefix(DASHING_TAG));
    }

    #[test]
    fn test_stamp_field_name() {
        let event = EventEnvelope::new(BLINKT_TAG, serde_json::json!({"mode": "rainbow"}));
        let json = serde_json::to_value(&event).unwrap();
        assert!(json.get("_stamp").is_some());
        assert_eq!(json["tag"], BLINKT_TAG);
    }
}
