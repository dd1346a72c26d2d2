//! Shared wire protocol types for minion effect engines.
//!
//! This crate defines the types that cross boundaries between:
//! - command senders (execution modules, `minion-fire`, remote publishers)
//! - the event bus and its MQTT bridge
//! - the Blinkt and Dashing engines that consume commands
//!
//! # Modules
//! - [`envelope`] - Tagged bus events and topic helpers
//! - [`command`] - Command payload (`mode` + `kwargs`)
//! - [`result`] - `(result, comment)` call results returned to callers

pub mod command;
pub mod envelope;
pub mod result;

// Re-export commonly used types at crate root
pub use command::CommandPayload;
pub use envelope::{minion_tag, EventEnvelope, BLINKT_TAG, DASHING_TAG, DEFAULT_NAMESPACE};
pub use result::CallResult;
