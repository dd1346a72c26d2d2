//! Minion Effects
//!
//! Event-driven effect engines for configuration-management minions:
//!
//! - Blinkt: an 8-pixel APA102 LED strip, driven directly or through events
//! - Dashing: widget posts to a Dashing dashboard with automatic reset
//! - A command dispatch loop that reverts timed effects per target
//! - An MQTT bridge so remote senders can fire commands

// =============================================================================
// Lints - Enforce code quality and consistency
// =============================================================================

#![deny(unsafe_code)]
#![deny(unused_must_use)]

pub mod blinkt;
pub mod bus;
pub mod config;
pub mod dashing;
pub mod device;
pub mod engine;
pub mod error;
#[cfg(feature = "mqtt")]
pub mod mqtt;

pub use minion_events::{CallResult, CommandPayload, EventEnvelope};
