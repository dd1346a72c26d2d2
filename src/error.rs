//! Error types for the effect engines
//!
//! - Decode errors (bus payload to command)
//! - Registry errors (handler table construction)
//! - Handler errors (argument, device, or dashboard failures)
//! - Fire errors (publishing commands onto an event sink)
//!
//! Validation failures such as an out-of-range pixel are not errors: they
//! are returned to the caller as a failed `CallResult`.

use thiserror::Error;

/// A bus payload could not be turned into a command
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Payload was not a JSON object
    #[error("Event payload is not an object")]
    NotAnObject,

    /// Payload carried no command name and the engine has no default
    #[error("Event payload has no command name")]
    MissingCommand,

    /// A payload field had the wrong shape
    #[error("Invalid payload field '{field}': {reason}")]
    InvalidField {
        /// The offending field.
        field: &'static str,
        /// What was wrong with it.
        reason: String,
    },
}

/// The handler table could not be built
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// The same command name was registered twice
    #[error("Command '{0}' registered more than once")]
    Duplicate(&'static str),

    /// A command name was empty or contained whitespace
    #[error("Invalid command name '{0}'")]
    InvalidName(&'static str),

    /// Every registry must carry a clear handler
    #[error("No '{0}' handler registered")]
    MissingClear(&'static str),
}

/// Device driver failure
#[derive(Error, Debug)]
pub enum DeviceError {
    /// Writing to the device failed
    #[error("Device I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Pixel index outside the strip
    #[error("Pixel {index} out of range (strip has {count} pixels)")]
    OutOfRange {
        /// Requested pixel index.
        index: usize,
        /// Number of addressable pixels.
        count: usize,
    },
}

/// Dashing HTTP failure
#[derive(Error, Debug)]
pub enum DashingError {
    /// The dashboard URL could not be parsed or joined
    #[error("Invalid Dashing URL: {0}")]
    Url(#[from] url::ParseError),

    /// Transport-level failure
    #[error("Dashing request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Handler invocation failure
#[derive(Error, Debug)]
pub enum HandlerError {
    /// Arguments did not match what the command expects
    #[error("Invalid arguments: {0}")]
    InvalidArguments(#[from] serde_json::Error),

    /// The device driver failed
    #[error(transparent)]
    Device(#[from] DeviceError),

    /// The dashboard call failed
    #[error(transparent)]
    Dashing(#[from] DashingError),
}

/// Error surfaced by the dispatch loop for a single event
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Handler(#[from] HandlerError),

    /// The handler panicked while processing the event
    #[error("Handler panicked: {0}")]
    Panicked(String),
}

/// Firing a command onto an event sink failed
#[derive(Error, Debug)]
pub enum FireError {
    /// Payload could not be serialized
    #[error("Failed to encode event: {0}")]
    Encode(#[from] serde_json::Error),

    /// The sink rejected the publish
    #[error("Failed to publish event: {0}")]
    Publish(String),
}
