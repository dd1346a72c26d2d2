//! Commands decoded from bus payloads

use serde_json::{Map, Value};
use std::time::Duration;

use crate::error::DecodeError;

/// Keyword arguments of a command
pub type Arguments = Map<String, Value>;

/// A named operation with its arguments and optional auto-revert timeout
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub name: String,
    pub arguments: Arguments,
    pub timeout: Option<Duration>,
}

impl Command {
    pub fn new(name: impl Into<String>, arguments: Arguments) -> Self {
        let timeout = parse_timeout(arguments.get("timeout"));
        Self {
            name: name.into(),
            arguments,
            timeout,
        }
    }

    /// Decode a `{"mode": ..., "kwargs": {...}}` payload.
    ///
    /// `default_name` is used when the payload has no `mode`. When
    /// `target_field` is set and present at the top level of the payload, it
    /// is copied into the arguments unless they already carry it.
    pub fn from_payload(
        data: &Value,
        default_name: Option<&str>,
        target_field: Option<&str>,
    ) -> Result<Self, DecodeError> {
        let payload = data.as_object().ok_or(DecodeError::NotAnObject)?;

        let name = match payload.get("mode") {
            Some(Value::String(mode)) if !mode.is_empty() => mode.clone(),
            None | Some(Value::Null) => default_name
                .map(str::to_string)
                .ok_or(DecodeError::MissingCommand)?,
            Some(other) => {
                return Err(DecodeError::InvalidField {
                    field: "mode",
                    reason: format!("expected a command name, got {}", other),
                })
            }
        };

        let mut arguments = match payload.get("kwargs") {
            Some(Value::Object(kwargs)) => kwargs.clone(),
            None | Some(Value::Null) => Arguments::new(),
            Some(other) => {
                return Err(DecodeError::InvalidField {
                    field: "kwargs",
                    reason: format!("expected an object, got {}", other),
                })
            }
        };

        if let Some(field) = target_field {
            if let Some(target) = payload.get(field) {
                if !target.is_null() && !arguments.contains_key(field) {
                    arguments.insert(field.to_string(), target.clone());
                }
            }
        }

        Ok(Self::new(name, arguments))
    }
}

/// Interpret a `timeout` argument.
///
/// Positive finite numbers (or numeric strings) are seconds. Anything else,
/// including zero, negatives, null and booleans, means no timeout. So does a
/// value too large for a [`Duration`].
pub fn parse_timeout(value: Option<&Value>) -> Option<Duration> {
    let seconds = match value? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };

    if seconds > 0.0 {
        Duration::try_from_secs_f64(seconds).ok()
    } else {
        None
    }
}
