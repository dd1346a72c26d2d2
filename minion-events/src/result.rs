//! Call results returned to the immediate caller of a module function.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Structured `(success, message)` pair.
///
/// The sender of a bus event never sees this; it is only returned to the
/// code that called the module function or handler directly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CallResult {
    /// Whether the call succeeded
    pub result: bool,

    /// Human-readable explanation
    pub comment: String,
}

impl CallResult {
    pub fn ok(comment: impl Into<String>) -> Self {
        Self {
            result: true,
            comment: comment.into(),
        }
    }

    pub fn failed(comment: impl Into<String>) -> Self {
        Self {
            result: false,
            comment: comment.into(),
        }
    }

    /// The result as a plain tuple
    pub fn as_pair(&self) -> (bool, &str) {
        (self.result, &self.comment)
    }
}

impl fmt::Display for CallResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.result { "ok" } else { "failed" };
        write!(f, "{}: {}", status, self.comment)
    }
}
