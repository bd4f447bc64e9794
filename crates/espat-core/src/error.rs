//! Errors raised by the AT link.

use thiserror::Error;

/// Errors that can occur while exchanging AT commands with the module.
#[derive(Debug, Error)]
pub enum AtError {
    /// No line containing the expected token arrived before the deadline.
    #[error("timed out after {timeout_ms}ms waiting for {expected:?}")]
    Timeout { expected: String, timeout_ms: u64 },

    /// The firmware answered with an error token instead of the confirmation.
    #[error("module rejected {command:?} with {line:?}")]
    Rejected { command: String, line: String },

    /// Reading from or writing to the serial channel failed.
    #[error("serial I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

impl AtError {
    /// True when the error is a plain deadline expiry.
    pub fn is_timeout(&self) -> bool {
        matches!(self, AtError::Timeout { .. })
    }
}
