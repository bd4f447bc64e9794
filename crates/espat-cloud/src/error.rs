//! Error types for the cloud integrations.

use thiserror::Error;

use espat_core::AtError;
use espat_protocol::SessionError;

use crate::time_sync::TimeParseError;

/// Why an integration did not complete.
#[derive(Debug, Error)]
pub enum CloudError {
    #[error("WiFi is not connected")]
    WifiDisconnected,

    #[error("WiFi SSID cannot be empty")]
    EmptySsid,

    #[error(transparent)]
    Link(#[from] AtError),

    #[error(transparent)]
    Session(#[from] SessionError),

    /// The expected reply line never arrived.
    #[error("no reply containing {0:?}")]
    NoReply(&'static str),

    /// The service answered but did not accept the request.
    #[error("request rejected: {0}")]
    Rejected(String),

    #[error("malformed reply {line:?}: {reason}")]
    Malformed { line: String, reason: &'static str },

    #[error("all {attempted} servers failed")]
    AllServersFailed { attempted: usize },

    #[error("timezone {0} is outside -11..=13")]
    InvalidTimezone(i8),

    #[error("internet time is not initialized")]
    TimeNotInitialized,

    #[error("module clock not synchronised within {0}ms")]
    TimeNotSynced(u64),

    #[error(transparent)]
    TimeParse(#[from] TimeParseError),
}

impl CloudError {
    /// Check if the failure was a deadline expiring rather than a refusal.
    pub fn is_timeout(&self) -> bool {
        match self {
            CloudError::Link(err) => err.is_timeout(),
            CloudError::Session(SessionError::Connect { source, .. }) => source.is_timeout(),
            CloudError::Session(SessionError::Send(err) | SessionError::Status(err)) => {
                err.is_timeout()
            }
            CloudError::NoReply(_) | CloudError::TimeNotSynced(_) => true,
            _ => false,
        }
    }
}
