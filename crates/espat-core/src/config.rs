//! Link tuning parameters.
//!
//! These values control how the link polls the serial channel. Defaults match
//! an ESP8266 running stock AT firmware at 115200 baud; embedding
//! applications may deserialize overrides from their own settings store.

use serde::{Deserialize, Serialize};

/// Polling and pacing settings for an [`AtLink`](crate::AtLink).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LinkConfig {
    /// Pause between two reads of the serial channel while waiting.
    pub poll_interval_ms: u64,

    /// Pause before each command so the firmware can finish its previous reply.
    pub settle_delay_ms: u64,

    /// Deadline used by callers that do not pick their own.
    pub default_timeout_ms: u64,

    /// Size of the scratch buffer handed to each non-blocking read.
    pub read_chunk_size: usize,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1,
            settle_delay_ms: 10,
            default_timeout_ms: 100,
            read_chunk_size: 128,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_partial_override() {
        let config: LinkConfig =
            serde_json::from_str(r#"{"pollIntervalMs": 5, "settleDelayMs": 0}"#).unwrap();

        assert_eq!(config.poll_interval_ms, 5);
        assert_eq!(config.settle_delay_ms, 0);
        assert_eq!(config.default_timeout_ms, 100);
        assert_eq!(config.read_chunk_size, 128);
    }

    #[test]
    fn test_serializes_camel_case() {
        let json = serde_json::to_string(&LinkConfig::default()).unwrap();
        assert!(json.contains("\"pollIntervalMs\":1"));
        assert!(json.contains("\"defaultTimeoutMs\":100"));
    }
}
