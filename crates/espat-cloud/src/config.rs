//! Configuration for the cloud integrations.
//!
//! Every section has defaults matching the public services, so an empty JSON
//! object is a complete configuration. Embedding applications usually keep
//! only their overrides on disk.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use espat_core::LinkConfig;
use espat_protocol::SessionTimeouts;

use crate::variables::{Addressing, ServerList};

/// Errors from loading a [`CloudConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("remote-variable server list is empty")]
    NoServers,

    #[error("{0} host cannot be empty")]
    EmptyHost(&'static str),
}

/// Complete configuration for an [`Esp8266`](crate::Esp8266).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CloudConfig {
    pub link: LinkConfig,
    pub modem: ModemConfig,
    pub metrics: MetricsConfig,
    pub messaging: MessagingConfig,
    pub variables: VariablesConfig,
    pub time: TimeConfig,
}

impl CloudConfig {
    /// Parse and validate a configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: CloudConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.variables.servers.is_empty() {
            return Err(ConfigError::NoServers);
        }
        if self.metrics.host.is_empty() {
            return Err(ConfigError::EmptyHost("metrics"));
        }
        if self.messaging.host.is_empty() {
            return Err(ConfigError::EmptyHost("messaging"));
        }
        if self.variables.legacy_host.is_empty() {
            return Err(ConfigError::EmptyHost("legacy variables"));
        }
        if self.time.ntp_server.is_empty() {
            return Err(ConfigError::EmptyHost("NTP"));
        }
        Ok(())
    }
}

/// Deadlines for module bring-up and the WiFi status check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ModemConfig {
    /// Factory reset until `ready`.
    pub restore_timeout_ms: u64,
    /// Joining an access point.
    pub join_timeout_ms: u64,
    /// Waiting for the `STATUS:` line.
    pub status_timeout_ms: u64,
}

impl Default for ModemConfig {
    fn default() -> Self {
        Self {
            restore_timeout_ms: 5000,
            join_timeout_ms: 20000,
            status_timeout_ms: 1000,
        }
    }
}

/// ThingSpeak channel upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MetricsConfig {
    pub host: String,
    pub port: u16,
    pub session: SessionTimeouts,
    /// Quiet period that ends the reply drain; the entry count is the last line.
    pub reply_timeout_ms: u64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            host: "api.thingspeak.com".to_string(),
            port: 80,
            session: SessionTimeouts {
                connect_ms: 10000,
                send_ok_ms: 1000,
                http_ok_ms: None,
                ..SessionTimeouts::default()
            },
            reply_timeout_ms: 1000,
        }
    }
}

/// Telegram bot messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MessagingConfig {
    pub host: String,
    pub port: u16,
    pub session: SessionTimeouts,
    /// Waiting for the `"ok":true` marker.
    pub reply_timeout_ms: u64,
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            host: "api.telegram.org".to_string(),
            port: 443,
            session: SessionTimeouts {
                connect_ms: 10000,
                send_ok_ms: 1000,
                http_ok_ms: None,
                ..SessionTimeouts::default()
            },
            reply_timeout_ms: 1000,
        }
    }
}

/// Blynk virtual pins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VariablesConfig {
    /// Hosts tried in order with [`Addressing::ExternalApi`].
    pub servers: ServerList,
    pub addressing: Addressing,
    /// Single host used with [`Addressing::Legacy`].
    pub legacy_host: String,
    pub port: u16,
    pub session: SessionTimeouts,
    /// Quiet period that ends the body drain.
    pub drain_timeout_ms: u64,
}

impl Default for VariablesConfig {
    fn default() -> Self {
        Self {
            servers: ServerList::default(),
            addressing: Addressing::default(),
            legacy_host: "blynk-cloud.com".to_string(),
            port: 80,
            session: SessionTimeouts::default(),
            drain_timeout_ms: 200,
        }
    }
}

/// SNTP through the module's built-in client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TimeConfig {
    pub ntp_server: String,
    /// Waiting for `OK` after `AT+CIPSNTPCFG`.
    pub configure_timeout_ms: u64,
    /// Waiting for each `+CIPSNTPTIME:` line.
    pub query_timeout_ms: u64,
    /// Overall budget for the module clock to leave 1970.
    pub sync_deadline_ms: u64,
    /// Pause between two queries while the clock is unsynchronised.
    pub retry_interval_ms: u64,
}

impl Default for TimeConfig {
    fn default() -> Self {
        Self {
            ntp_server: "pool.ntp.org".to_string(),
            configure_timeout_ms: 500,
            query_timeout_ms: 2000,
            sync_deadline_ms: 20000,
            retry_interval_ms: 100,
        }
    }
}
