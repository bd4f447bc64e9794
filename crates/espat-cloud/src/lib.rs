//! # espat-cloud
//!
//! Cloud integrations driven through an ESP8266 AT link:
//!
//! - [`MetricsClient`]: ThingSpeak channel uploads
//! - [`RemoteVariables`]: Blynk virtual pins with server failover
//! - [`MessagingClient`]: Telegram bot messages
//! - [`TimeSync`]: internet time through the module's SNTP client
//!
//! [`Esp8266`] bundles the link with all of them and the module bring-up
//! helpers in [`Modem`].

pub mod config;
pub mod device;
pub mod error;
pub mod messaging;
pub mod metrics;
pub mod modem;
pub mod time_sync;
pub mod variables;

pub use config::{CloudConfig, ConfigError};
pub use device::Esp8266;
pub use error::CloudError;
pub use messaging::MessagingClient;
pub use metrics::{MetricFields, MetricsClient};
pub use modem::{Modem, WifiStatus};
pub use time_sync::{parse_time_line, TimeParseError, TimeRecord, TimeSync};
pub use variables::{Addressing, RemoteVariables, ServerList};
