//! # espat-core
//!
//! AT-command transport for ESP8266 WiFi co-processors.
//!
//! This crate provides:
//! - Line reassembly from an arbitrarily fragmented byte stream
//! - Command execution with confirmation matching and error fast-fail
//! - Deadline-bounded waits for specific response lines
//! - Percent-encoding for request targets
//!
//! This crate is intentionally runtime-agnostic and contains no async code.
//! All waiting is done by polling a [`Clock`] against a deadline while doing
//! non-blocking reads from a [`SerialPort`], so it runs the same on a host
//! and on a microcontroller.

pub mod buffer;
pub mod command;
pub mod config;
pub mod error;
pub mod link;
pub mod response;
pub mod transport;
pub mod urlencode;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use buffer::LineBuffer;
pub use command::{ERROR, OK};
pub use config::LinkConfig;
pub use error::AtError;
pub use link::{AtLink, Deadline};
pub use response::MatchResult;
pub use transport::{Clock, IoSerial, SerialPort, SystemClock};
