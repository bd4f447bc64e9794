//! # espat-protocol
//!
//! AT command set and HTTP request sessions on top of [`espat_core`].
//!
//! This crate defines the commands the integrations send, the minimal HTTP
//! request format written over a module socket, and the connection session
//! that ties them together.

pub mod commands;
pub mod http;
pub mod session;

pub use commands::{AtCommand, Protocol};
pub use http::{is_success_status, HttpGet};
pub use session::{
    open, request, Connection, SessionError, SessionOutcome, SessionRequest, SessionTimeouts,
};
