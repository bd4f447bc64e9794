//! One HTTP request over an AT-managed socket.
//!
//! A session opens a TCP or SSL socket through the module, writes one
//! request, waits for `SEND OK` and optionally for a `200` status line, then
//! hands the open [`Connection`] to the caller so it can read the body.
//! The socket is closed when the connection is closed or dropped, including
//! on every early-return path inside [`open`].

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use espat_core::buffer::LINE_DELIMITER;
use espat_core::{AtError, AtLink, Clock, MatchResult, SerialPort, OK};

use crate::commands::{AtCommand, Protocol, CLOSED, SEND_OK};
use crate::http::{is_success_status, STATUS_LINE};

/// Deadlines for each step of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SessionTimeouts {
    /// Opening the socket, including DNS and TLS handshake.
    pub connect_ms: u64,
    /// Waiting for the module to accept the payload length.
    pub send_length_ms: u64,
    /// Waiting for `SEND OK` after the payload.
    pub send_ok_ms: u64,
    /// Waiting for the HTTP status line; `None` skips the check.
    pub http_ok_ms: Option<u64>,
    /// Closing the socket.
    pub close_ms: u64,
}

impl Default for SessionTimeouts {
    fn default() -> Self {
        Self {
            connect_ms: 5000,
            send_length_ms: 1000,
            send_ok_ms: 5000,
            http_ok_ms: Some(5000),
            close_ms: 1000,
        }
    }
}

/// Where to connect and what to send.
#[derive(Debug, Clone)]
pub struct SessionRequest<'a> {
    pub host: &'a str,
    pub port: u16,
    pub protocol: Protocol,
    /// Request bytes, usually [`HttpGet::to_wire`](crate::http::HttpGet::to_wire).
    pub payload: &'a str,
    pub timeouts: SessionTimeouts,
}

/// How far a session got.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionOutcome {
    pub opened: bool,
    pub sent: bool,
    pub http200: bool,
}

/// Errors that end a session early.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The socket could not be opened.
    #[error("could not open {protocol} connection to {host}:{port}: {source}")]
    Connect {
        protocol: Protocol,
        host: String,
        port: u16,
        source: AtError,
    },

    /// The module did not accept or transmit the request.
    #[error("request was not sent: {0}")]
    Send(#[source] AtError),

    /// No status line arrived.
    #[error("no HTTP status line: {0}")]
    Status(#[source] AtError),

    /// The status line did not report success.
    #[error("server answered {0:?}")]
    Rejected(String),
}

impl SessionError {
    /// Steps completed before the failure.
    pub fn outcome(&self) -> SessionOutcome {
        match self {
            SessionError::Connect { .. } => SessionOutcome::default(),
            SessionError::Send(_) => SessionOutcome {
                opened: true,
                ..Default::default()
            },
            SessionError::Status(_) | SessionError::Rejected(_) => SessionOutcome {
                opened: true,
                sent: true,
                http200: false,
            },
        }
    }
}

/// An open socket with the request already sent.
///
/// Closing is best-effort: a close that is not confirmed is logged and
/// otherwise ignored.
pub struct Connection<'l, S: SerialPort, C: Clock> {
    link: &'l mut AtLink<S, C>,
    close_timeout_ms: u64,
    outcome: SessionOutcome,
    status_line: Option<String>,
    closed: bool,
}

impl<'l, S: SerialPort, C: Clock> Connection<'l, S, C> {
    pub fn outcome(&self) -> SessionOutcome {
        self.outcome
    }

    /// Status line seen while opening, if the check was requested.
    pub fn status_line(&self) -> Option<&str> {
        self.status_line.as_deref()
    }

    /// Wait for the next line containing `expected`.
    pub fn next_line(&mut self, expected: &str, timeout_ms: u64) -> Result<MatchResult, AtError> {
        self.link.get_response(expected, timeout_ms)
    }

    /// Read every remaining line until none arrives within `timeout_ms` and
    /// return the last non-empty one.
    ///
    /// A `CLOSED` notice from the module is not part of the body. On its own
    /// line it is dropped. When the body has no line ending the notice is
    /// glued to it (`42CLOSED`); it is cut off the final line only in that
    /// case, so a body that itself ends in `CLOSED` survives.
    pub fn drain_last_line(&mut self, timeout_ms: u64) -> Result<Option<String>, AtError> {
        let mut previous: Option<String> = None;
        let mut last: Option<MatchResult> = None;
        loop {
            let reply = self.link.get_response("", timeout_ms)?;
            if !reply.is_matched() {
                break;
            }
            if reply.as_str().is_empty() {
                continue;
            }
            if let Some(earlier) = last.replace(reply) {
                previous = earlier.into_line();
            }
        }

        Ok(match last {
            None => None,
            Some(notice) if notice.as_str() == CLOSED => previous,
            Some(fragment) if fragment.is_partial() => fragment.into_line(),
            Some(line) => line.into_line().map(|line| match line.strip_suffix(CLOSED) {
                Some(body) if !body.is_empty() => body.to_string(),
                _ => line,
            }),
        })
    }

    /// Close the socket now.
    pub fn close(mut self) {
        self.shutdown();
    }

    fn send(&mut self, payload: &str, timeouts: &SessionTimeouts) -> Result<(), SessionError> {
        let length = AtCommand::SendLength(payload.len() + LINE_DELIMITER.len()).to_string();
        self.link
            .send_command(&length, Some(OK), timeouts.send_length_ms)
            .map_err(SessionError::Send)?;
        self.link
            .send_command(payload, None, 0)
            .map_err(SessionError::Send)?;

        let accepted = self
            .link
            .get_response(SEND_OK, timeouts.send_ok_ms)
            .map_err(SessionError::Send)?;
        if !accepted.is_matched() {
            return Err(SessionError::Send(AtError::Timeout {
                expected: SEND_OK.to_string(),
                timeout_ms: timeouts.send_ok_ms,
            }));
        }

        self.outcome.sent = true;
        Ok(())
    }

    fn await_status(&mut self, timeout_ms: u64) -> Result<(), SessionError> {
        let reply = self
            .link
            .get_response(STATUS_LINE, timeout_ms)
            .map_err(SessionError::Status)?;
        let Some(line) = reply.into_line() else {
            return Err(SessionError::Status(AtError::Timeout {
                expected: STATUS_LINE.to_string(),
                timeout_ms,
            }));
        };
        if !is_success_status(&line) {
            return Err(SessionError::Rejected(line));
        }

        self.status_line = Some(line);
        self.outcome.http200 = true;
        Ok(())
    }

    fn shutdown(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        let close = AtCommand::Close.to_string();
        if let Err(err) = self.link.send_command(&close, Some(OK), self.close_timeout_ms) {
            debug!(%err, "close not confirmed");
        }
    }
}

impl<S: SerialPort, C: Clock> Drop for Connection<'_, S, C> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Open a socket, send `request.payload` and wait for it to be accepted.
///
/// On success the returned connection is still open so the caller can read
/// the response body. Any failure after the socket opened closes it before
/// returning.
pub fn open<'l, S: SerialPort, C: Clock>(
    link: &'l mut AtLink<S, C>,
    request: &SessionRequest<'_>,
) -> Result<Connection<'l, S, C>, SessionError> {
    let timeouts = request.timeouts;
    let start = AtCommand::Start {
        protocol: request.protocol,
        host: request.host,
        port: request.port,
    }
    .to_string();

    if let Err(source) = link.send_command(&start, Some(OK), timeouts.connect_ms) {
        warn!(host = request.host, port = request.port, %source, "connect failed");
        return Err(SessionError::Connect {
            protocol: request.protocol,
            host: request.host.to_string(),
            port: request.port,
            source,
        });
    }

    let mut connection = Connection {
        link,
        close_timeout_ms: timeouts.close_ms,
        outcome: SessionOutcome {
            opened: true,
            ..Default::default()
        },
        status_line: None,
        closed: false,
    };

    connection.send(request.payload, &timeouts)?;
    if let Some(http_ok_ms) = timeouts.http_ok_ms {
        connection.await_status(http_ok_ms)?;
    }

    info!(host = request.host, port = request.port, "request accepted");
    Ok(connection)
}

/// Run a whole session and close it straight away.
///
/// For services where the status line is the only result of interest.
pub fn request<S: SerialPort, C: Clock>(
    link: &mut AtLink<S, C>,
    request: &SessionRequest<'_>,
) -> SessionOutcome {
    match open(link, request) {
        Ok(connection) => {
            let outcome = connection.outcome();
            connection.close();
            outcome
        }
        Err(err) => {
            debug!(%err, "session failed");
            err.outcome()
        }
    }
}
