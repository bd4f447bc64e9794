//! Waiting for a specific line without sending anything.

use tracing::{debug, trace};

use crate::error::AtError;
use crate::link::AtLink;
use crate::transport::{Clock, SerialPort};

/// Outcome of a bounded wait for a line containing a substring.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MatchResult {
    matched: bool,
    partial: bool,
    line: String,
}

impl MatchResult {
    /// A complete, delimited line matched.
    pub fn line(line: String) -> Self {
        Self {
            matched: true,
            partial: false,
            line,
        }
    }

    /// The deadline expired but the unterminated remainder matched.
    pub fn partial(line: String) -> Self {
        Self {
            matched: true,
            partial: true,
            line,
        }
    }

    /// The deadline expired without a match.
    pub fn not_found() -> Self {
        Self::default()
    }

    pub fn is_matched(&self) -> bool {
        self.matched
    }

    /// True when the match came from bytes without a trailing delimiter.
    pub fn is_partial(&self) -> bool {
        self.partial
    }

    /// Matched text; empty when nothing matched.
    pub fn as_str(&self) -> &str {
        &self.line
    }

    pub fn into_line(self) -> Option<String> {
        self.matched.then_some(self.line)
    }
}

impl<S: SerialPort, C: Clock> AtLink<S, C> {
    /// Wait up to `timeout_ms` for a line containing `expected`.
    ///
    /// The buffer is not cleared on entry, so this can be called repeatedly
    /// after [`send_command`](AtLink::send_command) to walk through a
    /// multi-line reply. Non-matching lines are consumed; a matching one is
    /// consumed and returned with everything after it left in place.
    ///
    /// If the deadline expires while an unterminated fragment containing
    /// `expected` sits in the buffer, the fragment is consumed and returned as
    /// a partial match. This covers firmware that omits the final delimiter.
    pub fn get_response(&mut self, expected: &str, timeout_ms: u64) -> Result<MatchResult, AtError> {
        let found = self.poll(timeout_ms, |buffer| {
            while let Some(line) = buffer.take_line() {
                if line.contains(expected) {
                    return Some(line);
                }
                trace!(line = %line, "skipped");
            }
            None
        })?;

        if let Some(line) = found {
            debug!(expected, line = %line, "matched");
            return Ok(MatchResult::line(line));
        }

        if !self.buffer.is_empty() && self.buffer.pending_contains(expected) {
            let line = self.buffer.take_pending();
            debug!(expected, line = %line, "matched unterminated fragment");
            return Ok(MatchResult::partial(line));
        }

        trace!(expected, timeout_ms, "no match");
        Ok(MatchResult::not_found())
    }
}
