//! The AT link: exclusive owner of the serial channel and its receive buffer.
//!
//! Every wait in the system goes through [`AtLink::poll`]: read whatever the
//! UART has, let the caller inspect the buffered lines, then sleep briefly
//! until the deadline runs out. Command and response helpers live in
//! [`crate::command`] and [`crate::response`].

use tracing::trace;

use crate::buffer::LineBuffer;
use crate::config::LinkConfig;
use crate::error::AtError;
use crate::transport::{Clock, SerialPort};

/// Reads performed per poll iteration before the buffer is inspected.
const MAX_READS_PER_FILL: usize = 32;

/// A wall-clock budget measured against a [`Clock`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    start_ms: u64,
    budget_ms: u64,
}

impl Deadline {
    /// Start a budget of `budget_ms` from the clock's current time.
    pub fn start(clock: &impl Clock, budget_ms: u64) -> Self {
        Self {
            start_ms: clock.now_ms(),
            budget_ms,
        }
    }

    /// True once strictly more than the budget has elapsed.
    pub fn expired(&self, clock: &impl Clock) -> bool {
        self.elapsed_ms(clock) > self.budget_ms
    }

    pub fn elapsed_ms(&self, clock: &impl Clock) -> u64 {
        clock.now_ms().saturating_sub(self.start_ms)
    }

    pub fn remaining_ms(&self, clock: &impl Clock) -> u64 {
        self.budget_ms.saturating_sub(self.elapsed_ms(clock))
    }
}

/// Exclusive handle on one physical AT channel.
///
/// Only one command may be in flight; `&mut self` on every operation
/// enforces that.
pub struct AtLink<S, C> {
    pub(crate) serial: S,
    pub(crate) clock: C,
    pub(crate) buffer: LineBuffer,
    pub(crate) config: LinkConfig,
    scratch: Vec<u8>,
}

impl<S: SerialPort, C: Clock> AtLink<S, C> {
    /// Create a link with default settings.
    pub fn new(serial: S, clock: C) -> Self {
        Self::with_config(serial, clock, LinkConfig::default())
    }

    /// Create a link with explicit settings.
    pub fn with_config(serial: S, clock: C, config: LinkConfig) -> Self {
        let scratch = vec![0u8; config.read_chunk_size.max(1)];
        Self {
            serial,
            clock,
            buffer: LineBuffer::new(),
            config,
            scratch,
        }
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn serial(&self) -> &S {
        &self.serial
    }

    pub fn serial_mut(&mut self) -> &mut S {
        &mut self.serial
    }

    /// Receive buffer as currently filled.
    pub fn buffer(&self) -> &LineBuffer {
        &self.buffer
    }

    /// Sleep on the link's clock.
    pub fn pause(&self, ms: u64) {
        self.clock.sleep_ms(ms);
    }

    pub fn into_parts(self) -> (S, C) {
        (self.serial, self.clock)
    }

    /// Move every byte the UART has ready into the line buffer.
    pub(crate) fn fill(&mut self) -> Result<usize, AtError> {
        let mut total = 0;
        let mut reads = 0;
        loop {
            let n = self.serial.read_available(&mut self.scratch)?;
            if n == 0 {
                break;
            }
            self.buffer.append(&self.scratch[..n]);
            total += n;
            reads += 1;
            if reads == MAX_READS_PER_FILL {
                break;
            }
        }
        if total > 0 {
            trace!(bytes = total, buffered = self.buffer.len(), "rx");
        }
        Ok(total)
    }

    /// Read, inspect and sleep until `inspect` yields a value or `timeout_ms`
    /// elapses.
    ///
    /// `inspect` sees the buffer after each read and is expected to consume
    /// the lines it looks at. Returns `Ok(None)` on expiry.
    pub fn poll<T>(
        &mut self,
        timeout_ms: u64,
        mut inspect: impl FnMut(&mut LineBuffer) -> Option<T>,
    ) -> Result<Option<T>, AtError> {
        let deadline = Deadline::start(&self.clock, timeout_ms);
        loop {
            self.fill()?;
            if let Some(value) = inspect(&mut self.buffer) {
                return Ok(Some(value));
            }
            if deadline.expired(&self.clock) {
                return Ok(None);
            }
            self.clock.sleep_ms(self.config.poll_interval_ms);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ManualClock, ScriptedSerial};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_deadline() {
        let clock = ManualClock::new();
        let deadline = Deadline::start(&clock, 100);

        clock.advance(100);
        assert!(!deadline.expired(&clock));
        assert_eq!(deadline.remaining_ms(&clock), 0);

        clock.advance(1);
        assert!(deadline.expired(&clock));
    }

    #[test]
    fn test_poll_times_out() {
        let mut link = AtLink::new(ScriptedSerial::new(), ManualClock::new());

        let result = link.poll(50, |buffer| buffer.take_line()).unwrap();

        assert_eq!(result, None);
        assert!(link.clock().now_ms() > 50);
    }

    #[test]
    fn test_poll_returns_first_value() {
        let mut serial = ScriptedSerial::new();
        serial.push_unsolicited("WIFI CONNECTED\r\n");
        let mut link = AtLink::new(serial, ManualClock::new());

        let result = link.poll(50, |buffer| buffer.take_line()).unwrap();

        assert_eq!(result, Some("WIFI CONNECTED".to_string()));
        assert_eq!(link.clock().now_ms(), 0);
    }
}
