//! Sending AT commands and waiting for their confirmation.

use tracing::{debug, trace, warn};

use crate::buffer::LINE_DELIMITER;
use crate::error::AtError;
use crate::link::AtLink;
use crate::transport::{Clock, SerialPort};

/// Confirmation token most commands answer with.
pub const OK: &str = "OK";

/// Token the firmware sends when it refuses a command.
pub const ERROR: &str = "ERROR";

impl<S: SerialPort, C: Clock> AtLink<S, C> {
    /// Send `command` terminated by `\r\n` and wait for `expected`.
    ///
    /// Stale input is flushed first so replies to an earlier command cannot
    /// be mistaken for this one. With `expected == None` the command is
    /// fire-and-forget and returns as soon as it is written.
    ///
    /// Unrelated lines received before the confirmation are discarded. When
    /// waiting for `"OK"`, a line containing `"ERROR"` fails immediately
    /// instead of running out the deadline.
    pub fn send_command(
        &mut self,
        command: &str,
        expected: Option<&str>,
        timeout_ms: u64,
    ) -> Result<(), AtError> {
        self.clock.sleep_ms(self.config.settle_delay_ms);
        self.serial.clear_input()?;
        self.buffer.reset();

        debug!(command, "tx");
        let mut frame = Vec::with_capacity(command.len() + LINE_DELIMITER.len());
        frame.extend_from_slice(command.as_bytes());
        frame.extend_from_slice(LINE_DELIMITER);
        self.serial.write_all(&frame)?;

        let Some(expected) = expected else {
            return Ok(());
        };
        let fast_fail = expected == OK;

        let outcome = self.poll(timeout_ms, |buffer| {
            while let Some(line) = buffer.take_line() {
                if line.contains(expected) {
                    return Some(Ok(line));
                }
                if fast_fail && line.contains(ERROR) {
                    return Some(Err(line));
                }
                trace!(line = %line, "skipped");
            }
            None
        })?;

        match outcome {
            Some(Ok(line)) => {
                debug!(command, line = %line, "confirmed");
                Ok(())
            }
            Some(Err(line)) => {
                warn!(command, line = %line, "command rejected");
                Err(AtError::Rejected {
                    command: command.to_string(),
                    line,
                })
            }
            None => {
                debug!(command, expected, timeout_ms, "no confirmation");
                Err(AtError::Timeout {
                    expected: expected.to_string(),
                    timeout_ms,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ManualClock, ScriptedSerial};
    use pretty_assertions::assert_eq;

    fn link(serial: ScriptedSerial) -> AtLink<ScriptedSerial, ManualClock> {
        AtLink::new(serial, ManualClock::new())
    }

    #[test]
    fn test_ok_confirms() {
        let mut serial = ScriptedSerial::new();
        serial.on("ATE0", "ATE0\r\n\r\nOK\r\n");
        let mut link = link(serial);

        link.send_command("ATE0", Some(OK), 100).unwrap();

        assert_eq!(link.serial().written(), ["ATE0"]);
    }

    #[test]
    fn test_error_fails_fast() {
        let mut serial = ScriptedSerial::new();
        serial.on("ATE0", "ERROR\r\n");
        let mut link = link(serial);

        let err = link.send_command("ATE0", Some(OK), 10_000).unwrap_err();

        assert!(matches!(err, AtError::Rejected { .. }));
        assert!(link.clock().now_ms() < 100);
    }

    #[test]
    fn test_error_is_not_fatal_for_other_tokens() {
        let mut serial = ScriptedSerial::new();
        serial.on("AT+RESTORE", "ERROR\r\nready\r\n");
        let mut link = link(serial);

        link.send_command("AT+RESTORE", Some("ready"), 5000).unwrap();
    }

    #[test]
    fn test_times_out_without_confirmation() {
        let mut serial = ScriptedSerial::new();
        serial.on("AT+CWJAP", "WIFI DISCONNECT\r\n");
        let mut link = link(serial);

        let err = link
            .send_command("AT+CWJAP=\"ssid\",\"pw\"", Some(OK), 200)
            .unwrap_err();

        assert!(err.is_timeout());
        assert!(link.clock().now_ms() > 200);
    }

    #[test]
    fn test_skips_chatter_before_confirmation() {
        let mut serial = ScriptedSerial::new().with_chunk_size(3);
        serial.on(
            "AT+CWJAP",
            "WIFI CONNECTED\r\nWIFI GOT IP\r\n\r\nOK\r\n",
        );
        let mut link = link(serial);

        link.send_command("AT+CWJAP=\"ssid\",\"pw\"", Some(OK), 1000)
            .unwrap();
    }

    #[test]
    fn test_fire_and_forget_does_not_wait() {
        let mut link = link(ScriptedSerial::new());

        link.send_command("GET / HTTP/1.1\r\n", None, 5000).unwrap();

        assert_eq!(link.clock().now_ms(), link.config().settle_delay_ms);
        assert_eq!(link.serial().written(), ["GET / HTTP/1.1\r\n"]);
    }

    #[test]
    fn test_flushes_stale_input() {
        let mut serial = ScriptedSerial::new();
        serial.push_unsolicited("OK\r\n");
        let mut link = link(serial);

        let err = link.send_command("AT+CIPCLOSE", Some(OK), 50).unwrap_err();

        assert!(err.is_timeout());
    }

    #[test]
    fn test_unterminated_confirmation_does_not_match() {
        let mut serial = ScriptedSerial::new();
        serial.on("AT", "OK");
        let mut link = link(serial);

        assert!(link.send_command("AT", Some(OK), 50).is_err());
    }
}
