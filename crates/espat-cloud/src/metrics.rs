//! ThingSpeak channel uploads.
//!
//! One `GET /update` per upload. ThingSpeak answers with the number of the
//! entry it created as the whole body and closes the socket. The count is
//! the last line of the reply: a plain `5` after the headers, or
//! `+IPD,<len>:5` when the body arrives in a frame of its own. A count of
//! `0` means the update was refused (most often because of the 15 s rate
//! limit).

use std::iter;

use tracing::{info, warn};

use espat_core::{AtLink, Clock, SerialPort};
use espat_protocol::commands::{CLOSED, IPD};
use espat_protocol::{session, HttpGet, Protocol, SessionRequest};

use crate::config::MetricsConfig;
use crate::error::CloudError;
use crate::modem::Modem;

/// Number of fields a channel holds.
pub const FIELD_COUNT: usize = 8;

/// Field values for one upload. Field 1 is always sent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricFields {
    first: f64,
    rest: [Option<f64>; FIELD_COUNT - 1],
}

impl MetricFields {
    pub fn new(field1: f64) -> Self {
        Self {
            first: field1,
            rest: [None; FIELD_COUNT - 1],
        }
    }

    /// Set field `field` (1-based).
    pub fn with(mut self, field: usize, value: f64) -> Self {
        self.set(field, Some(value));
        self
    }

    /// Set or clear field `field` (1-based). Field 1 cannot be cleared.
    pub fn set(&mut self, field: usize, value: Option<f64>) {
        match (field, value) {
            (1, Some(value)) => self.first = value,
            (1, None) => warn!("field 1 is mandatory, ignoring clear"),
            _ => match field.checked_sub(2).and_then(|i| self.rest.get_mut(i)) {
                Some(slot) => *slot = value,
                None => warn!(field, "ignoring out-of-range metric field"),
            },
        }
    }

    pub fn get(&self, field: usize) -> Option<f64> {
        match field {
            1 => Some(self.first),
            _ => field
                .checked_sub(2)
                .and_then(|i| self.rest.get(i))
                .copied()
                .flatten(),
        }
    }

    /// Fields that carry a value, as `(number, value)` in field order.
    pub fn present(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        iter::once((1, self.first)).chain(
            self.rest
                .iter()
                .enumerate()
                .filter_map(|(i, value)| value.map(|v| (i + 2, v))),
        )
    }
}

/// Build the update request for `api_key`, addressed to `host`.
pub fn build_request(host: &str, api_key: &str, fields: &MetricFields) -> HttpGet {
    fields
        .present()
        .fold(
            HttpGet::new("/update").query("api_key", api_key),
            |request, (field, value)| request.query(&format!("field{}", field), value),
        )
        .host(host)
}

/// Extract the entry count from the last reply line.
///
/// Accepts a bare body (`5`), an `+IPD,<len>:5` frame, and either with a
/// glued `CLOSED` notice.
pub fn parse_accepted_count(line: &str) -> Option<u32> {
    let body = if line.starts_with(IPD) {
        line.split_once(':')?.1
    } else {
        line
    };
    let body = match body.find(CLOSED) {
        Some(end) => &body[..end],
        None => body,
    };
    let body = body.trim_start();
    let end = body
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(body.len());
    body[..end].parse().ok()
}

/// Uploads readings to a ThingSpeak channel.
#[derive(Debug, Clone)]
pub struct MetricsClient {
    config: MetricsConfig,
    modem: Modem,
    uploaded: bool,
}

impl MetricsClient {
    pub fn new(config: MetricsConfig, modem: Modem) -> Self {
        Self {
            config,
            modem,
            uploaded: false,
        }
    }

    /// True when the last upload was accepted.
    pub fn is_uploaded(&self) -> bool {
        self.uploaded
    }

    /// Upload `fields` and return the entry count ThingSpeak assigned.
    pub fn upload<S: SerialPort, C: Clock>(
        &mut self,
        link: &mut AtLink<S, C>,
        api_key: &str,
        fields: &MetricFields,
    ) -> Result<u32, CloudError> {
        self.uploaded = false;
        self.modem.require_wifi(link)?;

        let payload = build_request(&self.config.host, api_key, fields).to_wire();
        let request = SessionRequest {
            host: &self.config.host,
            port: self.config.port,
            protocol: Protocol::Tcp,
            payload: &payload,
            timeouts: self.config.session,
        };

        let mut connection = session::open(link, &request)?;
        let line = connection
            .drain_last_line(self.config.reply_timeout_ms)?
            .ok_or(CloudError::NoReply(IPD))?;
        connection.close();

        let count = parse_accepted_count(&line).ok_or_else(|| CloudError::Malformed {
            line: line.clone(),
            reason: "no entry count",
        })?;
        if count == 0 {
            warn!("ThingSpeak refused the update");
            return Err(CloudError::Rejected("entry count 0".to_string()));
        }

        self.uploaded = true;
        info!(count, "metrics uploaded");
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModemConfig;
    use espat_core::testing::{ManualClock, ScriptedSerial};
    use pretty_assertions::assert_eq;

    fn client() -> MetricsClient {
        MetricsClient::new(MetricsConfig::default(), Modem::new(ModemConfig::default()))
    }

    fn online() -> ScriptedSerial {
        let mut serial = ScriptedSerial::new();
        serial
            .always("AT+CIPSTATUS", "STATUS:2\r\nOK\r\n")
            .always("AT+CIPSTART", "CONNECT\r\n\r\nOK\r\n")
            .always("AT+CIPSEND", "OK\r\n> ");
        serial
    }

    #[test]
    fn test_fields_gated_individually() {
        let fields = MetricFields::new(21.5).with(3, 7.0).with(8, -1.0);
        assert_eq!(
            build_request("api.thingspeak.com", "KEY", &fields).target(),
            "/update?api_key=KEY&field1=21.5&field3=7&field8=-1"
        );
    }

    #[test]
    fn test_field_bounds() {
        let mut fields = MetricFields::new(1.0).with(9, 5.0).with(0, 5.0);
        assert_eq!(fields.present().count(), 1);

        fields.set(1, None);
        assert_eq!(fields.get(1), Some(1.0));

        fields.set(2, Some(4.0));
        assert_eq!(fields.get(2), Some(4.0));
        fields.set(2, None);
        assert_eq!(fields.get(2), None);
        assert_eq!(fields.get(42), None);
    }

    #[test]
    fn test_parse_accepted_count() {
        assert_eq!(parse_accepted_count("+IPD,1:5CLOSED"), Some(5));
        assert_eq!(parse_accepted_count("+IPD,4:1234"), Some(1234));
        assert_eq!(parse_accepted_count("+IPD,1:0CLOSED"), Some(0));
        assert_eq!(parse_accepted_count("+IPD,1:CLOSED"), None);
        assert_eq!(parse_accepted_count("+IPD"), None);
        assert_eq!(parse_accepted_count("5"), Some(5));
        assert_eq!(parse_accepted_count("5CLOSED"), Some(5));
        assert_eq!(parse_accepted_count("Content-Type: text/plain"), None);
    }

    #[test]
    fn test_upload_reports_count() {
        let mut serial = online();
        serial.on("GET /update", "SEND OK\r\n+IPD,2:17CLOSED\r\n");
        let mut link = AtLink::new(serial, ManualClock::new());
        let mut metrics = client();

        let count = metrics
            .upload(&mut link, "KEY", &MetricFields::new(1.0))
            .unwrap();
        assert_eq!(count, 17);
        assert!(metrics.is_uploaded());
        assert_eq!(
            link.serial().written()[1],
            "AT+CIPSTART=\"TCP\",\"api.thingspeak.com\",80"
        );
    }

    #[test]
    fn test_upload_reads_count_after_headers() {
        let mut serial = online();
        serial.on(
            "GET /update",
            "SEND OK\r\n\r\n+IPD,180:HTTP/1.1 200 OK\r\n\
             Content-Type: text/plain; charset=utf-8\r\n\
             Connection: close\r\n\r\n5CLOSED\r\n",
        );
        let mut link = AtLink::new(serial, ManualClock::new());
        let mut metrics = client();

        let count = metrics
            .upload(&mut link, "K", &MetricFields::new(1.0))
            .unwrap();
        assert_eq!(count, 5);
        assert_eq!(
            link.serial().written()[3],
            "GET /update?api_key=K&field1=1 HTTP/1.1\r\nHost: api.thingspeak.com\r\n"
        );
    }

    #[test]
    fn test_zero_count_is_rejected() {
        let mut serial = online();
        serial.on("GET /update", "SEND OK\r\n+IPD,1:0CLOSED\r\n");
        let mut link = AtLink::new(serial, ManualClock::new());
        let mut metrics = client();

        let err = metrics
            .upload(&mut link, "KEY", &MetricFields::new(1.0))
            .unwrap_err();
        assert!(matches!(err, CloudError::Rejected(_)));
        assert!(!metrics.is_uploaded());
    }

    #[test]
    fn test_missing_reply_closes_connection() {
        let mut serial = online();
        serial.on("GET /update", "SEND OK\r\n");
        let mut link = AtLink::new(serial, ManualClock::new());
        let mut metrics = client();

        let err = metrics
            .upload(&mut link, "KEY", &MetricFields::new(1.0))
            .unwrap_err();
        assert!(matches!(err, CloudError::NoReply(IPD)));
        assert_eq!(link.serial().count_written("AT+CIPCLOSE"), 1);
    }

    #[test]
    fn test_offline_sends_nothing_else() {
        let mut serial = ScriptedSerial::new();
        serial.always("AT+CIPSTATUS", "STATUS:5\r\nOK\r\n");
        let mut link = AtLink::new(serial, ManualClock::new());
        let mut metrics = client();

        let err = metrics
            .upload(&mut link, "KEY", &MetricFields::new(1.0))
            .unwrap_err();
        assert!(matches!(err, CloudError::WifiDisconnected));
        assert_eq!(link.serial().written(), ["AT+CIPSTATUS"]);
    }
}
