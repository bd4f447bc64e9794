//! Blynk virtual pins with server failover.
//!
//! Blynk runs several regional clouds and a token only works on the one it
//! was issued by, so requests walk a list of hosts until one answers. The
//! host that answered moves to the front of the list and is tried first on
//! the next request.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use espat_core::urlencode::encode;
use espat_core::{AtLink, Clock, SerialPort};
use espat_protocol::{session, HttpGet, Protocol, SessionRequest};

use crate::config::VariablesConfig;
use crate::error::CloudError;
use crate::modem::Modem;

/// Hosts tried when no list is configured.
pub const DEFAULT_SERVERS: [&str; 7] = [
    "blynk.cloud",
    "fra1.blynk.cloud",
    "lon1.blynk.cloud",
    "ny3.blynk.cloud",
    "sgp1.blynk.cloud",
    "blr1.blynk.cloud",
    "iot.serangkota.go.id",
];

/// Ordered list of candidate hosts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServerList(Vec<String>);

impl ServerList {
    pub fn new<I, T>(hosts: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self(hosts.into_iter().map(Into::into).collect())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.0.get(index).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Move the host at `index` to the front, keeping the others in order.
    pub fn promote(&mut self, index: usize) {
        if index < self.0.len() {
            self.0[..=index].rotate_right(1);
        }
    }
}

impl Default for ServerList {
    fn default() -> Self {
        Self::new(DEFAULT_SERVERS)
    }
}

/// URL scheme for pin requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Addressing {
    /// `/external/api/get?token=..&V0` against the server list.
    #[default]
    ExternalApi,
    /// `/<token>/get/V0` against the single legacy host.
    Legacy,
}

/// A single pin operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinRequest<'a> {
    Read { pin: &'a str },
    Write { pin: &'a str, value: &'a str },
}

/// Build the request for `op` under `addressing`. Written values are
/// percent-encoded.
pub fn build_request(addressing: Addressing, token: &str, op: PinRequest<'_>) -> HttpGet {
    match (addressing, op) {
        (Addressing::ExternalApi, PinRequest::Read { pin }) => HttpGet::new("/external/api/get")
            .query("token", token)
            .query_flag(pin),
        (Addressing::ExternalApi, PinRequest::Write { pin, value }) => {
            HttpGet::new("/external/api/update")
                .query("token", token)
                .query(pin, encode(value))
        }
        (Addressing::Legacy, PinRequest::Read { pin }) => {
            HttpGet::new(format!("/{}/get/{}", token, pin))
        }
        (Addressing::Legacy, PinRequest::Write { pin, value }) => {
            HttpGet::new(format!("/{}/update/{}", token, pin)).query("value", encode(value))
        }
    }
}

/// Reads and writes Blynk virtual pins.
#[derive(Debug, Clone)]
pub struct RemoteVariables {
    config: VariablesConfig,
    servers: ServerList,
    modem: Modem,
    updated: bool,
}

impl RemoteVariables {
    pub fn new(config: VariablesConfig, modem: Modem) -> Self {
        let servers = match config.addressing {
            Addressing::ExternalApi => config.servers.clone(),
            Addressing::Legacy => ServerList::new([config.legacy_host.clone()]),
        };
        Self {
            config,
            servers,
            modem,
            updated: false,
        }
    }

    /// True when the last read or write succeeded.
    pub fn is_updated(&self) -> bool {
        self.updated
    }

    /// Current host order.
    pub fn servers(&self) -> &ServerList {
        &self.servers
    }

    /// Read `pin`. The value is the last non-empty line of the body.
    pub fn read<S: SerialPort, C: Clock>(
        &mut self,
        link: &mut AtLink<S, C>,
        token: &str,
        pin: &str,
    ) -> Result<String, CloudError> {
        self.exchange(link, token, PinRequest::Read { pin })
    }

    /// Write `value` to `pin`.
    pub fn write<S: SerialPort, C: Clock>(
        &mut self,
        link: &mut AtLink<S, C>,
        token: &str,
        pin: &str,
        value: &str,
    ) -> Result<(), CloudError> {
        self.exchange(link, token, PinRequest::Write { pin, value })
            .map(|_| ())
    }

    fn exchange<S: SerialPort, C: Clock>(
        &mut self,
        link: &mut AtLink<S, C>,
        token: &str,
        op: PinRequest<'_>,
    ) -> Result<String, CloudError> {
        self.updated = false;
        self.modem.require_wifi(link)?;

        let payload = build_request(self.config.addressing, token, op).to_wire();
        let attempted = self.servers.len();
        for index in 0..attempted {
            let Some(host) = self.servers.get(index).map(str::to_string) else {
                break;
            };
            match self.try_server(link, &host, &payload) {
                Ok(value) => {
                    self.servers.promote(index);
                    self.updated = true;
                    info!(host = %host, "pin exchange succeeded");
                    return Ok(value);
                }
                Err(err) => warn!(host = %host, %err, "server failed, trying next"),
            }
        }

        Err(CloudError::AllServersFailed { attempted })
    }

    fn try_server<S: SerialPort, C: Clock>(
        &self,
        link: &mut AtLink<S, C>,
        host: &str,
        payload: &str,
    ) -> Result<String, CloudError> {
        let request = SessionRequest {
            host,
            port: self.config.port,
            protocol: Protocol::Tcp,
            payload,
            timeouts: self.config.session,
        };
        let mut connection = session::open(link, &request)?;
        let value = connection.drain_last_line(self.config.drain_timeout_ms)?;
        connection.close();
        debug!(host, value = ?value, "body drained");
        Ok(value.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use espat_core::testing::{ManualClock, ScriptedSerial};
    use pretty_assertions::assert_eq;

    const REPLY: &str =
        "SEND OK\r\n+IPD,64:HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\n42CLOSED\r\n";

    fn online() -> ScriptedSerial {
        let mut serial = ScriptedSerial::new();
        serial
            .always("AT+CIPSTATUS", "STATUS:2\r\nOK\r\n")
            .always("AT+CIPSEND", "OK\r\n> ");
        serial
    }

    fn variables(config: VariablesConfig) -> RemoteVariables {
        RemoteVariables::new(config, Modem::default())
    }

    #[test]
    fn test_promote() {
        let mut list = ServerList::new(["A", "B", "C", "D"]);
        list.promote(2);
        assert_eq!(list, ServerList::new(["C", "A", "B", "D"]));

        list.promote(0);
        assert_eq!(list, ServerList::new(["C", "A", "B", "D"]));

        list.promote(9);
        assert_eq!(list.len(), 4);
    }

    #[test]
    fn test_default_servers() {
        let list = ServerList::default();
        assert_eq!(list.get(0), Some("blynk.cloud"));
        assert_eq!(list.iter().last(), Some("iot.serangkota.go.id"));
    }

    #[test]
    fn test_request_paths() {
        let read = PinRequest::Read { pin: "V0" };
        let write = PinRequest::Write {
            pin: "V1",
            value: "a b",
        };

        assert_eq!(
            build_request(Addressing::ExternalApi, "T", read).target(),
            "/external/api/get?token=T&V0"
        );
        assert_eq!(
            build_request(Addressing::ExternalApi, "T", write).target(),
            "/external/api/update?token=T&V1=a%20b"
        );
        assert_eq!(
            build_request(Addressing::Legacy, "T", read).target(),
            "/T/get/V0"
        );
        assert_eq!(
            build_request(Addressing::Legacy, "T", write).target(),
            "/T/update/V1?value=a%20b"
        );
    }

    #[test]
    fn test_read_first_server() {
        let mut serial = online();
        serial.always("AT+CIPSTART", "OK\r\n").on("GET ", REPLY);
        let mut link = AtLink::new(serial, ManualClock::new());
        let mut vars = variables(VariablesConfig::default());

        assert_eq!(vars.read(&mut link, "T", "V0").unwrap(), "42");
        assert!(vars.is_updated());
        assert_eq!(vars.servers().get(0), Some("blynk.cloud"));
        assert_eq!(link.serial().count_written("AT+CIPCLOSE"), 1);
    }

    #[test]
    fn test_write_rotates_to_answering_server() {
        let mut serial = online();
        serial
            .on("AT+CIPSTART=\"TCP\",\"b.example\"", "OK\r\n")
            .on("GET /external/api/update", REPLY);
        let mut link = AtLink::new(serial, ManualClock::new());
        let config = VariablesConfig {
            servers: ServerList::new(["a.example", "b.example", "c.example"]),
            ..VariablesConfig::default()
        };
        let mut vars = variables(config);

        vars.write(&mut link, "T", "V1", "on").unwrap();
        assert!(vars.is_updated());
        assert_eq!(
            vars.servers(),
            &ServerList::new(["b.example", "a.example", "c.example"])
        );
    }

    #[test]
    fn test_error_status_moves_on_to_next_server() {
        let mut serial = online();
        serial
            .always("AT+CIPSTART", "OK\r\n")
            .on(
                "GET ",
                "SEND OK\r\n+IPD,200:HTTP/1.1 404 Not Found\r\n\r\nInvalid token.CLOSED\r\n",
            )
            .on("GET ", REPLY);
        let mut link = AtLink::new(serial, ManualClock::new());
        let config = VariablesConfig {
            servers: ServerList::new(["wrong.example", "right.example"]),
            ..VariablesConfig::default()
        };
        let mut vars = variables(config);

        assert_eq!(vars.read(&mut link, "T", "V0").unwrap(), "42");
        assert!(vars.is_updated());
        assert_eq!(vars.servers().get(0), Some("right.example"));
        assert_eq!(link.serial().count_written("AT+CIPCLOSE"), 2);
    }

    #[test]
    fn test_all_servers_fail() {
        let mut link = AtLink::new(online(), ManualClock::new());
        let config = VariablesConfig {
            servers: ServerList::new(["a.example", "b.example"]),
            ..VariablesConfig::default()
        };
        let mut vars = variables(config);

        let err = vars.read(&mut link, "T", "V0").unwrap_err();
        assert!(matches!(err, CloudError::AllServersFailed { attempted: 2 }));
        assert!(!vars.is_updated());
        assert_eq!(link.serial().count_written("AT+CIPSTART"), 2);
        // Connect failures never issue a close.
        assert_eq!(link.serial().count_written("AT+CIPCLOSE"), 0);
    }

    #[test]
    fn test_legacy_uses_single_host() {
        let mut serial = online();
        serial.always("AT+CIPSTART", "OK\r\n").on("GET /T/get/V0", REPLY);
        let mut link = AtLink::new(serial, ManualClock::new());
        let config = VariablesConfig {
            addressing: Addressing::Legacy,
            ..VariablesConfig::default()
        };
        let mut vars = variables(config);

        assert_eq!(vars.read(&mut link, "T", "V0").unwrap(), "42");
        assert_eq!(
            link.serial().written()[1],
            "AT+CIPSTART=\"TCP\",\"blynk-cloud.com\",80"
        );
    }
}
