//! AT command set used by the integrations.
//!
//! Commands are rendered with [`std::fmt::Display`]; the link appends the
//! `\r\n` terminator when sending. Reply tokens the integrations match on are
//! collected here as constants.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Token the firmware sends after a restore completes.
pub const READY: &str = "ready";

/// Confirmation that data written after `AT+CIPSEND` went out.
pub const SEND_OK: &str = "SEND OK";

/// Prefix of data received on an open connection.
pub const IPD: &str = "+IPD";

/// Notice sent when the remote side closes the connection.
pub const CLOSED: &str = "CLOSED";

/// Prefix of the connection status line.
pub const STATUS: &str = "STATUS:";

/// Prefix of the SNTP time reply.
pub const SNTP_TIME: &str = "+CIPSNTPTIME:";

/// Socket type for `AT+CIPSTART`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Ssl,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Tcp => "TCP",
            Protocol::Ssl => "SSL",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An AT command understood by the ESP8266 firmware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AtCommand<'a> {
    /// `AT+RESTORE`: factory reset, answered by `ready`.
    Restore,
    /// `ATE0`: stop echoing commands back.
    EchoOff,
    /// `AT+CWMODE=1`: station mode.
    StationMode,
    /// `AT+CWJAP="ssid","password"`: join an access point.
    JoinAccessPoint { ssid: &'a str, password: &'a str },
    /// `AT+CIPSTATUS`: connection status.
    Status,
    /// `AT+CIPSTART="TCP","host",port`: open a socket.
    Start {
        protocol: Protocol,
        host: &'a str,
        port: u16,
    },
    /// `AT+CIPSEND=n`: announce `n` bytes of payload.
    SendLength(usize),
    /// `AT+CIPCLOSE`: close the socket.
    Close,
    /// `AT+CIPSNTPCFG=1,tz,"server"`: enable SNTP.
    SntpConfig { timezone: i8, server: &'a str },
    /// `AT+CIPSNTPTIME?`: query the current time.
    SntpTime,
}

impl fmt::Display for AtCommand<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AtCommand::Restore => f.write_str("AT+RESTORE"),
            AtCommand::EchoOff => f.write_str("ATE0"),
            AtCommand::StationMode => f.write_str("AT+CWMODE=1"),
            AtCommand::JoinAccessPoint { ssid, password } => {
                write!(f, "AT+CWJAP=\"{}\",\"{}\"", ssid, password)
            }
            AtCommand::Status => f.write_str("AT+CIPSTATUS"),
            AtCommand::Start {
                protocol,
                host,
                port,
            } => write!(f, "AT+CIPSTART=\"{}\",\"{}\",{}", protocol, host, port),
            AtCommand::SendLength(len) => write!(f, "AT+CIPSEND={}", len),
            AtCommand::Close => f.write_str("AT+CIPCLOSE"),
            AtCommand::SntpConfig { timezone, server } => {
                write!(f, "AT+CIPSNTPCFG=1,{},\"{}\"", timezone, server)
            }
            AtCommand::SntpTime => f.write_str("AT+CIPSNTPTIME?"),
        }
    }
}
