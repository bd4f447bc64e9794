//! Module bring-up and WiFi station management.

use tracing::{debug, info, warn};

use espat_core::{AtError, AtLink, Clock, SerialPort, OK};
use espat_protocol::commands::{READY, STATUS};
use espat_protocol::AtCommand;

use crate::config::ModemConfig;
use crate::error::CloudError;

/// Station state reported by `AT+CIPSTATUS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WifiStatus {
    /// Associated and holding an IP address.
    GotIp,
    /// Associated with a socket open.
    Connected,
    /// Associated, last socket closed.
    Disconnected,
    /// Not associated with any access point.
    NotAssociated,
    /// A code this crate does not know.
    Other(u8),
}

impl WifiStatus {
    /// Parse a `STATUS:<n>` line.
    pub fn from_status_line(line: &str) -> Option<Self> {
        let (_, code) = line.split_once(STATUS)?;
        let code: u8 = code.trim().parse().ok()?;
        Some(match code {
            2 => WifiStatus::GotIp,
            3 => WifiStatus::Connected,
            4 => WifiStatus::Disconnected,
            5 => WifiStatus::NotAssociated,
            other => WifiStatus::Other(other),
        })
    }

    pub fn is_associated(&self) -> bool {
        !matches!(self, WifiStatus::NotAssociated)
    }
}

/// Bring-up and status commands for the module itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct Modem {
    config: ModemConfig,
}

impl Modem {
    pub fn new(config: ModemConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ModemConfig {
        &self.config
    }

    /// Factory-reset the module and turn command echo off.
    pub fn init<S: SerialPort, C: Clock>(&self, link: &mut AtLink<S, C>) -> Result<(), CloudError> {
        link.send_command(
            &AtCommand::Restore.to_string(),
            Some(READY),
            self.config.restore_timeout_ms,
        )?;
        let timeout = link.config().default_timeout_ms;
        link.send_command(&AtCommand::EchoOff.to_string(), Some(OK), timeout)?;
        info!("module initialized");
        Ok(())
    }

    /// Switch to station mode and join `ssid`.
    pub fn connect_wifi<S: SerialPort, C: Clock>(
        &self,
        link: &mut AtLink<S, C>,
        ssid: &str,
        password: &str,
    ) -> Result<(), CloudError> {
        if ssid.is_empty() {
            return Err(CloudError::EmptySsid);
        }
        if password.is_empty() {
            info!("WiFi password is empty, using open network");
        }

        let timeout = link.config().default_timeout_ms;
        link.send_command(&AtCommand::StationMode.to_string(), Some(OK), timeout)?;

        info!(ssid, "joining access point");
        link.send_command(
            &AtCommand::JoinAccessPoint { ssid, password }.to_string(),
            Some(OK),
            self.config.join_timeout_ms,
        )?;
        info!(ssid, "WiFi connected");
        Ok(())
    }

    /// Query the station state.
    ///
    /// Returns `None` when no status line arrived in time.
    pub fn wifi_status<S: SerialPort, C: Clock>(
        &self,
        link: &mut AtLink<S, C>,
    ) -> Result<Option<WifiStatus>, AtError> {
        link.send_command(&AtCommand::Status.to_string(), None, 0)?;
        let status = link.get_response(STATUS, self.config.status_timeout_ms)?;
        let timeout = link.config().default_timeout_ms;
        if !link.get_response(OK, timeout)?.is_matched() {
            debug!("status reply not terminated by OK");
        }
        Ok(status.into_line().and_then(|line| WifiStatus::from_status_line(&line)))
    }

    /// Check if the station is associated with an access point.
    pub fn is_wifi_connected<S: SerialPort, C: Clock>(
        &self,
        link: &mut AtLink<S, C>,
    ) -> Result<bool, AtError> {
        Ok(self
            .wifi_status(link)?
            .map_or(false, |status| status.is_associated()))
    }

    /// Fail with [`CloudError::WifiDisconnected`] unless the station is up.
    pub fn require_wifi<S: SerialPort, C: Clock>(
        &self,
        link: &mut AtLink<S, C>,
    ) -> Result<(), CloudError> {
        if self.is_wifi_connected(link)? {
            Ok(())
        } else {
            warn!("WiFi is not connected");
            Err(CloudError::WifiDisconnected)
        }
    }
}
