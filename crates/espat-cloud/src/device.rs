//! One object owning the link and the state of every integration.

use tracing::warn;

use espat_core::{AtLink, Clock, SerialPort};

use crate::config::CloudConfig;
use crate::error::CloudError;
use crate::messaging::MessagingClient;
use crate::metrics::{MetricFields, MetricsClient};
use crate::modem::Modem;
use crate::time_sync::{TimeRecord, TimeSync};
use crate::variables::{RemoteVariables, ServerList};

/// An ESP8266 on a serial port together with its cloud clients.
///
/// Every operation returns a `Result`; the matching `is_*` accessor keeps
/// the outcome of the most recent attempt for callers that poll flags.
pub struct Esp8266<S, C> {
    link: AtLink<S, C>,
    modem: Modem,
    initialized: bool,
    metrics: MetricsClient,
    variables: RemoteVariables,
    messaging: MessagingClient,
    time: TimeSync,
}

impl<S: SerialPort, C: Clock> Esp8266<S, C> {
    pub fn new(serial: S, clock: C, config: CloudConfig) -> Self {
        let modem = Modem::new(config.modem);
        Self {
            link: AtLink::with_config(serial, clock, config.link),
            modem,
            initialized: false,
            metrics: MetricsClient::new(config.metrics, modem),
            variables: RemoteVariables::new(config.variables, modem),
            messaging: MessagingClient::new(config.messaging, modem),
            time: TimeSync::new(config.time, modem),
        }
    }

    pub fn link(&self) -> &AtLink<S, C> {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut AtLink<S, C> {
        &mut self.link
    }

    pub fn into_link(self) -> AtLink<S, C> {
        self.link
    }

    /// Factory-reset the module and disable echo.
    pub fn init(&mut self) -> Result<(), CloudError> {
        self.initialized = false;
        self.modem.init(&mut self.link)?;
        self.initialized = true;
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn connect_wifi(&mut self, ssid: &str, password: &str) -> Result<(), CloudError> {
        self.modem.connect_wifi(&mut self.link, ssid, password)
    }

    /// Check the station state. Serial failures count as disconnected.
    pub fn is_wifi_connected(&mut self) -> bool {
        self.modem
            .is_wifi_connected(&mut self.link)
            .unwrap_or_else(|err| {
                warn!(%err, "WiFi status check failed");
                false
            })
    }

    // ThingSpeak

    pub fn upload_metrics(&mut self, api_key: &str, fields: &MetricFields) -> Result<u32, CloudError> {
        self.metrics.upload(&mut self.link, api_key, fields)
    }

    pub fn is_metrics_uploaded(&self) -> bool {
        self.metrics.is_uploaded()
    }

    // Blynk

    pub fn read_variable(&mut self, token: &str, pin: &str) -> Result<String, CloudError> {
        self.variables.read(&mut self.link, token, pin)
    }

    pub fn write_variable(&mut self, token: &str, pin: &str, value: &str) -> Result<(), CloudError> {
        self.variables.write(&mut self.link, token, pin, value)
    }

    pub fn is_variable_updated(&self) -> bool {
        self.variables.is_updated()
    }

    pub fn variable_servers(&self) -> &ServerList {
        self.variables.servers()
    }

    // Telegram

    pub fn send_message(&mut self, bot_token: &str, chat_id: &str, text: &str) -> Result<(), CloudError> {
        self.messaging.send(&mut self.link, bot_token, chat_id, text)
    }

    pub fn is_message_sent(&self) -> bool {
        self.messaging.is_sent()
    }

    // Internet time

    pub fn init_time(&mut self, timezone: i8) -> Result<(), CloudError> {
        self.time.configure(&mut self.link, timezone)
    }

    pub fn update_time(&mut self) -> Result<TimeRecord, CloudError> {
        self.time.update(&mut self.link)
    }

    pub fn sync_time_once(&mut self, timezone: i8) -> Result<TimeRecord, CloudError> {
        self.time.sync_once(&mut self.link, timezone)
    }

    pub fn is_time_initialized(&self) -> bool {
        self.time.is_initialized()
    }

    pub fn is_time_updated(&self) -> bool {
        self.time.is_updated()
    }

    pub fn time(&self) -> &TimeRecord {
        self.time.record()
    }

    pub fn year(&self) -> u16 {
        self.time.record().year
    }

    pub fn month(&self) -> u8 {
        self.time.record().month
    }

    pub fn day(&self) -> u8 {
        self.time.record().day
    }

    pub fn weekday(&self) -> u8 {
        self.time.record().weekday
    }

    pub fn hour(&self) -> u8 {
        self.time.record().hour
    }

    pub fn minute(&self) -> u8 {
        self.time.record().minute
    }

    pub fn second(&self) -> u8 {
        self.time.record().second
    }
}
