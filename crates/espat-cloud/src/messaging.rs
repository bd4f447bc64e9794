//! Telegram bot messages over SSL.

use tracing::{info, warn};

use espat_core::urlencode::encode;
use espat_core::{AtLink, Clock, SerialPort};
use espat_protocol::{session, HttpGet, Protocol, SessionRequest};

use crate::config::MessagingConfig;
use crate::error::CloudError;
use crate::modem::Modem;

/// Marker the Bot API puts in every successful reply.
pub const OK_MARKER: &str = "\"ok\":true";

/// Build the `sendMessage` request. Every user-supplied part is
/// percent-encoded.
pub fn build_request(host: &str, bot_token: &str, chat_id: &str, text: &str) -> HttpGet {
    HttpGet::new(format!("/bot{}/sendMessage", encode(bot_token)))
        .query("chat_id", encode(chat_id))
        .query("text", encode(text))
        .host(host)
}

/// Sends messages through a Telegram bot.
#[derive(Debug, Clone)]
pub struct MessagingClient {
    config: MessagingConfig,
    modem: Modem,
    sent: bool,
}

impl MessagingClient {
    pub fn new(config: MessagingConfig, modem: Modem) -> Self {
        Self {
            config,
            modem,
            sent: false,
        }
    }

    /// True when the last message was accepted.
    pub fn is_sent(&self) -> bool {
        self.sent
    }

    pub fn send<S: SerialPort, C: Clock>(
        &mut self,
        link: &mut AtLink<S, C>,
        bot_token: &str,
        chat_id: &str,
        text: &str,
    ) -> Result<(), CloudError> {
        self.sent = false;
        self.modem.require_wifi(link)?;

        let payload = build_request(&self.config.host, bot_token, chat_id, text).to_wire();
        let request = SessionRequest {
            host: &self.config.host,
            port: self.config.port,
            protocol: Protocol::Ssl,
            payload: &payload,
            timeouts: self.config.session,
        };

        let mut connection = session::open(link, &request)?;
        let confirmed = connection
            .next_line(OK_MARKER, self.config.reply_timeout_ms)?
            .is_matched();
        connection.close();

        if !confirmed {
            warn!(chat_id, "message not confirmed");
            return Err(CloudError::NoReply(OK_MARKER));
        }

        self.sent = true;
        info!(chat_id, "message sent");
        Ok(())
    }
}
