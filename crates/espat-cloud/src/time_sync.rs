//! Internet time through the module's SNTP client.
//!
//! The module keeps its own clock once SNTP is enabled. Until the first
//! exchange with the NTP server completes it reports a date in 1970, so
//! [`TimeSync::update`] polls until the year changes.

use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use espat_core::{AtLink, Clock, Deadline, SerialPort, OK};
use espat_protocol::commands::SNTP_TIME;
use espat_protocol::AtCommand;

use crate::config::TimeConfig;
use crate::error::CloudError;
use crate::modem::Modem;

/// Year reported by an unsynchronised module clock.
pub const EPOCH_YEAR: u16 = 1970;

/// Accepted time-zone offsets in hours.
pub const TIMEZONE_RANGE: std::ops::RangeInclusive<i8> = -11..=13;

const WEEKDAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Errors from parsing a `+CIPSNTPTIME:` line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimeParseError {
    #[error("expected 5 fields, found {0}")]
    FieldCount(usize),

    #[error("unknown weekday {0:?}")]
    Weekday(String),

    #[error("unknown month {0:?}")]
    Month(String),

    #[error("invalid {field} {value:?}")]
    Number { field: &'static str, value: String },
}

/// Calendar time as reported by the module, in its configured zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TimeRecord {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    /// 1 = Monday .. 7 = Sunday.
    pub weekday: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl TimeRecord {
    /// Check if this is the module's unsynchronised placeholder.
    pub fn is_epoch(&self) -> bool {
        self.year == EPOCH_YEAR
    }

    /// Convert to a chrono value. `None` if the fields are not a real date.
    pub fn to_naive_datetime(&self) -> Option<NaiveDateTime> {
        NaiveDate::from_ymd_opt(self.year.into(), self.month.into(), self.day.into())?.and_hms_opt(
            self.hour.into(),
            self.minute.into(),
            self.second.into(),
        )
    }
}

/// Parse `Mon Jan 02 03:04:05 2024`, with or without the `+CIPSNTPTIME:`
/// prefix. Runs of spaces are tolerated.
pub fn parse_time_line(line: &str) -> Result<TimeRecord, TimeParseError> {
    let line = line.trim();
    let payload = line.strip_prefix(SNTP_TIME).unwrap_or(line);
    let fields: Vec<&str> = payload.split(' ').filter(|f| !f.is_empty()).collect();
    let &[weekday, month, day, clock, year] = fields.as_slice() else {
        return Err(TimeParseError::FieldCount(fields.len()));
    };

    let weekday = table_index(&WEEKDAYS, weekday)
        .ok_or_else(|| TimeParseError::Weekday(weekday.to_string()))?;
    let month =
        table_index(&MONTHS, month).ok_or_else(|| TimeParseError::Month(month.to_string()))?;

    let mut clock_parts = clock.split(':');
    let (Some(hour), Some(minute), Some(second), None) = (
        clock_parts.next(),
        clock_parts.next(),
        clock_parts.next(),
        clock_parts.next(),
    ) else {
        return Err(TimeParseError::Number {
            field: "time",
            value: clock.to_string(),
        });
    };

    Ok(TimeRecord {
        year: number("year", year)?,
        month,
        day: number("day", day)?,
        weekday,
        hour: number("hour", hour)?,
        minute: number("minute", minute)?,
        second: number("second", second)?,
    })
}

fn table_index(table: &[&str], name: &str) -> Option<u8> {
    table
        .iter()
        .position(|entry| *entry == name)
        .and_then(|i| u8::try_from(i + 1).ok())
}

fn number<T: FromStr>(field: &'static str, value: &str) -> Result<T, TimeParseError> {
    value.parse().map_err(|_| TimeParseError::Number {
        field,
        value: value.to_string(),
    })
}

/// SNTP configuration and time queries.
#[derive(Debug, Clone)]
pub struct TimeSync {
    config: TimeConfig,
    modem: Modem,
    initialized: bool,
    updated: bool,
    record: TimeRecord,
}

impl TimeSync {
    pub fn new(config: TimeConfig, modem: Modem) -> Self {
        Self {
            config,
            modem,
            initialized: false,
            updated: false,
            record: TimeRecord::default(),
        }
    }

    /// True when SNTP was configured successfully.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// True when the last update published a record.
    pub fn is_updated(&self) -> bool {
        self.updated
    }

    /// Last published time. All zeros until the first successful update.
    pub fn record(&self) -> &TimeRecord {
        &self.record
    }

    /// Enable SNTP with `timezone` hours of offset.
    pub fn configure<S: SerialPort, C: Clock>(
        &mut self,
        link: &mut AtLink<S, C>,
        timezone: i8,
    ) -> Result<(), CloudError> {
        self.initialized = false;
        self.updated = false;
        if !TIMEZONE_RANGE.contains(&timezone) {
            return Err(CloudError::InvalidTimezone(timezone));
        }
        self.modem.require_wifi(link)?;

        let command = AtCommand::SntpConfig {
            timezone,
            server: &self.config.ntp_server,
        };
        link.send_command(
            &command.to_string(),
            Some(OK),
            self.config.configure_timeout_ms,
        )?;

        self.initialized = true;
        info!(timezone, server = %self.config.ntp_server, "SNTP configured");
        Ok(())
    }

    /// Poll the module clock until it is synchronised and publish it.
    ///
    /// Requires a prior successful [`configure`](Self::configure). Gives up
    /// once the sync deadline has passed.
    pub fn update<S: SerialPort, C: Clock>(
        &mut self,
        link: &mut AtLink<S, C>,
    ) -> Result<TimeRecord, CloudError> {
        self.updated = false;
        self.modem.require_wifi(link)?;
        if !self.initialized {
            return Err(CloudError::TimeNotInitialized);
        }

        let deadline = Deadline::start(link.clock(), self.config.sync_deadline_ms);
        let record = loop {
            if deadline.expired(link.clock()) {
                return Err(CloudError::TimeNotSynced(self.config.sync_deadline_ms));
            }
            let record = self.query(link)?;
            if !record.is_epoch() {
                break record;
            }
            debug!("module clock not synchronised yet");
            link.pause(self.config.retry_interval_ms);
        };

        self.confirm(link)?;
        Ok(self.publish(record))
    }

    /// Configure SNTP and read the clock once, without waiting for it to
    /// leave 1970.
    pub fn sync_once<S: SerialPort, C: Clock>(
        &mut self,
        link: &mut AtLink<S, C>,
        timezone: i8,
    ) -> Result<TimeRecord, CloudError> {
        self.configure(link, timezone)?;
        let record = self.query(link)?;
        self.confirm(link)?;
        Ok(self.publish(record))
    }

    fn query<S: SerialPort, C: Clock>(
        &self,
        link: &mut AtLink<S, C>,
    ) -> Result<TimeRecord, CloudError> {
        link.send_command(&AtCommand::SntpTime.to_string(), None, 0)?;
        let line = link
            .get_response(SNTP_TIME, self.config.query_timeout_ms)?
            .into_line()
            .ok_or(CloudError::NoReply(SNTP_TIME))?;
        Ok(parse_time_line(&line)?)
    }

    fn confirm<S: SerialPort, C: Clock>(&self, link: &mut AtLink<S, C>) -> Result<(), CloudError> {
        let timeout = link.config().default_timeout_ms;
        if link.get_response(OK, timeout)?.is_matched() {
            Ok(())
        } else {
            Err(CloudError::NoReply(OK))
        }
    }

    fn publish(&mut self, record: TimeRecord) -> TimeRecord {
        self.record = record;
        self.updated = true;
        info!(
            year = record.year,
            month = record.month,
            day = record.day,
            hour = record.hour,
            minute = record.minute,
            second = record.second,
            "internet time updated"
        );
        record
    }
}
