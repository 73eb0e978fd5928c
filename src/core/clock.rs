//! Event status clock
//!
//! Derives UPCOMING / LIVE / ENDED and the countdown to start from an
//! [`EventConfig`] and the local wall-clock time. Re-evaluated on every tick.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::fmt;

use super::config::{ConfigStatus, EventConfig};

const DEFAULT_START: &str = "00:00";
const DEFAULT_END: &str = "23:59";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionStatus {
    Upcoming,
    Live,
    Ended,
}

impl SessionStatus {
    pub fn is_live(self) -> bool {
        self == SessionStatus::Live
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Upcoming => "UPCOMING",
            SessionStatus::Live => "LIVE",
            SessionStatus::Ended => "ENDED",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Time remaining until start
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Countdown {
    pub hours: u64,
    pub minutes: u64,
    pub seconds: u64,
}

impl Countdown {
    /// Floor-divide a millisecond difference. Negative input clamps to zero.
    pub fn from_millis(ms: i64) -> Self {
        let total = (ms.max(0) / 1000) as u64;
        Self {
            hours: total / 3600,
            minutes: (total % 3600) / 60,
            seconds: total % 60,
        }
    }
}

impl fmt::Display for Countdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}:{:02}", self.hours, self.minutes, self.seconds)
    }
}

/// One evaluation of the clock
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClockReading {
    pub status: SessionStatus,
    /// Present only while UPCOMING
    pub countdown: Option<Countdown>,
}

/// Scheduled window of an event in local time
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Schedule {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl Schedule {
    /// Combine the config's date with its start/end times. None when the date is
    /// missing or any part fails to parse.
    pub fn from_config(config: &EventConfig) -> Option<Self> {
        let date = NaiveDate::parse_from_str(config.date.as_deref()?.trim(), "%Y-%m-%d").ok()?;
        let start = parse_time(config.start_time.as_deref().unwrap_or(DEFAULT_START))?;
        let end = parse_time(config.end_time.as_deref().unwrap_or(DEFAULT_END))?;
        Some(Self {
            start: date.and_time(start),
            end: date.and_time(end),
        })
    }
}

fn parse_time(s: &str) -> Option<NaiveTime> {
    let s = s.trim();
    NaiveTime::parse_from_str(s, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .ok()
}

/// Evaluate status and countdown at `now`
pub fn evaluate(config: &EventConfig, now: NaiveDateTime) -> ClockReading {
    match config.status {
        ConfigStatus::Live => return reading(SessionStatus::Live),
        ConfigStatus::Ended => return reading(SessionStatus::Ended),
        ConfigStatus::Scheduled => {}
    }

    // An unusable schedule compares false against both bounds and lands on ENDED
    let Some(schedule) = Schedule::from_config(config) else {
        return reading(SessionStatus::Ended);
    };

    if now >= schedule.start && now <= schedule.end {
        reading(SessionStatus::Live)
    } else if now < schedule.start {
        let ms = (schedule.start - now).num_milliseconds();
        ClockReading {
            status: SessionStatus::Upcoming,
            countdown: Some(Countdown::from_millis(ms)),
        }
    } else {
        reading(SessionStatus::Ended)
    }
}

fn reading(status: SessionStatus) -> ClockReading {
    ClockReading {
        status,
        countdown: None,
    }
}
