//! Clock abstraction and time-of-day handling.
//!
//! All day boundaries are computed in the offset carried by the "now" value a
//! [`Clock`] returns, so callers decide which local calendar applies.

mod deadline;
pub mod splits;

pub use deadline::{resolve_deadline, BudgetWindow, Rollover};
pub use splits::{DaySplits, SplitTimes};

use std::cell::Cell;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, FixedOffset, Local, NaiveDate, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Source of the current instant.
pub trait Clock {
    fn now(&self) -> DateTime<FixedOffset>;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> DateTime<FixedOffset> {
        (**self).now()
    }
}

/// Wall clock in the machine's local offset.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Local::now().fixed_offset()
    }
}

/// Manually driven clock for tests and replaying a given instant.
#[derive(Debug, Clone)]
pub struct FixedClock {
    now: Cell<DateTime<FixedOffset>>,
}

impl FixedClock {
    pub fn new(now: DateTime<FixedOffset>) -> Self {
        Self { now: Cell::new(now) }
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }

    pub fn set(&self, now: DateTime<FixedOffset>) {
        self.now.set(now);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<FixedOffset> {
        self.now.get()
    }
}

/// An hour and minute on an unspecified day, written "HH:MM".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeOfDay {
    hour: u32,
    minute: u32,
}

impl TimeOfDay {
    pub fn new(hour: u32, minute: u32) -> Result<Self, ValidationError> {
        if hour > 23 || minute > 59 {
            return Err(ValidationError::InvalidTimeOfDay(format!(
                "{hour:02}:{minute:02}"
            )));
        }
        Ok(Self { hour, minute })
    }

    pub fn hour(&self) -> u32 {
        self.hour
    }

    pub fn minute(&self) -> u32 {
        self.minute
    }

    pub fn minutes_from_midnight(&self) -> i64 {
        i64::from(self.hour) * 60 + i64::from(self.minute)
    }

    /// Builds a time of day from minutes past midnight, wrapping around the day.
    pub fn from_minutes(minutes: i64) -> Self {
        let m = minutes.rem_euclid(24 * 60);
        Self {
            hour: (m / 60) as u32,
            minute: (m % 60) as u32,
        }
    }

    /// The hour:minute of `instant`, seconds dropped.
    pub fn of(instant: &DateTime<FixedOffset>) -> Self {
        Self {
            hour: instant.hour(),
            minute: instant.minute(),
        }
    }

    /// True when the time of day is at or before the minute of `now`.
    pub fn has_passed(&self, now: &DateTime<FixedOffset>) -> bool {
        *self <= Self::of(now)
    }

    /// This time of day on the calendar date of `day`, in `day`'s offset.
    pub fn on(&self, day: &DateTime<FixedOffset>) -> DateTime<FixedOffset> {
        self.on_date(day.date_naive(), *day.offset())
    }

    pub fn on_date(&self, date: NaiveDate, offset: FixedOffset) -> DateTime<FixedOffset> {
        let local = date.and_time(self.as_naive());
        let utc = local - Duration::seconds(i64::from(offset.local_minus_utc()));
        DateTime::from_naive_utc_and_offset(utc, offset)
    }

    fn as_naive(&self) -> NaiveTime {
        NaiveTime::from_num_seconds_from_midnight_opt(self.hour * 3600 + self.minute * 60, 0)
            .unwrap_or(NaiveTime::MIN)
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl FromStr for TimeOfDay {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ValidationError::InvalidTimeOfDay(s.to_string());
        let (h, m) = s.trim().split_once(':').ok_or_else(invalid)?;
        if h.is_empty() || h.len() > 2 || m.len() != 2 {
            return Err(invalid());
        }
        let hour = h.parse::<u32>().map_err(|_| invalid())?;
        let minute = m.parse::<u32>().map_err(|_| invalid())?;
        Self::new(hour, minute).map_err(|_| invalid())
    }
}

impl TryFrom<String> for TimeOfDay {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TimeOfDay> for String {
    fn from(value: TimeOfDay) -> Self {
        value.to_string()
    }
}
