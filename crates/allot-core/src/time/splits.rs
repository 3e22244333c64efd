//! Day-planning reference points derived from wake, home and sleep times.

use chrono::{DateTime, Duration, FixedOffset};
use serde::Serialize;

use super::{resolve_deadline, Rollover, TimeOfDay};
use crate::storage::config::ScheduleConfig;

/// Inputs for [`DaySplits::compute`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitTimes {
    pub today_wake_up: TimeOfDay,
    pub wake_up: TimeOfDay,
    pub sleep: TimeOfDay,
    pub home: TimeOfDay,
}

impl From<&ScheduleConfig> for SplitTimes {
    fn from(schedule: &ScheduleConfig) -> Self {
        Self {
            today_wake_up: schedule.today_wake_up_time,
            wake_up: schedule.wake_up_time,
            sleep: schedule.sleep_time,
            home: schedule.home_time,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DaySplits {
    /// Halfway between today's wake-up and tomorrow's.
    pub wake_midpoint: DateTime<FixedOffset>,
    /// Sleep time, moved to the next day when it is not after the wake-up hour.
    pub sleep: DateTime<FixedOffset>,
    pub sleeps_next_day: bool,
    /// Waking day cut into thirds.
    pub double_split: [DateTime<FixedOffset>; 2],
    /// Waking day cut into quarters.
    pub triple_split: [DateTime<FixedOffset>; 3],
    /// Halfway between getting home and going to sleep.
    pub half_time: DateTime<FixedOffset>,
}

impl DaySplits {
    pub fn compute(now: &DateTime<FixedOffset>, times: &SplitTimes) -> Self {
        let day_start = resolve_deadline(now, times.today_wake_up, Rollover::Today);
        let next_wake = resolve_deadline(now, times.wake_up, Rollover::Tomorrow);
        let wake_midpoint = day_start + (next_wake - day_start) / 2;

        let mut sleep = times.sleep.on(now);
        if times.sleep.hour() <= times.wake_up.hour() {
            sleep += Duration::days(1);
        }
        let awake = sleep - day_start;
        let fraction = |n: i32, d: i32| day_start + awake * n / d;

        Self {
            wake_midpoint,
            sleep,
            sleeps_next_day: times.today_wake_up.hour() > times.sleep.hour(),
            double_split: [fraction(1, 3), fraction(2, 3)],
            triple_split: [fraction(1, 4), fraction(2, 4), fraction(3, 4)],
            half_time: half_time(now, times.home, times.sleep),
        }
    }
}

/// Midpoint of the evening between `home` and `sleep`, anchored with auto rollover.
pub fn half_time(now: &DateTime<FixedOffset>, home: TimeOfDay, sleep: TimeOfDay) -> DateTime<FixedOffset> {
    let home_m = home.minutes_from_midnight();
    let mut sleep_m = sleep.minutes_from_midnight();
    if sleep_m <= home_m {
        sleep_m += 24 * 60;
    }
    let middle = TimeOfDay::from_minutes(sleep_m - (sleep_m - home_m) / 2);
    resolve_deadline(now, middle, Rollover::Auto)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(s).unwrap()
    }

    fn times(today_wake: &str, wake: &str, sleep: &str, home: &str) -> SplitTimes {
        SplitTimes {
            today_wake_up: today_wake.parse().unwrap(),
            wake_up: wake.parse().unwrap(),
            sleep: sleep.parse().unwrap(),
            home: home.parse().unwrap(),
        }
    }

    #[test]
    fn splits_for_a_regular_day() {
        let now = at("2024-05-01T09:00:00+00:00");
        let s = DaySplits::compute(&now, &times("07:00", "07:00", "23:00", "17:00"));
        assert_eq!(s.wake_midpoint, at("2024-05-01T19:00:00+00:00"));
        assert_eq!(s.sleep, at("2024-05-01T23:00:00+00:00"));
        assert!(!s.sleeps_next_day);
        // 16 waking hours
        assert_eq!(s.double_split[0], at("2024-05-01T12:20:00+00:00"));
        assert_eq!(s.double_split[1], at("2024-05-01T17:40:00+00:00"));
        assert_eq!(s.triple_split[0], at("2024-05-01T11:00:00+00:00"));
        assert_eq!(s.triple_split[1], at("2024-05-01T15:00:00+00:00"));
        assert_eq!(s.triple_split[2], at("2024-05-01T19:00:00+00:00"));
        assert_eq!(s.half_time, at("2024-05-01T20:00:00+00:00"));
    }

    #[test]
    fn sleep_after_midnight_moves_to_next_day() {
        let now = at("2024-05-01T09:00:00+00:00");
        let s = DaySplits::compute(&now, &times("08:00", "08:00", "01:00", "18:00"));
        assert_eq!(s.sleep, at("2024-05-02T01:00:00+00:00"));
        assert!(s.sleeps_next_day);
        assert_eq!(s.triple_split[1], at("2024-05-01T16:30:00+00:00"));
    }

    #[test]
    fn half_time_wraps_past_midnight() {
        let now = at("2024-05-01T09:00:00+00:00");
        let h = half_time(&now, "22:00".parse().unwrap(), "02:00".parse().unwrap());
        assert_eq!(h, at("2024-05-02T00:00:00+00:00"));
    }

    #[test]
    fn half_time_rolls_over_once_passed() {
        let now = at("2024-05-01T21:00:00+00:00");
        let h = half_time(&now, "17:00".parse().unwrap(), "23:00".parse().unwrap());
        assert_eq!(h, at("2024-05-02T20:00:00+00:00"));
    }
}
