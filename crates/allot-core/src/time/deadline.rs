use chrono::{DateTime, Duration, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::TimeOfDay;
use crate::error::ValidationError;
use crate::storage::config::ScheduleConfig;

/// Which calendar day a configured time of day refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rollover {
    /// Tomorrow once the time has passed today, otherwise today.
    #[default]
    Auto,
    Today,
    Tomorrow,
}

impl std::str::FromStr for Rollover {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Rollover::Auto),
            "today" => Ok(Rollover::Today),
            "tomorrow" => Ok(Rollover::Tomorrow),
            _ => Err(ValidationError::InvalidValue {
                field: "rollover".to_string(),
                message: format!("unknown rollover '{s}' (auto, today, tomorrow)"),
            }),
        }
    }
}

/// Anchors `at` to a concrete instant relative to `now`.
///
/// Auto moves to tomorrow when the hour:minute is at or before the current
/// minute. Tomorrow means `now + 24h` with the configured hour and minute.
pub fn resolve_deadline(
    now: &DateTime<FixedOffset>,
    at: TimeOfDay,
    rollover: Rollover,
) -> DateTime<FixedOffset> {
    let tomorrow = match rollover {
        Rollover::Today => false,
        Rollover::Tomorrow => true,
        Rollover::Auto => at.has_passed(now),
    };
    if tomorrow {
        at.on(&(*now + Duration::days(1)))
    } else {
        at.on(now)
    }
}

/// The span of time the allocation engine distributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BudgetWindow {
    /// Calendar day used for days-until-due.
    pub today: NaiveDate,
    pub start: DateTime<FixedOffset>,
    pub deadline: DateTime<FixedOffset>,
}

impl BudgetWindow {
    pub fn new(now: DateTime<FixedOffset>, deadline: DateTime<FixedOffset>) -> Self {
        Self {
            today: now.date_naive(),
            start: now,
            deadline,
        }
    }

    /// Builds the window for `now` from the schedule section of the config.
    pub fn resolve(now: DateTime<FixedOffset>, schedule: &ScheduleConfig) -> Self {
        let rollover = if schedule.sleep_tomorrow {
            Rollover::Tomorrow
        } else {
            schedule.rollover
        };
        let deadline = resolve_deadline(&now, schedule.sleep_time, rollover);
        let start = if schedule.is_tomorrow {
            now + Duration::days(1)
        } else {
            now
        };
        debug!(%start, %deadline, ?rollover, "resolved budget window");
        Self {
            today: now.date_naive(),
            start,
            deadline,
        }
    }

    /// Whole minutes from start to the deadline; negative when already past.
    pub fn minutes(&self) -> i64 {
        (self.deadline - self.start).num_minutes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(s).unwrap()
    }

    fn tod(s: &str) -> TimeOfDay {
        s.parse().unwrap()
    }

    #[test]
    fn rollover_parses_case_insensitively() {
        assert_eq!("Tomorrow".parse::<Rollover>().unwrap(), Rollover::Tomorrow);
        assert_eq!("auto".parse::<Rollover>().unwrap(), Rollover::Auto);
        assert!(matches!(
            "yesterday".parse::<Rollover>(),
            Err(ValidationError::InvalidValue { ref field, .. }) if field == "rollover"
        ));
    }

    #[test]
    fn auto_stays_today_before_the_time() {
        let now = at("2024-05-01T20:00:00+00:00");
        let d = resolve_deadline(&now, tod("23:00"), Rollover::Auto);
        assert_eq!(d, at("2024-05-01T23:00:00+00:00"));
    }

    #[test]
    fn auto_rolls_over_after_the_time() {
        let now = at("2024-05-01T23:30:00+00:00");
        let d = resolve_deadline(&now, tod("01:00"), Rollover::Auto);
        assert_eq!(d, at("2024-05-02T01:00:00+00:00"));
    }

    #[test]
    fn auto_treats_current_minute_as_passed() {
        let now = at("2024-05-01T23:00:30+00:00");
        let d = resolve_deadline(&now, tod("23:00"), Rollover::Auto);
        assert_eq!(d, at("2024-05-02T23:00:00+00:00"));
    }

    #[test]
    fn explicit_modes_override_auto() {
        let now = at("2024-05-01T20:00:00+00:00");
        assert_eq!(
            resolve_deadline(&now, tod("23:00"), Rollover::Tomorrow),
            at("2024-05-02T23:00:00+00:00")
        );
        assert_eq!(
            resolve_deadline(&now, tod("08:00"), Rollover::Today),
            at("2024-05-01T08:00:00+00:00")
        );
    }

    #[test]
    fn window_minutes_can_be_negative() {
        let now = at("2024-05-01T20:00:00+00:00");
        let w = BudgetWindow::new(now, at("2024-05-01T19:00:00+00:00"));
        assert_eq!(w.minutes(), -60);
    }

    #[test]
    fn window_from_schedule() {
        let now = at("2024-05-01T20:00:00+00:00");
        let mut schedule = ScheduleConfig::default();
        schedule.sleep_time = tod("23:00");
        let w = BudgetWindow::resolve(now, &schedule);
        assert_eq!(w.minutes(), 180);

        schedule.sleep_tomorrow = true;
        let w = BudgetWindow::resolve(now, &schedule);
        assert_eq!(w.minutes(), 27 * 60);

        schedule.is_tomorrow = true;
        let w = BudgetWindow::resolve(now, &schedule);
        assert_eq!(w.minutes(), 180);
        assert_eq!(w.today, now.date_naive());
    }
}
