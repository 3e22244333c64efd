use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::task::Task;

/// How `start` picks the next task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMode {
    /// Lowest `temporary_order` first.
    #[default]
    PriorityOrder,
    /// Largest `current_minutes` first, ties by rank.
    HighestAllocation,
}

impl SelectionMode {
    /// Picks the next task to time among those with budget left today.
    pub fn select<'a>(&self, tasks: &'a [Task]) -> Option<&'a Task> {
        let candidates = tasks
            .iter()
            .filter(|t| t.is_eligible() && t.current_minutes != 0);
        match self {
            SelectionMode::PriorityOrder => candidates.min_by_key(|t| t.temporary_order),
            SelectionMode::HighestAllocation => candidates.min_by(|a, b| {
                b.current_minutes
                    .cmp(&a.current_minutes)
                    .then_with(|| a.temporary_order.cmp(&b.temporary_order))
            }),
        }
    }
}

impl fmt::Display for SelectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SelectionMode::PriorityOrder => "priority_order",
            SelectionMode::HighestAllocation => "highest_allocation",
        })
    }
}

impl FromStr for SelectionMode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "priority_order" | "priority" => Ok(SelectionMode::PriorityOrder),
            "highest_allocation" | "highest_time" | "highest" => Ok(SelectionMode::HighestAllocation),
            _ => Err(ValidationError::InvalidValue {
                field: "selection_mode".to_string(),
                message: format!("unknown mode '{s}' (priority_order, highest_allocation)"),
            }),
        }
    }
}

/// One countdown against a single task. Persisted for restart recovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    #[serde(default)]
    pub task_id: String,
    /// Lookup fallback when the id is missing or stale.
    #[serde(default)]
    pub task_name: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl Session {
    pub fn new(
        task_id: impl Into<String>,
        task_name: impl Into<String>,
        start_time: DateTime<Utc>,
        minutes: u32,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            task_name: task_name.into(),
            start_time,
            end_time: start_time + Duration::minutes(i64::from(minutes)),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.end_time
    }

    /// Time left until `end_time`, never negative.
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        (self.end_time - now).max(Duration::zero())
    }

    /// Whole minutes since `start_time`, never negative.
    pub fn elapsed_minutes(&self, now: DateTime<Utc>) -> u32 {
        let secs = (now - self.start_time).num_seconds().max(0);
        u32::try_from(secs / 60).unwrap_or(u32::MAX)
    }
}
