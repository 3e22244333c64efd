//! Task model.
//!
//! Tasks belong to the task store. The allocation engine writes
//! `current_minutes`; the timer writes `completed_time` and
//! `is_done_for_today`; list editing writes `temporary_order`.

pub mod daily;
pub mod ordering;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub name: String,
    /// Only the calendar day matters.
    #[serde(deserialize_with = "deserialize_due_date")]
    pub due_date: NaiveDate,
    #[serde(default)]
    pub is_for_school: bool,
    #[serde(default)]
    pub is_completed: bool,
    #[serde(default)]
    pub is_done_for_today: bool,
    /// Today's budget in minutes, written by allocation.
    #[serde(default)]
    pub current_minutes: u32,
    /// Minutes worked today, written by the timer.
    #[serde(default)]
    pub completed_time: u32,
    /// Rank in the user's list; 0 is the top.
    #[serde(default)]
    pub temporary_order: usize,
    #[serde(default)]
    pub notes: String,
}

impl Task {
    /// New school task at the top rank with no budget.
    pub fn new(name: impl Into<String>, due_date: NaiveDate) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            due_date,
            is_for_school: true,
            is_completed: false,
            is_done_for_today: false,
            current_minutes: 0,
            completed_time: 0,
            temporary_order: 0,
            notes: String::new(),
        }
    }

    pub fn with_school(mut self, is_for_school: bool) -> Self {
        self.is_for_school = is_for_school;
        self
    }

    pub fn with_order(mut self, order: usize) -> Self {
        self.temporary_order = order;
        self
    }

    pub fn with_minutes(mut self, current_minutes: u32, completed_time: u32) -> Self {
        self.current_minutes = current_minutes;
        self.completed_time = completed_time;
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    /// Whether allocation and the timer still consider this task today.
    pub fn is_eligible(&self) -> bool {
        !self.is_completed && !self.is_done_for_today
    }

    /// Budget minus time worked; negative once over budget.
    pub fn remaining_minutes(&self) -> i64 {
        i64::from(self.current_minutes) - i64::from(self.completed_time)
    }

    /// Minutes already worked that still count against today's budget.
    pub fn reclaimable_minutes(&self) -> u32 {
        self.current_minutes.min(self.completed_time)
    }

    pub fn budget_met(&self) -> bool {
        self.completed_time >= self.current_minutes
    }
}

/// Parses "YYYY-MM-DD", RFC 3339 or "YYYY-MM-DD HH:MM", keeping the date.
pub fn parse_due_date(raw: &str) -> Result<NaiveDate, ValidationError> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(date);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.date_naive());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M") {
        return Ok(dt.date());
    }
    Err(ValidationError::InvalidValue {
        field: "due_date".to_string(),
        message: format!("expected YYYY-MM-DD, got '{raw}'"),
    })
}

fn deserialize_due_date<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_due_date(&raw).map_err(serde::de::Error::custom)
}

/// Tasks sorted by rank, ties broken by name.
pub fn sorted_by_order(tasks: &[Task]) -> Vec<&Task> {
    let mut sorted: Vec<&Task> = tasks.iter().collect();
    sorted.sort_by(|a, b| {
        a.temporary_order
            .cmp(&b.temporary_order)
            .then_with(|| a.name.cmp(&b.name))
    });
    sorted
}
