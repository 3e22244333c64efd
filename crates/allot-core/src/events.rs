use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::timer::TimerSnapshot;

/// Every state change in the core produces an Event.
/// The CLI prints them; embedders can forward them to a UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    TimerStarted {
        task_id: String,
        task_name: String,
        planned_minutes: i64,
        end_time: DateTime<Utc>,
        at: DateTime<Utc>,
    },
    /// A persisted session was picked up after a restart.
    TimerRestored {
        task_id: String,
        task_name: String,
        remaining_secs: i64,
        end_time: DateTime<Utc>,
        at: DateTime<Utc>,
    },
    TimerStopped {
        task_id: String,
        task_name: String,
        elapsed_minutes: u32,
        completed_time: u32,
        budget_met: bool,
        at: DateTime<Utc>,
    },
    /// The task was marked done for today.
    TimerCompleted {
        task_id: String,
        task_name: String,
        elapsed_minutes: u32,
        completed_time: u32,
        at: DateTime<Utc>,
    },
    TimerReset {
        at: DateTime<Utc>,
    },
    AllocationApplied {
        eligible: usize,
        excluded: usize,
        total_work_minutes: i64,
        allocated_minutes: i64,
        at: DateTime<Utc>,
    },
    /// Allocation left eligible tasks untouched (nothing to weigh).
    AllocationSkipped {
        excluded: usize,
        at: DateTime<Utc>,
    },
    StateSnapshot(TimerSnapshot),
}

impl Event {
    /// One-line human summary, used by the CLI.
    pub fn summary(&self) -> String {
        match self {
            Event::TimerStarted {
                task_name,
                planned_minutes,
                end_time,
                ..
            } => format!("started '{task_name}' for {planned_minutes} min (ends {end_time})"),
            Event::TimerRestored {
                task_name,
                remaining_secs,
                ..
            } => format!("resumed '{task_name}', {} min left", remaining_secs / 60),
            Event::TimerStopped {
                task_name,
                elapsed_minutes,
                completed_time,
                budget_met,
                ..
            } => {
                let tail = if *budget_met { ", budget met" } else { "" };
                format!("stopped '{task_name}': +{elapsed_minutes} min, {completed_time} min today{tail}")
            }
            Event::TimerCompleted {
                task_name,
                elapsed_minutes,
                completed_time,
                ..
            } => format!(
                "completed '{task_name}' for today: +{elapsed_minutes} min, {completed_time} min today"
            ),
            Event::TimerReset { .. } => "timer reset".to_string(),
            Event::AllocationApplied {
                eligible,
                total_work_minutes,
                allocated_minutes,
                ..
            } => format!(
                "allocated {allocated_minutes} of {total_work_minutes} min across {eligible} task(s)"
            ),
            Event::AllocationSkipped { excluded, .. } => {
                format!("nothing to allocate ({excluded} task(s) excluded)")
            }
            Event::StateSnapshot(s) => match &s.task_name {
                Some(name) => format!(
                    "running '{name}': {:02}:{:02}:{:02} left",
                    s.remaining_secs / 3600,
                    (s.remaining_secs % 3600) / 60,
                    s.remaining_secs % 60
                ),
                None => "idle".to_string(),
            },
        }
    }
}
