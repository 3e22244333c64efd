//! Time allocation.
//!
//! Splits the minutes left before the sleep deadline across eligible tasks in
//! proportion to their urgency. Minutes already worked on eligible tasks are
//! folded back into the pool so the split covers the whole day's work, not
//! just what is left of it.

mod urgency;

pub use urgency::{days_until_due, effective_days, urgency};

use std::sync::{Mutex, PoisonError};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::error::{Result, ValidationError};
use crate::events::Event;
use crate::storage::TaskStore;
use crate::task::Task;
use crate::time::BudgetWindow;

/// Numeric knobs for an allocation run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AllocationSettings {
    pub offset_minutes: i64,
    pub extra_minutes: i64,
    /// Urgency weight for non-school tasks.
    pub school_multiplier: f64,
}

impl Default for AllocationSettings {
    fn default() -> Self {
        Self {
            offset_minutes: 0,
            extra_minutes: 0,
            school_multiplier: 0.1,
        }
    }
}

impl AllocationSettings {
    /// Rejects a multiplier that would give a task a negative or undefined
    /// weight. Shares only stay within the budget while every weight is >= 0.
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_school_multiplier(self.school_multiplier).map(|_| ())
    }
}

/// Accepts finite, non-negative multipliers.
pub fn check_school_multiplier(value: f64) -> Result<f64, ValidationError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(ValidationError::InvalidValue {
            field: "school_multiplier".into(),
            message: format!("expected a finite number >= 0, got {value}"),
        })
    }
}

/// Outcome for one task.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskAllocation {
    pub task_id: String,
    pub name: String,
    /// `None` for excluded tasks.
    pub days_until_due: Option<i64>,
    pub urgency: f64,
    pub share: f64,
    pub minutes: u32,
    pub excluded: bool,
}

/// A computed allocation, before or after it is written back.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AllocationPlan {
    pub window: BudgetWindow,
    /// Minutes from window start to the deadline.
    pub raw_minutes: i64,
    pub reclaimed_minutes: i64,
    pub total_work_minutes: i64,
    pub urgency_sum: f64,
    /// True when no eligible task carried weight; eligible tasks keep their values.
    pub skipped: bool,
    pub allocations: Vec<TaskAllocation>,
}

impl AllocationPlan {
    pub fn allocated_minutes(&self) -> i64 {
        self.allocations
            .iter()
            .filter(|a| !a.excluded)
            .map(|a| i64::from(a.minutes))
            .sum()
    }

    pub fn eligible_count(&self) -> usize {
        self.allocations.iter().filter(|a| !a.excluded).count()
    }

    pub fn excluded_count(&self) -> usize {
        self.allocations.iter().filter(|a| a.excluded).count()
    }

    /// Writes minutes into matching tasks. Returns the tasks that changed.
    pub fn apply(&self, tasks: &mut [Task]) -> Vec<Task> {
        let mut changed = Vec::new();
        for task in tasks.iter_mut() {
            let Some(alloc) = self.allocations.iter().find(|a| a.task_id == task.id) else {
                continue;
            };
            if self.skipped && !alloc.excluded {
                continue;
            }
            if task.current_minutes != alloc.minutes {
                task.current_minutes = alloc.minutes;
                changed.push(task.clone());
            }
        }
        changed
    }

    pub fn to_event(&self) -> Event {
        let at = self.window.start.with_timezone(&Utc);
        if self.skipped {
            Event::AllocationSkipped {
                excluded: self.excluded_count(),
                at,
            }
        } else {
            Event::AllocationApplied {
                eligible: self.eligible_count(),
                excluded: self.excluded_count(),
                total_work_minutes: self.total_work_minutes,
                allocated_minutes: self.allocated_minutes(),
                at,
            }
        }
    }
}

/// Computes the allocation for `tasks` without touching them.
pub fn plan(tasks: &[Task], window: &BudgetWindow, settings: &AllocationSettings) -> AllocationPlan {
    let raw_minutes = window.minutes();
    let eligible: Vec<&Task> = tasks.iter().filter(|t| t.is_eligible()).collect();

    let reclaimed_minutes: i64 = eligible
        .iter()
        .map(|t| i64::from(t.reclaimable_minutes()))
        .sum();
    let total_work_minutes =
        raw_minutes - settings.offset_minutes - settings.extra_minutes + reclaimed_minutes;

    let weights: Vec<(i64, f64)> = eligible
        .iter()
        .map(|t| {
            let days = days_until_due(window.today, t.due_date);
            (days, urgency(days, t.is_for_school, settings.school_multiplier))
        })
        .collect();
    let urgency_sum: f64 = weights.iter().map(|(_, u)| u).sum();
    let skipped = !(urgency_sum > 0.0 && urgency_sum.is_finite());

    let mut allocations = Vec::with_capacity(tasks.len());
    let mut weight_iter = weights.into_iter();
    for task in tasks {
        if !task.is_eligible() {
            allocations.push(TaskAllocation {
                task_id: task.id.clone(),
                name: task.name.clone(),
                days_until_due: None,
                urgency: 0.0,
                share: 0.0,
                minutes: 0,
                excluded: true,
            });
            continue;
        }

        let (days, weight) = weight_iter.next().unwrap_or((0, 0.0));
        let (share, minutes) = if skipped {
            (0.0, task.current_minutes)
        } else {
            let share = weight / urgency_sum;
            (share, floor_minutes(share * total_work_minutes as f64))
        };
        debug!(task_id = %task.id, days, weight, share, minutes, "task allocation");
        allocations.push(TaskAllocation {
            task_id: task.id.clone(),
            name: task.name.clone(),
            days_until_due: Some(days),
            urgency: weight,
            share,
            minutes,
            excluded: false,
        });
    }

    AllocationPlan {
        window: *window,
        raw_minutes,
        reclaimed_minutes,
        total_work_minutes,
        urgency_sum,
        skipped,
        allocations,
    }
}

fn floor_minutes(value: f64) -> u32 {
    if value.is_nan() || value <= 0.0 {
        0
    } else if value >= f64::from(u32::MAX) {
        u32::MAX
    } else {
        value.floor() as u32
    }
}

/// Allocation engine bound to a set of settings.
///
/// `run` holds a lock across read, compute and save so two runs through the
/// same engine never interleave.
#[derive(Debug, Default)]
pub struct AllocationEngine {
    settings: AllocationSettings,
    in_flight: Mutex<()>,
}

impl AllocationEngine {
    /// # Errors
    /// Returns `ValidationError::InvalidValue` for a negative or non-finite
    /// school multiplier.
    pub fn new(settings: AllocationSettings) -> Result<Self, ValidationError> {
        settings.validate()?;
        Ok(Self {
            settings,
            in_flight: Mutex::new(()),
        })
    }

    pub fn settings(&self) -> &AllocationSettings {
        &self.settings
    }

    pub fn plan(&self, tasks: &[Task], window: &BudgetWindow) -> AllocationPlan {
        plan(tasks, window, &self.settings)
    }

    /// Reads every task, recomputes `current_minutes` and saves the changed
    /// tasks as one batch.
    ///
    /// # Errors
    /// Store failures are logged and returned; nothing is retried.
    pub fn run<S: TaskStore + ?Sized>(&self, store: &S, window: &BudgetWindow) -> Result<AllocationPlan> {
        let _guard = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);

        let mut tasks = store.list_tasks()?;
        let plan = self.plan(&tasks, window);
        if plan.skipped {
            warn!(tasks = tasks.len(), "no eligible task carries weight; leaving budgets unchanged");
        }
        if plan.total_work_minutes < 0 {
            warn!(total = plan.total_work_minutes, "budget is negative; every allocation clamps to 0");
        }

        let changed = plan.apply(&mut tasks);
        if !changed.is_empty() {
            if let Err(e) = store.save_tasks(&changed) {
                error!(error = %e, changed = changed.len(), "saving allocation failed");
                return Err(e.into());
            }
        }

        info!(
            eligible = plan.eligible_count(),
            excluded = plan.excluded_count(),
            total_work_minutes = plan.total_work_minutes,
            allocated = plan.allocated_minutes(),
            changed = changed.len(),
            "allocation run finished"
        );
        Ok(plan)
    }
}
