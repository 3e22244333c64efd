//! Deadline-proximity weighting.

use chrono::NaiveDate;

/// Whole calendar days from `today` to `due`; negative when overdue.
pub fn days_until_due(today: NaiveDate, due: NaiveDate) -> i64 {
    (due - today).num_days()
}

/// Day count used as the urgency denominator.
///
/// Positive counts pass through. Due today gives 0.5 and one day overdue
/// gives 1.0. Further overdue gives `1 / (|d| + 2)`, so urgency keeps
/// rising as the task slips and nothing divides by zero.
pub fn effective_days(days_until_due: i64) -> f64 {
    match days_until_due {
        d if d > 0 => d as f64,
        0 | -1 => 1.0 / (days_until_due as f64 + 2.0),
        d => 1.0 / (d.unsigned_abs() as f64 + 2.0),
    }
}

/// Urgency weight: inverse effective days, scaled down for non-school tasks.
pub fn urgency(days_until_due: i64, is_for_school: bool, school_multiplier: f64) -> f64 {
    let category = if is_for_school { 1.0 } else { school_multiplier };
    (1.0 / effective_days(days_until_due)) * category
}
