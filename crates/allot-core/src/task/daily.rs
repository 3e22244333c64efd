//! Bulk end-of-day and start-of-day edits.

use tracing::info;

use super::Task;
use crate::error::{Result, StoreError};
use crate::storage::TaskStore;

/// Sets `is_done_for_today` on open non-school tasks.
pub fn mark_non_school_done(tasks: &mut [Task]) -> usize {
    let mut changed = 0;
    for task in tasks
        .iter_mut()
        .filter(|t| !t.is_completed && !t.is_for_school && !t.is_done_for_today)
    {
        task.is_done_for_today = true;
        changed += 1;
    }
    changed
}

/// Clears done-for-today and worked time on every open task.
pub fn clear_progress(tasks: &mut [Task]) -> usize {
    let mut changed = 0;
    for task in tasks.iter_mut().filter(|t| !t.is_completed) {
        if task.is_done_for_today || task.completed_time != 0 {
            task.is_done_for_today = false;
            task.completed_time = 0;
            changed += 1;
        }
    }
    changed
}

pub fn mark_non_school_done_for_today<S: TaskStore + ?Sized>(store: &S) -> Result<usize> {
    bulk_edit(store, mark_non_school_done, "non-school tasks marked done for today")
}

pub fn clear_daily_progress<S: TaskStore + ?Sized>(store: &S) -> Result<usize> {
    bulk_edit(store, clear_progress, "daily progress cleared")
}

pub fn set_done_for_today<S: TaskStore + ?Sized>(store: &S, task_id: &str, done: bool) -> Result<Task> {
    edit_one(store, task_id, |t| t.is_done_for_today = done)
}

pub fn set_completed<S: TaskStore + ?Sized>(store: &S, task_id: &str, completed: bool) -> Result<Task> {
    edit_one(store, task_id, |t| t.is_completed = completed)
}

fn bulk_edit<S, F>(store: &S, edit: F, what: &str) -> Result<usize>
where
    S: TaskStore + ?Sized,
    F: FnOnce(&mut [Task]) -> usize,
{
    let mut tasks = store.list_tasks()?;
    let changed = edit(&mut tasks);
    if changed > 0 {
        store.save_tasks(&tasks)?;
    }
    info!(changed, "{what}");
    Ok(changed)
}

fn edit_one<S, F>(store: &S, task_id: &str, edit: F) -> Result<Task>
where
    S: TaskStore + ?Sized,
    F: FnOnce(&mut Task),
{
    let mut task = store
        .get_task(task_id)?
        .ok_or_else(|| StoreError::NotFound(task_id.to_string()))?;
    edit(&mut task);
    store.save_tasks(std::slice::from_ref(&task))?;
    Ok(task)
}
