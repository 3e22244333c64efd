//! Rank maintenance for the user's task list.
//!
//! Ranks (`temporary_order`) form the dense sequence `0..n`. Every edit here
//! keeps that true.

use tracing::{debug, warn};

use super::Task;
use crate::error::{Result, StoreError, ValidationError};
use crate::storage::TaskStore;

/// Moves the task ranked `source` so it lands before the task currently at
/// `destination`. `destination == len` moves it to the bottom.
pub fn apply_move(tasks: &mut [Task], source: usize, destination: usize) -> Result<(), ValidationError> {
    let len = tasks.len();
    if source >= len {
        return Err(ValidationError::OutOfBounds {
            collection: "task ranks".to_string(),
            index: source,
            len,
        });
    }
    if destination > len {
        return Err(ValidationError::OutOfBounds {
            collection: "task ranks".to_string(),
            index: destination,
            len,
        });
    }
    let moving = tasks
        .iter()
        .position(|t| t.temporary_order == source)
        .ok_or_else(|| ValidationError::InvalidValue {
            field: "temporary_order".to_string(),
            message: format!("no task holds rank {source}"),
        })?;

    if source < destination {
        for task in tasks.iter_mut() {
            if task.temporary_order > source && task.temporary_order < destination {
                task.temporary_order -= 1;
            }
        }
        tasks[moving].temporary_order = destination - 1;
    } else if source > destination {
        for task in tasks.iter_mut() {
            if task.temporary_order >= destination && task.temporary_order < source {
                task.temporary_order += 1;
            }
        }
        tasks[moving].temporary_order = destination;
    }
    Ok(())
}

/// Frees rank `position` (clamped to the end) and returns it.
pub fn open_rank(tasks: &mut [Task], position: usize) -> usize {
    let position = position.min(tasks.len());
    for task in tasks.iter_mut().filter(|t| t.temporary_order >= position) {
        task.temporary_order += 1;
    }
    position
}

/// Closes the gap left by removing the task that held `removed`.
pub fn close_rank(tasks: &mut [Task], removed: usize) {
    for task in tasks.iter_mut().filter(|t| t.temporary_order > removed) {
        task.temporary_order -= 1;
    }
}

pub fn is_dense(tasks: &[Task]) -> bool {
    let mut ranks: Vec<usize> = tasks.iter().map(|t| t.temporary_order).collect();
    ranks.sort_unstable();
    ranks.iter().enumerate().all(|(i, r)| i == *r)
}

/// Reassigns ranks `0..n` keeping the current relative order. Returns how
/// many tasks changed rank.
pub fn normalize(tasks: &mut [Task]) -> usize {
    let mut idx: Vec<usize> = (0..tasks.len()).collect();
    idx.sort_by(|&a, &b| {
        let (a, b) = (&tasks[a], &tasks[b]);
        a.temporary_order
            .cmp(&b.temporary_order)
            .then_with(|| a.name.cmp(&b.name))
            .then_with(|| a.id.cmp(&b.id))
    });
    let mut changed = 0;
    for (rank, i) in idx.into_iter().enumerate() {
        if tasks[i].temporary_order != rank {
            tasks[i].temporary_order = rank;
            changed += 1;
        }
    }
    changed
}

// ── Store operations ────────────────────────────────────────────────

/// Adds `task` at `position` (bottom when `None`) and persists the shifted list.
pub fn add_task<S: TaskStore + ?Sized>(store: &S, mut task: Task, position: Option<usize>) -> Result<Task> {
    let mut tasks = store.list_tasks()?;
    let bottom = tasks.len();
    let rank = open_rank(&mut tasks, position.unwrap_or(bottom));
    task.temporary_order = rank;
    tasks.push(task.clone());
    store.save_tasks(&tasks)?;
    debug!(task_id = %task.id, rank, "task added");
    Ok(task)
}

/// Deletes a task and compacts ranks in one store batch. Returns the removed
/// task for undo.
pub fn delete_task<S: TaskStore + ?Sized>(store: &S, task_id: &str) -> Result<Task> {
    let mut tasks = store.list_tasks()?;
    let idx = tasks
        .iter()
        .position(|t| t.id == task_id)
        .ok_or_else(|| StoreError::NotFound(task_id.to_string()))?;
    let removed = tasks.remove(idx);
    close_rank(&mut tasks, removed.temporary_order);
    store.delete_and_save(task_id, &tasks)?;
    debug!(task_id, rank = removed.temporary_order, "task deleted");
    Ok(removed)
}

/// Re-inserts a previously deleted task at the bottom of the list.
pub fn restore_task<S: TaskStore + ?Sized>(store: &S, mut task: Task) -> Result<Task> {
    let tasks = store.list_tasks()?;
    if tasks.iter().any(|t| t.id == task.id) {
        return Err(ValidationError::InvalidValue {
            field: "id".to_string(),
            message: format!("task {} already exists", task.id),
        }
        .into());
    }
    task.temporary_order = tasks.len();
    store.insert_task(&task)?;
    Ok(task)
}

/// Moves a task between ranks and persists the list.
pub fn move_task<S: TaskStore + ?Sized>(store: &S, source: usize, destination: usize) -> Result<()> {
    let mut tasks = store.list_tasks()?;
    if !is_dense(&tasks) {
        let fixed = normalize(&mut tasks);
        warn!(fixed, "task ranks were not dense; renumbered before move");
    }
    apply_move(&mut tasks, source, destination)?;
    store.save_tasks(&tasks)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn list(names: &[&str]) -> Vec<Task> {
        let due = NaiveDate::from_ymd_opt(2024, 5, 3).unwrap();
        names
            .iter()
            .enumerate()
            .map(|(i, n)| Task::new(*n, due).with_order(i))
            .collect()
    }

    fn names_in_order(tasks: &[Task]) -> Vec<String> {
        super::super::sorted_by_order(tasks)
            .into_iter()
            .map(|t| t.name.clone())
            .collect()
    }

    #[test]
    fn move_down_lands_before_destination() {
        let mut tasks = list(&["a", "b", "c", "d"]);
        apply_move(&mut tasks, 0, 3).unwrap();
        assert_eq!(names_in_order(&tasks), ["b", "c", "a", "d"]);
        assert!(is_dense(&tasks));
    }

    #[test]
    fn move_to_bottom() {
        let mut tasks = list(&["a", "b", "c"]);
        apply_move(&mut tasks, 0, 3).unwrap();
        assert_eq!(names_in_order(&tasks), ["b", "c", "a"]);
    }

    #[test]
    fn move_up() {
        let mut tasks = list(&["a", "b", "c", "d"]);
        apply_move(&mut tasks, 3, 1).unwrap();
        assert_eq!(names_in_order(&tasks), ["a", "d", "b", "c"]);
        assert!(is_dense(&tasks));
    }

    #[test]
    fn move_onto_itself_is_a_noop() {
        let mut tasks = list(&["a", "b", "c"]);
        apply_move(&mut tasks, 1, 1).unwrap();
        apply_move(&mut tasks, 1, 2).unwrap();
        assert_eq!(names_in_order(&tasks), ["a", "b", "c"]);
    }

    #[test]
    fn move_out_of_range_is_rejected() {
        let mut tasks = list(&["a", "b"]);
        assert!(matches!(
            apply_move(&mut tasks, 2, 0),
            Err(ValidationError::OutOfBounds { index: 2, len: 2, .. })
        ));
        assert!(apply_move(&mut tasks, 0, 3).is_err());
    }

    #[test]
    fn open_and_close_rank_keep_density() {
        let mut tasks = list(&["a", "b", "c"]);
        let rank = open_rank(&mut tasks, 1);
        assert_eq!(rank, 1);
        assert_eq!(tasks[1].temporary_order, 2);
        close_rank(&mut tasks, 1);
        assert!(is_dense(&tasks));
        assert_eq!(open_rank(&mut tasks, 99), 3);
    }

    #[test]
    fn normalize_repairs_gaps_and_ties() {
        let mut tasks = list(&["a", "b", "c"]);
        tasks[0].temporary_order = 4;
        tasks[1].temporary_order = 4;
        tasks[2].temporary_order = 9;
        assert!(!is_dense(&tasks));
        assert_eq!(normalize(&mut tasks), 3);
        assert_eq!(names_in_order(&tasks), ["a", "b", "c"]);
        assert!(is_dense(&tasks));
    }
}
