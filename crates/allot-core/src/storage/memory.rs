use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{SessionStore, TaskStore};
use crate::error::StoreError;
use crate::task::{sorted_by_order, Task};
use crate::timer::Session;

/// In-process task and session store.
///
/// Used by tests and by callers that persist elsewhere. `fail_saves` makes
/// every task write fail and `fail_session_writes` every session write, to
/// exercise error paths.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tasks: Mutex<Vec<Task>>,
    session: Mutex<Option<Session>>,
    fail_saves: Mutex<bool>,
    fail_session_writes: Mutex<bool>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tasks(tasks: Vec<Task>) -> Self {
        Self {
            tasks: Mutex::new(tasks),
            ..Self::default()
        }
    }

    pub fn fail_saves(&self, fail: bool) {
        *lock(&self.fail_saves) = fail;
    }

    pub fn fail_session_writes(&self, fail: bool) {
        *lock(&self.fail_session_writes) = fail;
    }

    /// Snapshot of the stored tasks in insertion order.
    pub fn tasks(&self) -> Vec<Task> {
        lock(&self.tasks).clone()
    }

    fn check_writable(flag: &Mutex<bool>) -> Result<(), StoreError> {
        if *lock(flag) {
            return Err(StoreError::QueryFailed("memory store is read-only".into()));
        }
        Ok(())
    }
}

fn upsert_all(stored: &mut Vec<Task>, tasks: &[Task]) {
    for task in tasks {
        match stored.iter_mut().find(|t| t.id == task.id) {
            Some(existing) => *existing = task.clone(),
            None => stored.push(task.clone()),
        }
    }
}

fn remove_by_id(stored: &mut Vec<Task>, task_id: &str) -> Result<(), StoreError> {
    let idx = stored
        .iter()
        .position(|t| t.id == task_id)
        .ok_or_else(|| StoreError::NotFound(task_id.to_string()))?;
    stored.remove(idx);
    Ok(())
}

impl TaskStore for MemoryStore {
    fn list_tasks(&self) -> Result<Vec<Task>, StoreError> {
        let stored = lock(&self.tasks);
        Ok(sorted_by_order(&stored).into_iter().cloned().collect())
    }

    fn save_tasks(&self, tasks: &[Task]) -> Result<(), StoreError> {
        Self::check_writable(&self.fail_saves)?;
        upsert_all(&mut lock(&self.tasks), tasks);
        Ok(())
    }

    fn insert_task(&self, task: &Task) -> Result<(), StoreError> {
        self.save_tasks(std::slice::from_ref(task))
    }

    fn delete_task(&self, task_id: &str) -> Result<(), StoreError> {
        Self::check_writable(&self.fail_saves)?;
        remove_by_id(&mut lock(&self.tasks), task_id)
    }

    fn delete_and_save(&self, task_id: &str, tasks: &[Task]) -> Result<(), StoreError> {
        Self::check_writable(&self.fail_saves)?;
        let mut stored = lock(&self.tasks);
        remove_by_id(&mut stored, task_id)?;
        upsert_all(&mut stored, tasks);
        Ok(())
    }
}

impl SessionStore for MemoryStore {
    fn load_session(&self) -> Result<Option<Session>, StoreError> {
        Ok(lock(&self.session).clone())
    }

    fn save_session(&self, session: &Session) -> Result<(), StoreError> {
        Self::check_writable(&self.fail_session_writes)?;
        *lock(&self.session) = Some(session.clone());
        Ok(())
    }

    fn clear_session(&self) -> Result<(), StoreError> {
        Self::check_writable(&self.fail_session_writes)?;
        *lock(&self.session) = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn failed_save_changes_nothing() {
        let due = NaiveDate::from_ymd_opt(2024, 5, 3).unwrap();
        let store = MemoryStore::with_tasks(vec![Task::new("a", due)]);
        store.fail_saves(true);
        assert!(store.save_tasks(&[Task::new("b", due)]).is_err());
        assert_eq!(store.tasks().len(), 1);
        store.fail_saves(false);
        store.save_tasks(&[Task::new("b", due)]).unwrap();
        assert_eq!(store.tasks().len(), 2);
    }

    #[test]
    fn delete_and_save_is_all_or_nothing() {
        let due = NaiveDate::from_ymd_opt(2024, 5, 3).unwrap();
        let a = Task::new("a", due).with_order(0);
        let b = Task::new("b", due).with_order(1);
        let store = MemoryStore::with_tasks(vec![a.clone(), b.clone()]);

        assert!(matches!(
            store.delete_and_save("missing", &[b.clone().with_order(0)]),
            Err(StoreError::NotFound(_))
        ));
        assert_eq!(store.list_tasks().unwrap(), vec![a.clone(), b.clone()]);

        store.delete_and_save(&a.id, &[b.clone().with_order(0)]).unwrap();
        assert_eq!(store.list_tasks().unwrap(), vec![b.with_order(0)]);
    }
}
