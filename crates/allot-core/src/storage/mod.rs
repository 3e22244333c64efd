pub mod alerts;
pub mod config;
pub mod database;
mod memory;
pub mod migrations;

pub use alerts::{AlertKind, AlertQueue, AlertRecord};
pub use config::Config;
pub use database::Database;
pub use memory::MemoryStore;

use std::path::PathBuf;

use crate::error::StoreError;
use crate::task::Task;
use crate::timer::Session;

/// Persistent task collection.
///
/// `save_tasks` upserts by id and must apply the whole batch or none of it.
pub trait TaskStore {
    fn list_tasks(&self) -> Result<Vec<Task>, StoreError>;

    fn get_task(&self, task_id: &str) -> Result<Option<Task>, StoreError> {
        Ok(self.list_tasks()?.into_iter().find(|t| t.id == task_id))
    }

    fn save_tasks(&self, tasks: &[Task]) -> Result<(), StoreError>;

    fn insert_task(&self, task: &Task) -> Result<(), StoreError>;

    /// Removes a task; `NotFound` when no task has this id.
    fn delete_task(&self, task_id: &str) -> Result<(), StoreError>;

    /// Removes `task_id` and upserts `tasks` as one batch. On any error,
    /// including `NotFound`, the store is left as it was.
    fn delete_and_save(&self, task_id: &str, tasks: &[Task]) -> Result<(), StoreError>;
}

/// Durable home for the running timer session.
pub trait SessionStore {
    fn load_session(&self) -> Result<Option<Session>, StoreError>;
    fn save_session(&self, session: &Session) -> Result<(), StoreError>;
    fn clear_session(&self) -> Result<(), StoreError>;
}

impl<T: TaskStore + ?Sized> TaskStore for &T {
    fn list_tasks(&self) -> Result<Vec<Task>, StoreError> {
        (**self).list_tasks()
    }
    fn get_task(&self, task_id: &str) -> Result<Option<Task>, StoreError> {
        (**self).get_task(task_id)
    }
    fn save_tasks(&self, tasks: &[Task]) -> Result<(), StoreError> {
        (**self).save_tasks(tasks)
    }
    fn insert_task(&self, task: &Task) -> Result<(), StoreError> {
        (**self).insert_task(task)
    }
    fn delete_task(&self, task_id: &str) -> Result<(), StoreError> {
        (**self).delete_task(task_id)
    }
    fn delete_and_save(&self, task_id: &str, tasks: &[Task]) -> Result<(), StoreError> {
        (**self).delete_and_save(task_id, tasks)
    }
}

impl<S: SessionStore + ?Sized> SessionStore for &S {
    fn load_session(&self) -> Result<Option<Session>, StoreError> {
        (**self).load_session()
    }
    fn save_session(&self, session: &Session) -> Result<(), StoreError> {
        (**self).save_session(session)
    }
    fn clear_session(&self) -> Result<(), StoreError> {
        (**self).clear_session()
    }
}

/// Returns the data directory, creating it if needed.
///
/// `ALLOT_HOME` wins when set. Otherwise `~/.config/allot`, or
/// `~/.config/allot-dev` with `ALLOT_ENV=dev`.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> std::io::Result<PathBuf> {
    let dir = match std::env::var_os("ALLOT_HOME") {
        Some(home) if !home.is_empty() => PathBuf::from(home),
        _ => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("ALLOT_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("allot-dev")
            } else {
                base_dir.join("allot")
            }
        }
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
