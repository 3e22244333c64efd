//! SQLite-backed task and session storage.
//!
//! Provides persistent storage for:
//! - The task list
//! - The running timer session
//! - The last deleted task, for undo
//! - Key-value store for application state

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, error};

use super::{data_dir, migrations, SessionStore, TaskStore};
use crate::error::StoreError;
use crate::task::{parse_due_date, Task};
use crate::timer::Session;

const SESSION_KEY: &str = "active_session";
const DELETED_TASK_KEY: &str = "last_deleted_task";

const TASK_COLUMNS: &str = "id, name, due_date, is_for_school, is_completed, is_done_for_today,
    current_minutes, completed_time, temporary_order, notes";

/// SQLite database holding tasks, the timer session and app state.
pub struct Database {
    conn: Connection,
    path: Option<PathBuf>,
}

impl Database {
    /// Get a reference to the underlying SQLite connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// File backing this database; `None` for in-memory databases.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Open the database at `<data dir>/allot.db`.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self, StoreError> {
        let path = data_dir()?.join("allot.db");
        Self::open_at(path)
    }

    /// Open (and create if needed) the database at `path`.
    pub fn open_at(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(&path).map_err(|source| StoreError::OpenFailed {
            path: path.clone(),
            source,
        })?;
        let db = Self {
            conn,
            path: Some(path),
        };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(|source| StoreError::OpenFailed {
            path: PathBuf::from(":memory:"),
            source,
        })?;
        let db = Self { conn, path: None };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), StoreError> {
        migrations::migrate(&self.conn).map_err(|e| StoreError::MigrationFailed(e.to_string()))
    }

    // ── Key-value ────────────────────────────────────────────────────

    pub fn kv_get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get::<_, String>(0)
            })
            .optional()?;
        Ok(value)
    }

    pub fn kv_set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO kv (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn kv_delete(&self, key: &str) -> Result<(), StoreError> {
        self.conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }

    fn kv_get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        match self.kv_get(key)? {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|e| StoreError::Corrupt {
                    key: key.to_string(),
                    message: e.to_string(),
                }),
            None => Ok(None),
        }
    }

    fn kv_set_json<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let raw = serde_json::to_string(value).map_err(|e| StoreError::Corrupt {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        self.kv_set(key, &raw)
    }

    // ── Undo ─────────────────────────────────────────────────────────

    /// Keeps `task` so a later undo can bring it back. Replaces any earlier one.
    pub fn remember_deleted(&self, task: &Task) -> Result<(), StoreError> {
        self.kv_set_json(DELETED_TASK_KEY, task)
    }

    /// Returns and forgets the last deleted task.
    pub fn take_deleted(&self) -> Result<Option<Task>, StoreError> {
        let task = self.kv_get_json(DELETED_TASK_KEY)?;
        self.kv_delete(DELETED_TASK_KEY)?;
        Ok(task)
    }

    fn row_to_task(row: &Row<'_>) -> rusqlite::Result<(Task, String)> {
        let due_raw: String = row.get(2)?;
        let task = Task {
            id: row.get(0)?,
            name: row.get(1)?,
            due_date: chrono::NaiveDate::MIN,
            is_for_school: row.get(3)?,
            is_completed: row.get(4)?,
            is_done_for_today: row.get::<_, Option<bool>>(5)?.unwrap_or(false),
            current_minutes: row.get::<_, Option<u32>>(6)?.unwrap_or(0),
            completed_time: row.get::<_, Option<u32>>(7)?.unwrap_or(0),
            temporary_order: row.get::<_, i64>(8)?.max(0) as usize,
            notes: row.get::<_, Option<String>>(9)?.unwrap_or_default(),
        };
        Ok((task, due_raw))
    }

    fn upsert(conn: &Connection, task: &Task) -> Result<(), StoreError> {
        conn.execute(
            "INSERT INTO tasks (id, name, due_date, is_for_school, is_completed, is_done_for_today,
                                current_minutes, completed_time, temporary_order, notes)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                due_date = excluded.due_date,
                is_for_school = excluded.is_for_school,
                is_completed = excluded.is_completed,
                is_done_for_today = excluded.is_done_for_today,
                current_minutes = excluded.current_minutes,
                completed_time = excluded.completed_time,
                temporary_order = excluded.temporary_order,
                notes = excluded.notes",
            params![
                task.id,
                task.name,
                task.due_date.format("%Y-%m-%d").to_string(),
                task.is_for_school,
                task.is_completed,
                task.is_done_for_today,
                task.current_minutes,
                task.completed_time,
                task.temporary_order as i64,
                task.notes,
            ],
        )?;
        Ok(())
    }

    fn delete_row(conn: &Connection, task_id: &str) -> Result<(), StoreError> {
        let removed = conn.execute("DELETE FROM tasks WHERE id = ?1", params![task_id])?;
        if removed == 0 {
            return Err(StoreError::NotFound(task_id.to_string()));
        }
        Ok(())
    }
}

impl TaskStore for Database {
    fn list_tasks(&self) -> Result<Vec<Task>, StoreError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks ORDER BY temporary_order, name"
        ))?;
        let rows = stmt.query_map([], Self::row_to_task)?;

        let mut tasks = Vec::new();
        for row in rows {
            let (mut task, due_raw) = row?;
            task.due_date = parse_due_date(&due_raw).map_err(|e| StoreError::Corrupt {
                key: format!("tasks/{}", task.id),
                message: e.to_string(),
            })?;
            tasks.push(task);
        }
        Ok(tasks)
    }

    fn get_task(&self, task_id: &str) -> Result<Option<Task>, StoreError> {
        let found = self
            .conn
            .query_row(
                &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"),
                params![task_id],
                Self::row_to_task,
            )
            .optional()?;
        match found {
            Some((mut task, due_raw)) => {
                task.due_date = parse_due_date(&due_raw).map_err(|e| StoreError::Corrupt {
                    key: format!("tasks/{task_id}"),
                    message: e.to_string(),
                })?;
                Ok(Some(task))
            }
            None => Ok(None),
        }
    }

    fn save_tasks(&self, tasks: &[Task]) -> Result<(), StoreError> {
        let tx = self.conn.unchecked_transaction()?;
        for task in tasks {
            if let Err(e) = Self::upsert(&tx, task) {
                error!(task_id = %task.id, error = %e, "task save failed; rolling back");
                return Err(e);
            }
        }
        tx.commit()?;
        debug!(count = tasks.len(), "tasks saved");
        Ok(())
    }

    fn insert_task(&self, task: &Task) -> Result<(), StoreError> {
        Self::upsert(&self.conn, task)
    }

    fn delete_task(&self, task_id: &str) -> Result<(), StoreError> {
        Self::delete_row(&self.conn, task_id)
    }

    fn delete_and_save(&self, task_id: &str, tasks: &[Task]) -> Result<(), StoreError> {
        let tx = self.conn.unchecked_transaction()?;
        Self::delete_row(&tx, task_id)?;
        for task in tasks {
            if let Err(e) = Self::upsert(&tx, task) {
                error!(task_id = %task.id, error = %e, "compaction after delete failed; rolling back");
                return Err(e);
            }
        }
        tx.commit()?;
        debug!(task_id, count = tasks.len(), "task deleted and ranks saved");
        Ok(())
    }
}

impl SessionStore for Database {
    fn load_session(&self) -> Result<Option<Session>, StoreError> {
        self.kv_get_json(SESSION_KEY)
    }

    fn save_session(&self, session: &Session) -> Result<(), StoreError> {
        self.kv_set_json(SESSION_KEY, session)
    }

    fn clear_session(&self) -> Result<(), StoreError> {
        self.kv_delete(SESSION_KEY)
    }
}
