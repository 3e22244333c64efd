pub mod alerts;
pub mod allocate;
pub mod config;
pub mod splits;
pub mod task;
pub mod timer;

use std::path::PathBuf;

use allot_core::storage::data_dir;
use allot_core::{AlertQueue, Clock, Config, ConfigError, Database, FixedClock, StoreError, SystemClock};
use chrono::{DateTime, FixedOffset};
use serde::Serialize;

pub type CmdResult = Result<(), Box<dyn std::error::Error>>;

/// Options shared by every subcommand.
pub struct Context {
    pub db: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub now: Option<DateTime<FixedOffset>>,
}

impl Context {
    pub fn open_db(&self) -> Result<Database, StoreError> {
        match &self.db {
            Some(path) => Database::open_at(path),
            None => Database::open(),
        }
    }

    pub fn config_path(&self) -> Result<PathBuf, ConfigError> {
        match &self.config {
            Some(path) => Ok(path.clone()),
            None => Config::path(),
        }
    }

    pub fn load_config(&self) -> Result<Config, ConfigError> {
        Config::load_from(&self.config_path()?)
    }

    /// Alerts live beside the database.
    pub fn alert_queue(&self, config: &Config) -> std::io::Result<AlertQueue> {
        let dir = match self.db.as_ref().and_then(|p| p.parent()) {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => data_dir()?,
        };
        Ok(AlertQueue::with_settings(dir.join("alerts.jsonl"), &config.notifications))
    }

    pub fn clock(&self) -> Box<dyn Clock> {
        match self.now {
            Some(now) => Box::new(FixedClock::new(now)),
            None => Box::new(SystemClock),
        }
    }

    pub fn now(&self) -> DateTime<FixedOffset> {
        self.now.unwrap_or_else(|| SystemClock.now())
    }
}

pub fn parse_now(s: &str) -> Result<DateTime<FixedOffset>, String> {
    DateTime::parse_from_rfc3339(s).map_err(|e| format!("expected an RFC 3339 timestamp: {e}"))
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> CmdResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
