//! Core error types for allot-core.
//!
//! Store, configuration, notification and validation failures each get their
//! own enum; [`CoreError`] wraps them for callers that only need to report.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for allot-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Task or session store errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Alert delivery errors
    #[error("Notification error: {0}")]
    Notify(#[from] NotifyError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Store-specific errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Failed to open the backing database
    #[error("Failed to open task store at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Migration failed
    #[error("Store migration failed: {0}")]
    MigrationFailed(String),

    /// Database is locked
    #[error("Task store is locked")]
    Locked,

    /// No task with the given id
    #[error("Task not found: {0}")]
    NotFound(String),

    /// A stored record could not be decoded
    #[error("Corrupt record '{key}': {message}")]
    Corrupt { key: String, message: String },

    /// Filesystem errors around the store
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Dot path does not name a configuration key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),
}

/// Alert delivery errors.
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Alert queue IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Alert queue encoding error: {0}")]
    Json(#[from] serde_json::Error),

    /// The notifier refused the request
    #[error("Alert rejected: {0}")]
    Rejected(String),
}

/// Validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Malformed "HH:MM" time of day
    #[error("Invalid time of day '{0}': expected HH:MM")]
    InvalidTimeOfDay(String),

    /// Out of bounds
    #[error("Index {index} out of bounds for {collection} (length: {len})")]
    OutOfBounds {
        collection: String,
        index: usize,
        len: usize,
    },

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(code, _msg) => {
                if code.code == rusqlite::ErrorCode::DatabaseLocked {
                    StoreError::Locked
                } else {
                    StoreError::QueryFailed(err.to_string())
                }
            }
            _ => StoreError::QueryFailed(err.to_string()),
        }
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locked_sqlite_maps_to_locked() {
        let err = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            None,
        );
        // SQLITE_BUSY is reported as DatabaseBusy, not locked.
        assert!(matches!(StoreError::from(err), StoreError::QueryFailed(_)));

        let err = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_LOCKED),
            None,
        );
        assert!(matches!(StoreError::from(err), StoreError::Locked));
    }

    #[test]
    fn core_error_wraps_store_error() {
        let err: CoreError = StoreError::NotFound("abc".into()).into();
        assert_eq!(err.to_string(), "Store error: Task not found: abc");
    }
}
