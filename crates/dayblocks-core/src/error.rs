//! Core error types for dayblocks-core.
//!
//! Contract violations (illegal timer transitions) are kept apart from
//! recoverable failures (storage, configuration) so callers can disable the
//! triggering control for the former and retry the latter.

use std::path::PathBuf;
use thiserror::Error;

use crate::block::BlockStatus;
use crate::timer::TimerState;

/// Core error type for dayblocks-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Illegal state machine transition requested by the caller
    #[error("Transition rejected: {0}")]
    Transition(#[from] TransitionError),

    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A block write failed. The in-memory state is still authoritative and
    /// the write must be retried with the same run id.
    #[error("Failed to persist block {block_index} of {date} (run {run_id:?}): {message}")]
    Persistence {
        date: chrono::NaiveDate,
        block_index: u8,
        run_id: Option<String>,
        message: String,
    },

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors with context
    #[error("{0}")]
    Custom(String),
}

/// Programming errors: the caller asked for a transition the current state
/// does not allow. Never retried.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransitionError {
    #[error("block {requested} is not the current block ({current})")]
    WrongBlock { requested: u8, current: u8 },

    #[error("block belongs to {requested}, current day is {current}")]
    WrongDate {
        requested: chrono::NaiveDate,
        current: chrono::NaiveDate,
    },

    #[error("'{action}' is not allowed while {state:?}")]
    InvalidState {
        action: &'static str,
        state: TimerState,
    },

    #[error("timer is not paused")]
    NotPaused,

    #[error("timer is not running")]
    NotRunning,

    #[error("block {block_index} has already ended")]
    BlockEnded { block_index: u8 },

    #[error("block {block_index} still has {remaining_secs}s left")]
    NotYetEnded { block_index: u8, remaining_secs: i64 },

    #[error("block {block_index} was skipped")]
    BlockSkipped { block_index: u8 },

    #[error("block {block_index} is already completely filled")]
    BlockFilled { block_index: u8 },

    #[error("block with {used_seconds}s of recorded time cannot become {status:?}")]
    SkipForbidden {
        used_seconds: u32,
        status: BlockStatus,
    },

    #[error("block index {0} is outside 0..72")]
    BlockOutOfRange(u8),

    #[error("no active timer session")]
    NoActiveSession,
}

/// Database-specific errors.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Stored payload could not be decoded
    #[error("Corrupt block payload for {key}: {message}")]
    CorruptPayload { key: String, message: String },

    /// Database is locked
    #[error("Database is locked")]
    Locked,
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

    /// Unknown configuration key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),
}

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(err, _msg) => {
                if err.code == rusqlite::ErrorCode::DatabaseLocked {
                    DatabaseError::Locked
                } else {
                    DatabaseError::QueryFailed(err.to_string())
                }
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::Database(err.into())
    }
}

impl CoreError {
    /// True for errors the caller should treat as a disabled control rather
    /// than a failure to report.
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, CoreError::Transition(_))
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_errors_are_contract_violations() {
        let err: CoreError = TransitionError::NotPaused.into();
        assert!(err.is_contract_violation());
        assert_eq!(err.to_string(), "Transition rejected: timer is not paused");
    }

    #[test]
    fn persistence_error_mentions_run() {
        let err = CoreError::Persistence {
            date: chrono::NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            block_index: 30,
            run_id: Some("run-1".into()),
            message: "disk full".into(),
        };
        assert!(!err.is_contract_violation());
        let text = err.to_string();
        assert!(text.contains("block 30"));
        assert!(text.contains("run-1"));
    }

    #[test]
    fn locked_sqlite_maps_to_locked() {
        let locked = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_LOCKED),
            None,
        );
        assert!(matches!(DatabaseError::from(locked), DatabaseError::Locked));

        let other = rusqlite::Error::QueryReturnedNoRows;
        assert!(matches!(DatabaseError::from(other), DatabaseError::QueryFailed(_)));
    }
}
