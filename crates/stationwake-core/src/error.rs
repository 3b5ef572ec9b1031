//! Core error types for stationwake-core.
//!
//! Failure policy in one sentence: configuration and permission problems
//! fail fast at session start, everything that happens during a polling
//! tick is recovered locally and the session keeps running.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for stationwake-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Storage-related errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Monitor lifecycle errors
    #[error("Monitor error: {0}")]
    Monitor(#[from] MonitorError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Durable-storage errors. During a polling tick these are logged and
/// treated as "no destination" for that tick; they are never fatal to a
/// running session.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Failed to open the database file
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Schema migration failed
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// A stored value did not round-trip through serialization
    #[error("Stored value is corrupt: {0}")]
    Corrupt(String),

    /// The data directory could not be prepared
    #[error("Cannot prepare data directory: {0}")]
    DataDir(#[from] std::io::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),

    /// Key does not exist in the configuration tree
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Value cannot be parsed as the type the key holds
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// The data directory could not be prepared
    #[error("Cannot prepare data directory: {0}")]
    DataDir(#[from] std::io::Error),
}

/// Errors that fail a session at `start()`. A session that got past
/// `start()` never returns these; see [`SampleError`] for per-tick
/// failures.
#[derive(Error, Debug)]
pub enum MonitorError {
    /// The permission gate reported not-ready. Callers cannot tell which
    /// authorization step failed.
    #[error("Location permissions not granted")]
    PermissionDenied,

    /// Polling interval of zero
    #[error("Polling interval must be greater than zero")]
    InvalidInterval,

    /// No destination stored at session start
    #[error("No destination has been set")]
    MissingDestination,

    /// `start()` called twice on the same session
    #[error("Monitoring session already started")]
    AlreadyStarted,

    /// The background runner refused to register the session
    #[error("Background runner error: {0}")]
    Runner(#[from] RunnerError),
}

/// Position-sampling errors. Always recovered locally: the tick is
/// skipped and polling continues, with no retry backoff.
#[derive(Error, Debug)]
pub enum SampleError {
    /// The sensor did not answer within the configured bound
    #[error("Position request timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },

    /// Platform sensor error
    #[error("Position sensor error: {0}")]
    Sensor(String),

    /// The source has no position to offer
    #[error("No position available")]
    Unavailable,
}

/// Background-runner errors.
#[derive(Error, Debug)]
pub enum RunnerError {
    /// The keep-alive facility could not be acquired
    #[error("Background task failed to start: {0}")]
    StartFailed(String),
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        StorageError::QueryFailed(err.to_string())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
