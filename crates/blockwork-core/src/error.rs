//! Core error types for blockwork-core.
//!
//! One `thiserror` enum per concern, aggregated by [`CoreError`]. Outcomes that
//! are expected in normal operation (conditions not met) are not errors and live
//! in [`crate::unlock::UnlockOutcome`] instead.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Core error type for blockwork-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Persisted state errors
    #[error("State error: {0}")]
    State(#[from] StateError),

    /// Remote transport errors after retry handling
    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    /// Unlock protocol errors
    #[error("{0}")]
    Unlock(#[from] UnlockError),

    /// Condition registry errors
    #[error("Condition error: {0}")]
    Condition(#[from] ConditionError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
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

    /// Key does not exist in the configuration tree
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),
}

/// Classification of a single failed remote attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Transport-layer hiccup worth retrying.
    Transient,
    /// Auth, permission or configuration problem. Never retried.
    Fatal,
}

impl fmt::Display for FailureClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureClass::Transient => f.write_str("transient"),
            FailureClass::Fatal => f.write_str("fatal"),
        }
    }
}

/// Failure of one remote attempt, carrying the underlying cause.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{class} failure: {cause}")]
pub struct TransportError {
    pub class: FailureClass,
    pub cause: String,
}

impl TransportError {
    pub fn transient(cause: impl Into<String>) -> Self {
        Self {
            class: FailureClass::Transient,
            cause: cause.into(),
        }
    }

    pub fn fatal(cause: impl Into<String>) -> Self {
        Self {
            class: FailureClass::Fatal,
            cause: cause.into(),
        }
    }

    pub fn is_transient(&self) -> bool {
        self.class == FailureClass::Transient
    }
}

/// Result of running a remote operation through the retry policy.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Every attempt failed with a transient error.
    #[error("{operation} failed after {attempts} attempts: {last}")]
    Exhausted {
        operation: String,
        attempts: u32,
        #[source]
        last: TransportError,
    },

    /// A fatal error stopped the operation without retrying.
    #[error("{operation} failed on attempt {attempt}: {source}")]
    Fatal {
        operation: String,
        attempt: u32,
        #[source]
        source: TransportError,
    },

    /// The backoff wait was interrupted by a shutdown signal.
    #[error("{operation} interrupted during retry backoff")]
    Interrupted { operation: String },

    /// The remote answered, but not with something we understand.
    #[error("unexpected response from {operation}: {message}")]
    BadResponse { operation: String, message: String },

    /// Local side of the push failed (writing the blocklist artifact).
    #[error("failed to write {path}: {source}")]
    Local {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Persisted state errors.
#[derive(Error, Debug)]
pub enum StateError {
    /// Reading or writing the local state file failed
    #[error("Failed to access state file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// State could not be encoded
    #[error("Failed to serialize state: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Remote state host unreachable or refused the operation
    #[error("Remote state unavailable: {0}")]
    Remote(#[from] SyncError),
}

/// Unlock protocol errors.
#[derive(Error, Debug)]
pub enum UnlockError {
    /// All emergency unlocks for today are used up
    #[error("No emergency unlocks remaining today (used {used}/{max}).")]
    LimitExceeded { used: u32, max: u32 },

    /// The confirmation phrase did not match
    #[error("Incorrect confirmation. Emergency unlock cancelled.")]
    ConfirmationMismatch,

    /// The emergency wait was interrupted before completing
    #[error("Emergency unlock cancelled.")]
    Cancelled,

    /// Loading or saving state failed
    #[error(transparent)]
    State(#[from] StateError),

    /// The enforcement point could not be updated; state left unchanged
    #[error("Sync failed: {0}")]
    SyncFailed(#[from] SyncError),
}

/// Condition construction and evaluation errors.
#[derive(Error, Debug)]
pub enum ConditionError {
    /// No factory registered under this type name
    #[error("Unknown condition type: {0}")]
    UnknownType(String),

    /// The condition (or its context) is missing required settings
    #[error("Condition misconfigured: {0}")]
    Misconfigured(String),

    /// Reading the evaluated source failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
