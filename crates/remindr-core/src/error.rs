//! Core error types for remindr-core.
//!
//! Store operations surface [`CoreError::NotFound`] to callers, treat
//! [`CoreError::AlreadyExists`] as a programming error, and wrap storage
//! failures in [`CoreError::Persistence`]. A failed mutation never leaves a
//! partially applied state behind.

use std::path::PathBuf;
use thiserror::Error;

use crate::reminder::ReminderId;

/// Core error type for remindr-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// An operation referenced a reminder id that is not in the store
    #[error("Reminder with id {0} does not exist")]
    NotFound(ReminderId),

    /// A reminder with a pre-assigned id collided with a stored one
    #[error("Cannot add reminder: reminder with id {0} already exists")]
    AlreadyExists(ReminderId),

    /// Reading or writing the durable state failed
    #[error("Persistence error: {0}")]
    Persistence(#[from] DatabaseError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

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

impl CoreError {
    /// Whether this error means the referenced reminder is gone.
    pub fn is_not_found(&self) -> bool {
        matches!(self, CoreError::NotFound(_))
    }
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

    /// A stored value could not be decoded
    #[error("Corrupt value at key '{key}': {message}")]
    CorruptValue { key: String, message: String },

    /// Database is locked by another writer
    #[error("Database is locked")]
    Locked,

    /// The state lock was poisoned by a panicking writer
    #[error("State lock poisoned")]
    Poisoned,
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

    /// Unknown dot-path key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// The data directory could not be determined or created
    #[error("Data directory unavailable: {0}")]
    DataDir(String),
}

/// Validation errors.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    /// Reminder text is empty or whitespace only
    #[error("Reminder text must not be empty")]
    EmptyText,

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

// Helper implementations for converting from other error types

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(inner, _msg) => {
                if inner.code == rusqlite::ErrorCode::DatabaseLocked
                    || inner.code == rusqlite::ErrorCode::DatabaseBusy
                {
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
        CoreError::Persistence(err.into())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_display_names_id() {
        let err = CoreError::NotFound(4);
        assert_eq!(err.to_string(), "Reminder with id 4 does not exist");
        assert!(err.is_not_found());
    }

    #[test]
    fn rusqlite_errors_become_persistence_errors() {
        let err: CoreError = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(matches!(
            err,
            CoreError::Persistence(DatabaseError::QueryFailed(_))
        ));
        assert!(!err.is_not_found());
    }

    #[test]
    fn validation_error_converts() {
        let err: CoreError = ValidationError::EmptyText.into();
        assert!(err.to_string().contains("must not be empty"));
    }
}
