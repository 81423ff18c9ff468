mod config;
pub mod database;
pub mod memory;

pub use config::{Config, DueTimeDisplay, NotificationsConfig, RemindersConfig, WatchConfig};
pub use database::Database;
pub use memory::MemoryKv;

use std::path::PathBuf;

use crate::error::{ConfigError, DatabaseError};

/// Durable key-value persistence for the reminder state.
///
/// Writes between [`KvBackend::begin`] and [`KvBackend::commit`] become
/// visible together or not at all; [`KvBackend::rollback`] discards them.
/// Reads inside an open transaction observe its pending writes.
pub trait KvBackend: Send {
    fn kv_get(&self, key: &str) -> Result<Option<String>, DatabaseError>;

    fn kv_set(&mut self, key: &str, value: &str) -> Result<(), DatabaseError>;

    /// Start an exclusive write transaction.
    fn begin(&mut self) -> Result<(), DatabaseError>;

    fn commit(&mut self) -> Result<(), DatabaseError>;

    /// Discard writes since [`KvBackend::begin`]. Must be safe to call
    /// after a failed `commit`.
    fn rollback(&mut self);
}

/// Returns the data directory.
///
/// `REMINDR_DATA_DIR` wins if set. Otherwise `~/.config/remindr[-dev]/`
/// based on `REMINDR_ENV` (set `REMINDR_ENV=dev` for a development
/// directory).
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let dir = match std::env::var_os("REMINDR_DATA_DIR") {
        Some(explicit) => PathBuf::from(explicit),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");

            let env = std::env::var("REMINDR_ENV").unwrap_or_else(|_| "production".to_string());

            if env == "dev" {
                base_dir.join("remindr-dev")
            } else {
                base_dir.join("remindr")
            }
        }
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}
