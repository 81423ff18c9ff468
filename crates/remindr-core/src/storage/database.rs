//! SQLite-backed key-value storage.
//!
//! The reminder state lives in a single `kv` table. Mutations run inside
//! `BEGIN IMMEDIATE` transactions, so two processes sharing the same file
//! serialize their read-modify-write sequences as well.

use rusqlite::{params, Connection};
use std::path::Path;
use std::time::Duration;

use super::{data_dir, KvBackend};
use crate::error::{DatabaseError, Result};

/// How long a writer waits for another process to release the database.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite database holding the `kv` table.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open the database at `<data dir>/remindr.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self> {
        let path = data_dir()?.join("remindr.db");
        Self::open_at(&path)
    }

    /// Open (or create) the database at an explicit path.
    pub fn open_at(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database (for tests).
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> std::result::Result<(), rusqlite::Error> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );",
        )?;
        Ok(())
    }

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> std::result::Result<Option<String>, rusqlite::Error> {
        let mut stmt = self.conn.prepare("SELECT value FROM kv WHERE key = ?1")?;
        let result = stmt.query_row(params![key], |row| row.get::<_, String>(0));
        match result {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> std::result::Result<(), rusqlite::Error> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }
}

impl KvBackend for Database {
    fn kv_get(&self, key: &str) -> std::result::Result<Option<String>, DatabaseError> {
        Database::kv_get(self, key).map_err(DatabaseError::from)
    }

    fn kv_set(&mut self, key: &str, value: &str) -> std::result::Result<(), DatabaseError> {
        Database::kv_set(self, key, value).map_err(DatabaseError::from)
    }

    fn begin(&mut self) -> std::result::Result<(), DatabaseError> {
        self.conn.execute_batch("BEGIN IMMEDIATE TRANSACTION;")?;
        Ok(())
    }

    fn commit(&mut self) -> std::result::Result<(), DatabaseError> {
        self.conn.execute_batch("COMMIT;")?;
        Ok(())
    }

    fn rollback(&mut self) {
        if !self.conn.is_autocommit() {
            let _ = self.conn.execute_batch("ROLLBACK;");
        }
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("path", &self.conn.path())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kv_store() {
        let db = Database::open_memory().unwrap();
        assert!(db.kv_get("test").unwrap().is_none());
        db.kv_set("test", "hello").unwrap();
        assert_eq!(db.kv_get("test").unwrap().unwrap(), "hello");
    }

    #[test]
    fn rollback_discards_pending_writes() {
        let mut db = Database::open_memory().unwrap();
        db.kv_set("nextid", "4").unwrap();

        KvBackend::begin(&mut db).unwrap();
        KvBackend::kv_set(&mut db, "nextid", "6").unwrap();
        assert_eq!(KvBackend::kv_get(&db, "nextid").unwrap().as_deref(), Some("6"));
        KvBackend::rollback(&mut db);

        assert_eq!(db.kv_get("nextid").unwrap().as_deref(), Some("4"));
    }

    #[test]
    fn commit_publishes_all_writes() {
        let mut db = Database::open_memory().unwrap();
        KvBackend::begin(&mut db).unwrap();
        KvBackend::kv_set(&mut db, "a", "1").unwrap();
        KvBackend::kv_set(&mut db, "b", "2").unwrap();
        KvBackend::commit(&mut db).unwrap();

        assert_eq!(db.kv_get("a").unwrap().as_deref(), Some("1"));
        assert_eq!(db.kv_get("b").unwrap().as_deref(), Some("2"));
    }

    #[test]
    fn rollback_outside_transaction_is_harmless() {
        let mut db = Database::open_memory().unwrap();
        KvBackend::rollback(&mut db);
        db.kv_set("k", "v").unwrap();
        assert_eq!(db.kv_get("k").unwrap().as_deref(), Some("v"));
    }

    #[test]
    fn file_database_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("remindr.db");
        {
            let db = Database::open_at(&path).unwrap();
            db.kv_set("nextid", "8").unwrap();
        }
        let db = Database::open_at(&path).unwrap();
        assert_eq!(db.kv_get("nextid").unwrap().as_deref(), Some("8"));
    }
}
