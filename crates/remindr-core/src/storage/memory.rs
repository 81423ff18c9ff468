//! Volatile key-value backend.

use std::collections::HashMap;

use super::KvBackend;
use crate::error::DatabaseError;

/// In-memory [`KvBackend`]. Transactions stage writes in an overlay that is
/// merged on commit.
#[derive(Debug, Default, Clone)]
pub struct MemoryKv {
    committed: HashMap<String, String>,
    staged: Option<HashMap<String, String>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Committed value for `key`, ignoring any open transaction.
    pub fn committed(&self, key: &str) -> Option<&str> {
        self.committed.get(key).map(String::as_str)
    }
}

impl KvBackend for MemoryKv {
    fn kv_get(&self, key: &str) -> Result<Option<String>, DatabaseError> {
        let staged = self.staged.as_ref().and_then(|s| s.get(key));
        Ok(staged.or_else(|| self.committed.get(key)).cloned())
    }

    fn kv_set(&mut self, key: &str, value: &str) -> Result<(), DatabaseError> {
        match self.staged.as_mut() {
            Some(staged) => {
                staged.insert(key.to_string(), value.to_string());
            }
            None => {
                self.committed.insert(key.to_string(), value.to_string());
            }
        }
        Ok(())
    }

    fn begin(&mut self) -> Result<(), DatabaseError> {
        if self.staged.is_some() {
            return Err(DatabaseError::QueryFailed(
                "cannot start a transaction within a transaction".into(),
            ));
        }
        self.staged = Some(HashMap::new());
        Ok(())
    }

    fn commit(&mut self) -> Result<(), DatabaseError> {
        let staged = self
            .staged
            .take()
            .ok_or_else(|| DatabaseError::QueryFailed("no transaction is active".into()))?;
        self.committed.extend(staged);
        Ok(())
    }

    fn rollback(&mut self) {
        self.staged = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staged_writes_are_visible_inside_transaction_only() {
        let mut kv = MemoryKv::new();
        kv.begin().unwrap();
        kv.kv_set("reminders", "[]").unwrap();
        assert_eq!(kv.kv_get("reminders").unwrap().as_deref(), Some("[]"));
        assert_eq!(kv.committed("reminders"), None);
        kv.commit().unwrap();
        assert_eq!(kv.committed("reminders"), Some("[]"));
    }

    #[test]
    fn rollback_drops_staged_writes() {
        let mut kv = MemoryKv::new();
        kv.kv_set("nextid", "2").unwrap();
        kv.begin().unwrap();
        kv.kv_set("nextid", "4").unwrap();
        kv.rollback();
        assert_eq!(kv.kv_get("nextid").unwrap().as_deref(), Some("2"));
    }

    #[test]
    fn nested_begin_is_rejected() {
        let mut kv = MemoryKv::new();
        kv.begin().unwrap();
        assert!(kv.begin().is_err());
    }
}
