//! Serialized read-modify-write over the persisted reminder state.

use std::sync::{Arc, Mutex};

use super::notifier::ChangeNotifier;
use crate::clock::Clock;
use crate::error::{CoreError, DatabaseError, Result};
use crate::reminder::{self, Reminder, ReminderId, ID_STRIDE};
use crate::storage::KvBackend;

pub(crate) const KEY_REMINDERS: &str = "reminders";
pub(crate) const KEY_NEXT_ID: &str = "nextid";
pub(crate) const KEY_UPDATED: &str = "remindersUpdated";
pub(crate) const KEY_FORMAT_VERSION: &str = "remindersFormatVersion";

/// Version of the persisted reminder list layout.
pub const FORMAT_VERSION: u32 = 1;

/// Everything persisted about the reminder collection, as seen by one
/// exclusive operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreState {
    pub reminders: Vec<Reminder>,
    pub next_id: ReminderId,
    /// Sticky "reminders changed" flag for observers that were not running.
    pub dirty: bool,
}

impl StoreState {
    pub fn find(&self, id: ReminderId) -> Option<&Reminder> {
        self.reminders.iter().find(|r| r.id == id)
    }

    pub fn find_mut(&mut self, id: ReminderId) -> Option<&mut Reminder> {
        self.reminders.iter_mut().find(|r| r.id == id)
    }

    pub fn contains(&self, id: ReminderId) -> bool {
        self.find(id).is_some()
    }

    /// Take the next id and advance the counter.
    pub fn allocate_id(&mut self) -> Result<ReminderId> {
        let id = self.next_id;
        self.next_id = id
            .checked_add(ID_STRIDE)
            .ok_or_else(|| DatabaseError::CorruptValue {
                key: KEY_NEXT_ID.into(),
                message: "id counter exhausted".into(),
            })?;
        Ok(id)
    }

    /// Move the counter past `id` if needed. The counter never decreases
    /// and always lands on a multiple of [`ID_STRIDE`].
    pub fn reserve_id(&mut self, id: ReminderId) {
        let after = align_id(id.saturating_add(1));
        if after > self.next_id {
            self.next_id = after;
        }
    }
}

/// Single lock guarding the persisted state.
///
/// Every read and write goes through [`ExclusiveAccessGate::with_exclusive_access`]:
/// the operation runs on a copy of the current state inside a backend
/// transaction; if it returns `Ok` and changed the collection, the new
/// collection, counter and dirty flag are written and committed together,
/// then one `RemindersChanged` event is published. On `Err` nothing is
/// written.
pub struct ExclusiveAccessGate {
    backend: Mutex<Box<dyn KvBackend>>,
    notifier: ChangeNotifier,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for ExclusiveAccessGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExclusiveAccessGate")
            .field("subscribers", &self.notifier.subscriber_count())
            .finish_non_exhaustive()
    }
}

impl ExclusiveAccessGate {
    /// Wrap `backend`, stamping the format version on first use.
    ///
    /// # Errors
    /// Fails if the backend cannot be read or holds a newer format.
    pub fn new(
        backend: Box<dyn KvBackend>,
        notifier: ChangeNotifier,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let gate = Self {
            backend: Mutex::new(backend),
            notifier,
            clock,
        };
        gate.ensure_format_version()?;
        Ok(gate)
    }

    pub fn with_exclusive_access<T, F>(&self, operation: F) -> Result<T>
    where
        F: FnOnce(&mut StoreState) -> Result<T>,
    {
        let mut backend = self.backend.lock().map_err(|_| DatabaseError::Poisoned)?;
        backend.begin()?;

        let (value, changed) = match run_in_transaction(backend.as_mut(), operation) {
            Ok(outcome) => outcome,
            Err(err) => {
                backend.rollback();
                tracing::debug!(error = %err, "reminder operation rolled back");
                return Err(err);
            }
        };

        if let Err(err) = backend.commit() {
            backend.rollback();
            tracing::error!(error = %err, "failed to commit reminder state");
            return Err(err.into());
        }

        if changed {
            self.notifier.reminders_changed(self.clock.now());
        }
        Ok(value)
    }

    /// Stored format version. Written on first open.
    pub fn format_version(&self) -> Result<u32> {
        let backend = self.backend.lock().map_err(|_| DatabaseError::Poisoned)?;
        let raw = backend.kv_get(KEY_FORMAT_VERSION)?;
        match raw {
            Some(raw) => parse_value(KEY_FORMAT_VERSION, &raw),
            None => Ok(FORMAT_VERSION),
        }
    }

    fn ensure_format_version(&self) -> Result<()> {
        let mut backend = self.backend.lock().map_err(|_| DatabaseError::Poisoned)?;
        backend.begin()?;
        let result = (|| -> Result<()> {
            match backend.kv_get(KEY_FORMAT_VERSION)? {
                None => {
                    backend.kv_set(KEY_FORMAT_VERSION, &FORMAT_VERSION.to_string())?;
                    tracing::info!(version = FORMAT_VERSION, "initialized reminder store");
                }
                Some(raw) => {
                    let version: u32 = parse_value(KEY_FORMAT_VERSION, &raw)?;
                    if version > FORMAT_VERSION {
                        return Err(DatabaseError::CorruptValue {
                            key: KEY_FORMAT_VERSION.into(),
                            message: format!(
                                "format version {version} is newer than supported version {FORMAT_VERSION}"
                            ),
                        }
                        .into());
                    }
                }
            }
            Ok(())
        })();
        match result {
            Ok(()) => {
                backend.commit()?;
                Ok(())
            }
            Err(err) => {
                backend.rollback();
                Err(err)
            }
        }
    }
}

fn run_in_transaction<T, F>(backend: &mut dyn KvBackend, operation: F) -> Result<(T, bool)>
where
    F: FnOnce(&mut StoreState) -> Result<T>,
{
    let before = load_state(backend)?;
    let mut working = before.clone();
    let value = operation(&mut working)?;
    let changed = persist_state(backend, &before, &working)?;
    Ok((value, changed))
}

fn load_state(backend: &dyn KvBackend) -> Result<StoreState> {
    let reminders = match backend.kv_get(KEY_REMINDERS)? {
        Some(json) => reminder::from_json(&json).map_err(|e| DatabaseError::CorruptValue {
            key: KEY_REMINDERS.into(),
            message: e.to_string(),
        })?,
        None => Vec::new(),
    };
    let next_id = match backend.kv_get(KEY_NEXT_ID)? {
        Some(raw) => parse_value(KEY_NEXT_ID, &raw)?,
        None => 0,
    };
    let dirty = match backend.kv_get(KEY_UPDATED)? {
        Some(raw) => parse_value(KEY_UPDATED, &raw)?,
        None => false,
    };

    let mut state = StoreState {
        reminders,
        next_id: align_id(next_id),
        dirty,
    };
    if state.next_id != next_id {
        tracing::warn!(next_id, aligned = state.next_id, "id counter not a multiple of the id stride");
    }
    // A counter behind the stored ids would hand out a live id again.
    if let Some(max) = state.reminders.iter().map(|r| r.id).max() {
        if max >= state.next_id {
            tracing::warn!(next_id = state.next_id, max_id = max, "id counter behind stored ids");
            state.reserve_id(max);
        }
    }
    Ok(state)
}

/// Round `id` up to the next valid reminder id.
fn align_id(id: ReminderId) -> ReminderId {
    id.checked_next_multiple_of(ID_STRIDE)
        .unwrap_or(ReminderId::MAX - ReminderId::MAX % ID_STRIDE)
}

/// Returns whether the reminder collection changed.
fn persist_state(backend: &mut dyn KvBackend, before: &StoreState, after: &StoreState) -> Result<bool> {
    let contents_changed = before.reminders != after.reminders || before.next_id != after.next_id;
    if contents_changed {
        let json = reminder::to_json(&after.reminders).map_err(CoreError::from)?;
        backend.kv_set(KEY_REMINDERS, &json)?;
        backend.kv_set(KEY_NEXT_ID, &after.next_id.to_string())?;
        backend.kv_set(KEY_UPDATED, "true")?;
        return Ok(true);
    }
    if before.dirty != after.dirty {
        backend.kv_set(KEY_UPDATED, if after.dirty { "true" } else { "false" })?;
    }
    Ok(false)
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| {
        DatabaseError::CorruptValue {
            key: key.into(),
            message: format!("'{raw}': {e}"),
        }
        .into()
    })
}
