//! Durable reminder collection.
//!
//! [`ReminderStore`] is the single source of truth for reminders. It owns
//! the [`ExclusiveAccessGate`] that serializes every read-modify-write and
//! the [`ChangeNotifier`] that observers subscribe to. Share it through an
//! `Arc`.

mod gate;
mod notifier;

pub use gate::{ExclusiveAccessGate, StoreState, FORMAT_VERSION};
pub use notifier::ChangeNotifier;

use std::sync::Arc;
use tokio::sync::broadcast;

use crate::clock::{Clock, SystemClock};
use crate::error::{CoreError, Result};
use crate::events::Event;
use crate::reminder::{NewReminder, Reminder, ReminderId};
use crate::storage::{Database, KvBackend, MemoryKv};

#[derive(Debug)]
pub struct ReminderStore {
    gate: ExclusiveAccessGate,
    notifier: ChangeNotifier,
}

impl ReminderStore {
    pub fn new(backend: impl KvBackend + 'static) -> Result<Self> {
        Self::with_clock(backend, Arc::new(SystemClock))
    }

    /// Like [`ReminderStore::new`], stamping change events with `clock`.
    pub fn with_clock(backend: impl KvBackend + 'static, clock: Arc<dyn Clock>) -> Result<Self> {
        let notifier = ChangeNotifier::new();
        let gate = ExclusiveAccessGate::new(Box::new(backend), notifier.clone(), clock)?;
        Ok(Self { gate, notifier })
    }

    /// Open the store in the default data directory.
    pub fn open() -> Result<Self> {
        Self::new(Database::open()?)
    }

    /// A store that lives only as long as the process.
    pub fn in_memory() -> Result<Self> {
        Self::new(MemoryKv::new())
    }

    /// Run `operation` under the gate. See [`ExclusiveAccessGate`].
    pub fn with_exclusive_access<T, F>(&self, operation: F) -> Result<T>
    where
        F: FnOnce(&mut StoreState) -> Result<T>,
    {
        self.gate.with_exclusive_access(operation)
    }

    pub fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.notifier.subscribe()
    }

    pub fn format_version(&self) -> Result<u32> {
        self.gate.format_version()
    }

    /// Assign the next id and store the reminder as `Scheduled`.
    pub fn add(&self, new: NewReminder) -> Result<Reminder> {
        let reminder = self.with_exclusive_access(|state| {
            let id = state.allocate_id()?;
            let reminder = new.into_reminder(id);
            state.reminders.push(reminder.clone());
            Ok(reminder)
        })?;
        tracing::debug!(id = reminder.id, due_at = %reminder.due_at, "reminder added");
        Ok(reminder)
    }

    /// Store a reminder that already has an id.
    ///
    /// # Errors
    /// [`CoreError::AlreadyExists`] if the id is taken.
    pub fn insert(&self, reminder: Reminder) -> Result<Reminder> {
        reminder.validate()?;
        self.with_exclusive_access(|state| {
            if state.contains(reminder.id) {
                return Err(CoreError::AlreadyExists(reminder.id));
            }
            state.reserve_id(reminder.id);
            state.reminders.push(reminder.clone());
            Ok(reminder)
        })
    }

    pub fn get(&self, id: ReminderId) -> Result<Reminder> {
        self.with_exclusive_access(|state| state.find(id).cloned().ok_or(CoreError::NotFound(id)))
    }

    /// Snapshot of all reminders in storage order.
    pub fn list(&self) -> Result<Vec<Reminder>> {
        self.with_exclusive_access(|state| Ok(state.reminders.clone()))
    }

    /// Replace the stored reminder with the same id.
    pub fn update(&self, reminder: Reminder) -> Result<Reminder> {
        reminder.validate()?;
        self.with_exclusive_access(|state| {
            let slot = state
                .find_mut(reminder.id)
                .ok_or(CoreError::NotFound(reminder.id))?;
            *slot = reminder.clone();
            Ok(reminder)
        })
    }

    /// Replace several reminders. All or none are written.
    pub fn update_many(&self, reminders: Vec<Reminder>) -> Result<Vec<Reminder>> {
        for reminder in &reminders {
            reminder.validate()?;
        }
        self.with_exclusive_access(|state| {
            for reminder in &reminders {
                let slot = state
                    .find_mut(reminder.id)
                    .ok_or(CoreError::NotFound(reminder.id))?;
                *slot = reminder.clone();
            }
            Ok(reminders)
        })
    }

    /// Apply `transform` to each listed reminder under one lock and return
    /// the results. All or none are written.
    pub fn update_where<F>(&self, ids: &[ReminderId], mut transform: F) -> Result<Vec<Reminder>>
    where
        F: FnMut(&mut Reminder),
    {
        self.with_exclusive_access(|state| {
            let mut updated = Vec::with_capacity(ids.len());
            for &id in ids {
                let slot = state.find_mut(id).ok_or(CoreError::NotFound(id))?;
                transform(slot);
                slot.id = id;
                slot.validate()?;
                updated.push(slot.clone());
            }
            Ok(updated)
        })
    }

    /// Remove the listed reminders and return the ones that were present.
    /// Unknown ids are ignored.
    pub fn remove(&self, ids: &[ReminderId]) -> Result<Vec<Reminder>> {
        let removed = self.with_exclusive_access(|state| {
            let (removed, kept): (Vec<Reminder>, Vec<Reminder>) = std::mem::take(&mut state.reminders)
                .into_iter()
                .partition(|r| ids.contains(&r.id));
            state.reminders = kept;
            Ok(removed)
        })?;
        if !removed.is_empty() {
            tracing::debug!(count = removed.len(), "reminders removed");
        }
        Ok(removed)
    }

    /// Whether the collection changed since the last [`ReminderStore::clear_dirty`].
    pub fn is_dirty(&self) -> Result<bool> {
        self.with_exclusive_access(|state| Ok(state.dirty))
    }

    pub fn clear_dirty(&self) -> Result<()> {
        self.with_exclusive_access(|state| {
            state.dirty = false;
            Ok(())
        })
    }
}
