//! Due-callback registration.
//!
//! The core talks to the platform timer through [`AlarmScheduler`]. Each
//! registration carries a [`DueAction`] payload that is handed back to
//! [`crate::ReminderManager::on_due_callback`] when the timer fires, at or
//! after the requested time, possibly in a later process.
//!
//! [`AlarmQueue`] keeps registrations in memory for a single process.
//! [`StoredAlarmQueue`] keeps them in a [`KvBackend`] so several processes
//! sharing one database register on and drain the same queue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

use crate::error::{CoreError, DatabaseError};
use crate::reminder::ReminderId;
use crate::storage::KvBackend;

/// Key holding the persisted registrations of a [`StoredAlarmQueue`].
pub const ALARM_QUEUE_KEY: &str = "alarm_queue";

/// What to do with a reminder when a callback fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "action", content = "reminderId", rename_all = "snake_case")]
pub enum DueAction {
    /// The reminder is due: present it and mark it notified.
    Notify(ReminderId),
    /// Present a notified nagging reminder again.
    Nag(ReminderId),
    /// The notification was dismissed: mark the reminder done.
    MarkDone(ReminderId),
}

impl DueAction {
    pub fn reminder_id(self) -> ReminderId {
        match self {
            DueAction::Notify(id) | DueAction::Nag(id) | DueAction::MarkDone(id) => id,
        }
    }

    /// Notify and Nag share a registration, so a nag replaces a pending
    /// notify and one cancel clears both.
    pub fn identity(self) -> CallbackIdentity {
        match self {
            DueAction::Notify(id) | DueAction::Nag(id) => CallbackIdentity::Due(id),
            DueAction::MarkDone(id) => CallbackIdentity::Dismissed(id),
        }
    }

    pub fn to_payload(self) -> String {
        // Serializing a tag plus an integer cannot fail.
        serde_json::to_string(&self).unwrap_or_default()
    }

    pub fn from_payload(payload: &str) -> Result<Self, CoreError> {
        Ok(serde_json::from_str(payload)?)
    }
}

/// Registration key for the timer subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "reminderId", rename_all = "snake_case")]
pub enum CallbackIdentity {
    /// The timed callback of a reminder (notify or nag).
    Due(ReminderId),
    /// The dismissal callback attached to a presented notification.
    Dismissed(ReminderId),
}

impl CallbackIdentity {
    pub fn reminder_id(self) -> ReminderId {
        match self {
            CallbackIdentity::Due(id) | CallbackIdentity::Dismissed(id) => id,
        }
    }
}

/// Platform timer. Registering an identity that is already registered
/// replaces it. Cancelling an unknown identity is a no-op.
pub trait AlarmScheduler: Send + Sync {
    fn register(
        &self,
        identity: CallbackIdentity,
        fires_at: DateTime<Utc>,
        action: DueAction,
    ) -> Result<(), CoreError>;

    fn cancel(&self, identity: CallbackIdentity) -> Result<(), CoreError>;
}

/// A registered callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAlarm {
    pub identity: CallbackIdentity,
    pub fires_at: DateTime<Utc>,
    pub action: DueAction,
}

fn by_fire_time(a: &PendingAlarm, b: &PendingAlarm) -> std::cmp::Ordering {
    a.fires_at.cmp(&b.fires_at).then(a.identity.cmp(&b.identity))
}

fn replace_registration(
    pending: &mut Vec<PendingAlarm>,
    identity: CallbackIdentity,
    fires_at: DateTime<Utc>,
    action: DueAction,
) {
    pending.retain(|a| a.identity != identity);
    pending.push(PendingAlarm {
        identity,
        fires_at,
        action,
    });
}

fn take_due(pending: &mut Vec<PendingAlarm>, now: DateTime<Utc>) -> Vec<DueAction> {
    let (mut fired, keep): (Vec<_>, Vec<_>) = pending.drain(..).partition(|a| a.fires_at <= now);
    *pending = keep;
    fired.sort_by(by_fire_time);
    fired.into_iter().map(|a| a.action).collect()
}

/// In-process [`AlarmScheduler`]. The caller polls [`AlarmQueue::due`]
/// and feeds the returned actions to the manager.
#[derive(Debug, Default)]
pub struct AlarmQueue {
    pending: Mutex<Vec<PendingAlarm>>,
}

impl AlarmQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<PendingAlarm>> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Remove and return every action due at or before `now`, earliest first.
    pub fn due(&self, now: DateTime<Utc>) -> Vec<DueAction> {
        take_due(&mut self.lock(), now)
    }

    pub fn next_fire_time(&self) -> Option<DateTime<Utc>> {
        self.lock().iter().map(|a| a.fires_at).min()
    }

    pub fn get(&self, identity: CallbackIdentity) -> Option<PendingAlarm> {
        self.lock().iter().find(|a| a.identity == identity).cloned()
    }

    pub fn is_registered(&self, identity: CallbackIdentity) -> bool {
        self.get(identity).is_some()
    }

    /// Snapshot of all registrations, ordered by fire time.
    pub fn pending(&self) -> Vec<PendingAlarm> {
        let mut all = self.lock().clone();
        all.sort_by(by_fire_time);
        all
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl AlarmScheduler for AlarmQueue {
    fn register(
        &self,
        identity: CallbackIdentity,
        fires_at: DateTime<Utc>,
        action: DueAction,
    ) -> Result<(), CoreError> {
        replace_registration(&mut self.lock(), identity, fires_at, action);
        Ok(())
    }

    fn cancel(&self, identity: CallbackIdentity) -> Result<(), CoreError> {
        self.lock().retain(|a| a.identity != identity);
        Ok(())
    }
}

/// [`AlarmScheduler`] whose registrations live under [`ALARM_QUEUE_KEY`].
///
/// Every call reads the stored list, changes it and writes it back in one
/// backend transaction. With [`crate::Database`] that transaction is
/// `BEGIN IMMEDIATE`, so a long-running poller and short-lived commands on
/// other connections never overwrite each other's registrations.
pub struct StoredAlarmQueue {
    backend: Mutex<Box<dyn KvBackend>>,
}

impl std::fmt::Debug for StoredAlarmQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredAlarmQueue").finish_non_exhaustive()
    }
}

impl StoredAlarmQueue {
    pub fn new(backend: impl KvBackend + 'static) -> Self {
        Self {
            backend: Mutex::new(Box::new(backend)),
        }
    }

    fn transact<T, F>(&self, operation: F) -> Result<T, CoreError>
    where
        F: FnOnce(&mut Vec<PendingAlarm>) -> T,
    {
        let mut backend = self.backend.lock().map_err(|_| DatabaseError::Poisoned)?;
        backend.begin()?;

        let result = (|| -> Result<T, CoreError> {
            let before = read_pending(&**backend)?;
            let mut pending = before.clone();
            let value = operation(&mut pending);
            if pending != before {
                backend.kv_set(ALARM_QUEUE_KEY, &serde_json::to_string(&pending)?)?;
            }
            Ok(value)
        })();

        match result {
            Ok(value) => {
                if let Err(err) = backend.commit() {
                    backend.rollback();
                    return Err(err.into());
                }
                Ok(value)
            }
            Err(err) => {
                backend.rollback();
                Err(err)
            }
        }
    }

    /// Remove and return every action due at or before `now`, earliest first.
    pub fn due(&self, now: DateTime<Utc>) -> Result<Vec<DueAction>, CoreError> {
        self.transact(|pending| take_due(pending, now))
    }

    pub fn get(&self, identity: CallbackIdentity) -> Result<Option<PendingAlarm>, CoreError> {
        self.transact(|pending| pending.iter().find(|a| a.identity == identity).cloned())
    }

    /// Snapshot of all registrations, ordered by fire time.
    pub fn pending(&self) -> Result<Vec<PendingAlarm>, CoreError> {
        self.transact(|pending| {
            let mut all = pending.clone();
            all.sort_by(by_fire_time);
            all
        })
    }
}

fn read_pending(backend: &dyn KvBackend) -> Result<Vec<PendingAlarm>, CoreError> {
    let Some(json) = backend.kv_get(ALARM_QUEUE_KEY)? else {
        return Ok(Vec::new());
    };
    match serde_json::from_str(&json) {
        Ok(pending) => Ok(pending),
        Err(e) => {
            tracing::warn!(error = %e, "discarding unreadable alarm queue");
            Ok(Vec::new())
        }
    }
}

impl AlarmScheduler for StoredAlarmQueue {
    fn register(
        &self,
        identity: CallbackIdentity,
        fires_at: DateTime<Utc>,
        action: DueAction,
    ) -> Result<(), CoreError> {
        self.transact(|pending| replace_registration(pending, identity, fires_at, action))
    }

    fn cancel(&self, identity: CallbackIdentity) -> Result<(), CoreError> {
        self.transact(|pending| pending.retain(|a| a.identity != identity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 4, 12, 0, 0).unwrap()
    }

    #[test]
    fn payload_is_tagged() {
        let payload = DueAction::MarkDone(8).to_payload();
        assert_eq!(payload, r#"{"action":"mark_done","reminderId":8}"#);
        assert_eq!(DueAction::from_payload(&payload).unwrap(), DueAction::MarkDone(8));
    }

    #[test]
    fn malformed_payload_is_an_error() {
        assert!(DueAction::from_payload(r#"{"action":"explode","reminderId":1}"#).is_err());
    }

    #[test]
    fn nag_shares_identity_with_notify() {
        assert_eq!(DueAction::Notify(2).identity(), DueAction::Nag(2).identity());
        assert_ne!(DueAction::Notify(2).identity(), DueAction::MarkDone(2).identity());
    }

    #[test]
    fn register_replaces_same_identity() {
        let queue = AlarmQueue::new();
        queue
            .register(CallbackIdentity::Due(0), t0(), DueAction::Notify(0))
            .unwrap();
        queue
            .register(
                CallbackIdentity::Due(0),
                t0() + Duration::minutes(10),
                DueAction::Nag(0),
            )
            .unwrap();
        assert_eq!(queue.len(), 1);
        assert_eq!(
            queue.get(CallbackIdentity::Due(0)).unwrap().action,
            DueAction::Nag(0)
        );
    }

    #[test]
    fn due_pops_only_expired_in_order() {
        let queue = AlarmQueue::new();
        queue
            .register(CallbackIdentity::Due(4), t0() + Duration::minutes(2), DueAction::Notify(4))
            .unwrap();
        queue
            .register(CallbackIdentity::Due(2), t0() + Duration::minutes(1), DueAction::Notify(2))
            .unwrap();
        queue
            .register(CallbackIdentity::Due(6), t0() + Duration::hours(1), DueAction::Notify(6))
            .unwrap();

        assert!(queue.due(t0()).is_empty());
        let fired = queue.due(t0() + Duration::minutes(5));
        assert_eq!(fired, vec![DueAction::Notify(2), DueAction::Notify(4)]);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.next_fire_time(), Some(t0() + Duration::hours(1)));
    }

    #[test]
    fn cancel_is_idempotent() {
        let queue = AlarmQueue::new();
        queue.cancel(CallbackIdentity::Due(0)).unwrap();
        queue
            .register(CallbackIdentity::Due(0), t0(), DueAction::Notify(0))
            .unwrap();
        queue.cancel(CallbackIdentity::Due(0)).unwrap();
        queue.cancel(CallbackIdentity::Due(0)).unwrap();
        assert!(queue.is_empty());
    }

    #[test]
    fn stored_queue_is_shared_between_handles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("remindr.db");
        let poller = StoredAlarmQueue::new(crate::Database::open_at(&path).unwrap());
        let command = StoredAlarmQueue::new(crate::Database::open_at(&path).unwrap());

        poller
            .register(CallbackIdentity::Due(0), t0(), DueAction::Notify(0))
            .unwrap();
        command
            .register(CallbackIdentity::Due(2), t0() + Duration::hours(1), DueAction::Notify(2))
            .unwrap();
        command
            .register(
                CallbackIdentity::Due(0),
                t0() + Duration::hours(2),
                DueAction::Notify(0),
            )
            .unwrap();

        assert!(poller.due(t0() + Duration::minutes(1)).unwrap().is_empty());
        assert_eq!(
            poller.due(t0() + Duration::hours(1)).unwrap(),
            vec![DueAction::Notify(2)]
        );
        let left = command.pending().unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].fires_at, t0() + Duration::hours(2));
    }

    #[test]
    fn stored_queue_drops_unreadable_value() {
        let mut kv = crate::MemoryKv::new();
        kv.kv_set(ALARM_QUEUE_KEY, "{not a list").unwrap();
        let queue = StoredAlarmQueue::new(kv);
        assert!(queue.pending().unwrap().is_empty());
        queue.cancel(CallbackIdentity::Due(0)).unwrap();
        queue
            .register(CallbackIdentity::Dismissed(4), t0(), DueAction::MarkDone(4))
            .unwrap();
        assert_eq!(
            queue.get(CallbackIdentity::Dismissed(4)).unwrap().unwrap().action,
            DueAction::MarkDone(4)
        );
    }
}
