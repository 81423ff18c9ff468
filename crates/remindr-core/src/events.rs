use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::reminder::ReminderId;

/// Every observable state change produces an Event.
/// Observers subscribe to `RemindersChanged`; the due-callback handler
/// reports what it did with the other variants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// The stored reminder collection changed.
    RemindersChanged { at: DateTime<Utc> },
    /// A due reminder was presented and is now notified.
    ReminderNotified {
        id: ReminderId,
        next_nag_at: Option<DateTime<Utc>>,
        at: DateTime<Utc>,
    },
    /// A notified nagging reminder was presented again.
    ReminderNagged {
        id: ReminderId,
        next_nag_at: DateTime<Utc>,
        at: DateTime<Utc>,
    },
    /// The reminder was marked done from its notification.
    ReminderDone { id: ReminderId, at: DateTime<Utc> },
    /// A callback arrived for a reminder it no longer applies to.
    CallbackIgnored {
        id: ReminderId,
        reason: IgnoreReason,
        at: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IgnoreReason {
    /// The reminder was deleted after the callback was registered.
    Deleted,
    /// The reminder is already done.
    AlreadyDone,
    /// A nag arrived for a reminder that is not notified.
    NotNotified,
    /// A nag arrived after nagging was turned off for the reminder.
    NaggingDisabled,
    /// A notify arrived for a scheduled reminder whose due time was moved
    /// later.
    NotYetDue,
}

impl Event {
    /// The reminder an event is about, if any.
    pub fn reminder_id(&self) -> Option<ReminderId> {
        match self {
            Event::RemindersChanged { .. } => None,
            Event::ReminderNotified { id, .. }
            | Event::ReminderNagged { id, .. }
            | Event::ReminderDone { id, .. }
            | Event::CallbackIgnored { id, .. } => Some(*id),
        }
    }
}
