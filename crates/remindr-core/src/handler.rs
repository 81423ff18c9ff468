//! What happens when a due-callback fires.

use std::sync::Arc;

use crate::alarm::DueAction;
use crate::error::Result;
use crate::events::{Event, IgnoreReason};
use crate::notification::PresentReason;
use crate::reminder::{Reminder, ReminderId, ReminderStatus};
use crate::scheduler::Scheduler;
use crate::store::ReminderStore;

/// Result of a status transition attempted under the gate.
enum Transition {
    Applied(Reminder),
    Ignored(IgnoreReason),
}

/// Runs [`DueAction`]s against the store.
///
/// Every outcome is returned as an [`Event`] and also published on the
/// store's notifier. A callback for a reminder that is gone or no longer
/// in the expected state is ignored, never an error.
#[derive(Debug, Clone)]
pub struct DueReminderHandler {
    store: Arc<ReminderStore>,
    scheduler: Arc<Scheduler>,
}

impl DueReminderHandler {
    pub fn new(store: Arc<ReminderStore>, scheduler: Arc<Scheduler>) -> Self {
        Self { store, scheduler }
    }

    pub fn handle(&self, action: DueAction) -> Result<Event> {
        tracing::debug!(?action, "handling due callback");
        let event = match action {
            DueAction::Notify(id) => self.notify(id)?,
            DueAction::Nag(id) => self.nag(id)?,
            DueAction::MarkDone(id) => self.mark_done(id)?,
        };
        self.store.notifier().publish(event.clone());
        Ok(event)
    }

    fn notify(&self, id: ReminderId) -> Result<Event> {
        let now = self.scheduler.now();
        let transition = self.store.with_exclusive_access(|state| {
            let Some(reminder) = state.find_mut(id) else {
                return Ok(Transition::Ignored(IgnoreReason::Deleted));
            };
            if reminder.status == ReminderStatus::Done {
                return Ok(Transition::Ignored(IgnoreReason::AlreadyDone));
            }
            if reminder.status == ReminderStatus::Scheduled && reminder.is_future(now) {
                return Ok(Transition::Ignored(IgnoreReason::NotYetDue));
            }
            reminder.status = ReminderStatus::Notified;
            Ok(Transition::Applied(reminder.clone()))
        })?;
        let reminder = match transition {
            Transition::Applied(reminder) => reminder,
            Transition::Ignored(reason) => return Ok(self.ignored(id, reason)),
        };

        self.scheduler.present(&reminder, PresentReason::Due);
        let next_nag_at = self.scheduler.schedule_nag(&reminder)?;
        self.retract_if_settled(id)?;
        tracing::info!(id, "reminder notified");
        Ok(Event::ReminderNotified {
            id,
            next_nag_at,
            at: self.scheduler.now(),
        })
    }

    fn nag(&self, id: ReminderId) -> Result<Event> {
        let found = self
            .store
            .with_exclusive_access(|state| Ok(state.find(id).cloned()))?;
        let Some(reminder) = found else {
            return Ok(self.ignored(id, IgnoreReason::Deleted));
        };
        match reminder.status {
            ReminderStatus::Notified => {}
            ReminderStatus::Done => return Ok(self.ignored(id, IgnoreReason::AlreadyDone)),
            ReminderStatus::Scheduled => return Ok(self.ignored(id, IgnoreReason::NotNotified)),
        }
        if !reminder.is_nagging() {
            return Ok(self.ignored(id, IgnoreReason::NaggingDisabled));
        }

        self.scheduler.present(&reminder, PresentReason::Nag);
        let next_nag_at = self
            .scheduler
            .schedule_nag(&reminder)?
            .unwrap_or_else(|| self.scheduler.now());
        self.retract_if_settled(id)?;
        tracing::debug!(id, next_nag_at = %next_nag_at, "reminder nagged");
        Ok(Event::ReminderNagged {
            id,
            next_nag_at,
            at: self.scheduler.now(),
        })
    }

    fn mark_done(&self, id: ReminderId) -> Result<Event> {
        let transition = self.store.with_exclusive_access(|state| {
            let Some(reminder) = state.find_mut(id) else {
                return Ok(Transition::Ignored(IgnoreReason::Deleted));
            };
            if reminder.status == ReminderStatus::Done {
                return Ok(Transition::Ignored(IgnoreReason::AlreadyDone));
            }
            reminder.status = ReminderStatus::Done;
            Ok(Transition::Applied(reminder.clone()))
        })?;
        // Stray nags or a lingering notification go either way.
        self.scheduler.cancel(id)?;
        match transition {
            Transition::Applied(_) => {
                tracing::info!(id, "reminder marked done");
                Ok(Event::ReminderDone {
                    id,
                    at: self.scheduler.now(),
                })
            }
            Transition::Ignored(reason) => Ok(self.ignored(id, reason)),
        }
    }

    /// A dismissal or delete may have committed while the notification
    /// was being shown. The reminder must not keep a notification or nag.
    fn retract_if_settled(&self, id: ReminderId) -> Result<()> {
        let status = self
            .store
            .with_exclusive_access(|state| Ok(state.find(id).map(|r| r.status)))?;
        if status != Some(ReminderStatus::Notified) {
            tracing::debug!(id, ?status, "reminder settled while presenting");
            self.scheduler.cancel(id)?;
        }
        Ok(())
    }

    fn ignored(&self, id: ReminderId, reason: IgnoreReason) -> Event {
        match reason {
            IgnoreReason::Deleted => {
                tracing::warn!(id, "due callback for a reminder that no longer exists")
            }
            _ => tracing::debug!(id, ?reason, "due callback ignored"),
        }
        Event::CallbackIgnored {
            id,
            reason,
            at: self.scheduler.now(),
        }
    }
}
