//! Public entry point for reminder operations.
//!
//! [`ReminderManager`] combines the store, the scheduler and the
//! due-callback handler. Every mutation is persisted through the store's
//! gate first; callbacks are (re)arranged after the write succeeded. If
//! arranging a callback fails the error is returned and the persisted
//! change stands; [`ReminderManager::schedule_all_reminders`] repairs the
//! registrations on the next start.

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::alarm::{AlarmScheduler, DueAction};
use crate::clock::Clock;
use crate::error::Result;
use crate::events::Event;
use crate::handler::DueReminderHandler;
use crate::notification::{NotificationPresenter, PresentReason};
use crate::reminder::{NewReminder, Reminder, ReminderId, ReminderStatus};
use crate::scheduler::{ScheduleOutcome, Scheduler};
use crate::storage::Config;
use crate::store::ReminderStore;

/// Counts from [`ReminderManager::schedule_all_reminders`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScheduleSummary {
    /// Future reminders with a registered due-callback.
    pub registered: usize,
    /// Overdue reminders delivered during the call.
    pub delivered: usize,
    /// Notified reminders whose notification was shown again.
    pub reshown: usize,
    /// Reminders whose callbacks could not be arranged.
    pub failed: usize,
}

#[derive(Debug, Clone)]
pub struct ReminderManager {
    store: Arc<ReminderStore>,
    scheduler: Arc<Scheduler>,
    handler: DueReminderHandler,
}

impl ReminderManager {
    pub fn new(
        store: Arc<ReminderStore>,
        alarms: Arc<dyn AlarmScheduler>,
        presenter: Arc<dyn NotificationPresenter>,
        clock: Arc<dyn Clock>,
        config: &Config,
    ) -> Self {
        let scheduler = Arc::new(Scheduler::new(
            alarms,
            presenter,
            clock,
            config.notifications.clone(),
        ));
        let handler = DueReminderHandler::new(Arc::clone(&store), Arc::clone(&scheduler));
        Self {
            store,
            scheduler,
            handler,
        }
    }

    pub fn store(&self) -> &Arc<ReminderStore> {
        &self.store
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.store.subscribe()
    }

    /// Store a new reminder and arrange its due-callback. A reminder that
    /// is already due is delivered before this returns.
    pub fn add_reminder(&self, new: NewReminder) -> Result<Reminder> {
        let reminder = self.store.add(new)?;
        tracing::info!(id = reminder.id, due_at = %reminder.due_at, "reminder added");
        let outcome = self.scheduler.schedule(&reminder)?;
        self.settle(&reminder, outcome)
    }

    /// Put back a reminder with its original id, e.g. to undo a delete.
    pub fn restore_reminder(&self, reminder: Reminder) -> Result<Reminder> {
        let reminder = self.store.insert(reminder)?;
        tracing::info!(id = reminder.id, "reminder restored");
        self.arrange(&reminder)
    }

    /// Persist `reminder`. With `reschedule`, its callbacks are cancelled
    /// and registered again to match the new state.
    pub fn update_reminder(&self, reminder: Reminder, reschedule: bool) -> Result<Reminder> {
        let reminder = self.store.update(reminder)?;
        if reschedule {
            return self.arrange(&reminder);
        }
        Ok(reminder)
    }

    pub fn update_reminders(
        &self,
        reminders: Vec<Reminder>,
        reschedule: bool,
    ) -> Result<Vec<Reminder>> {
        let updated = self.store.update_many(reminders)?;
        if reschedule {
            return self.arrange_all(updated);
        }
        Ok(updated)
    }

    /// Apply `transform` to the listed reminders under one lock.
    pub fn update_reminders_where<F>(
        &self,
        ids: &[ReminderId],
        transform: F,
        reschedule: bool,
    ) -> Result<Vec<Reminder>>
    where
        F: FnMut(&mut Reminder),
    {
        let updated = self.store.update_where(ids, transform)?;
        if reschedule {
            return self.arrange_all(updated);
        }
        Ok(updated)
    }

    /// Delete reminders and cancel their callbacks and notifications.
    /// Unknown ids are ignored.
    pub fn remove_reminders(&self, ids: &[ReminderId]) -> Result<Vec<Reminder>> {
        let removed = self.store.remove(ids)?;
        for &id in ids {
            self.scheduler.cancel(id)?;
        }
        tracing::info!(count = removed.len(), "reminders removed");
        Ok(removed)
    }

    pub fn get_reminder(&self, id: ReminderId) -> Result<Reminder> {
        self.store.get(id)
    }

    /// All reminders ordered by due time.
    pub fn list_reminders(&self) -> Result<Vec<Reminder>> {
        let mut reminders = self.store.list()?;
        reminders.sort_by(|a, b| a.cmp_due(b));
        Ok(reminders)
    }

    /// Re-arrange every callback, e.g. after a restart or reboot.
    ///
    /// Overdue scheduled reminders are delivered now and future ones are
    /// registered. Notified reminders get their notification re-created
    /// and their nagging re-armed. Failures are logged and counted; the
    /// remaining reminders are still processed.
    pub fn schedule_all_reminders(&self) -> Result<ScheduleSummary> {
        let reminders = self.store.list()?;
        let mut summary = ScheduleSummary::default();
        for reminder in &reminders {
            match self.schedule_on_start(reminder, &mut summary) {
                Ok(()) => {}
                Err(err) => {
                    summary.failed += 1;
                    tracing::warn!(id = reminder.id, error = %err, "failed to schedule reminder");
                }
            }
        }
        tracing::info!(
            registered = summary.registered,
            delivered = summary.delivered,
            reshown = summary.reshown,
            failed = summary.failed,
            "scheduled all reminders"
        );
        Ok(summary)
    }

    fn schedule_on_start(&self, reminder: &Reminder, summary: &mut ScheduleSummary) -> Result<()> {
        match reminder.status {
            ReminderStatus::Scheduled => match self.scheduler.schedule(reminder)? {
                ScheduleOutcome::Registered { .. } => summary.registered += 1,
                ScheduleOutcome::AlreadyDue => {
                    self.handler.handle(DueAction::Notify(reminder.id))?;
                    summary.delivered += 1;
                }
                ScheduleOutcome::Skipped => {}
            },
            ReminderStatus::Notified => {
                self.scheduler.present(reminder, PresentReason::Recreate);
                self.scheduler.schedule_nag(reminder)?;
                summary.reshown += 1;
            }
            ReminderStatus::Done => {}
        }
        Ok(())
    }

    /// Entry point for the timer subsystem.
    pub fn on_due_callback(&self, action: DueAction) -> Result<Event> {
        self.handler.handle(action)
    }

    /// Like [`ReminderManager::on_due_callback`] with a serialized action.
    pub fn on_due_payload(&self, payload: &str) -> Result<Event> {
        let action = DueAction::from_payload(payload)?;
        self.on_due_callback(action)
    }

    /// Cancel and re-register `reminder`, delivering it now if it is
    /// scheduled and overdue. Returns the reminder as stored afterwards.
    fn arrange(&self, reminder: &Reminder) -> Result<Reminder> {
        let outcome = self.scheduler.reschedule(reminder)?;
        self.settle(reminder, outcome)
    }

    /// Arrange every reminder of a committed batch. Failures are logged and
    /// the first one is returned once all reminders were attempted.
    fn arrange_all(&self, reminders: Vec<Reminder>) -> Result<Vec<Reminder>> {
        let mut arranged = Vec::with_capacity(reminders.len());
        let mut first_err = None;
        for reminder in &reminders {
            match self.arrange(reminder) {
                Ok(reminder) => arranged.push(reminder),
                Err(err) => {
                    tracing::warn!(id = reminder.id, error = %err, "failed to arrange reminder");
                    first_err.get_or_insert(err);
                }
            }
        }
        match first_err {
            Some(err) => Err(err),
            None => Ok(arranged),
        }
    }

    fn settle(&self, reminder: &Reminder, outcome: ScheduleOutcome) -> Result<Reminder> {
        match outcome {
            ScheduleOutcome::AlreadyDue => {
                self.handler.handle(DueAction::Notify(reminder.id))?;
                self.store.get(reminder.id)
            }
            ScheduleOutcome::Registered { .. } | ScheduleOutcome::Skipped => Ok(reminder.clone()),
        }
    }
}
