//! Due-callback (re)registration.
//!
//! The scheduler owns no state of its own. It turns a reminder into
//! registrations on the [`AlarmScheduler`] and requests on the
//! [`NotificationPresenter`], using the injected [`Clock`] for "now".

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::Arc;

use crate::alarm::{AlarmScheduler, CallbackIdentity, DueAction};
use crate::clock::Clock;
use crate::error::Result;
use crate::notification::{NotificationPresenter, NotificationRequest, PresentReason};
use crate::reminder::{Reminder, ReminderId, ReminderStatus};
use crate::storage::NotificationsConfig;

/// Result of asking the scheduler to arrange a reminder's due-callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ScheduleOutcome {
    /// A Notify callback is registered for `fires_at`.
    Registered { fires_at: DateTime<Utc> },
    /// The due time has passed. The caller delivers it now.
    AlreadyDue,
    /// The reminder is not `Scheduled`; nothing was registered.
    Skipped,
}

pub struct Scheduler {
    alarms: Arc<dyn AlarmScheduler>,
    presenter: Arc<dyn NotificationPresenter>,
    clock: Arc<dyn Clock>,
    notifications: NotificationsConfig,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("notifications", &self.notifications)
            .finish_non_exhaustive()
    }
}

impl Scheduler {
    pub fn new(
        alarms: Arc<dyn AlarmScheduler>,
        presenter: Arc<dyn NotificationPresenter>,
        clock: Arc<dyn Clock>,
        notifications: NotificationsConfig,
    ) -> Self {
        Self {
            alarms,
            presenter,
            clock,
            notifications,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Register the Notify callback if the reminder is due in the future.
    pub fn schedule(&self, reminder: &Reminder) -> Result<ScheduleOutcome> {
        let now = self.now();
        if !reminder.is_future(now) {
            return Ok(ScheduleOutcome::AlreadyDue);
        }
        let action = DueAction::Notify(reminder.id);
        self.alarms
            .register(action.identity(), reminder.due_at, action)?;
        tracing::debug!(id = reminder.id, fires_at = %reminder.due_at, "due callback registered");
        Ok(ScheduleOutcome::Registered {
            fires_at: reminder.due_at,
        })
    }

    /// Unregister every callback of `id` and withdraw its notification.
    /// Safe to call any number of times.
    pub fn cancel(&self, id: ReminderId) -> Result<()> {
        self.alarms.cancel(CallbackIdentity::Due(id))?;
        self.alarms.cancel(CallbackIdentity::Dismissed(id))?;
        self.presenter.withdraw(id);
        Ok(())
    }

    /// Cancel, then register again only for a `Scheduled` reminder.
    ///
    /// A `Scheduled` reminder whose time has passed is reported as
    /// [`ScheduleOutcome::AlreadyDue`] without a registration.
    pub fn reschedule(&self, reminder: &Reminder) -> Result<ScheduleOutcome> {
        self.cancel(reminder.id)?;
        if reminder.status != ReminderStatus::Scheduled {
            return Ok(ScheduleOutcome::Skipped);
        }
        self.schedule(reminder)
    }

    /// Register the next Nag callback. Returns `None` for reminders that
    /// do not nag.
    pub fn schedule_nag(&self, reminder: &Reminder) -> Result<Option<DateTime<Utc>>> {
        let Some(next) = next_nag_time(reminder, self.now()) else {
            return Ok(None);
        };
        let action = DueAction::Nag(reminder.id);
        self.alarms.register(action.identity(), next, action)?;
        tracing::debug!(id = reminder.id, next_nag_at = %next, "nag callback registered");
        Ok(Some(next))
    }

    /// Hand a notification for `reminder` to the presenter.
    /// Does nothing when notifications are disabled.
    pub fn present(&self, reminder: &Reminder, reason: PresentReason) {
        if !self.notifications.enabled {
            tracing::debug!(id = reminder.id, "notifications disabled, not presenting");
            return;
        }
        let request = NotificationRequest::for_reminder(reminder, reason, &self.notifications);
        self.presenter.present(&request);
    }
}

/// Next nag time, aligned to whole intervals after the due time so a late
/// delivery does not replay the nags it missed.
pub fn next_nag_time(reminder: &Reminder, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let interval = reminder.nagging_interval()?.num_milliseconds();
    let since_due = (now - reminder.due_at).num_milliseconds();
    let since_last_nag = since_due.rem_euclid(interval);
    Some(now + Duration::milliseconds(interval - since_last_nag))
}
