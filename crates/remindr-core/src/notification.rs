//! Notification presentation requests.
//!
//! The core never observes whether a notification was shown. It hands a
//! [`NotificationRequest`] to a [`NotificationPresenter`] and moves on.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

use crate::alarm::DueAction;
use crate::reminder::{Reminder, ReminderId};
use crate::storage::NotificationsConfig;

/// Why a notification is being presented. Selects the due-time display
/// setting and whether it should alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresentReason {
    /// The reminder just became due.
    Due,
    /// Nagging repeat.
    Nag,
    /// Re-created at startup for an already notified reminder.
    Recreate,
}

/// What the notification opens when tapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "reminderId", rename_all = "snake_case")]
pub enum OpenAction {
    EditReminder(ReminderId),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRequest {
    /// Also the notification's own id; presenting again replaces it.
    pub reminder_id: ReminderId,
    pub text: String,
    pub due_at: DateTime<Utc>,
    pub reason: PresentReason,
    pub show_due_time: bool,
    pub silent: bool,
    pub sound: bool,
    pub priority: i8,
    /// Delivered back through the manager when the user dismisses it.
    pub on_dismissed: DueAction,
    pub on_opened: OpenAction,
}

impl NotificationRequest {
    pub fn for_reminder(
        reminder: &Reminder,
        reason: PresentReason,
        config: &NotificationsConfig,
    ) -> Self {
        let display = &config.display_original_due_time;
        let (show_due_time, silent) = match reason {
            PresentReason::Due => (display.normal, false),
            PresentReason::Nag => (display.nag, false),
            PresentReason::Recreate => (display.recreate, config.silent_recreate),
        };
        Self {
            reminder_id: reminder.id,
            text: reminder.text.clone(),
            due_at: reminder.due_at,
            reason,
            show_due_time,
            silent,
            sound: config.sound && !silent,
            priority: config.priority,
            on_dismissed: DueAction::MarkDone(reminder.id),
            on_opened: OpenAction::EditReminder(reminder.id),
        }
    }
}

pub trait NotificationPresenter: Send + Sync {
    fn present(&self, request: &NotificationRequest);

    /// Remove the notification for `reminder_id` if one is showing.
    fn withdraw(&self, reminder_id: ReminderId);
}

/// Presenter that keeps every request, for observers that render later and
/// for tests.
#[derive(Debug, Default)]
pub struct RecordingPresenter {
    presented: Mutex<Vec<NotificationRequest>>,
    withdrawn: Mutex<Vec<ReminderId>>,
}

impl RecordingPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn presented(&self) -> Vec<NotificationRequest> {
        self.presented
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn withdrawn(&self) -> Vec<ReminderId> {
        self.withdrawn
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn presented_for(&self, reminder_id: ReminderId) -> Vec<NotificationRequest> {
        self.presented()
            .into_iter()
            .filter(|r| r.reminder_id == reminder_id)
            .collect()
    }
}

impl NotificationPresenter for RecordingPresenter {
    fn present(&self, request: &NotificationRequest) {
        self.presented
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request.clone());
    }

    fn withdraw(&self, reminder_id: ReminderId) {
        self.withdrawn
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(reminder_id);
    }
}
