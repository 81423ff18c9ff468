//! Reminder data model.
//!
//! A [`Reminder`] is persisted as a JSON record
//! `{id, dueAt, text, naggingRepeatInterval?, status}` where `dueAt` is
//! stored as epoch milliseconds.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::cmp::Ordering;

use crate::error::ValidationError;

/// Identifier assigned by the store. Always even.
pub type ReminderId = u64;

/// Distance between two consecutively assigned ids.
pub const ID_STRIDE: ReminderId = 2;

/// Status of a stored reminder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReminderStatus {
    /// Waiting for its due time.
    #[default]
    Scheduled,
    /// Due; the notification has been presented.
    Notified,
    /// Marked done by the user.
    Done,
}

impl ReminderStatus {
    /// Map a persisted status name. Values outside the closed set (such as
    /// the retired `CANCELLED`) load as [`ReminderStatus::Done`].
    pub fn from_persisted(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "SCHEDULED" => ReminderStatus::Scheduled,
            "NOTIFIED" => ReminderStatus::Notified,
            "DONE" => ReminderStatus::Done,
            other => {
                tracing::warn!(status = other, "unknown persisted reminder status, treating as done");
                ReminderStatus::Done
            }
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ReminderStatus::Scheduled => "scheduled",
            ReminderStatus::Notified => "notified",
            ReminderStatus::Done => "done",
        }
    }
}

impl<'de> Deserialize<'de> for ReminderStatus {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(ReminderStatus::from_persisted(&raw))
    }
}

impl std::fmt::Display for ReminderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored reminder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reminder {
    pub id: ReminderId,
    #[serde(with = "chrono::serde::ts_milliseconds", alias = "date")]
    pub due_at: DateTime<Utc>,
    pub text: String,
    /// Repeat interval in minutes while notified. `None` disables nagging.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_nagging_interval"
    )]
    pub nagging_repeat_interval: Option<u32>,
    #[serde(default)]
    pub status: ReminderStatus,
}

impl Reminder {
    pub fn is_nagging(&self) -> bool {
        self.nagging_repeat_interval.is_some_and(|m| m > 0)
    }

    /// Nagging interval as a duration, if nagging is enabled.
    pub fn nagging_interval(&self) -> Option<Duration> {
        self.nagging_repeat_interval
            .filter(|m| *m > 0)
            .map(|m| Duration::minutes(i64::from(m)))
    }

    /// Whether the due time is strictly after `now`.
    pub fn is_future(&self, now: DateTime<Utc>) -> bool {
        self.due_at > now
    }

    /// Assign a new due time and reset the status to `Scheduled`.
    /// This is the only way back to `Scheduled`.
    pub fn reschedule_to(&mut self, due_at: DateTime<Utc>) {
        self.due_at = due_at;
        self.status = ReminderStatus::Scheduled;
    }

    /// Check the fields a caller may have edited.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_text(&self.text)?;
        if self.id % ID_STRIDE != 0 {
            return Err(ValidationError::InvalidValue {
                field: "id".into(),
                message: format!("{} is not a multiple of {ID_STRIDE}", self.id),
            });
        }
        Ok(())
    }

    /// Order by due time, then id.
    pub fn cmp_due(&self, other: &Reminder) -> Ordering {
        self.due_at
            .cmp(&other.due_at)
            .then_with(|| self.id.cmp(&other.id))
    }
}

/// A reminder that has not been assigned an id yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewReminder {
    pub due_at: DateTime<Utc>,
    pub text: String,
    pub nagging_repeat_interval: Option<u32>,
}

impl NewReminder {
    /// Validate and build a new reminder description.
    ///
    /// # Errors
    /// Returns [`ValidationError::EmptyText`] if `text` is blank.
    pub fn new(text: impl Into<String>, due_at: DateTime<Utc>) -> Result<Self, ValidationError> {
        let text = text.into();
        validate_text(&text)?;
        Ok(Self {
            due_at,
            text,
            nagging_repeat_interval: None,
        })
    }

    /// Enable nagging. Non-positive values disable it.
    pub fn nagging(mut self, minutes: i64) -> Self {
        self.nagging_repeat_interval = normalize_interval(minutes);
        self
    }

    /// Attach the store-assigned id.
    pub fn into_reminder(self, id: ReminderId) -> Reminder {
        Reminder {
            id,
            due_at: self.due_at,
            text: self.text,
            nagging_repeat_interval: self.nagging_repeat_interval,
            status: ReminderStatus::Scheduled,
        }
    }
}

fn validate_text(text: &str) -> Result<(), ValidationError> {
    if text.trim().is_empty() {
        return Err(ValidationError::EmptyText);
    }
    Ok(())
}

fn normalize_interval(minutes: i64) -> Option<u32> {
    if minutes <= 0 {
        None
    } else {
        Some(u32::try_from(minutes).unwrap_or(u32::MAX))
    }
}

fn deserialize_nagging_interval<'de, D>(deserializer: D) -> std::result::Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<i64>::deserialize(deserializer)?;
    Ok(raw.and_then(normalize_interval))
}

/// Encode a reminder list for the `reminders` key.
pub fn to_json(reminders: &[Reminder]) -> serde_json::Result<String> {
    serde_json::to_string(reminders)
}

/// Decode the `reminders` key.
pub fn from_json(json: &str) -> serde_json::Result<Vec<Reminder>> {
    serde_json::from_str(json)
}
