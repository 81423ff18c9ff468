//! # remindr core library
//!
//! The reminder state and scheduling engine behind the `remindr` CLI. Any
//! front end (CLI, desktop shell, boot hook) is a thin layer over the same
//! [`ReminderManager`].
//!
//! ## Architecture
//!
//! - **Store**: [`ReminderStore`] is the single source of truth. Every read
//!   and write goes through its [`ExclusiveAccessGate`] and is persisted to a
//!   [`storage::KvBackend`] (SQLite in production) in one transaction.
//! - **Scheduling**: the [`Scheduler`] turns reminders into registrations on
//!   an injected [`AlarmScheduler`]. Callbacks carry a serialized
//!   [`DueAction`] and come back through [`ReminderManager::on_due_callback`].
//! - **Delivery**: the [`DueReminderHandler`] moves reminders through
//!   `Scheduled -> Notified -> Done`, asks the [`NotificationPresenter`] to
//!   show them and re-arms nagging.
//! - **Observation**: the [`ChangeNotifier`] broadcasts an [`Event`] after
//!   every committed change; a persisted dirty flag covers observers that
//!   were not running.
//!
//! Time comes from an injected [`Clock`], so the whole engine can be driven
//! by a [`ManualClock`] in tests.

pub mod alarm;
pub mod clock;
pub mod error;
pub mod events;
pub mod handler;
pub mod manager;
pub mod notification;
pub mod reminder;
pub mod scheduler;
pub mod storage;
pub mod store;

pub use alarm::{
    AlarmQueue, AlarmScheduler, CallbackIdentity, DueAction, PendingAlarm, StoredAlarmQueue,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{ConfigError, CoreError, DatabaseError, Result, ValidationError};
pub use events::{Event, IgnoreReason};
pub use handler::DueReminderHandler;
pub use manager::{ReminderManager, ScheduleSummary};
pub use notification::{
    NotificationPresenter, NotificationRequest, PresentReason, RecordingPresenter,
};
pub use reminder::{NewReminder, Reminder, ReminderId, ReminderStatus, ID_STRIDE};
pub use scheduler::{next_nag_time, ScheduleOutcome, Scheduler};
pub use storage::{Config, Database, KvBackend, MemoryKv};
pub use store::{ChangeNotifier, ExclusiveAccessGate, ReminderStore, StoreState};
