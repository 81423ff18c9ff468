//! Shared harness for integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use remindr_core::{
    AlarmQueue, Clock, Config, Database, Event, KvBackend, ManualClock, RecordingPresenter,
    ReminderManager, ReminderStore,
};

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 1, 9, 0, 0).unwrap()
}

/// A manager wired to an in-process alarm queue, a recording presenter and
/// a manual clock.
pub struct Harness {
    pub clock: ManualClock,
    pub alarms: Arc<AlarmQueue>,
    pub presenter: Arc<RecordingPresenter>,
    pub manager: ReminderManager,
}

impl Harness {
    pub fn new() -> Self {
        Self::over(Database::open_memory().unwrap())
    }

    /// Harness over `backend`, with the store stamping events from the
    /// harness clock.
    pub fn over(backend: impl KvBackend + 'static) -> Self {
        let clock = ManualClock::new(t0());
        let store =
            Arc::new(ReminderStore::with_clock(backend, Arc::new(clock.clone())).unwrap());
        let alarms = Arc::new(AlarmQueue::new());
        let presenter = Arc::new(RecordingPresenter::new());
        let manager = ReminderManager::new(
            store,
            alarms.clone(),
            presenter.clone(),
            Arc::new(clock.clone()),
            &Config::default(),
        );
        Self {
            clock,
            alarms,
            presenter,
            manager,
        }
    }

    /// Advance the clock and deliver every callback that became due.
    pub fn advance(&self, by: Duration) -> Vec<Event> {
        self.clock.advance(by);
        self.fire_due()
    }

    pub fn fire_due(&self) -> Vec<Event> {
        self.alarms
            .due(self.clock.now())
            .into_iter()
            .map(|action| self.manager.on_due_callback(action).unwrap())
            .collect()
    }
}
