use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

use crate::events::Event;

/// Buffered events per subscriber before the slowest one starts lagging.
const CHANNEL_CAPACITY: usize = 64;

/// Fan-out of store changes and handler outcomes to observers.
///
/// Sending never blocks and never fails; with no subscribers the event is
/// dropped. A lagging subscriber sees `RecvError::Lagged` and should re-read
/// the store.
#[derive(Debug, Clone)]
pub struct ChangeNotifier {
    tx: broadcast::Sender<Event>,
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeNotifier {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub(crate) fn reminders_changed(&self, at: DateTime<Utc>) {
        self.publish(Event::RemindersChanged { at });
    }

    pub fn publish(&self, event: Event) {
        // Err only means nobody is listening.
        let _ = self.tx.send(event);
    }
}
