//! Observer double that records lifecycle events.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::observer::{ConnectionObserver, Link};

/// Records `(connection id, opened)` pairs in delivery order.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<(u64, bool)>>,
}

impl RecordingObserver {
    /// Captures a copy of the recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<(u64, bool)> {
        self.events
            .lock()
            .expect("observer mutex poisoned")
            .clone()
    }

    /// Waits until at least `count` events have arrived.
    pub fn wait_for(&self, count: usize) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if self.events().len() >= count {
                return true;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        false
    }
}

impl ConnectionObserver for RecordingObserver {
    fn notify_connection(&self, link: &Link, opened: bool) {
        self.events
            .lock()
            .expect("observer mutex poisoned")
            .push((link.id(), opened));
    }
}
