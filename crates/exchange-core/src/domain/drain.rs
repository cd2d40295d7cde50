//! In-flight request counter used by graceful close.

use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// Counts two-way requests sent on a channel that have not yet resolved.
///
/// `wait_idle` blocks until the count drops to zero, so a closing channel can
/// wait for its outstanding work without polling.
#[derive(Debug, Default)]
pub struct InflightCounter {
    count: Mutex<usize>,
    idle: Condvar,
}

impl InflightCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&self) {
        *self.count.lock() += 1;
    }

    pub fn decrement(&self) {
        let mut count = self.count.lock();
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.idle.notify_all();
        }
    }

    pub fn get(&self) -> usize {
        *self.count.lock()
    }

    /// Block until the count reaches zero or `timeout` elapses.
    ///
    /// Returns true if the counter went idle.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let mut count = self.count.lock();
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            while *count > 0 {
                self.idle.wait(&mut count);
            }
            return true;
        };

        while *count > 0 {
            if self.idle.wait_until(&mut count, deadline).timed_out() {
                return *count == 0;
            }
        }
        true
    }
}
