//! Periodic hard update of the target network.
use serde::{Deserialize, Serialize};

/// Counts environment steps and fires every `interval` steps.
#[derive(Debug, Deserialize, Serialize, PartialEq, Eq, Clone)]
pub struct SyncScheduler {
    interval: usize,
    counter: usize,
}

impl SyncScheduler {
    /// Constructs a scheduler firing every `interval` steps.
    ///
    /// `interval` must be positive.
    pub fn new(interval: usize) -> Self {
        Self {
            interval,
            counter: 0,
        }
    }

    /// Counts one step, returns `true` if a sync is due.
    pub fn tick(&mut self) -> bool {
        self.counter += 1;
        if self.counter >= self.interval {
            self.counter = 0;
            true
        } else {
            false
        }
    }

    /// Steps until the next sync.
    pub fn remaining(&self) -> usize {
        self.interval - self.counter
    }

    /// Sync interval in steps.
    pub fn interval(&self) -> usize {
        self.interval
    }
}
