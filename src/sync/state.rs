//! Producer flag shared by the lister and every kind worker.

use std::sync::atomic::{AtomicBool, Ordering};

/// Whether the lister is still producing. One writer, many readers.
#[derive(Debug, Default)]
pub struct SyncState {
    producing: AtomicBool,
}

impl SyncState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Must be called before any worker starts, otherwise an empty queue reads as "done".
    pub fn start_producing(&self) {
        self.producing.store(true, Ordering::Release);
    }

    pub fn stop_producing(&self) {
        self.producing.store(false, Ordering::Release);
    }

    pub fn is_producing(&self) -> bool {
        self.producing.load(Ordering::Acquire)
    }
}
