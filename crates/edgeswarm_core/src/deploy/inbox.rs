use edgeswarm_data::NeighborMessage;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Single-slot mailbox between the radio and the control loop.
///
/// Messages posted between ticks overwrite each other; the control loop takes
/// the latest one at the start of a tick.
#[derive(Debug, Default)]
pub struct NeighborInbox {
    slot: Mutex<Option<NeighborMessage>>,
    overwritten: AtomicU64,
}

impl NeighborInbox {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn post(&self, message: NeighborMessage) {
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        if slot.replace(message).is_some() {
            self.overwritten.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn take(&self) -> Option<NeighborMessage> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner()).take()
    }

    /// Messages replaced before the control loop read them.
    #[must_use]
    pub fn overwritten(&self) -> u64 {
        self.overwritten.load(Ordering::Relaxed)
    }
}
