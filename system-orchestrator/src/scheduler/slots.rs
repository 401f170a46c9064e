use crate::locks::lock;
use std::collections::HashSet;
use std::sync::Mutex;

/// Which sessions currently have a running scheduler.
///
/// Claiming and the idle-exit check share one lock, so an instance created
/// while a scheduler winds down is either seen by that scheduler or gets a
/// fresh one.
#[derive(Debug, Default)]
pub struct SchedulerSlots {
    running: Mutex<HashSet<String>>,
}

impl SchedulerSlots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the caller now owns the session's scheduler slot.
    pub fn try_claim(&self, session_id: &str) -> bool {
        lock(&self.running).insert(session_id.to_string())
    }

    /// Releases the slot if `is_idle` holds, evaluated under the slot lock.
    /// Returns the result of `is_idle`.
    pub fn release_if_idle(&self, session_id: &str, is_idle: impl FnOnce() -> bool) -> bool {
        let mut running = lock(&self.running);
        let idle = is_idle();
        if idle {
            running.remove(session_id);
        }
        idle
    }

    pub fn release(&self, session_id: &str) {
        lock(&self.running).remove(session_id);
    }

    pub fn is_running(&self, session_id: &str) -> bool {
        lock(&self.running).contains(session_id)
    }

    pub fn running(&self) -> Vec<String> {
        lock(&self.running).iter().cloned().collect()
    }
}
