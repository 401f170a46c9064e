use crate::error::{OrchestratorError, Result};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

pub const DEFAULT_CEILING: usize = 10;

/// Counting admission gate for per-instance work units.
///
/// Admission is FIFO (tokio's semaphore queues waiters in order), so a
/// waiting unit is admitted once the holders ahead of it release.
#[derive(Debug, Clone)]
pub struct ConcurrencyLimiter {
    semaphore: Arc<Semaphore>,
    ceiling: usize,
}

/// A held slot. Dropping it releases the slot.
#[derive(Debug)]
pub struct LimiterPermit {
    _permit: OwnedSemaphorePermit,
}

impl LimiterPermit {
    pub fn release(self) {}
}

impl ConcurrencyLimiter {
    pub fn new(ceiling: usize) -> Self {
        let ceiling = ceiling.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(ceiling)),
            ceiling,
        }
    }

    /// Suspends until a slot is free.
    pub async fn acquire(&self) -> Result<LimiterPermit> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| OrchestratorError::LimiterClosed)?;
        Ok(LimiterPermit { _permit: permit })
    }

    pub fn ceiling(&self) -> usize {
        self.ceiling
    }

    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Refuses every pending and future `acquire`.
    pub fn close(&self) {
        self.semaphore.close();
    }
}

impl Default for ConcurrencyLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_CEILING)
    }
}
