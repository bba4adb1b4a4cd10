//! Concurrency limiter for calls to a shared downstream resource

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Bounds the number of in-flight calls to one resource (e.g. a model
/// endpoint). Cloning shares the same permit pool, so one limiter covers
/// every question and run in the process.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    semaphore: Arc<Semaphore>,
    max_permits: usize,
}

/// A held permit. Dropping it returns the permit, which also happens when the
/// holding task is cancelled.
#[derive(Debug)]
pub struct Permit {
    _permit: OwnedSemaphorePermit,
}

impl Permit {
    /// Return the permit explicitly
    pub fn release(self) {}
}

impl RateLimiter {
    pub const DEFAULT_MAX_PERMITS: usize = 5;

    pub fn new(max_permits: usize) -> Self {
        let max_permits = max_permits.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(max_permits)),
            max_permits,
        }
    }

    /// Wait until a permit is free. Waiters are served in FIFO order.
    pub async fn acquire(&self) -> Permit {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .expect("rate limiter semaphore is never closed");
        Permit { _permit: permit }
    }

    pub fn max_permits(&self) -> usize {
        self.max_permits
    }

    /// Permits currently held
    pub fn in_flight(&self) -> usize {
        self.max_permits - self.semaphore.available_permits()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_PERMITS)
    }
}
