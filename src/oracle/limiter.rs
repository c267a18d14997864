use super::OracleError;
use governor::{
    Quota, RateLimiter,
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
};
use std::num::NonZeroU32;
use tokio::sync::{Semaphore, SemaphorePermit};

/// Admission control shared by every source in a run.
///
/// Concurrency is bounded by a tokio semaphore, which hands out permits in FIFO
/// order: a source waiting for a slot is served before any call queued after it,
/// so no source can be starved. An optional per-minute quota is applied after
/// admission.
pub struct CallLimiter {
    slots: Semaphore,
    rate: Option<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
}

impl CallLimiter {
    pub fn new(max_concurrent: usize, requests_per_minute: u32) -> Self {
        let rate = NonZeroU32::new(requests_per_minute)
            .map(|rpm| RateLimiter::direct(Quota::per_minute(rpm)));
        Self {
            slots: Semaphore::new(max_concurrent.max(1)),
            rate,
        }
    }

    pub async fn acquire(&self) -> Result<SemaphorePermit<'_>, OracleError> {
        let permit = self
            .slots
            .acquire()
            .await
            .map_err(|_| OracleError::Transient("call limiter closed".into()))?;
        if let Some(rate) = &self.rate {
            rate.until_ready().await;
        }
        Ok(permit)
    }
}
