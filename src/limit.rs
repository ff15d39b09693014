use std::num::NonZeroU32;

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};

/// Bytes-per-second cap shared by every connection of a run.
pub struct SpeedLimit {
    limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    burst: NonZeroU32,
}

impl SpeedLimit {
    pub fn new(bytes_per_sec: NonZeroU32) -> Self {
        Self {
            limiter: RateLimiter::direct(Quota::per_second(bytes_per_sec)),
            burst: bytes_per_sec,
        }
    }

    /// Waits until `len` bytes may pass. Chunks larger than one second's
    /// allowance are paid for in installments.
    pub async fn consume(&self, len: usize) {
        let mut remaining = u32::try_from(len).unwrap_or(u32::MAX);
        while let Some(n) = NonZeroU32::new(remaining.min(self.burst.get())) {
            if self.limiter.until_n_ready(n).await.is_err() {
                break;
            }
            remaining -= n.get();
        }
    }
}
