/*!
 * Request pacing shared by all workers.
 */

use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

/// Spaces backend requests at least `min_interval` apart.
///
/// A caller reserves the next free slot under a short lock and sleeps
/// outside it, so the limiter serializes the request rate without
/// serializing the callers' work.
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            next_slot: Mutex::new(None),
        }
    }

    /// Build from a requests-per-minute budget
    pub fn per_minute(requests: u32) -> Self {
        if requests == 0 {
            return Self::new(Duration::ZERO);
        }
        Self::new(Duration::from_secs(60) / requests)
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Wait until this caller may send
    pub async fn acquire(&self) {
        if self.min_interval.is_zero() {
            return;
        }

        let wait = {
            let mut next_slot = self.next_slot.lock();
            let now = Instant::now();
            let slot = match *next_slot {
                Some(slot) if slot > now => slot,
                _ => now,
            };
            *next_slot = Some(slot + self.min_interval);
            slot - now
        };

        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }
    }
}
