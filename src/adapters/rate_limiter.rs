//! Minimum-interval request gate for throttled upstream providers.

use crate::ports::provider_port::RateLimiter;
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

/// Spaces successive `acquire` calls at least `interval` apart.
/// A zero interval never blocks.
pub struct MinIntervalGate {
    interval: Duration,
    last: Mutex<Option<Instant>>,
}

impl MinIntervalGate {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: Mutex::new(None),
        }
    }

    pub fn from_millis(millis: u64) -> Self {
        Self::new(Duration::from_millis(millis))
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl RateLimiter for MinIntervalGate {
    fn acquire(&self) {
        if self.interval.is_zero() {
            return;
        }
        // The lock is held across the sleep so concurrent callers queue up.
        let mut last = match self.last.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.interval {
                let wait = self.interval - elapsed;
                debug!("Rate limit: waiting {} ms", wait.as_millis());
                thread::sleep(wait);
            }
        }
        *last = Some(Instant::now());
    }
}
