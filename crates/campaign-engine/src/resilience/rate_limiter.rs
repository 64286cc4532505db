/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Token-bucket rate limiter, used both globally and per-provider.

use crate::error::EngineError;
use std::sync::Mutex;
use std::time::Instant;

struct Inner {
    tokens: f64,
    last_refill: Instant,
}

/// A token bucket: `capacity` tokens max, refilled continuously at
/// `refill_per_sec` tokens per second.
pub struct TokenBucket {
    name: String,
    capacity: f64,
    refill_per_sec: f64,
    inner: Mutex<Inner>,
}

impl TokenBucket {
    pub fn new(name: impl Into<String>, capacity: u32, refill_per_sec: f64) -> Self {
        TokenBucket {
            name: name.into(),
            capacity: capacity as f64,
            refill_per_sec,
            inner: Mutex::new(Inner {
                tokens: capacity as f64,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Attempts to take one token. Fails fast with `RateLimitExceeded` if the
    /// bucket is empty rather than queuing, leaving the queue-or-fail choice
    /// to the caller (the scheduler backs off and retries next tick; the
    /// webhook path has no caller to queue for).
    pub fn try_acquire(&self) -> Result<(), EngineError> {
        let mut inner = self.inner.lock().expect("rate limiter mutex poisoned");

        let now = Instant::now();
        let elapsed = now.duration_since(inner.last_refill).as_secs_f64();
        inner.tokens = (inner.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        inner.last_refill = now;

        if inner.tokens >= 1.0 {
            inner.tokens -= 1.0;
            Ok(())
        } else {
            let shortfall = 1.0 - inner.tokens;
            let retry_after_secs = (shortfall / self.refill_per_sec).ceil().max(1.0) as u64;
            let _ = &self.name;
            Err(EngineError::RateLimitExceeded { retry_after_secs })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;
    use std::time::Duration;

    #[test]
    fn exhausts_then_refills() {
        let bucket = TokenBucket::new("global", 2, 10.0);
        assert!(bucket.try_acquire().is_ok());
        assert!(bucket.try_acquire().is_ok());
        assert!(bucket.try_acquire().is_err());

        sleep(Duration::from_millis(150));
        assert!(bucket.try_acquire().is_ok());
    }

    #[test]
    fn never_exceeds_capacity() {
        let bucket = TokenBucket::new("global", 1, 1000.0);
        sleep(Duration::from_millis(50));
        assert!(bucket.try_acquire().is_ok());
        assert!(bucket.try_acquire().is_err());
    }
}
