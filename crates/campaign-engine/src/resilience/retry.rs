/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Exponential backoff retry wrapping `EngineError::is_retryable`.
//!
//! Non-retryable errors (validation, signature failure, dedup) short-circuit
//! immediately; retryable ones (transient, circuit-open, pool exhaustion) are
//! retried with `base * 2^attempt + jitter` up to `max_attempts`.

use crate::error::EngineError;
use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use std::future::Future;
use std::time::Duration;

/// Retry policy knobs, sourced from `campaign_utils::config::Resilience`.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub max_attempts: u32,
}

/// Runs `f`, retrying on `EngineError::is_retryable()` results up to
/// `policy.max_attempts` attempts total, with exponential backoff plus
/// jitter between attempts. Returns the last error once attempts are exhausted.
pub async fn retry<F, Fut, T>(policy: RetryPolicy, mut f: F) -> Result<T, EngineError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, EngineError>>,
{
    let mut backoff = ExponentialBackoff {
        initial_interval: policy.base_delay,
        multiplier: 2.0,
        max_elapsed_time: None,
        ..ExponentialBackoff::default()
    };

    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        match f().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt < policy.max_attempts => {
                let wait = backoff.next_backoff().unwrap_or(policy.base_delay);
                tokio::time::sleep(wait).await;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retries_transient_until_success() {
        let attempts = AtomicU32::new(0);
        let policy = RetryPolicy {
            base_delay: Duration::from_millis(1),
            max_attempts: 5,
        };

        let result = retry(policy, || {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(EngineError::Transient("timeout".into()))
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_on_non_retryable() {
        let attempts = AtomicU32::new(0);
        let policy = RetryPolicy {
            base_delay: Duration::from_millis(1),
            max_attempts: 5,
        };

        let result: Result<(), EngineError> = retry(policy, || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(EngineError::Validation("bad input".into())) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausts_max_attempts() {
        let attempts = AtomicU32::new(0);
        let policy = RetryPolicy {
            base_delay: Duration::from_millis(1),
            max_attempts: 3,
        };

        let result: Result<(), EngineError> = retry(policy, || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(EngineError::Transient("still failing".into())) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }
}
