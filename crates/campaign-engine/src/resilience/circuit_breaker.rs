/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Per-provider circuit breaker.
//!
//! Three states: `Closed` executes calls and tracks outcomes in a rolling
//! window; `Open` rejects immediately until `reset_timeout` elapses, then
//! moves to `HalfOpen`; `HalfOpen` permits exactly one probe call, closing
//! the circuit on success or reopening it on failure.

use crate::error::EngineError;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Closed,
    Open,
    HalfOpen,
}

struct Outcome {
    at: Instant,
    failed: bool,
}

struct Inner {
    state: State,
    opened_at: Instant,
    window: VecDeque<Outcome>,
    half_open_probe_in_flight: bool,
}

/// Configuration for one circuit breaker instance, sourced from
/// `campaign_utils::config::Resilience`.
#[derive(Debug, Clone, Copy)]
pub struct CircuitBreakerConfig {
    pub rolling_window: Duration,
    pub volume_threshold: u32,
    pub error_threshold_percentage: f64,
    pub reset_timeout: Duration,
}

/// A circuit breaker scoped to one named dependency (typically a provider).
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        CircuitBreaker {
            name: name.into(),
            config,
            inner: Mutex::new(Inner {
                state: State::Closed,
                opened_at: Instant::now(),
                window: VecDeque::new(),
                half_open_probe_in_flight: false,
            }),
        }
    }

    /// Runs `f` through the breaker. Rejects with `EngineError::CircuitOpen`
    /// without calling `f` if the circuit is open (or half-open with a probe
    /// already in flight). `is_failure` classifies the call's result for the
    /// rolling window, excluding client errors (4xx, 429) per spec.md §4.3's
    /// error filter.
    pub async fn call<F, Fut, T>(&self, is_failure: impl Fn(&EngineError) -> bool, f: F) -> Result<T, EngineError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, EngineError>>,
    {
        let is_probe = self.admit()?;

        let result = f().await;

        match &result {
            Ok(_) => self.record(is_probe, false),
            Err(e) if is_failure(e) => self.record(is_probe, true),
            Err(_) => self.record(is_probe, false),
        }

        result
    }

    /// Decides whether a call may proceed right now, transitioning `Open ->
    /// HalfOpen` if `reset_timeout` has elapsed. Returns whether this call is
    /// the half-open probe.
    fn admit(&self) -> Result<bool, EngineError> {
        let mut inner = self.inner.lock().expect("circuit breaker mutex poisoned");

        match inner.state {
            State::Closed => Ok(false),
            State::Open => {
                if inner.opened_at.elapsed() >= self.config.reset_timeout {
                    inner.state = State::HalfOpen;
                    inner.half_open_probe_in_flight = true;
                    Ok(true)
                } else {
                    Err(EngineError::CircuitOpen(self.name.clone()))
                }
            }
            State::HalfOpen => {
                if inner.half_open_probe_in_flight {
                    Err(EngineError::CircuitOpen(self.name.clone()))
                } else {
                    inner.half_open_probe_in_flight = true;
                    Ok(true)
                }
            }
        }
    }

    fn record(&self, was_probe: bool, failed: bool) {
        let mut inner = self.inner.lock().expect("circuit breaker mutex poisoned");

        if was_probe {
            inner.half_open_probe_in_flight = false;
            if failed {
                inner.state = State::Open;
                inner.opened_at = Instant::now();
                inner.window.clear();
                return;
            }
            inner.state = State::Closed;
            inner.window.clear();
            return;
        }

        let now = Instant::now();
        inner.window.push_back(Outcome { at: now, failed });
        while let Some(front) = inner.window.front() {
            if now.duration_since(front.at) > self.config.rolling_window {
                inner.window.pop_front();
            } else {
                break;
            }
        }

        if inner.state != State::Closed {
            return;
        }

        let total = inner.window.len() as u32;
        if total < self.config.volume_threshold {
            return;
        }
        let failures = inner.window.iter().filter(|o| o.failed).count() as f64;
        let error_rate = failures / total as f64 * 100.0;

        if error_rate >= self.config.error_threshold_percentage {
            inner.state = State::Open;
            inner.opened_at = now;
            inner.window.clear();
        }
    }

    /// True if the breaker is currently rejecting calls outright.
    pub fn is_open(&self) -> bool {
        let inner = self.inner.lock().expect("circuit breaker mutex poisoned");
        inner.state == State::Open && inner.opened_at.elapsed() < self.config.reset_timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            rolling_window: Duration::from_secs(60),
            volume_threshold: 4,
            error_threshold_percentage: 50.0,
            reset_timeout: Duration::from_millis(50),
        }
    }

    fn always_failure(_: &EngineError) -> bool {
        true
    }

    #[tokio::test]
    async fn trips_after_volume_and_error_threshold() {
        let breaker = CircuitBreaker::new("postmark", config());

        for _ in 0..3 {
            let _ = breaker
                .call(always_failure, || async { Err::<(), _>(EngineError::Transient("boom".into())) })
                .await;
        }
        assert!(!breaker.is_open(), "should stay closed below volume_threshold");

        let _ = breaker
            .call(always_failure, || async { Err::<(), _>(EngineError::Transient("boom".into())) })
            .await;
        assert!(breaker.is_open());
    }

    #[tokio::test]
    async fn half_open_probe_recovers_on_success() {
        let breaker = CircuitBreaker::new("postmark", config());
        for _ in 0..4 {
            let _ = breaker
                .call(always_failure, || async { Err::<(), _>(EngineError::Transient("boom".into())) })
                .await;
        }
        assert!(breaker.is_open());

        tokio::time::sleep(Duration::from_millis(60)).await;

        let result = breaker.call(always_failure, || async { Ok::<_, EngineError>(()) }).await;
        assert!(result.is_ok());
        assert!(!breaker.is_open());
    }

    #[tokio::test]
    async fn rejects_immediately_while_open() {
        let breaker = CircuitBreaker::new("postmark", config());
        for _ in 0..4 {
            let _ = breaker
                .call(always_failure, || async { Err::<(), _>(EngineError::Transient("boom".into())) })
                .await;
        }

        let result = breaker.call(always_failure, || async { Ok::<_, EngineError>(()) }).await;
        assert!(matches!(result, Err(EngineError::CircuitOpen(_))));
    }
}
