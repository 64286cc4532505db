/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! The enrollment scheduler.
//!
//! Each tick claims due enrollments with `SELECT ... FOR UPDATE SKIP LOCKED`
//! and advances each one through its template's sequence: resolve the
//! provider for the step's channel, send through the resilience fabric
//! (token bucket, circuit breaker, retry), record a `sent` event, and
//! schedule the next step.
//!
//! Claiming and sending can't share one Diesel transaction end to end — the
//! provider call is a network round trip and Diesel connections are
//! synchronous — so a claim immediately bumps `next_action_at` forward by a
//! short lease (`PROCESSING_LEASE_SECS`) and commits. If the worker crashes
//! mid-send, the lease simply expires and the row becomes claimable again on
//! a later tick; a successful send overwrites the lease with the real next
//! step time before that happens.

use crate::dal::linkedin_rate_limits::ClaimOutcome;
use crate::dal::DAL;
use crate::error::EngineError;
use crate::providers::{self, ProviderRegistry, SendRequest};
use crate::resilience::circuit_breaker::CircuitBreakerConfig;
use crate::resilience::retry::{retry, RetryPolicy};
use crate::resilience::{CircuitBreaker, TokenBucket};
use crate::{metrics, providers::SendOutcome};
use campaign_models::models::enrollments::{
    CampaignEnrollment, UpdateCampaignEnrollment, ENROLLMENT_STATUS_ACTIVE, ENROLLMENT_STATUS_COMPLETED,
    ENROLLMENT_STATUS_PAUSED,
};
use campaign_models::models::events::{CHANNEL_EMAIL, CHANNEL_LINKEDIN, CHANNEL_VIDEO, EVENT_SENT, VideoFields};
use campaign_models::models::instances::{CampaignInstance, INSTANCE_STATUS_ACTIVE};
use campaign_models::models::linkedin_rate_limits::LinkedInActionKind;
use campaign_models::models::templates::SequenceStep;
use campaign_utils::Settings;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Visibility timeout applied the instant an enrollment is claimed, long
/// enough to cover any provider's send timeout (§5's longest is 30s for
/// video) with margin for retries.
const PROCESSING_LEASE_SECS: i64 = 120;

/// Outcome of processing one claimed enrollment, for tick-level bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Sent,
    Completed,
    Deferred,
    Failed,
}

/// Aggregate counters for one `run_once` tick.
#[derive(Debug, Clone, Copy, Default)]
pub struct TickStats {
    pub claimed: usize,
    pub sent: usize,
    pub completed: usize,
    pub deferred: usize,
    pub failed: usize,
}

#[derive(Default)]
struct TickStatsAtomic {
    sent: AtomicUsize,
    completed: AtomicUsize,
    deferred: AtomicUsize,
    failed: AtomicUsize,
}

/// Drives campaign enrollments through their templates on a fixed tick.
pub struct Scheduler {
    dal: DAL,
    registry: ProviderRegistry,
    config: Arc<Settings>,
    breakers: HashMap<&'static str, CircuitBreaker>,
    provider_limiters: HashMap<&'static str, TokenBucket>,
    global_limiter: TokenBucket,
}

impl Scheduler {
    pub fn new(dal: DAL, registry: ProviderRegistry, config: Arc<Settings>) -> Self {
        let mut breakers = HashMap::new();
        let mut provider_limiters = HashMap::new();

        for channel in [CHANNEL_EMAIL, CHANNEL_LINKEDIN, CHANNEL_VIDEO] {
            breakers.insert(
                channel,
                CircuitBreaker::new(
                    channel,
                    CircuitBreakerConfig {
                        rolling_window: Duration::from_secs(config.resilience.breaker_rolling_window_secs),
                        volume_threshold: config.resilience.breaker_volume_threshold,
                        error_threshold_percentage: config.resilience.breaker_error_threshold_percentage,
                        reset_timeout: Duration::from_secs(config.resilience.breaker_reset_timeout_secs),
                    },
                ),
            );
            provider_limiters.insert(
                channel,
                TokenBucket::new(
                    channel,
                    config.resilience.provider_rate_limit_capacity,
                    config.resilience.provider_rate_limit_refill_per_sec,
                ),
            );
        }

        let global_limiter = TokenBucket::new(
            "global",
            config.resilience.global_rate_limit_capacity,
            config.resilience.global_rate_limit_refill_per_sec,
        );

        Scheduler {
            dal,
            registry,
            config,
            breakers,
            provider_limiters,
            global_limiter,
        }
    }

    /// Ticks on `config.scheduler.tick_seconds` until `cancel` signals true.
    /// A tick already in flight always finishes — including every claimed
    /// enrollment's in-flight provider call — before the loop checks `cancel`
    /// again.
    pub async fn run_forever(&self, mut cancel: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.config.scheduler.tick_seconds));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if *cancel.borrow() {
                        break;
                    }
                    match self.run_once(Utc::now()).await {
                        Ok(stats) => tracing::info!(
                            claimed = stats.claimed,
                            sent = stats.sent,
                            completed = stats.completed,
                            deferred = stats.deferred,
                            failed = stats.failed,
                            "scheduler tick complete"
                        ),
                        Err(error) => tracing::error!(%error, "scheduler tick failed"),
                    }
                }
                result = cancel.changed() => {
                    if result.is_err() || *cancel.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!("scheduler stopped");
    }

    /// Runs one tick at `now`: claim due enrollments, process the claimed
    /// batch with bounded concurrency, return aggregate counters.
    pub async fn run_once(&self, now: DateTime<Utc>) -> Result<TickStats, EngineError> {
        let batch_size = self.config.scheduler.batch_size;
        let lease_until = now + ChronoDuration::seconds(PROCESSING_LEASE_SECS);

        let claimed = self.dal.enrollments().with_transaction(|conn| {
            let rows = self.dal.enrollments().claim_due(conn, now, batch_size)?;
            let lease = UpdateCampaignEnrollment {
                next_action_at: Some(Some(lease_until)),
                ..Default::default()
            };
            for row in &rows {
                self.dal.enrollments().update_with_conn(conn, row.id, &lease)?;
            }
            Ok(rows)
        })?;

        let mut stats = TickStats {
            claimed: claimed.len(),
            ..Default::default()
        };
        if claimed.is_empty() {
            return Ok(stats);
        }
        metrics::SCHEDULER_CLAIMED_TOTAL
            .with_label_values(&["default"])
            .inc_by(claimed.len() as u64);

        let counters = Arc::new(TickStatsAtomic::default());
        let worker_pool_size = self.config.scheduler.worker_pool_size;

        futures::stream::iter(claimed.into_iter())
            .for_each_concurrent(Some(worker_pool_size), |enrollment| {
                let counters = counters.clone();
                async move {
                    let outcome = match self.process_one(enrollment).await {
                        Ok(outcome) => outcome,
                        Err(error) => {
                            tracing::warn!(%error, "scheduler failed to process claimed enrollment");
                            Outcome::Failed
                        }
                    };
                    let label = match outcome {
                        Outcome::Sent => {
                            counters.sent.fetch_add(1, Ordering::Relaxed);
                            "sent"
                        }
                        Outcome::Completed => {
                            counters.completed.fetch_add(1, Ordering::Relaxed);
                            "completed"
                        }
                        Outcome::Deferred => {
                            counters.deferred.fetch_add(1, Ordering::Relaxed);
                            "deferred"
                        }
                        Outcome::Failed => {
                            counters.failed.fetch_add(1, Ordering::Relaxed);
                            "failed"
                        }
                    };
                    metrics::SCHEDULER_OUTCOMES_TOTAL.with_label_values(&[label]).inc();
                }
            })
            .await;

        stats.sent = counters.sent.load(Ordering::Relaxed);
        stats.completed = counters.completed.load(Ordering::Relaxed);
        stats.deferred = counters.deferred.load(Ordering::Relaxed);
        stats.failed = counters.failed.load(Ordering::Relaxed);

        for (channel, breaker) in &self.breakers {
            metrics::CIRCUIT_BREAKER_OPEN
                .with_label_values(&[channel])
                .set(if breaker.is_open() { 1.0 } else { 0.0 });
        }

        Ok(stats)
    }

    async fn process_one(&self, enrollment: CampaignEnrollment) -> Result<Outcome, EngineError> {
        let instance = match self.dal.instances().get(enrollment.instance_id)? {
            Some(instance) if instance.status == INSTANCE_STATUS_ACTIVE => instance,
            Some(_) | None => {
                self.release(&enrollment)?;
                return Ok(Outcome::Deferred);
            }
        };

        let today_start = Utc::now()
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .expect("midnight is always a valid time")
            .and_utc();
        let sent_today = self.dal.events().count_since(instance.id, EVENT_SENT, today_start)?;
        if providers::daily_sends_remaining(sent_today, self.config.scheduler.instance_daily_send_cap) <= 0 {
            self.reschedule_next_utc_midnight(&enrollment)?;
            return Ok(Outcome::Deferred);
        }

        let template = self
            .dal
            .templates()
            .get(instance.template_id)?
            .ok_or_else(|| EngineError::NotFound(format!("campaign template {}", instance.template_id)))?;
        let steps = template.sequence_steps().map_err(EngineError::Validation)?;

        let next_step_number = enrollment.current_step + 1;
        let step = match steps.iter().find(|s| s.step_number == next_step_number) {
            Some(step) => step.clone(),
            None => {
                self.complete(&enrollment)?;
                return Ok(Outcome::Completed);
            }
        };

        if step.channel == CHANNEL_LINKEDIN {
            match self.claim_linkedin_slot(&instance, &step)? {
                ClaimOutcome::CapExceeded => {
                    let timezone = linkedin_timezone(&instance);
                    self.reschedule_next_day_in_tz(&enrollment, &timezone)?;
                    return Ok(Outcome::Deferred);
                }
                ClaimOutcome::Claimed(_) => {}
            }
        }

        let provider = match self.registry.get(&step.channel) {
            Ok(provider) => provider,
            Err(error) => {
                self.fail_nonretryable(&enrollment, &error.to_string())?;
                return Err(error);
            }
        };

        if self.global_limiter.try_acquire().is_err() {
            self.release(&enrollment)?;
            return Ok(Outcome::Deferred);
        }
        if let Some(limiter) = self.provider_limiters.get(step.channel.as_str()) {
            if limiter.try_acquire().is_err() {
                self.release(&enrollment)?;
                return Ok(Outcome::Deferred);
            }
        }

        let send_request = SendRequest {
            enrollment_id: enrollment.id,
            step_number: next_step_number,
            idempotency_key: providers::idempotency_key(enrollment.id, next_step_number),
            content: step.content.clone(),
            recipient: serde_json::json!({ "contact_id": enrollment.contact_id }),
        };

        let retry_policy = RetryPolicy {
            base_delay: Duration::from_millis(self.config.resilience.retry_base_delay_ms),
            max_attempts: self.config.resilience.retry_max_attempts,
        };
        let breaker = self
            .breakers
            .get(step.channel.as_str())
            .ok_or_else(|| EngineError::Configuration(format!("no circuit breaker configured for '{}'", step.channel)))?;

        let send_result = retry(retry_policy, move || {
            let provider = provider.clone();
            let request = send_request.clone();
            async move { breaker.call(is_breaker_failure, move || provider.send(request)).await }
        })
        .await;

        match send_result {
            Ok(outcome) => {
                let max_step = steps.iter().map(|s| s.step_number).max().unwrap_or(next_step_number);
                let following_delay = steps
                    .iter()
                    .find(|s| s.step_number == next_step_number + 1)
                    .map(|s| s.delay_after_previous());
                self.finalize_success(
                    &enrollment,
                    &instance,
                    &step,
                    next_step_number,
                    next_step_number >= max_step,
                    following_delay,
                    &outcome,
                )?;
                Ok(Outcome::Sent)
            }
            Err(error) if error.is_retryable() => {
                self.release(&enrollment)?;
                Ok(Outcome::Deferred)
            }
            Err(error) => {
                self.fail_nonretryable(&enrollment, &error.to_string())?;
                Err(error)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn finalize_success(
        &self,
        enrollment: &CampaignEnrollment,
        instance: &CampaignInstance,
        step: &SequenceStep,
        step_number: i32,
        is_last_step: bool,
        following_delay: Option<Duration>,
        outcome: &SendOutcome,
    ) -> Result<(), EngineError> {
        self.dal.enrollments().with_transaction(|conn| {
            let sent_at = Utc::now();
            let video_fields = if step.channel == CHANNEL_VIDEO {
                VideoFields {
                    video_id: outcome.provider_action_id.clone(),
                    ..Default::default()
                }
            } else {
                VideoFields::default()
            };

            let new_event = campaign_models::models::events::NewCampaignEvent::new(
                Some(enrollment.id),
                Some(instance.id),
                EVENT_SENT.to_string(),
                step.channel.clone(),
                sent_at,
                provider_name_for_channel(&step.channel).to_string(),
                Some(format!("{}:sent:{}", outcome.provider_message_id, step_number)),
                Some(outcome.provider_message_id.clone()),
                Some(step_number),
                serde_json::json!({ "idempotency_key": providers::idempotency_key(enrollment.id, step_number) }),
                video_fields,
            )
            .map_err(EngineError::Validation)?;

            crate::dal::events::EventsDAL::record_with_conn(conn, &new_event)?;

            let next_action_at = if is_last_step {
                None
            } else {
                let delay = following_delay.unwrap_or_default();
                Some(sent_at + ChronoDuration::from_std(delay).unwrap_or_default())
            };

            let changeset = UpdateCampaignEnrollment {
                status: Some(if is_last_step {
                    ENROLLMENT_STATUS_COMPLETED.to_string()
                } else {
                    ENROLLMENT_STATUS_ACTIVE.to_string()
                }),
                current_step: Some(step_number),
                next_action_at: Some(next_action_at),
                provider_message_id: Some(Some(outcome.provider_message_id.clone())),
                provider_action_id: Some(outcome.provider_action_id.clone()),
                completed_at: if is_last_step { Some(Some(sent_at)) } else { None },
                ..Default::default()
            };

            self.dal.enrollments().update_with_conn(conn, enrollment.id, &changeset)?;
            Ok(())
        })?;

        if step.channel == CHANNEL_VIDEO {
            let video_id = outcome
                .provider_action_id
                .clone()
                .unwrap_or_else(|| outcome.provider_message_id.clone());
            if let Ok(new_video) = campaign_models::models::video_generations::NewVideoGeneration::new(
                video_id,
                Some(enrollment.id),
                Some(instance.id),
                None,
            ) {
                if let Err(error) = self.dal.video_generations().create(&new_video) {
                    tracing::warn!(%error, "failed to record video generation tracking row");
                }
            }
        }

        Ok(())
    }

    fn complete(&self, enrollment: &CampaignEnrollment) -> Result<(), EngineError> {
        let now = Utc::now();
        let changeset = UpdateCampaignEnrollment {
            status: Some(ENROLLMENT_STATUS_COMPLETED.to_string()),
            next_action_at: Some(None),
            completed_at: Some(Some(now)),
            ..Default::default()
        };
        self.dal.enrollments().update(enrollment.id, &changeset)?;
        Ok(())
    }

    fn release(&self, enrollment: &CampaignEnrollment) -> Result<(), EngineError> {
        let changeset = UpdateCampaignEnrollment {
            next_action_at: Some(Some(Utc::now())),
            ..Default::default()
        };
        self.dal.enrollments().update(enrollment.id, &changeset)?;
        Ok(())
    }

    fn reschedule_next_utc_midnight(&self, enrollment: &CampaignEnrollment) -> Result<(), EngineError> {
        let next_midnight = (Utc::now().date_naive() + ChronoDuration::days(1))
            .and_hms_opt(0, 0, 0)
            .expect("midnight is always a valid time")
            .and_utc();
        let changeset = UpdateCampaignEnrollment {
            next_action_at: Some(Some(next_midnight)),
            ..Default::default()
        };
        self.dal.enrollments().update(enrollment.id, &changeset)?;
        Ok(())
    }

    fn reschedule_next_day_in_tz(&self, enrollment: &CampaignEnrollment, timezone: &str) -> Result<(), EngineError> {
        let tz: chrono_tz::Tz = timezone.parse().unwrap_or(chrono_tz::UTC);
        let local_tomorrow = (Utc::now().with_timezone(&tz).date_naive() + ChronoDuration::days(1))
            .and_hms_opt(0, 0, 0)
            .expect("midnight is always a valid time");
        let next_action_at = local_tomorrow
            .and_local_timezone(tz)
            .single()
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|| Utc::now() + ChronoDuration::days(1));

        let changeset = UpdateCampaignEnrollment {
            next_action_at: Some(Some(next_action_at)),
            ..Default::default()
        };
        self.dal.enrollments().update(enrollment.id, &changeset)?;
        Ok(())
    }

    /// Pauses a non-retryably failed enrollment with the reason recorded in
    /// `metadata`, rather than an unmodeled `failed` status — enrollments
    /// only have `paused` as a non-terminal, non-schedulable resting state.
    fn fail_nonretryable(&self, enrollment: &CampaignEnrollment, reason: &str) -> Result<(), EngineError> {
        let mut metadata = enrollment.metadata.clone();
        if let Value::Object(ref mut map) = metadata {
            map.insert("failure_reason".to_string(), Value::String(reason.to_string()));
            map.insert("failed_at".to_string(), Value::String(Utc::now().to_rfc3339()));
        } else {
            metadata = serde_json::json!({ "failure_reason": reason, "failed_at": Utc::now().to_rfc3339() });
        }

        let changeset = UpdateCampaignEnrollment {
            status: Some(ENROLLMENT_STATUS_PAUSED.to_string()),
            next_action_at: Some(None),
            metadata: Some(metadata),
            ..Default::default()
        };
        self.dal.enrollments().update(enrollment.id, &changeset)?;
        Ok(())
    }

    fn claim_linkedin_slot(&self, instance: &CampaignInstance, step: &SequenceStep) -> Result<ClaimOutcome, EngineError> {
        let account_identifier = instance
            .provider_config
            .get("linkedin_account_identifier")
            .and_then(Value::as_str)
            .unwrap_or("default");
        let timezone = linkedin_timezone(instance);
        let kind = linkedin_action_kind(step);
        let cap = match kind {
            LinkedInActionKind::Connection => self.config.resilience.linkedin_daily_connection_cap,
            LinkedInActionKind::Message => self.config.resilience.linkedin_daily_message_cap,
            LinkedInActionKind::ProfileVisit => self.config.resilience.linkedin_daily_profile_visit_cap,
        };
        let tz: chrono_tz::Tz = timezone.parse().unwrap_or(chrono_tz::UTC);
        let today = Utc::now().with_timezone(&tz).date_naive();

        self.dal
            .linkedin_rate_limits()
            .claim(account_identifier, &timezone, today, kind, cap)
    }
}

fn linkedin_timezone(instance: &CampaignInstance) -> String {
    instance
        .provider_config
        .get("linkedin_timezone")
        .and_then(Value::as_str)
        .unwrap_or("UTC")
        .to_string()
}

fn linkedin_action_kind(step: &SequenceStep) -> LinkedInActionKind {
    match step.content.get("linkedin_action").and_then(Value::as_str) {
        Some("connection") => LinkedInActionKind::Connection,
        Some("profile_visit") => LinkedInActionKind::ProfileVisit,
        _ => LinkedInActionKind::Message,
    }
}

fn provider_name_for_channel(channel: &str) -> &'static str {
    match channel {
        CHANNEL_EMAIL => "postmark",
        CHANNEL_LINKEDIN => "phantombuster",
        CHANNEL_VIDEO => "heygen",
        _ => "unknown",
    }
}

/// Excludes client-shaped errors (validation, auth, rate limit, not-found,
/// conflict) from the circuit breaker's rolling window — only failures that
/// reflect the provider's own health should be able to trip it.
fn is_breaker_failure(error: &EngineError) -> bool {
    !matches!(
        error,
        EngineError::Validation(_)
            | EngineError::NotFound(_)
            | EngineError::Conflict(_)
            | EngineError::InvalidTransition(_)
            | EngineError::SignatureVerificationFailed
            | EngineError::Unauthorized
            | EngineError::RateLimitExceeded { .. }
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn breaker_failure_excludes_client_errors() {
        assert!(!is_breaker_failure(&EngineError::Validation("bad".into())));
        assert!(!is_breaker_failure(&EngineError::RateLimitExceeded { retry_after_secs: 1 }));
        assert!(is_breaker_failure(&EngineError::Transient("boom".into())));
        assert!(is_breaker_failure(&EngineError::Provider("boom".into())));
    }

    #[test]
    fn linkedin_action_kind_defaults_to_message() {
        let step = SequenceStep {
            step_number: 1,
            channel: CHANNEL_LINKEDIN.to_string(),
            content: serde_json::json!({}),
            delay_after_previous_secs: 0,
        };
        assert_eq!(linkedin_action_kind(&step), LinkedInActionKind::Message);
    }

    #[test]
    fn linkedin_action_kind_reads_explicit_field() {
        let step = SequenceStep {
            step_number: 1,
            channel: CHANNEL_LINKEDIN.to_string(),
            content: serde_json::json!({ "linkedin_action": "connection" }),
            delay_after_previous_secs: 0,
        };
        assert_eq!(linkedin_action_kind(&step), LinkedInActionKind::Connection);
    }

    #[test]
    fn provider_name_maps_known_channels() {
        assert_eq!(provider_name_for_channel(CHANNEL_EMAIL), "postmark");
        assert_eq!(provider_name_for_channel(CHANNEL_LINKEDIN), "phantombuster");
        assert_eq!(provider_name_for_channel(CHANNEL_VIDEO), "heygen");
    }
}
