/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Deferred correlation for orphaned webhook events.
//!
//! A webhook whose `provider_message_id`/`provider_action_id` matches no
//! enrollment is never written to `campaign_events` — there is no enrollment
//! to attach it to, and that table is append-only, so a later correction
//! would be impossible. Instead it is parked in the dead-letter queue with
//! `failure_reason = "awaiting_correlation"` and `status = failed`, which
//! doubles as the retry queue: this module's sweep re-attempts the same
//! lookup on a timer and, once the scheduler creates the enrollment the
//! webhook was waiting on, replays the event through the normal intake
//! recipe. An entry that outlives `dlq.orphan_max_attempts` or
//! `dlq.orphan_max_age_hours` is left in the queue permanently, exactly the
//! DLQ terminality spec.md describes for any other exhausted retry.

use crate::dal::dead_letter_events::DeadLetterFilter;
use crate::dal::DAL;
use crate::error::EngineError;
use crate::normalizer::{normalize, ResolvedEnrollment};
use crate::providers::RawEvent;
use campaign_models::models::dead_letter_events::{DeadLetterEvent, NewDeadLetterEvent, DLQ_STATUS_FAILED};
use campaign_utils::config::Settings;
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// The `failure_reason` tag distinguishing a parked orphan from any other
/// kind of dead-letter entry.
pub const AWAITING_CORRELATION: &str = "awaiting_correlation";

/// The `failure_reason` an entry is retagged with once it outlives its
/// bounded correlation window without resolving.
pub const CORRELATION_WINDOW_EXHAUSTED: &str = "correlation_window_exhausted";

/// Parks `raw` in the dead-letter queue pending correlation. Called by the
/// webhook intake handler when `find_by_provider_correlation_id` misses.
pub fn enqueue(dal: &DAL, provider: &str, channel: &str, raw: &RawEvent) -> Result<(), EngineError> {
    let event_data = serde_json::json!({
        "provider": provider,
        "channel": channel,
        "event_type": raw.event_type,
        "provider_event_id": raw.provider_event_id,
        "provider_message_id": raw.provider_message_id,
        "provider_action_id": raw.provider_action_id,
        "timestamp": raw.timestamp,
        "metadata": raw.metadata,
    });

    let entry = NewDeadLetterEvent::new(
        event_data,
        AWAITING_CORRELATION.to_string(),
        1,
        Utc::now(),
        Some(raw.event_type.clone()),
        Some(channel.to_string()),
        None,
        None,
    )
    .map_err(EngineError::Validation)?;

    dal.dead_letter_events().create(&entry)?;
    Ok(())
}

/// Decodes the `(provider, channel, RawEvent)` an `enqueue` call stored back
/// out of `event_data`. `None` if the payload doesn't have the shape this
/// module wrote — a data-integrity problem, not a correlation miss.
fn decode(entry: &DeadLetterEvent) -> Option<(String, String, RawEvent)> {
    let data = &entry.event_data;
    let provider = data.get("provider")?.as_str()?.to_string();
    let channel = data.get("channel")?.as_str()?.to_string();
    let event_type = data.get("event_type")?.as_str()?.to_string();
    let raw = RawEvent {
        event_type,
        provider_event_id: data.get("provider_event_id").and_then(Value::as_str).map(str::to_string),
        provider_message_id: data.get("provider_message_id").and_then(Value::as_str).map(str::to_string),
        provider_action_id: data.get("provider_action_id").and_then(Value::as_str).map(str::to_string),
        timestamp: data.get("timestamp").cloned(),
        metadata: data.get("metadata").cloned().unwrap_or(Value::Null),
    };
    Some((provider, channel, raw))
}

/// Tries to resolve and replay one dead-letter entry. `Ok(true)` means the
/// event was inserted and the entry marked `replayed`; `Ok(false)` means the
/// correlation lookup still missed and the caller should bump the attempt
/// count. Used both by the background sweep and the admin `replay` endpoint.
pub fn attempt_replay(dal: &DAL, entry: &DeadLetterEvent) -> Result<bool, EngineError> {
    let (provider, channel, raw) =
        decode(entry).ok_or_else(|| EngineError::Internal("dead-letter event_data is malformed".into()))?;

    let resolved = dal
        .enrollments()
        .find_by_provider_correlation_id(raw.provider_message_id.as_deref(), raw.provider_action_id.as_deref())?;

    let Some(enrollment) = resolved else {
        return Ok(false);
    };

    let resolved_enrollment = ResolvedEnrollment {
        enrollment_id: enrollment.id,
        instance_id: enrollment.instance_id,
    };
    let new_event = normalize(raw, &provider, &channel, Some(resolved_enrollment))?;
    dal.events().record(&new_event)?;
    dal.dead_letter_events().mark_replayed(entry.id)?;
    Ok(true)
}

/// Aggregate counters for one `sweep` pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct SweepStats {
    pub resolved: usize,
    pub still_pending: usize,
    pub exhausted: usize,
}

/// Periodically retries correlation for every parked orphan, on its own
/// tick independent of the enrollment scheduler.
pub struct OrphanCorrelationSweeper {
    dal: DAL,
    config: Arc<Settings>,
}

impl OrphanCorrelationSweeper {
    pub fn new(dal: DAL, config: Arc<Settings>) -> Self {
        OrphanCorrelationSweeper { dal, config }
    }

    /// Ticks on the same cadence as the enrollment scheduler until `cancel`
    /// signals true.
    pub async fn run_forever(&self, mut cancel: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.config.scheduler.tick_seconds));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if *cancel.borrow() {
                        break;
                    }
                    match self.sweep() {
                        Ok(stats) => tracing::debug!(
                            resolved = stats.resolved,
                            still_pending = stats.still_pending,
                            exhausted = stats.exhausted,
                            "orphan correlation sweep complete"
                        ),
                        Err(error) => tracing::error!(%error, "orphan correlation sweep failed"),
                    }
                }
                result = cancel.changed() => {
                    if result.is_err() || *cancel.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!("orphan correlation sweeper stopped");
    }

    /// Runs one pass over every `awaiting_correlation` entry still eligible
    /// for retry.
    pub fn sweep(&self) -> Result<SweepStats, EngineError> {
        let entries = self.dal.dead_letter_events().list(&DeadLetterFilter {
            status: Some(DLQ_STATUS_FAILED.to_string()),
            ..Default::default()
        })?;

        let mut stats = SweepStats::default();

        for entry in entries.iter().filter(|e| e.failure_reason == AWAITING_CORRELATION) {
            let age_hours = (Utc::now() - entry.first_attempted_at).num_hours();
            if entry.attempts >= self.config.dlq.orphan_max_attempts as i32 || age_hours >= self.config.dlq.orphan_max_age_hours
            {
                self.dal.dead_letter_events().mark_exhausted(entry.id, CORRELATION_WINDOW_EXHAUSTED)?;
                stats.exhausted += 1;
                continue;
            }

            match attempt_replay(&self.dal, entry) {
                Ok(true) => stats.resolved += 1,
                Ok(false) => {
                    self.dal.dead_letter_events().mark_failed_again(entry.id, entry.attempts + 1)?;
                    stats.still_pending += 1;
                }
                Err(error) => {
                    tracing::warn!(%error, dlq_id = %entry.id, "orphan correlation sweep failed to process entry");
                }
            }
        }

        Ok(stats)
    }
}
