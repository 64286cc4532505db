/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Translates a provider's `RawEvent` into the canonical `NewCampaignEvent`
//! shape, resolving the owning enrollment against already-loaded state.
//!
//! `normalize` is a pure function: given the same `RawEvent`, provider,
//! channel, and enrollment lookup result, its output is byte-identical. It
//! never touches the database itself — callers resolve the enrollment
//! lookup beforehand and pass the result in.

use crate::error::EngineError;
use crate::providers::RawEvent;
use campaign_models::models::events::{NewCampaignEvent, VideoFields, VALID_EVENT_TYPES};
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;
use uuid::Uuid;

/// What the enrollment lookup (`provider_message_id`/`provider_action_id` →
/// enrollment) found, if anything. `None` means the event is orphaned.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedEnrollment {
    pub enrollment_id: Uuid,
    pub instance_id: Uuid,
}

/// Threshold (spec.md §4.4 step 4): a numeric timestamp at or above this
/// value is interpreted as milliseconds since the epoch, below it as seconds.
const EPOCH_MS_THRESHOLD: i64 = 10_000_000_000;

/// Normalizes `raw` into a canonical event ready for insertion.
///
/// Errors only on missing-required-field violations (step 1); every other
/// anomaly (bad timestamp, unresolved enrollment) degrades gracefully per
/// spec.md §4.4 rather than failing the whole webhook.
pub fn normalize(
    raw: RawEvent,
    provider: &str,
    channel: &str,
    resolved: Option<ResolvedEnrollment>,
) -> Result<NewCampaignEvent, EngineError> {
    if !VALID_EVENT_TYPES.contains(&raw.event_type.as_str()) {
        return Err(EngineError::Validation(format!("unrecognized event type '{}'", raw.event_type)));
    }
    let provider_event_id = raw
        .provider_event_id
        .clone()
        .ok_or_else(|| EngineError::Validation("raw event missing provider_event_id".into()))?;

    let event_timestamp = normalize_timestamp(raw.timestamp.as_ref());
    let metadata = strip_nulls(raw.metadata.clone());

    let (enrollment_id, instance_id) = match resolved {
        Some(r) => (Some(r.enrollment_id), Some(r.instance_id)),
        None => (None, None),
    };

    NewCampaignEvent::new(
        enrollment_id,
        instance_id,
        raw.event_type,
        channel.to_string(),
        event_timestamp,
        provider.to_string(),
        Some(provider_event_id),
        raw.provider_message_id,
        None,
        metadata,
        VideoFields::default(),
    )
    .map_err(EngineError::Validation)
}

/// Epoch-seconds-vs-milliseconds heuristic, ISO-8601 string parsing, and a
/// fallback to `now` (with a warning) for anything else — spec.md §4.4 step 4.
fn normalize_timestamp(raw: Option<&Value>) -> DateTime<Utc> {
    match raw {
        Some(Value::Number(n)) => {
            if let Some(millis) = n.as_i64() {
                let (secs, sub_millis) = if millis.abs() >= EPOCH_MS_THRESHOLD {
                    (millis / 1000, (millis % 1000) as u32)
                } else {
                    (millis, 0)
                };
                match Utc.timestamp_opt(secs, sub_millis * 1_000_000).single() {
                    Some(ts) => ts,
                    None => {
                        tracing::warn!(raw = %n, "numeric event timestamp out of range, using now");
                        Utc::now()
                    }
                }
            } else if let Some(f) = n.as_f64() {
                let millis = if f.abs() >= EPOCH_MS_THRESHOLD as f64 { f } else { f * 1000.0 };
                match Utc.timestamp_millis_opt(millis as i64).single() {
                    Some(ts) => ts,
                    None => {
                        tracing::warn!(raw = %n, "numeric event timestamp out of range, using now");
                        Utc::now()
                    }
                }
            } else {
                tracing::warn!("non-finite numeric event timestamp, using now");
                Utc::now()
            }
        }
        Some(Value::String(s)) => DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| {
                tracing::warn!(raw = %s, "unparsable event timestamp string, using now");
                Utc::now()
            }),
        _ => {
            tracing::warn!("event carried no timestamp, using now");
            Utc::now()
        }
    }
}

/// Recursively strips `null` values from objects and arrays, matching
/// spec.md §4.4 step 5. `undefined` has no JSON representation so there is
/// nothing further to strip once a payload has been through `serde_json`.
fn strip_nulls(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k, strip_nulls(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .filter(|v| !v.is_null())
                .map(strip_nulls)
                .collect(),
        ),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use campaign_models::models::events::{CHANNEL_EMAIL, EVENT_DELIVERED};
    use serde_json::json;

    fn raw_event() -> RawEvent {
        RawEvent {
            event_type: EVENT_DELIVERED.to_string(),
            provider_event_id: Some("msg-1:Delivery".to_string()),
            provider_message_id: Some("msg-1".to_string()),
            provider_action_id: None,
            timestamp: Some(json!(1_700_000_000)),
            metadata: json!({"a": 1, "b": null, "c": {"d": null, "e": 2}}),
        }
    }

    #[test]
    fn normalizes_seconds_epoch() {
        let event = normalize(raw_event(), "postmark", CHANNEL_EMAIL, None).unwrap();
        assert_eq!(event.event_timestamp.timestamp(), 1_700_000_000);
    }

    #[test]
    fn normalizes_millis_epoch() {
        let mut raw = raw_event();
        raw.timestamp = Some(json!(1_700_000_000_000i64));
        let event = normalize(raw, "postmark", CHANNEL_EMAIL, None).unwrap();
        assert_eq!(event.event_timestamp.timestamp(), 1_700_000_000);
    }

    #[test]
    fn normalizes_iso8601_string() {
        let mut raw = raw_event();
        raw.timestamp = Some(json!("2023-11-14T22:13:20Z"));
        let event = normalize(raw, "postmark", CHANNEL_EMAIL, None).unwrap();
        assert_eq!(event.event_timestamp.timestamp(), 1_700_000_000);
    }

    #[test]
    fn falls_back_to_now_on_unparsable_timestamp() {
        let mut raw = raw_event();
        raw.timestamp = Some(json!("not a date"));
        let before = Utc::now();
        let event = normalize(raw, "postmark", CHANNEL_EMAIL, None).unwrap();
        assert!(event.event_timestamp >= before);
    }

    #[test]
    fn strips_nulls_from_metadata_recursively() {
        let event = normalize(raw_event(), "postmark", CHANNEL_EMAIL, None).unwrap();
        assert_eq!(event.metadata, json!({"a": 1, "c": {"e": 2}}));
    }

    #[test]
    fn leaves_enrollment_unresolved_when_lookup_misses() {
        let event = normalize(raw_event(), "postmark", CHANNEL_EMAIL, None).unwrap();
        assert!(event.enrollment_id.is_none());
        assert!(event.instance_id.is_none());
    }

    #[test]
    fn resolves_enrollment_when_lookup_hits() {
        let resolved = ResolvedEnrollment {
            enrollment_id: Uuid::new_v4(),
            instance_id: Uuid::new_v4(),
        };
        let event = normalize(raw_event(), "postmark", CHANNEL_EMAIL, Some(resolved)).unwrap();
        assert_eq!(event.enrollment_id, Some(resolved.enrollment_id));
        assert_eq!(event.instance_id, Some(resolved.instance_id));
    }

    #[test]
    fn rejects_unrecognized_event_type() {
        let mut raw = raw_event();
        raw.event_type = "not_a_real_event".to_string();
        assert!(normalize(raw, "postmark", CHANNEL_EMAIL, None).is_err());
    }

    #[test]
    fn is_byte_identical_for_identical_inputs() {
        let a = normalize(raw_event(), "postmark", CHANNEL_EMAIL, None).unwrap();
        let b = normalize(raw_event(), "postmark", CHANNEL_EMAIL, None).unwrap();
        assert_eq!(serde_json::to_string(&a).unwrap(), serde_json::to_string(&b).unwrap());
    }
}
