/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Dead-letter queue models. An event that survives maximum retries lands
//! here with its full original payload so nothing is ever silently dropped.

use crate::schema::dead_letter_events;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

pub const DLQ_STATUS_FAILED: &str = "failed";
pub const DLQ_STATUS_REPLAYING: &str = "replaying";
pub const DLQ_STATUS_REPLAYED: &str = "replayed";
pub const DLQ_STATUS_IGNORED: &str = "ignored";

pub const VALID_DLQ_STATUSES: &[&str] = &[
    DLQ_STATUS_FAILED,
    DLQ_STATUS_REPLAYING,
    DLQ_STATUS_REPLAYED,
    DLQ_STATUS_IGNORED,
];

/// A dead-letter queue row.
#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize, Deserialize, ToSchema)]
#[diesel(table_name = dead_letter_events)]
pub struct DeadLetterEvent {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub event_data: serde_json::Value,
    pub failure_reason: String,
    pub attempts: i32,
    pub first_attempted_at: DateTime<Utc>,
    pub last_attempted_at: DateTime<Utc>,
    pub status: String,
    pub replayed_at: Option<DateTime<Utc>>,
    pub event_type: Option<String>,
    pub channel: Option<String>,
    pub email: Option<String>,
    pub user_id: Option<Uuid>,
}

/// A new dead-letter entry to be inserted.
///
/// Invariant: `attempts >= max retries` at creation — the DLQ is only ever
/// reached after the retry budget is exhausted, never as a first-failure sink.
#[derive(Debug, Clone, Insertable, Serialize, Deserialize)]
#[diesel(table_name = dead_letter_events)]
pub struct NewDeadLetterEvent {
    pub event_data: serde_json::Value,
    pub failure_reason: String,
    pub attempts: i32,
    pub first_attempted_at: DateTime<Utc>,
    pub last_attempted_at: DateTime<Utc>,
    pub status: String,
    pub event_type: Option<String>,
    pub channel: Option<String>,
    pub email: Option<String>,
    pub user_id: Option<Uuid>,
}

impl NewDeadLetterEvent {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        event_data: serde_json::Value,
        failure_reason: String,
        attempts: i32,
        first_attempted_at: DateTime<Utc>,
        event_type: Option<String>,
        channel: Option<String>,
        email: Option<String>,
        user_id: Option<Uuid>,
    ) -> Result<Self, String> {
        if attempts < 1 {
            return Err("A dead-letter entry requires at least one failed attempt".to_string());
        }
        Ok(Self {
            event_data,
            failure_reason,
            attempts,
            first_attempted_at,
            last_attempted_at: Utc::now(),
            status: DLQ_STATUS_FAILED.to_string(),
            event_type,
            channel,
            email,
            user_id,
        })
    }
}

/// Changeset for admin replay/ignore operations.
#[derive(Debug, Clone, Default, AsChangeset)]
#[diesel(table_name = dead_letter_events)]
pub struct UpdateDeadLetterEvent {
    pub status: Option<String>,
    pub failure_reason: Option<String>,
    pub attempts: Option<i32>,
    pub last_attempted_at: Option<DateTime<Utc>>,
    pub replayed_at: Option<Option<DateTime<Utc>>>,
}

impl UpdateDeadLetterEvent {
    pub fn mark_replaying() -> Self {
        Self {
            status: Some(DLQ_STATUS_REPLAYING.to_string()),
            ..Default::default()
        }
    }

    pub fn mark_replayed() -> Self {
        Self {
            status: Some(DLQ_STATUS_REPLAYED.to_string()),
            replayed_at: Some(Some(Utc::now())),
            ..Default::default()
        }
    }

    pub fn mark_failed_again(attempts: i32) -> Self {
        Self {
            status: Some(DLQ_STATUS_FAILED.to_string()),
            attempts: Some(attempts),
            last_attempted_at: Some(Utc::now()),
            ..Default::default()
        }
    }

    pub fn mark_ignored() -> Self {
        Self {
            status: Some(DLQ_STATUS_IGNORED.to_string()),
            ..Default::default()
        }
    }

    /// Retags an entry whose bounded retry window ran out without ever
    /// resolving. The row stays `failed` (it is still a dead letter, not an
    /// admin-dismissed one) but its `failure_reason` changes so a future
    /// sweep no longer recognizes it as a live `awaiting_correlation` entry.
    pub fn mark_exhausted(failure_reason: impl Into<String>) -> Self {
        Self {
            failure_reason: Some(failure_reason.into()),
            last_attempted_at: Some(Utc::now()),
            ..Default::default()
        }
    }
}

/// Aggregate counts returned by `dal.dead_letter_events().stats()`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, QueryableByName)]
pub struct DeadLetterStats {
    #[diesel(sql_type = diesel::sql_types::BigInt)]
    pub failed: i64,
    #[diesel(sql_type = diesel::sql_types::BigInt)]
    pub replaying: i64,
    #[diesel(sql_type = diesel::sql_types::BigInt)]
    pub replayed: i64,
    #[diesel(sql_type = diesel::sql_types::BigInt)]
    pub ignored: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_zero_attempts() {
        let result = NewDeadLetterEvent::new(
            serde_json::json!({}),
            "max retries exceeded".to_string(),
            0,
            Utc::now(),
            None,
            None,
            None,
            None,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_new_starts_failed() {
        let entry = NewDeadLetterEvent::new(
            serde_json::json!({"raw": true}),
            "max retries exceeded".to_string(),
            5,
            Utc::now(),
            Some("opened".to_string()),
            Some("email".to_string()),
            None,
            None,
        )
        .unwrap();
        assert_eq!(entry.status, DLQ_STATUS_FAILED);
        assert_eq!(entry.attempts, 5);
    }

    #[test]
    fn test_mark_replayed_sets_timestamp() {
        let changeset = UpdateDeadLetterEvent::mark_replayed();
        assert_eq!(changeset.status, Some(DLQ_STATUS_REPLAYED.to_string()));
        assert!(changeset.replayed_at.flatten().is_some());
    }
}
