/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Campaign enrollment models — a single contact's journey through one instance.

use crate::schema::campaign_enrollments;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

// =============================================================================
// Constants
// =============================================================================

pub const ENROLLMENT_STATUS_ENROLLED: &str = "enrolled";
pub const ENROLLMENT_STATUS_ACTIVE: &str = "active";
pub const ENROLLMENT_STATUS_PAUSED: &str = "paused";
pub const ENROLLMENT_STATUS_COMPLETED: &str = "completed";
pub const ENROLLMENT_STATUS_UNSUBSCRIBED: &str = "unsubscribed";
pub const ENROLLMENT_STATUS_BOUNCED: &str = "bounced";

pub const VALID_ENROLLMENT_STATUSES: &[&str] = &[
    ENROLLMENT_STATUS_ENROLLED,
    ENROLLMENT_STATUS_ACTIVE,
    ENROLLMENT_STATUS_PAUSED,
    ENROLLMENT_STATUS_COMPLETED,
    ENROLLMENT_STATUS_UNSUBSCRIBED,
    ENROLLMENT_STATUS_BOUNCED,
];

/// Terminal statuses freeze counters and disable scheduling.
pub fn is_terminal_status(status: &str) -> bool {
    matches!(
        status,
        ENROLLMENT_STATUS_COMPLETED | ENROLLMENT_STATUS_UNSUBSCRIBED | ENROLLMENT_STATUS_BOUNCED
    )
}

/// Whether the scheduler may drive this enrollment forward: `next_action_at`
/// is only meaningful for `enrolled`/`active` rows.
pub fn is_schedulable_status(status: &str) -> bool {
    matches!(status, ENROLLMENT_STATUS_ENROLLED | ENROLLMENT_STATUS_ACTIVE)
}

// =============================================================================
// CampaignEnrollment
// =============================================================================

/// A campaign enrollment row from the database.
#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize, Deserialize, ToSchema)]
#[diesel(table_name = campaign_enrollments)]
pub struct CampaignEnrollment {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub instance_id: Uuid,
    pub contact_id: Uuid,
    pub status: String,
    pub current_step: i32,
    pub next_action_at: Option<DateTime<Utc>>,
    pub provider_message_id: Option<String>,
    pub provider_action_id: Option<String>,
    pub metadata: serde_json::Value,
    pub enrolled_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub unsubscribed_at: Option<DateTime<Utc>>,
}

/// A new campaign enrollment to be inserted.
#[derive(Debug, Clone, Insertable, Serialize, Deserialize)]
#[diesel(table_name = campaign_enrollments)]
pub struct NewCampaignEnrollment {
    pub instance_id: Uuid,
    pub contact_id: Uuid,
    pub status: String,
    pub current_step: i32,
    pub next_action_at: Option<DateTime<Utc>>,
    pub metadata: serde_json::Value,
    pub enrolled_at: DateTime<Utc>,
}

impl NewCampaignEnrollment {
    /// Builds a fresh enrollment, due immediately (`next_action_at = now`) so
    /// the scheduler picks up step 1 on its next tick.
    pub fn new(instance_id: Uuid, contact_id: Uuid, metadata: serde_json::Value) -> Result<Self, String> {
        if instance_id.is_nil() {
            return Err("Instance ID cannot be nil".to_string());
        }
        if contact_id.is_nil() {
            return Err("Contact ID cannot be nil".to_string());
        }
        let now = Utc::now();
        Ok(Self {
            instance_id,
            contact_id,
            status: ENROLLMENT_STATUS_ENROLLED.to_string(),
            current_step: 0,
            next_action_at: Some(now),
            metadata,
            enrolled_at: now,
        })
    }
}

/// Changeset for advancing/mutating an enrollment. Scheduler and webhook
/// intake are the only two writers; both go through this changeset so no
/// call site hand-rolls a partial `UPDATE`.
#[derive(Debug, Clone, Default, AsChangeset)]
#[diesel(table_name = campaign_enrollments)]
pub struct UpdateCampaignEnrollment {
    pub status: Option<String>,
    pub current_step: Option<i32>,
    pub next_action_at: Option<Option<DateTime<Utc>>>,
    pub provider_message_id: Option<Option<String>>,
    pub provider_action_id: Option<Option<String>>,
    pub metadata: Option<serde_json::Value>,
    pub completed_at: Option<Option<DateTime<Utc>>>,
    pub unsubscribed_at: Option<Option<DateTime<Utc>>>,
}

impl UpdateCampaignEnrollment {
    /// Changeset produced by a terminal webhook event: `bounced` or `unsubscribed`.
    pub fn terminal(status: &str) -> Self {
        let now = Utc::now();
        let mut u = Self {
            status: Some(status.to_string()),
            next_action_at: Some(None),
            ..Default::default()
        };
        if status == ENROLLMENT_STATUS_UNSUBSCRIBED {
            u.unsubscribed_at = Some(Some(now));
        }
        u
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_terminal_status() {
        assert!(is_terminal_status(ENROLLMENT_STATUS_COMPLETED));
        assert!(is_terminal_status(ENROLLMENT_STATUS_UNSUBSCRIBED));
        assert!(is_terminal_status(ENROLLMENT_STATUS_BOUNCED));
        assert!(!is_terminal_status(ENROLLMENT_STATUS_ACTIVE));
    }

    #[test]
    fn test_is_schedulable_status() {
        assert!(is_schedulable_status(ENROLLMENT_STATUS_ENROLLED));
        assert!(is_schedulable_status(ENROLLMENT_STATUS_ACTIVE));
        assert!(!is_schedulable_status(ENROLLMENT_STATUS_PAUSED));
    }

    #[test]
    fn test_new_enrollment_nil_instance() {
        let result = NewCampaignEnrollment::new(Uuid::nil(), Uuid::new_v4(), serde_json::json!({}));
        assert!(result.is_err());
    }

    #[test]
    fn test_new_enrollment_due_immediately() {
        let enrollment = NewCampaignEnrollment::new(Uuid::new_v4(), Uuid::new_v4(), serde_json::json!({})).unwrap();
        assert_eq!(enrollment.status, ENROLLMENT_STATUS_ENROLLED);
        assert_eq!(enrollment.current_step, 0);
        assert!(enrollment.next_action_at.is_some());
    }

    #[test]
    fn test_terminal_changeset_unsubscribed_sets_timestamp() {
        let changeset = UpdateCampaignEnrollment::terminal(ENROLLMENT_STATUS_UNSUBSCRIBED);
        assert_eq!(changeset.status, Some(ENROLLMENT_STATUS_UNSUBSCRIBED.to_string()));
        assert!(changeset.unsubscribed_at.flatten().is_some());
        assert_eq!(changeset.next_action_at, Some(None));
    }

    #[test]
    fn test_terminal_changeset_bounced_no_unsubscribed_timestamp() {
        let changeset = UpdateCampaignEnrollment::terminal(ENROLLMENT_STATUS_BOUNCED);
        assert_eq!(changeset.status, Some(ENROLLMENT_STATUS_BOUNCED.to_string()));
        assert!(changeset.unsubscribed_at.is_none());
    }
}
