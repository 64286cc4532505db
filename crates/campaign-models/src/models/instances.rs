/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Campaign instance models — a live execution of a template.

use crate::schema::campaign_instances;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

// =============================================================================
// Constants
// =============================================================================

pub const INSTANCE_STATUS_DRAFT: &str = "draft";
pub const INSTANCE_STATUS_ACTIVE: &str = "active";
pub const INSTANCE_STATUS_PAUSED: &str = "paused";
pub const INSTANCE_STATUS_COMPLETED: &str = "completed";
pub const INSTANCE_STATUS_FAILED: &str = "failed";

pub const VALID_INSTANCE_STATUSES: &[&str] = &[
    INSTANCE_STATUS_DRAFT,
    INSTANCE_STATUS_ACTIVE,
    INSTANCE_STATUS_PAUSED,
    INSTANCE_STATUS_COMPLETED,
    INSTANCE_STATUS_FAILED,
];

/// Whether `from -> to` is an allowed instance status transition.
///
/// `draft->active`, `active<->paused`, `{active,paused}->completed`,
/// anything `->failed`. All else is `InvalidTransition`.
pub fn is_valid_transition(from: &str, to: &str) -> bool {
    use INSTANCE_STATUS_ACTIVE as ACTIVE;
    use INSTANCE_STATUS_COMPLETED as COMPLETED;
    use INSTANCE_STATUS_DRAFT as DRAFT;
    use INSTANCE_STATUS_FAILED as FAILED;
    use INSTANCE_STATUS_PAUSED as PAUSED;

    if to == FAILED {
        return from != COMPLETED && from != FAILED;
    }
    matches!(
        (from, to),
        (DRAFT, ACTIVE) | (ACTIVE, PAUSED) | (PAUSED, ACTIVE) | (ACTIVE, COMPLETED) | (PAUSED, COMPLETED)
    )
}

// =============================================================================
// CampaignInstance
// =============================================================================

/// A campaign instance row from the database.
#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize, Deserialize, ToSchema)]
#[diesel(table_name = campaign_instances)]
pub struct CampaignInstance {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub template_id: Uuid,
    pub status: String,
    pub total_enrolled: i32,
    pub total_sent: i32,
    pub total_delivered: i32,
    pub total_opened: i32,
    pub total_clicked: i32,
    pub total_replied: i32,
    pub provider_config: serde_json::Value,
    pub started_at: Option<DateTime<Utc>>,
    pub paused_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl CampaignInstance {
    /// `delivery_rate = sent>0 ? delivered/sent*100 : 0`, two decimal places.
    /// Zero denominator formats as the literal string `"0"`, not `"0.00"`.
    pub fn delivery_rate(&self) -> String {
        format_rate(self.total_delivered, self.total_sent)
    }

    /// `open_rate = delivered>0 ? opened/delivered*100 : 0`, two decimal places.
    pub fn open_rate(&self) -> String {
        format_rate(self.total_opened, self.total_delivered)
    }

    /// `click_rate = opened>0 ? clicked/opened*100 : 0`, two decimal places.
    pub fn click_rate(&self) -> String {
        format_rate(self.total_clicked, self.total_opened)
    }

    /// `reply_rate = sent>0 ? replied/sent*100 : 0`, two decimal places.
    pub fn reply_rate(&self) -> String {
        format_rate(self.total_replied, self.total_sent)
    }
}

/// Formats a `numerator/denominator*100` percentage to two decimal places,
/// per spec.md P5. A zero denominator is the literal string `"0"` rather
/// than a computed `"0.00"`, so the empty-campaign case is unambiguous in
/// the JSON response.
fn format_rate(numerator: i32, denominator: i32) -> String {
    if denominator <= 0 {
        return "0".to_string();
    }
    format!("{:.2}", numerator as f64 / denominator as f64 * 100.0)
}

/// A new campaign instance to be inserted.
#[derive(Debug, Clone, Insertable, Serialize, Deserialize)]
#[diesel(table_name = campaign_instances)]
pub struct NewCampaignInstance {
    pub template_id: Uuid,
    pub status: String,
    pub total_enrolled: i32,
    pub total_sent: i32,
    pub total_delivered: i32,
    pub total_opened: i32,
    pub total_clicked: i32,
    pub total_replied: i32,
    pub provider_config: serde_json::Value,
}

impl NewCampaignInstance {
    pub fn new(template_id: Uuid, provider_config: serde_json::Value) -> Result<Self, String> {
        if template_id.is_nil() {
            return Err("Template ID cannot be nil".to_string());
        }
        Ok(Self {
            template_id,
            status: INSTANCE_STATUS_DRAFT.to_string(),
            total_enrolled: 0,
            total_sent: 0,
            total_delivered: 0,
            total_opened: 0,
            total_clicked: 0,
            total_replied: 0,
            provider_config,
        })
    }
}

/// Changeset for updating a campaign instance's status/lifecycle timestamps.
///
/// Counters are never updated through this changeset — they are mutated
/// exclusively via SQL-side `AtomicIncrement` in the DAL, never read-modify-write.
#[derive(Debug, Clone, Default, AsChangeset)]
#[diesel(table_name = campaign_instances)]
pub struct UpdateCampaignInstance {
    pub status: Option<String>,
    pub started_at: Option<Option<DateTime<Utc>>>,
    pub paused_at: Option<Option<DateTime<Utc>>>,
    pub completed_at: Option<Option<DateTime<Utc>>>,
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_draft_to_active() {
        assert!(is_valid_transition(INSTANCE_STATUS_DRAFT, INSTANCE_STATUS_ACTIVE));
    }

    #[test]
    fn test_transition_active_paused_roundtrip() {
        assert!(is_valid_transition(INSTANCE_STATUS_ACTIVE, INSTANCE_STATUS_PAUSED));
        assert!(is_valid_transition(INSTANCE_STATUS_PAUSED, INSTANCE_STATUS_ACTIVE));
    }

    #[test]
    fn test_transition_active_and_paused_to_completed() {
        assert!(is_valid_transition(INSTANCE_STATUS_ACTIVE, INSTANCE_STATUS_COMPLETED));
        assert!(is_valid_transition(INSTANCE_STATUS_PAUSED, INSTANCE_STATUS_COMPLETED));
    }

    #[test]
    fn test_transition_any_to_failed_except_terminal() {
        assert!(is_valid_transition(INSTANCE_STATUS_DRAFT, INSTANCE_STATUS_FAILED));
        assert!(is_valid_transition(INSTANCE_STATUS_ACTIVE, INSTANCE_STATUS_FAILED));
        assert!(!is_valid_transition(INSTANCE_STATUS_COMPLETED, INSTANCE_STATUS_FAILED));
        assert!(!is_valid_transition(INSTANCE_STATUS_FAILED, INSTANCE_STATUS_FAILED));
    }

    #[test]
    fn test_transition_draft_to_completed_forbidden() {
        assert!(!is_valid_transition(INSTANCE_STATUS_DRAFT, INSTANCE_STATUS_COMPLETED));
    }

    #[test]
    fn test_new_campaign_instance_nil_template() {
        let result = NewCampaignInstance::new(Uuid::nil(), serde_json::json!({}));
        assert!(result.is_err());
    }

    #[test]
    fn test_new_campaign_instance_defaults() {
        let instance = NewCampaignInstance::new(Uuid::new_v4(), serde_json::json!({})).unwrap();
        assert_eq!(instance.status, INSTANCE_STATUS_DRAFT);
        assert_eq!(instance.total_sent, 0);
    }

    fn sample(sent: i32, delivered: i32, opened: i32, clicked: i32, replied: i32) -> CampaignInstance {
        CampaignInstance {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            template_id: Uuid::new_v4(),
            status: INSTANCE_STATUS_ACTIVE.to_string(),
            total_enrolled: sent.max(1),
            total_sent: sent,
            total_delivered: delivered,
            total_opened: opened,
            total_clicked: clicked,
            total_replied: replied,
            provider_config: serde_json::json!({}),
            started_at: None,
            paused_at: None,
            completed_at: None,
        }
    }

    #[test]
    fn test_delivery_rate_zero_sent() {
        assert_eq!(sample(0, 0, 0, 0, 0).delivery_rate(), "0");
    }

    #[test]
    fn test_delivery_rate_computed() {
        // 15/20 * 100 = 75.00
        assert_eq!(sample(20, 15, 0, 0, 0).delivery_rate(), "75.00");
    }

    #[test]
    fn test_open_rate_rounds_to_two_decimals() {
        // 1/3 * 100 = 33.333... -> 33.33
        assert_eq!(sample(10, 3, 1, 0, 0).open_rate(), "33.33");
    }
}
