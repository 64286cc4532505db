/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Campaign template models.
//!
//! A template is an immutable definition of a campaign shape: the channel(s)
//! it runs over and the ordered sequence of steps a contact is driven
//! through. The sequence itself is not a separate table — it lives as
//! validated JSON inside `settings` and is parsed into `Vec<SequenceStep>`
//! at read time, the same treatment the teacher gives `WebhookFilters`.

use crate::schema::campaign_templates;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use utoipa::ToSchema;
use uuid::Uuid;

// =============================================================================
// Constants
// =============================================================================

pub const TEMPLATE_TYPE_EMAIL: &str = "email";
pub const TEMPLATE_TYPE_LINKEDIN: &str = "linkedin";
pub const TEMPLATE_TYPE_MULTI_CHANNEL: &str = "multi_channel";
pub const TEMPLATE_TYPE_VIDEO: &str = "video";

pub const VALID_TEMPLATE_TYPES: &[&str] = &[
    TEMPLATE_TYPE_EMAIL,
    TEMPLATE_TYPE_LINKEDIN,
    TEMPLATE_TYPE_MULTI_CHANNEL,
    TEMPLATE_TYPE_VIDEO,
];

pub const PATH_TYPE_STRUCTURED: &str = "structured";
pub const PATH_TYPE_DYNAMIC_AI: &str = "dynamic_ai";

pub const VALID_PATH_TYPES: &[&str] = &[PATH_TYPE_STRUCTURED, PATH_TYPE_DYNAMIC_AI];

pub const CHANNEL_EMAIL: &str = "email";
pub const CHANNEL_LINKEDIN: &str = "linkedin";
pub const CHANNEL_VIDEO: &str = "video";
pub const CHANNEL_SMS: &str = "sms";
pub const CHANNEL_PHONE: &str = "phone";

pub const VALID_CHANNELS: &[&str] = &[
    CHANNEL_EMAIL,
    CHANNEL_LINKEDIN,
    CHANNEL_VIDEO,
    CHANNEL_SMS,
    CHANNEL_PHONE,
];

// =============================================================================
// Sequence Step (parsed view over `settings`)
// =============================================================================

/// One ordered element of a template's sequence.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct SequenceStep {
    /// 1-based, unique and contiguous within the template.
    pub step_number: i32,
    /// Channel this step sends over.
    pub channel: String,
    /// Opaque message content (subject/body/script), never interpreted here.
    pub content: serde_json::Value,
    /// Delay after the previous step before this one becomes due, in seconds.
    pub delay_after_previous_secs: i64,
}

impl SequenceStep {
    pub fn delay_after_previous(&self) -> Duration {
        Duration::from_secs(self.delay_after_previous_secs.max(0) as u64)
    }
}

/// Validates that step numbers are contiguous starting at 1 and that every
/// step's channel is a member of the closed vocabulary.
pub fn validate_sequence_steps(steps: &[SequenceStep]) -> Result<(), String> {
    if steps.is_empty() {
        return Err("A template must have at least one sequence step".to_string());
    }

    let mut numbers: Vec<i32> = steps.iter().map(|s| s.step_number).collect();
    numbers.sort_unstable();
    for (expected, actual) in (1..=numbers.len() as i32).zip(numbers.iter()) {
        if expected != *actual {
            return Err(format!(
                "Sequence step numbers must be contiguous from 1; expected {} but found {}",
                expected, actual
            ));
        }
    }

    for step in steps {
        if !VALID_CHANNELS.contains(&step.channel.as_str()) {
            return Err(format!("Invalid channel '{}' in sequence step", step.channel));
        }
    }

    Ok(())
}

/// Parses and validates the sequence steps stored in a template's `settings` column.
pub fn parse_sequence_steps(settings: &serde_json::Value) -> Result<Vec<SequenceStep>, String> {
    let steps: Vec<SequenceStep> = settings
        .get("steps")
        .ok_or_else(|| "settings.steps is required".to_string())
        .and_then(|v| serde_json::from_value(v.clone()).map_err(|e| e.to_string()))?;
    validate_sequence_steps(&steps)?;
    Ok(steps)
}

// =============================================================================
// CampaignTemplate
// =============================================================================

/// A campaign template row from the database.
#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize, Deserialize, ToSchema)]
#[diesel(table_name = campaign_templates)]
pub struct CampaignTemplate {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub name: String,
    pub description: Option<String>,
    pub template_type: String,
    pub path_type: String,
    pub settings: serde_json::Value,
    pub is_active: bool,
}

impl CampaignTemplate {
    pub fn sequence_steps(&self) -> Result<Vec<SequenceStep>, String> {
        parse_sequence_steps(&self.settings)
    }
}

/// A new campaign template to be inserted.
#[derive(Debug, Clone, Insertable, Serialize, Deserialize)]
#[diesel(table_name = campaign_templates)]
pub struct NewCampaignTemplate {
    pub name: String,
    pub description: Option<String>,
    pub template_type: String,
    pub path_type: String,
    pub settings: serde_json::Value,
    pub is_active: bool,
}

impl NewCampaignTemplate {
    /// Creates a new template, validating the type/path-type vocabulary and
    /// the embedded sequence steps before a row is ever built.
    pub fn new(
        name: String,
        description: Option<String>,
        template_type: String,
        path_type: String,
        steps: Vec<SequenceStep>,
    ) -> Result<Self, String> {
        if name.trim().is_empty() {
            return Err("Name cannot be empty".to_string());
        }
        if name.len() > 255 {
            return Err("Name cannot exceed 255 characters".to_string());
        }
        if !VALID_TEMPLATE_TYPES.contains(&template_type.as_str()) {
            return Err(format!("Invalid template type '{}'", template_type));
        }
        if !VALID_PATH_TYPES.contains(&path_type.as_str()) {
            return Err(format!("Invalid path type '{}'", path_type));
        }
        validate_sequence_steps(&steps)?;

        let settings = serde_json::json!({ "steps": steps });

        Ok(Self {
            name,
            description,
            template_type,
            path_type,
            settings,
            is_active: true,
        })
    }
}

/// Changeset for updating a campaign template's activation flag.
///
/// Templates are immutable definitions; the only mutable field is
/// `is_active`, used to retire a template without deleting history.
#[derive(Debug, Clone, Default, AsChangeset)]
#[diesel(table_name = campaign_templates)]
pub struct UpdateCampaignTemplate {
    pub is_active: Option<bool>,
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn step(n: i32, channel: &str) -> SequenceStep {
        SequenceStep {
            step_number: n,
            channel: channel.to_string(),
            content: serde_json::json!({"subject": "hi"}),
            delay_after_previous_secs: 86400,
        }
    }

    #[test]
    fn test_validate_sequence_steps_contiguous() {
        let steps = vec![step(1, "email"), step(2, "email"), step(3, "linkedin")];
        assert!(validate_sequence_steps(&steps).is_ok());
    }

    #[test]
    fn test_validate_sequence_steps_gap() {
        let steps = vec![step(1, "email"), step(3, "email")];
        let err = validate_sequence_steps(&steps).unwrap_err();
        assert!(err.contains("contiguous"));
    }

    #[test]
    fn test_validate_sequence_steps_empty() {
        assert!(validate_sequence_steps(&[]).is_err());
    }

    #[test]
    fn test_validate_sequence_steps_bad_channel() {
        let steps = vec![step(1, "carrier_pigeon")];
        let err = validate_sequence_steps(&steps).unwrap_err();
        assert!(err.contains("Invalid channel"));
    }

    #[test]
    fn test_new_campaign_template_success() {
        let steps = vec![step(1, "email"), step(2, "linkedin")];
        let result = NewCampaignTemplate::new(
            "Outbound Q3".to_string(),
            None,
            TEMPLATE_TYPE_MULTI_CHANNEL.to_string(),
            PATH_TYPE_STRUCTURED.to_string(),
            steps,
        );
        assert!(result.is_ok());
        let tmpl = result.unwrap();
        assert!(tmpl.is_active);
        assert_eq!(tmpl.settings["steps"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_new_campaign_template_empty_name() {
        let result = NewCampaignTemplate::new(
            "".to_string(),
            None,
            TEMPLATE_TYPE_EMAIL.to_string(),
            PATH_TYPE_STRUCTURED.to_string(),
            vec![step(1, "email")],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_new_campaign_template_invalid_type() {
        let result = NewCampaignTemplate::new(
            "Test".to_string(),
            None,
            "carrier_pigeon".to_string(),
            PATH_TYPE_STRUCTURED.to_string(),
            vec![step(1, "email")],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_new_campaign_template_invalid_steps_rejected() {
        let result = NewCampaignTemplate::new(
            "Test".to_string(),
            None,
            TEMPLATE_TYPE_EMAIL.to_string(),
            PATH_TYPE_STRUCTURED.to_string(),
            vec![step(2, "email")],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_sequence_steps_round_trip() {
        let steps = vec![step(1, "email"), step(2, "video")];
        let settings = serde_json::json!({ "steps": steps });
        let parsed = parse_sequence_steps(&settings).unwrap();
        assert_eq!(parsed, steps);
    }
}
