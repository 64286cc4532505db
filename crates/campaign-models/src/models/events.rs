/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Campaign event models — the append-only fact table the whole system is
//! built around. Events are never updated or deleted by business logic;
//! `provider_event_id` (partial-unique where non-null) is the dedup key.

use crate::schema::campaign_events;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

// =============================================================================
// Closed event vocabulary (spec.md §6)
// =============================================================================

pub const EVENT_SENT: &str = "sent";
pub const EVENT_DELIVERED: &str = "delivered";
pub const EVENT_OPENED: &str = "opened";
pub const EVENT_CLICKED: &str = "clicked";
pub const EVENT_REPLIED: &str = "replied";
pub const EVENT_BOUNCED: &str = "bounced";
pub const EVENT_UNSUBSCRIBED: &str = "unsubscribed";
pub const EVENT_SPAM_REPORTED: &str = "spam_reported";

pub const EVENT_PROFILE_VISITED: &str = "profile_visited";
pub const EVENT_CONNECTION_SENT: &str = "connection_sent";
pub const EVENT_CONNECTION_ACCEPTED: &str = "connection_accepted";
pub const EVENT_CONNECTION_REJECTED: &str = "connection_rejected";
pub const EVENT_MESSAGE_SENT: &str = "message_sent";
pub const EVENT_MESSAGE_READ: &str = "message_read";
pub const EVENT_MESSAGE_REPLIED: &str = "message_replied";
pub const EVENT_VOICE_MESSAGE_SENT: &str = "voice_message_sent";

pub const EVENT_VIDEO_GENERATED: &str = "video_generated";
pub const EVENT_VIDEO_GENERATION_FAILED: &str = "video_generation_failed";
pub const EVENT_VIDEO_VIEWED: &str = "video_viewed";
pub const EVENT_VIDEO_COMPLETED: &str = "video_completed";
pub const EVENT_VIDEO_SHARED: &str = "video_shared";

pub const VALID_EVENT_TYPES: &[&str] = &[
    EVENT_SENT,
    EVENT_DELIVERED,
    EVENT_OPENED,
    EVENT_CLICKED,
    EVENT_REPLIED,
    EVENT_BOUNCED,
    EVENT_UNSUBSCRIBED,
    EVENT_SPAM_REPORTED,
    EVENT_PROFILE_VISITED,
    EVENT_CONNECTION_SENT,
    EVENT_CONNECTION_ACCEPTED,
    EVENT_CONNECTION_REJECTED,
    EVENT_MESSAGE_SENT,
    EVENT_MESSAGE_READ,
    EVENT_MESSAGE_REPLIED,
    EVENT_VOICE_MESSAGE_SENT,
    EVENT_VIDEO_GENERATED,
    EVENT_VIDEO_GENERATION_FAILED,
    EVENT_VIDEO_VIEWED,
    EVENT_VIDEO_COMPLETED,
    EVENT_VIDEO_SHARED,
];

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

/// Counter field on `campaign_instances` that a given event type increments
/// by one, or `None` if the event type carries no counter (spec.md §4.5's
/// counter-delta table).
pub fn counter_field_for_event_type(event_type: &str) -> Option<&'static str> {
    match event_type {
        EVENT_SENT => Some("total_sent"),
        EVENT_DELIVERED => Some("total_delivered"),
        EVENT_OPENED => Some("total_opened"),
        EVENT_CLICKED => Some("total_clicked"),
        EVENT_REPLIED => Some("total_replied"),
        _ => None,
    }
}

// =============================================================================
// CampaignEvent
// =============================================================================

/// A campaign event row from the database. Append-only: never updated,
/// never deleted by business logic.
#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize, Deserialize, ToSchema)]
#[diesel(table_name = campaign_events)]
pub struct CampaignEvent {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub enrollment_id: Option<Uuid>,
    pub instance_id: Option<Uuid>,
    pub event_type: String,
    pub channel: String,
    pub event_timestamp: DateTime<Utc>,
    pub provider: String,
    pub provider_event_id: Option<String>,
    pub provider_message_id: Option<String>,
    pub step_number: Option<i32>,
    pub metadata: serde_json::Value,
    pub video_id: Option<String>,
    pub video_url: Option<String>,
    pub video_status: Option<String>,
    pub video_duration: Option<i32>,
}

impl CampaignEvent {
    pub fn counter_field(&self) -> Option<&'static str> {
        counter_field_for_event_type(&self.event_type)
    }
}

/// A new campaign event to be inserted. This is the canonical output of the
/// event normalizer (`crate::normalizer` in campaign-engine).
#[derive(Debug, Clone, Insertable, Serialize, Deserialize)]
#[diesel(table_name = campaign_events)]
pub struct NewCampaignEvent {
    pub enrollment_id: Option<Uuid>,
    pub instance_id: Option<Uuid>,
    pub event_type: String,
    pub channel: String,
    pub event_timestamp: DateTime<Utc>,
    pub provider: String,
    pub provider_event_id: Option<String>,
    pub provider_message_id: Option<String>,
    pub step_number: Option<i32>,
    pub metadata: serde_json::Value,
    pub video_id: Option<String>,
    pub video_url: Option<String>,
    pub video_status: Option<String>,
    pub video_duration: Option<i32>,
}

#[derive(Debug, Clone, Default)]
pub struct VideoFields {
    pub video_id: Option<String>,
    pub video_url: Option<String>,
    pub video_status: Option<String>,
    pub video_duration: Option<i32>,
}

impl NewCampaignEvent {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        enrollment_id: Option<Uuid>,
        instance_id: Option<Uuid>,
        event_type: String,
        channel: String,
        event_timestamp: DateTime<Utc>,
        provider: String,
        provider_event_id: Option<String>,
        provider_message_id: Option<String>,
        step_number: Option<i32>,
        metadata: serde_json::Value,
        video_fields: VideoFields,
    ) -> Result<Self, String> {
        if !VALID_EVENT_TYPES.contains(&event_type.as_str()) {
            return Err(format!("Invalid event type '{}'", event_type));
        }
        if !VALID_CHANNELS.contains(&channel.as_str()) {
            return Err(format!("Invalid channel '{}'", channel));
        }
        Ok(Self {
            enrollment_id,
            instance_id,
            event_type,
            channel,
            event_timestamp,
            provider,
            provider_event_id,
            provider_message_id,
            step_number,
            metadata,
            video_id: video_fields.video_id,
            video_url: video_fields.video_url,
            video_status: video_fields.video_status,
            video_duration: video_fields.video_duration,
        })
    }
}

/// Outcome of inserting an event, distinguishing the happy path from a
/// dedup hit without ever throwing (spec.md §9's exception-free design note).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventInsertOutcome {
    Inserted(Uuid),
    DuplicateIgnored,
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_field_for_sent() {
        assert_eq!(counter_field_for_event_type(EVENT_SENT), Some("total_sent"));
    }

    #[test]
    fn test_counter_field_for_bounced_is_none() {
        assert_eq!(counter_field_for_event_type(EVENT_BOUNCED), None);
    }

    #[test]
    fn test_counter_field_for_unknown_is_none() {
        assert_eq!(counter_field_for_event_type("made_up"), None);
    }

    #[test]
    fn test_new_event_rejects_invalid_type() {
        let result = NewCampaignEvent::new(
            None,
            None,
            "made_up".to_string(),
            CHANNEL_EMAIL.to_string(),
            Utc::now(),
            "postmark".to_string(),
            Some("evt_1".to_string()),
            None,
            None,
            serde_json::json!({}),
            VideoFields::default(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_new_event_rejects_invalid_channel() {
        let result = NewCampaignEvent::new(
            None,
            None,
            EVENT_SENT.to_string(),
            "carrier_pigeon".to_string(),
            Utc::now(),
            "postmark".to_string(),
            Some("evt_1".to_string()),
            None,
            None,
            serde_json::json!({}),
            VideoFields::default(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_new_event_allows_orphaned_enrollment() {
        let event = NewCampaignEvent::new(
            None,
            None,
            EVENT_OPENED.to_string(),
            CHANNEL_EMAIL.to_string(),
            Utc::now(),
            "postmark".to_string(),
            Some("evt_2".to_string()),
            Some("msg_1".to_string()),
            None,
            serde_json::json!({}),
            VideoFields::default(),
        )
        .unwrap();
        assert!(event.enrollment_id.is_none());
    }
}
