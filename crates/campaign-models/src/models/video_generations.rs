/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Outstanding video asset tracking for the video provider (e.g. HeyGen).

use crate::schema::video_generations;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

pub const VIDEO_STATUS_PENDING: &str = "pending";
pub const VIDEO_STATUS_PROCESSING: &str = "processing";
pub const VIDEO_STATUS_COMPLETED: &str = "completed";
pub const VIDEO_STATUS_FAILED: &str = "failed";

pub const VALID_VIDEO_STATUSES: &[&str] = &[
    VIDEO_STATUS_PENDING,
    VIDEO_STATUS_PROCESSING,
    VIDEO_STATUS_COMPLETED,
    VIDEO_STATUS_FAILED,
];

pub fn is_terminal_video_status(status: &str) -> bool {
    matches!(status, VIDEO_STATUS_COMPLETED | VIDEO_STATUS_FAILED)
}

/// A video generation row.
#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize, Deserialize, ToSchema)]
#[diesel(table_name = video_generations)]
pub struct VideoGeneration {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub provider_video_id: String,
    pub status: String,
    pub enrollment_id: Option<Uuid>,
    pub instance_id: Option<Uuid>,
    pub video_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub attempts: i32,
    pub cost_credits: Option<i32>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// A new video generation record, created when a video send kicks off an
/// async render job at the provider.
#[derive(Debug, Clone, Insertable, Serialize, Deserialize)]
#[diesel(table_name = video_generations)]
pub struct NewVideoGeneration {
    pub provider_video_id: String,
    pub status: String,
    pub enrollment_id: Option<Uuid>,
    pub instance_id: Option<Uuid>,
    pub attempts: i32,
    pub cost_credits: Option<i32>,
}

impl NewVideoGeneration {
    pub fn new(
        provider_video_id: String,
        enrollment_id: Option<Uuid>,
        instance_id: Option<Uuid>,
        cost_credits: Option<i32>,
    ) -> Result<Self, String> {
        if provider_video_id.trim().is_empty() {
            return Err("provider_video_id cannot be empty".to_string());
        }
        Ok(Self {
            provider_video_id,
            status: VIDEO_STATUS_PENDING.to_string(),
            enrollment_id,
            instance_id,
            attempts: 0,
            cost_credits,
        })
    }
}

/// Changeset applied when a video webhook (or polled status check) reports progress.
#[derive(Debug, Clone, Default, AsChangeset)]
#[diesel(table_name = video_generations)]
pub struct UpdateVideoGeneration {
    pub status: Option<String>,
    pub video_url: Option<Option<String>>,
    pub thumbnail_url: Option<Option<String>>,
    pub attempts: Option<i32>,
    pub completed_at: Option<Option<DateTime<Utc>>>,
}

impl UpdateVideoGeneration {
    pub fn completed(video_url: String, thumbnail_url: Option<String>) -> Self {
        Self {
            status: Some(VIDEO_STATUS_COMPLETED.to_string()),
            video_url: Some(Some(video_url)),
            thumbnail_url: Some(thumbnail_url),
            completed_at: Some(Some(Utc::now())),
            ..Default::default()
        }
    }

    pub fn failed() -> Self {
        Self {
            status: Some(VIDEO_STATUS_FAILED.to_string()),
            completed_at: Some(Some(Utc::now())),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_empty_provider_id() {
        assert!(NewVideoGeneration::new("".to_string(), None, None, None).is_err());
    }

    #[test]
    fn test_new_starts_pending() {
        let video = NewVideoGeneration::new("hg_123".to_string(), None, None, Some(10)).unwrap();
        assert_eq!(video.status, VIDEO_STATUS_PENDING);
        assert_eq!(video.attempts, 0);
    }

    #[test]
    fn test_is_terminal_video_status() {
        assert!(is_terminal_video_status(VIDEO_STATUS_COMPLETED));
        assert!(is_terminal_video_status(VIDEO_STATUS_FAILED));
        assert!(!is_terminal_video_status(VIDEO_STATUS_PROCESSING));
    }

    #[test]
    fn test_completed_changeset_sets_completed_at() {
        let changeset = UpdateVideoGeneration::completed("https://cdn/video.mp4".to_string(), None);
        assert_eq!(changeset.status, Some(VIDEO_STATUS_COMPLETED.to_string()));
        assert!(changeset.completed_at.flatten().is_some());
    }
}
