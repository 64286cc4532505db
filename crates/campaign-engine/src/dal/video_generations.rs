/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Data Access Layer for video generation tracking (the video provider's
//! async render jobs).

use crate::dal::DAL;
use crate::error::EngineError;
use campaign_models::models::video_generations::{NewVideoGeneration, UpdateVideoGeneration, VideoGeneration};
use campaign_models::schema::video_generations;
use diesel::prelude::*;
use uuid::Uuid;

/// Data Access Layer for video generation operations.
pub struct VideoGenerationsDAL<'a> {
    /// Reference to the main DAL instance.
    pub dal: &'a DAL,
}

impl VideoGenerationsDAL<'_> {
    /// Records a new outstanding video render job.
    pub fn create(&self, new_video: &NewVideoGeneration) -> Result<VideoGeneration, EngineError> {
        let conn = &mut self.dal.pool.get()?;
        diesel::insert_into(video_generations::table)
            .values(new_video)
            .get_result(conn)
            .map_err(EngineError::from)
    }

    /// Retrieves a video generation row by its UUID.
    pub fn get(&self, id: Uuid) -> Result<Option<VideoGeneration>, EngineError> {
        let conn = &mut self.dal.pool.get()?;
        video_generations::table
            .filter(video_generations::id.eq(id))
            .first(conn)
            .optional()
            .map_err(EngineError::from)
    }

    /// Looks up a render job by the provider's own video identifier, used
    /// when a video webhook reports a status change.
    pub fn find_by_provider_video_id(&self, provider_video_id: &str) -> Result<Option<VideoGeneration>, EngineError> {
        let conn = &mut self.dal.pool.get()?;
        video_generations::table
            .filter(video_generations::provider_video_id.eq(provider_video_id))
            .first(conn)
            .optional()
            .map_err(EngineError::from)
    }

    /// Lists outstanding (non-terminal) render jobs for an enrollment.
    pub fn list_for_enrollment(&self, enrollment_id: Uuid) -> Result<Vec<VideoGeneration>, EngineError> {
        let conn = &mut self.dal.pool.get()?;
        video_generations::table
            .filter(video_generations::enrollment_id.eq(enrollment_id))
            .order(video_generations::created_at.desc())
            .load::<VideoGeneration>(conn)
            .map_err(EngineError::from)
    }

    /// Applies a status-progress changeset (completed/failed/attempt bump).
    pub fn update(&self, id: Uuid, changeset: &UpdateVideoGeneration) -> Result<VideoGeneration, EngineError> {
        let conn = &mut self.dal.pool.get()?;
        diesel::update(video_generations::table.filter(video_generations::id.eq(id)))
            .set(changeset)
            .get_result(conn)
            .map_err(EngineError::from)
    }
}
