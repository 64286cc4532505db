/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Data Access Layer for campaign enrollment operations.
//!
//! `claim_due` is the scheduler's entry point: `SELECT ... FOR UPDATE SKIP
//! LOCKED` so that several scheduler workers (or processes) can tick
//! concurrently without double-picking the same enrollment.

use crate::dal::DAL;
use crate::error::EngineError;
use campaign_models::models::enrollments::{CampaignEnrollment, NewCampaignEnrollment, UpdateCampaignEnrollment};
use campaign_models::schema::campaign_enrollments;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::PgConnection;
use uuid::Uuid;

/// Data Access Layer for campaign enrollment operations.
pub struct EnrollmentsDAL<'a> {
    /// Reference to the main DAL instance.
    pub dal: &'a DAL,
}

impl EnrollmentsDAL<'_> {
    /// Creates a new enrollment, due immediately.
    pub fn create(&self, new_enrollment: &NewCampaignEnrollment) -> Result<CampaignEnrollment, EngineError> {
        let conn = &mut self.dal.pool.get()?;
        diesel::insert_into(campaign_enrollments::table)
            .values(new_enrollment)
            .get_result(conn)
            .map_err(EngineError::from)
    }

    /// Retrieves an enrollment by its UUID.
    pub fn get(&self, enrollment_id: Uuid) -> Result<Option<CampaignEnrollment>, EngineError> {
        let conn = &mut self.dal.pool.get()?;
        campaign_enrollments::table
            .filter(campaign_enrollments::id.eq(enrollment_id))
            .first(conn)
            .optional()
            .map_err(EngineError::from)
    }

    /// Lists all enrollments for an instance, most recently enrolled first.
    pub fn list_for_instance(&self, instance_id: Uuid) -> Result<Vec<CampaignEnrollment>, EngineError> {
        let conn = &mut self.dal.pool.get()?;
        campaign_enrollments::table
            .filter(campaign_enrollments::instance_id.eq(instance_id))
            .order(campaign_enrollments::enrolled_at.desc())
            .load::<CampaignEnrollment>(conn)
            .map_err(EngineError::from)
    }

    /// Resolves an enrollment by the provider's correlation identifier, checking
    /// `provider_message_id` first and falling back to `provider_action_id`.
    ///
    /// Used by the normalizer to attach `enrollment_id`/`instance_id` to an
    /// incoming webhook event. Returns `None` on a miss (the event is orphaned).
    pub fn find_by_provider_correlation_id(
        &self,
        provider_message_id: Option<&str>,
        provider_action_id: Option<&str>,
    ) -> Result<Option<CampaignEnrollment>, EngineError> {
        let conn = &mut self.dal.pool.get()?;

        if let Some(message_id) = provider_message_id {
            if let Some(found) = campaign_enrollments::table
                .filter(campaign_enrollments::provider_message_id.eq(message_id))
                .first::<CampaignEnrollment>(conn)
                .optional()?
            {
                return Ok(Some(found));
            }
        }

        if let Some(action_id) = provider_action_id {
            return campaign_enrollments::table
                .filter(campaign_enrollments::provider_action_id.eq(action_id))
                .first::<CampaignEnrollment>(conn)
                .optional()
                .map_err(EngineError::from);
        }

        Ok(None)
    }

    /// Claims up to `batch_size` enrollments due for scheduling as of `now`,
    /// locking each row `FOR UPDATE SKIP LOCKED` so a concurrent scheduler
    /// worker never picks the same row twice.
    ///
    /// Must be called inside a transaction the caller owns, since the row
    /// locks are only meaningful for the lifetime of that transaction.
    pub fn claim_due(
        &self,
        conn: &mut PgConnection,
        now: DateTime<Utc>,
        batch_size: i64,
    ) -> Result<Vec<CampaignEnrollment>, EngineError> {
        campaign_enrollments::table
            .filter(
                campaign_enrollments::status
                    .eq_any(["enrolled", "active"])
                    .and(campaign_enrollments::next_action_at.le(now)),
            )
            .order(campaign_enrollments::next_action_at.asc())
            .limit(batch_size)
            .for_update()
            .skip_locked()
            .load::<CampaignEnrollment>(conn)
            .map_err(EngineError::from)
    }

    /// Runs `body` inside a transaction on a dedicated connection, handing it
    /// a `&mut PgConnection` suitable for `claim_due`'s row locking.
    pub fn with_transaction<T>(
        &self,
        body: impl FnOnce(&mut PgConnection) -> Result<T, EngineError>,
    ) -> Result<T, EngineError> {
        let conn = &mut self.dal.pool.get()?;
        conn.transaction(body)
    }

    /// Applies an arbitrary changeset to an enrollment (scheduler step advance,
    /// webhook-intake terminal-status update, ...).
    pub fn update(
        &self,
        enrollment_id: Uuid,
        changeset: &UpdateCampaignEnrollment,
    ) -> Result<CampaignEnrollment, EngineError> {
        let conn = &mut self.dal.pool.get()?;
        diesel::update(campaign_enrollments::table.filter(campaign_enrollments::id.eq(enrollment_id)))
            .set(changeset)
            .get_result(conn)
            .map_err(EngineError::from)
    }

    /// Same as [`update`](Self::update) but runs against a caller-supplied
    /// connection, for use inside the scheduler's claim transaction.
    pub fn update_with_conn(
        &self,
        conn: &mut PgConnection,
        enrollment_id: Uuid,
        changeset: &UpdateCampaignEnrollment,
    ) -> Result<CampaignEnrollment, EngineError> {
        diesel::update(campaign_enrollments::table.filter(campaign_enrollments::id.eq(enrollment_id)))
            .set(changeset)
            .get_result(conn)
            .map_err(EngineError::from)
    }
}
