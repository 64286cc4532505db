/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Data Access Layer for campaign instance operations.
//!
//! Counters (`total_sent`, `total_delivered`, ...) are never read-modify-written
//! in application memory. `increment_counter` issues a single SQL-side
//! `field = field + delta` and returns the updated row, so concurrent webhook
//! deliveries compose correctly without an explicit row lock.

use crate::dal::DAL;
use crate::error::EngineError;
use campaign_models::models::instances::{is_valid_transition, CampaignInstance, NewCampaignInstance, UpdateCampaignInstance};
use campaign_models::schema::campaign_instances;
use diesel::prelude::*;
use diesel::PgConnection;
use uuid::Uuid;

/// Data Access Layer for campaign instance operations.
pub struct InstancesDAL<'a> {
    /// Reference to the main DAL instance.
    pub dal: &'a DAL,
}

impl InstancesDAL<'_> {
    /// Creates a new campaign instance.
    pub fn create(&self, new_instance: &NewCampaignInstance) -> Result<CampaignInstance, EngineError> {
        let conn = &mut self.dal.pool.get()?;
        diesel::insert_into(campaign_instances::table)
            .values(new_instance)
            .get_result(conn)
            .map_err(EngineError::from)
    }

    /// Retrieves an instance by its UUID.
    pub fn get(&self, instance_id: Uuid) -> Result<Option<CampaignInstance>, EngineError> {
        let conn = &mut self.dal.pool.get()?;
        campaign_instances::table
            .filter(campaign_instances::id.eq(instance_id))
            .first(conn)
            .optional()
            .map_err(EngineError::from)
    }

    /// Lists all instances, most recently created first.
    pub fn list(&self) -> Result<Vec<CampaignInstance>, EngineError> {
        let conn = &mut self.dal.pool.get()?;
        campaign_instances::table
            .order(campaign_instances::created_at.desc())
            .load::<CampaignInstance>(conn)
            .map_err(EngineError::from)
    }

    /// Lists instances in a given status, used by the scheduler to find active campaigns.
    pub fn list_by_status(&self, status: &str) -> Result<Vec<CampaignInstance>, EngineError> {
        let conn = &mut self.dal.pool.get()?;
        campaign_instances::table
            .filter(campaign_instances::status.eq(status))
            .load::<CampaignInstance>(conn)
            .map_err(EngineError::from)
    }

    /// Applies a status/lifecycle-timestamp changeset after validating the transition.
    ///
    /// Returns `EngineError::InvalidTransition` without touching the database
    /// if `current.status -> changeset.status` is not allowed.
    pub fn transition(
        &self,
        instance_id: Uuid,
        new_status: &str,
        changeset: &UpdateCampaignInstance,
    ) -> Result<CampaignInstance, EngineError> {
        let conn = &mut self.dal.pool.get()?;
        let current: CampaignInstance = campaign_instances::table
            .filter(campaign_instances::id.eq(instance_id))
            .first(conn)
            .optional()?
            .ok_or_else(|| EngineError::NotFound(format!("campaign instance {instance_id}")))?;

        if !is_valid_transition(&current.status, new_status) {
            return Err(EngineError::InvalidTransition(format!(
                "{} -> {}",
                current.status, new_status
            )));
        }

        diesel::update(campaign_instances::table.filter(campaign_instances::id.eq(instance_id)))
            .set(changeset)
            .get_result(conn)
            .map_err(EngineError::from)
    }

    /// Atomically increments a single counter field by `delta` and returns the updated row.
    pub fn increment_counter(
        &self,
        instance_id: Uuid,
        field: &str,
        delta: i32,
    ) -> Result<CampaignInstance, EngineError> {
        let conn = &mut self.dal.pool.get()?;
        Self::increment_counter_with_conn(conn, instance_id, field, delta)
    }

    /// Same as [`increment_counter`](Self::increment_counter) but runs against a
    /// caller-supplied connection, so the webhook-intake recipe in
    /// `dal::events` can compose it into the same transaction as the event
    /// insert.
    ///
    /// `field` must be one of the six `total_*` columns; anything else is a
    /// programmer error caught by the `match`, never passed through to SQL.
    pub fn increment_counter_with_conn(
        conn: &mut PgConnection,
        instance_id: Uuid,
        field: &str,
        delta: i32,
    ) -> Result<CampaignInstance, EngineError> {
        if delta == 0 {
            return campaign_instances::table
                .filter(campaign_instances::id.eq(instance_id))
                .first(conn)
                .optional()?
                .ok_or_else(|| EngineError::NotFound(format!("campaign instance {instance_id}")));
        }

        let query = campaign_instances::table.filter(campaign_instances::id.eq(instance_id));

        let result = match field {
            "total_enrolled" => diesel::update(query)
                .set(campaign_instances::total_enrolled.eq(campaign_instances::total_enrolled + delta))
                .get_result(conn),
            "total_sent" => diesel::update(query)
                .set(campaign_instances::total_sent.eq(campaign_instances::total_sent + delta))
                .get_result(conn),
            "total_delivered" => diesel::update(query)
                .set(campaign_instances::total_delivered.eq(campaign_instances::total_delivered + delta))
                .get_result(conn),
            "total_opened" => diesel::update(query)
                .set(campaign_instances::total_opened.eq(campaign_instances::total_opened + delta))
                .get_result(conn),
            "total_clicked" => diesel::update(query)
                .set(campaign_instances::total_clicked.eq(campaign_instances::total_clicked + delta))
                .get_result(conn),
            "total_replied" => diesel::update(query)
                .set(campaign_instances::total_replied.eq(campaign_instances::total_replied + delta))
                .get_result(conn),
            other => return Err(EngineError::Internal(format!("unknown counter field '{other}'"))),
        };

        result.map_err(EngineError::from)
    }
}
