/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Data Access Layer for campaign template operations.

use crate::dal::DAL;
use crate::error::EngineError;
use campaign_models::models::templates::{CampaignTemplate, NewCampaignTemplate, UpdateCampaignTemplate};
use campaign_models::schema::campaign_templates;
use diesel::prelude::*;
use uuid::Uuid;

/// Data Access Layer for campaign template operations.
pub struct TemplatesDAL<'a> {
    /// Reference to the main DAL instance.
    pub dal: &'a DAL,
}

impl TemplatesDAL<'_> {
    /// Creates a new campaign template.
    pub fn create(&self, new_template: &NewCampaignTemplate) -> Result<CampaignTemplate, EngineError> {
        let conn = &mut self.dal.pool.get()?;
        diesel::insert_into(campaign_templates::table)
            .values(new_template)
            .get_result(conn)
            .map_err(EngineError::from)
    }

    /// Retrieves a template by its UUID.
    pub fn get(&self, template_id: Uuid) -> Result<Option<CampaignTemplate>, EngineError> {
        let conn = &mut self.dal.pool.get()?;
        campaign_templates::table
            .filter(campaign_templates::id.eq(template_id))
            .first(conn)
            .optional()
            .map_err(EngineError::from)
    }

    /// Lists all templates, most recently created first.
    pub fn list(&self) -> Result<Vec<CampaignTemplate>, EngineError> {
        let conn = &mut self.dal.pool.get()?;
        campaign_templates::table
            .order(campaign_templates::created_at.desc())
            .load::<CampaignTemplate>(conn)
            .map_err(EngineError::from)
    }

    /// Lists only active templates, usable when building new instances.
    pub fn list_active(&self) -> Result<Vec<CampaignTemplate>, EngineError> {
        let conn = &mut self.dal.pool.get()?;
        campaign_templates::table
            .filter(campaign_templates::is_active.eq(true))
            .order(campaign_templates::created_at.desc())
            .load::<CampaignTemplate>(conn)
            .map_err(EngineError::from)
    }

    /// Applies an `is_active` changeset to a template.
    pub fn update(
        &self,
        template_id: Uuid,
        changeset: &UpdateCampaignTemplate,
    ) -> Result<CampaignTemplate, EngineError> {
        let conn = &mut self.dal.pool.get()?;
        diesel::update(campaign_templates::table.filter(campaign_templates::id.eq(template_id)))
            .set(changeset)
            .get_result(conn)
            .map_err(EngineError::from)
    }
}
