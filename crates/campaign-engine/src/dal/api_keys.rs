/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Data Access Layer for API key operations.
//!
//! Keys are Argon2id-hashed (see `crate::utils::pak`), so unlike the
//! teacher's SHA-256 digest there is no deterministic ciphertext to look up
//! by equality. `list_active` hands the auth middleware every non-revoked
//! key; the middleware verifies the presented key against each hash in turn.
//! The active-key set is expected to stay small (this is a service-to-service
//! admin surface, not a consumer-facing key store), so the linear scan is
//! the practical choice over maintaining a separate unhashed lookup column.

use crate::dal::DAL;
use crate::error::EngineError;
use campaign_models::models::api_keys::{ApiKey, NewApiKey, UpdateApiKey};
use campaign_models::schema::api_keys;
use diesel::prelude::*;
use uuid::Uuid;

/// Data Access Layer for API key operations.
pub struct ApiKeysDAL<'a> {
    /// Reference to the main DAL instance.
    pub dal: &'a DAL,
}

impl ApiKeysDAL<'_> {
    /// Creates a new API key record. `pak_hash` must already be an Argon2id hash.
    pub fn create(&self, new_key: &NewApiKey) -> Result<ApiKey, EngineError> {
        let conn = &mut self.dal.pool.get()?;
        diesel::insert_into(api_keys::table)
            .values(new_key)
            .get_result(conn)
            .map_err(EngineError::from)
    }

    /// Retrieves a key by its UUID.
    pub fn get(&self, id: Uuid) -> Result<Option<ApiKey>, EngineError> {
        let conn = &mut self.dal.pool.get()?;
        api_keys::table
            .filter(api_keys::id.eq(id))
            .first(conn)
            .optional()
            .map_err(EngineError::from)
    }

    /// Lists all keys, most recently created first.
    pub fn list(&self) -> Result<Vec<ApiKey>, EngineError> {
        let conn = &mut self.dal.pool.get()?;
        api_keys::table
            .order(api_keys::created_at.desc())
            .load::<ApiKey>(conn)
            .map_err(EngineError::from)
    }

    /// Lists all non-revoked keys, for the auth middleware to verify against.
    pub fn list_active(&self) -> Result<Vec<ApiKey>, EngineError> {
        let conn = &mut self.dal.pool.get()?;
        api_keys::table
            .filter(api_keys::revoked_at.is_null())
            .load::<ApiKey>(conn)
            .map_err(EngineError::from)
    }

    /// Whether any key at all exists yet, used to gate first-run admin bootstrap.
    pub fn any_exist(&self) -> Result<bool, EngineError> {
        let conn = &mut self.dal.pool.get()?;
        let count: i64 = api_keys::table.count().get_result(conn)?;
        Ok(count > 0)
    }

    /// Records successful authentication (`last_used_at = now`).
    pub fn touch_last_used(&self, id: Uuid) -> Result<ApiKey, EngineError> {
        let conn = &mut self.dal.pool.get()?;
        diesel::update(api_keys::table.filter(api_keys::id.eq(id)))
            .set(&UpdateApiKey::touch_last_used())
            .get_result(conn)
            .map_err(EngineError::from)
    }

    /// Revokes a key.
    pub fn revoke(&self, id: Uuid) -> Result<ApiKey, EngineError> {
        let conn = &mut self.dal.pool.get()?;
        diesel::update(api_keys::table.filter(api_keys::id.eq(id)))
            .set(&UpdateApiKey::revoke())
            .get_result(conn)
            .map_err(EngineError::from)
    }
}
