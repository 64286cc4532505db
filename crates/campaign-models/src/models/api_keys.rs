/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! API key models. The plaintext key is never stored — only a memory-hard
//! hash of it, generated by `campaign-engine`'s `utils::pak` module.

use crate::schema::api_keys;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// An API key row. `pak_hash` is an Argon2id hash of the full prefixed key,
/// never the plaintext.
#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize, Deserialize, ToSchema)]
#[diesel(table_name = api_keys)]
pub struct ApiKey {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub name: String,
    #[serde(skip_serializing)]
    pub pak_hash: String,
    pub is_admin: bool,
    pub last_used_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl ApiKey {
    pub fn is_active(&self) -> bool {
        self.revoked_at.is_none()
    }
}

/// A new API key to be inserted.
#[derive(Debug, Clone, Insertable, Serialize, Deserialize)]
#[diesel(table_name = api_keys)]
pub struct NewApiKey {
    pub name: String,
    pub pak_hash: String,
    pub is_admin: bool,
}

impl NewApiKey {
    pub fn new(name: String, pak_hash: String, is_admin: bool) -> Result<Self, String> {
        if name.trim().is_empty() {
            return Err("Name cannot be empty".to_string());
        }
        if pak_hash.trim().is_empty() {
            return Err("pak_hash cannot be empty".to_string());
        }
        Ok(Self { name, pak_hash, is_admin })
    }
}

/// Changeset applied on successful auth (`last_used_at`) or revocation.
#[derive(Debug, Clone, Default, AsChangeset)]
#[diesel(table_name = api_keys)]
pub struct UpdateApiKey {
    pub last_used_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<Option<DateTime<Utc>>>,
}

impl UpdateApiKey {
    pub fn touch_last_used() -> Self {
        Self {
            last_used_at: Some(Utc::now()),
            ..Default::default()
        }
    }

    pub fn revoke() -> Self {
        Self {
            revoked_at: Some(Some(Utc::now())),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_empty_name() {
        assert!(NewApiKey::new("".to_string(), "hash".to_string(), false).is_err());
    }

    #[test]
    fn test_new_rejects_empty_hash() {
        assert!(NewApiKey::new("ci key".to_string(), "".to_string(), false).is_err());
    }

    #[test]
    fn test_is_active() {
        let key = ApiKey {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            name: "ci".to_string(),
            pak_hash: "hash".to_string(),
            is_admin: false,
            last_used_at: None,
            revoked_at: None,
        };
        assert!(key.is_active());
    }
}
