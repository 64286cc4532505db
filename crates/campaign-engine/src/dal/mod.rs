/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! # Data Access Layer (DAL) Module
//!
//! This module provides an abstraction layer for database operations in the
//! campaign engine. Each entity gets a typed accessor built once from a
//! shared connection pool and handed out by reference, following the same
//! "one accessor per concern" shape used throughout this crate.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use campaign_engine::dal::DAL;
//! use campaign_engine::db::create_shared_connection_pool;
//!
//! let pool = create_shared_connection_pool("database_url", "campaign", 5, None);
//! let dal = DAL::new(pool);
//! let templates = dal.templates().list().expect("Failed to list templates");
//! ```

use crate::db::ConnectionPool;

pub mod api_keys;
use api_keys::ApiKeysDAL;

pub mod templates;
use templates::TemplatesDAL;

pub mod instances;
use instances::InstancesDAL;

pub mod enrollments;
use enrollments::EnrollmentsDAL;

pub mod events;
use events::EventsDAL;

pub mod linkedin_rate_limits;
use linkedin_rate_limits::LinkedInRateLimitsDAL;

pub mod dead_letter_events;
use dead_letter_events::DeadLetterEventsDAL;

pub mod video_generations;
use video_generations::VideoGenerationsDAL;

/// The main Data Access Layer struct.
///
/// Holds the connection pool and hands out a typed accessor per entity.
/// Cheap to clone: the pool itself is reference-counted internally.
#[derive(Clone)]
pub struct DAL {
    /// Connection pool for PostgreSQL, with optional schema routing.
    pub pool: ConnectionPool,
}

impl DAL {
    /// Creates a new DAL instance with the given connection pool.
    pub fn new(pool: ConnectionPool) -> Self {
        DAL { pool }
    }

    pub fn api_keys(&self) -> ApiKeysDAL {
        ApiKeysDAL { dal: self }
    }

    pub fn templates(&self) -> TemplatesDAL {
        TemplatesDAL { dal: self }
    }

    pub fn instances(&self) -> InstancesDAL {
        InstancesDAL { dal: self }
    }

    pub fn enrollments(&self) -> EnrollmentsDAL {
        EnrollmentsDAL { dal: self }
    }

    pub fn events(&self) -> EventsDAL {
        EventsDAL { dal: self }
    }

    pub fn linkedin_rate_limits(&self) -> LinkedInRateLimitsDAL {
        LinkedInRateLimitsDAL { dal: self }
    }

    pub fn dead_letter_events(&self) -> DeadLetterEventsDAL {
        DeadLetterEventsDAL { dal: self }
    }

    pub fn video_generations(&self) -> VideoGenerationsDAL {
        VideoGenerationsDAL { dal: self }
    }
}
