/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Row structs and insertable/changeset types for every entity in the schema.

pub mod api_keys;
pub mod dead_letter_events;
pub mod enrollments;
pub mod events;
pub mod instances;
pub mod linkedin_rate_limits;
pub mod templates;
pub mod video_generations;
