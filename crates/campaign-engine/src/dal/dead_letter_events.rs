/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Data Access Layer for the dead-letter queue.

use crate::dal::DAL;
use crate::error::EngineError;
use campaign_models::models::dead_letter_events::{
    DeadLetterEvent, DeadLetterStats, NewDeadLetterEvent, UpdateDeadLetterEvent, DLQ_STATUS_FAILED,
};
use campaign_models::schema::dead_letter_events;
use diesel::prelude::*;
use uuid::Uuid;

/// Optional filters for listing/replaying dead-letter entries.
#[derive(Debug, Clone, Default)]
pub struct DeadLetterFilter {
    pub status: Option<String>,
    pub event_type: Option<String>,
    pub channel: Option<String>,
}

/// Data Access Layer for dead-letter queue operations.
pub struct DeadLetterEventsDAL<'a> {
    /// Reference to the main DAL instance.
    pub dal: &'a DAL,
}

impl DeadLetterEventsDAL<'_> {
    /// Writes a new entry, capturing the full original payload and attempt history.
    pub fn create(&self, new_entry: &NewDeadLetterEvent) -> Result<DeadLetterEvent, EngineError> {
        let conn = &mut self.dal.pool.get()?;
        diesel::insert_into(dead_letter_events::table)
            .values(new_entry)
            .get_result(conn)
            .map_err(EngineError::from)
    }

    /// Retrieves a dead-letter entry by its UUID.
    pub fn get(&self, id: Uuid) -> Result<Option<DeadLetterEvent>, EngineError> {
        let conn = &mut self.dal.pool.get()?;
        dead_letter_events::table
            .filter(dead_letter_events::id.eq(id))
            .first(conn)
            .optional()
            .map_err(EngineError::from)
    }

    /// Lists dead-letter entries matching `filter`, most recently created first.
    pub fn list(&self, filter: &DeadLetterFilter) -> Result<Vec<DeadLetterEvent>, EngineError> {
        let conn = &mut self.dal.pool.get()?;
        let mut query = dead_letter_events::table.into_boxed();

        if let Some(ref status) = filter.status {
            query = query.filter(dead_letter_events::status.eq(status.clone()));
        }
        if let Some(ref event_type) = filter.event_type {
            query = query.filter(dead_letter_events::event_type.eq(event_type.clone()));
        }
        if let Some(ref channel) = filter.channel {
            query = query.filter(dead_letter_events::channel.eq(channel.clone()));
        }

        query
            .order(dead_letter_events::created_at.desc())
            .load::<DeadLetterEvent>(conn)
            .map_err(EngineError::from)
    }

    /// Lists only entries still eligible for replay (`failed`).
    pub fn list_failed(&self) -> Result<Vec<DeadLetterEvent>, EngineError> {
        self.list(&DeadLetterFilter {
            status: Some(DLQ_STATUS_FAILED.to_string()),
            ..Default::default()
        })
    }

    /// Marks an entry `replaying`, returning the row the caller should feed
    /// back through the intake pipeline.
    pub fn mark_replaying(&self, id: Uuid) -> Result<DeadLetterEvent, EngineError> {
        let conn = &mut self.dal.pool.get()?;
        diesel::update(dead_letter_events::table.filter(dead_letter_events::id.eq(id)))
            .set(&UpdateDeadLetterEvent::mark_replaying())
            .get_result(conn)
            .map_err(EngineError::from)
    }

    /// Marks an entry `replayed` after the re-run intake pipeline succeeds.
    pub fn mark_replayed(&self, id: Uuid) -> Result<DeadLetterEvent, EngineError> {
        let conn = &mut self.dal.pool.get()?;
        diesel::update(dead_letter_events::table.filter(dead_letter_events::id.eq(id)))
            .set(&UpdateDeadLetterEvent::mark_replayed())
            .get_result(conn)
            .map_err(EngineError::from)
    }

    /// Returns an entry to `failed` with an incremented attempt count after a
    /// replay attempt fails again.
    pub fn mark_failed_again(&self, id: Uuid, attempts: i32) -> Result<DeadLetterEvent, EngineError> {
        let conn = &mut self.dal.pool.get()?;
        diesel::update(dead_letter_events::table.filter(dead_letter_events::id.eq(id)))
            .set(&UpdateDeadLetterEvent::mark_failed_again(attempts))
            .get_result(conn)
            .map_err(EngineError::from)
    }

    /// Marks an entry `ignored`, removing it from future replay sweeps without deleting it.
    pub fn ignore(&self, id: Uuid) -> Result<DeadLetterEvent, EngineError> {
        let conn = &mut self.dal.pool.get()?;
        diesel::update(dead_letter_events::table.filter(dead_letter_events::id.eq(id)))
            .set(&UpdateDeadLetterEvent::mark_ignored())
            .get_result(conn)
            .map_err(EngineError::from)
    }

    /// Retags an entry whose bounded retry window ran out, so it drops out
    /// of future `awaiting_correlation` sweeps while staying in the queue.
    pub fn mark_exhausted(&self, id: Uuid, failure_reason: &str) -> Result<DeadLetterEvent, EngineError> {
        let conn = &mut self.dal.pool.get()?;
        diesel::update(dead_letter_events::table.filter(dead_letter_events::id.eq(id)))
            .set(&UpdateDeadLetterEvent::mark_exhausted(failure_reason))
            .get_result(conn)
            .map_err(EngineError::from)
    }

    /// Aggregate counts per status, for the admin dashboard endpoint.
    pub fn stats(&self) -> Result<DeadLetterStats, EngineError> {
        let conn = &mut self.dal.pool.get()?;
        diesel::sql_query(
            "SELECT
                 COUNT(*) FILTER (WHERE status = 'failed') AS failed,
                 COUNT(*) FILTER (WHERE status = 'replaying') AS replaying,
                 COUNT(*) FILTER (WHERE status = 'replayed') AS replayed,
                 COUNT(*) FILTER (WHERE status = 'ignored') AS ignored
             FROM dead_letter_events",
        )
        .get_result(conn)
        .map_err(EngineError::from)
    }
}
