/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Data Access Layer for campaign event operations.
//!
//! `record` is the transactional recipe shared by the webhook intake handler
//! and the scheduler's post-send bookkeeping: insert the event, resolve
//! `UniqueViolation` on `provider_event_id` as an idempotent no-op, apply the
//! counter-delta table in the same transaction, and close out a terminal
//! enrollment status. Nothing here ever reads a counter back into memory to
//! recompute it.

use crate::dal::instances::InstancesDAL;
use crate::dal::DAL;
use crate::error::EngineError;
use campaign_models::models::events::{counter_field_for_event_type, CampaignEvent, EventInsertOutcome, NewCampaignEvent};
use campaign_models::models::enrollments::UpdateCampaignEnrollment;
use campaign_models::schema::{campaign_enrollments, campaign_events};
use chrono::{DateTime, Utc};
use diesel::dsl::count_star;
use diesel::prelude::*;
use diesel::PgConnection;
use uuid::Uuid;

/// Data Access Layer for campaign event operations.
pub struct EventsDAL<'a> {
    /// Reference to the main DAL instance.
    pub dal: &'a DAL,
}

impl EventsDAL<'_> {
    /// Retrieves an event by its UUID.
    pub fn get(&self, event_id: Uuid) -> Result<Option<CampaignEvent>, EngineError> {
        let conn = &mut self.dal.pool.get()?;
        campaign_events::table
            .filter(campaign_events::id.eq(event_id))
            .first(conn)
            .optional()
            .map_err(EngineError::from)
    }

    /// Lists events for an enrollment, oldest first.
    pub fn list_for_enrollment(&self, enrollment_id: Uuid) -> Result<Vec<CampaignEvent>, EngineError> {
        let conn = &mut self.dal.pool.get()?;
        campaign_events::table
            .filter(campaign_events::enrollment_id.eq(enrollment_id))
            .order(campaign_events::event_timestamp.asc())
            .load::<CampaignEvent>(conn)
            .map_err(EngineError::from)
    }

    /// Counts `event_type` events recorded for `instance_id` at or after
    /// `since` — the instance daily send cap's actual ledger. Unlike
    /// `total_sent` on `campaign_instances`, which accumulates for the
    /// instance's entire lifetime, this resets naturally every time `since`
    /// advances to a new day, so a saturated cap clears at the next
    /// rollover instead of stalling the campaign forever.
    pub fn count_since(&self, instance_id: Uuid, event_type: &str, since: DateTime<Utc>) -> Result<i64, EngineError> {
        let conn = &mut self.dal.pool.get()?;
        campaign_events::table
            .filter(campaign_events::instance_id.eq(instance_id))
            .filter(campaign_events::event_type.eq(event_type))
            .filter(campaign_events::event_timestamp.ge(since))
            .select(count_star())
            .first(conn)
            .map_err(EngineError::from)
    }

    /// Records a normalized event: the spec.md §4.5 transactional recipe.
    ///
    /// Runs in a single read-committed transaction on a fresh pooled
    /// connection:
    /// 1. `INSERT ... RETURNING id`. A `UniqueViolation` on `provider_event_id`
    ///    is treated as a duplicate delivery, not an error: the transaction
    ///    commits as a no-op and `DuplicateIgnored` is returned.
    /// 2. If the event carries an `enrollment_id`, one SQL-side
    ///    `field = field + 1` update per non-zero counter delta.
    /// 3. If the event type is terminal (`bounced`/`unsubscribed`), the
    ///    enrollment's status changeset is applied in the same transaction.
    pub fn record(&self, new_event: &NewCampaignEvent) -> Result<EventInsertOutcome, EngineError> {
        let conn = &mut self.dal.pool.get()?;
        conn.transaction(|conn| Self::record_with_conn(conn, new_event))
    }

    /// Same as [`record`](Self::record) but runs against a connection the
    /// caller already holds inside its own transaction — used by the
    /// scheduler, which must commit the `sent` event alongside its own
    /// enrollment-advance update atomically.
    pub fn record_with_conn(
        conn: &mut PgConnection,
        new_event: &NewCampaignEvent,
    ) -> Result<EventInsertOutcome, EngineError> {
        let inserted: Result<CampaignEvent, diesel::result::Error> = diesel::insert_into(campaign_events::table)
            .values(new_event)
            .get_result(conn);

        let event = match inserted {
            Ok(event) => event,
            Err(diesel::result::Error::DatabaseError(diesel::result::DatabaseErrorKind::UniqueViolation, _)) => {
                return Ok(EventInsertOutcome::DuplicateIgnored);
            }
            Err(other) => return Err(EngineError::from(other)),
        };

        if let Some(instance_id) = event.instance_id {
            if let Some(field) = counter_field_for_event_type(&event.event_type) {
                InstancesDAL::increment_counter_with_conn(conn, instance_id, field, 1)?;
            }
        }

        if let Some(enrollment_id) = event.enrollment_id {
            if let Some(terminal_status) = terminal_status_for_event_type(&event.event_type) {
                let changeset = UpdateCampaignEnrollment::terminal(terminal_status);
                diesel::update(campaign_enrollments::table.filter(campaign_enrollments::id.eq(enrollment_id)))
                    .set(&changeset)
                    .execute(conn)
                    .map_err(EngineError::from)?;
            }
        }

        Ok(EventInsertOutcome::Inserted(event.id))
    }
}

/// Maps a terminal webhook event type to the enrollment status it forces,
/// per spec.md §4.5 step 7. `None` for any event that does not close out
/// the enrollment.
fn terminal_status_for_event_type(event_type: &str) -> Option<&'static str> {
    use campaign_models::models::enrollments::{ENROLLMENT_STATUS_BOUNCED, ENROLLMENT_STATUS_UNSUBSCRIBED};
    use campaign_models::models::events::{EVENT_BOUNCED, EVENT_UNSUBSCRIBED};

    match event_type {
        EVENT_BOUNCED => Some(ENROLLMENT_STATUS_BOUNCED),
        EVENT_UNSUBSCRIBED => Some(ENROLLMENT_STATUS_UNSUBSCRIBED),
        _ => None,
    }
}
