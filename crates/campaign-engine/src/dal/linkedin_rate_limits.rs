/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Data Access Layer for the per-account LinkedIn daily rate-limit ledger.
//!
//! `claim` is the cap-enforcement primitive from spec.md §4.3: lock the
//! `(account_identifier, date)` row (creating it on first use that day),
//! verify the action would not exceed its cap, and increment atomically — all
//! inside one transaction, mirroring the lock-then-verify-then-mutate shape
//! `dal::enrollments::claim_due` uses for scheduler claims.

use crate::dal::DAL;
use crate::error::EngineError;
use campaign_models::models::linkedin_rate_limits::{
    LinkedInActionKind, LinkedInRateLimit, NewLinkedInRateLimit,
};
use campaign_models::schema::linkedin_rate_limits;
use chrono::NaiveDate;
use diesel::prelude::*;
use uuid::Uuid;

/// Data Access Layer for LinkedIn rate-limit ledger operations.
pub struct LinkedInRateLimitsDAL<'a> {
    /// Reference to the main DAL instance.
    pub dal: &'a DAL,
}

/// Outcome of a claim attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// The action was recorded; the ledger row now reflects it.
    Claimed(LinkedInRateLimit),
    /// The daily cap for this action kind has already been reached.
    CapExceeded,
}

impl LinkedInRateLimitsDAL<'_> {
    /// Fetches today's ledger row for an account, if one has been created yet.
    pub fn get(&self, account_identifier: &str, rate_limit_date: NaiveDate) -> Result<Option<LinkedInRateLimit>, EngineError> {
        let conn = &mut self.dal.pool.get()?;
        linkedin_rate_limits::table
            .filter(linkedin_rate_limits::account_identifier.eq(account_identifier))
            .filter(linkedin_rate_limits::rate_limit_date.eq(rate_limit_date))
            .first(conn)
            .optional()
            .map_err(EngineError::from)
    }

    /// Attempts to claim one `kind` action for `account_identifier` on
    /// `rate_limit_date`, enforcing `cap`.
    ///
    /// Locks the ledger row `FOR UPDATE` for the duration of the check, so
    /// concurrent scheduler workers sending on behalf of the same account
    /// serialize on this row rather than racing past the cap. Creates the row
    /// with zeroed counters if this is the account's first action of the day.
    pub fn claim(
        &self,
        account_identifier: &str,
        timezone: &str,
        rate_limit_date: NaiveDate,
        kind: LinkedInActionKind,
        cap: i32,
    ) -> Result<ClaimOutcome, EngineError> {
        let conn = &mut self.dal.pool.get()?;

        conn.transaction(|conn| {
            let existing: Option<LinkedInRateLimit> = linkedin_rate_limits::table
                .filter(linkedin_rate_limits::account_identifier.eq(account_identifier))
                .filter(linkedin_rate_limits::rate_limit_date.eq(rate_limit_date))
                .for_update()
                .first(conn)
                .optional()?;

            let ledger = match existing {
                Some(ledger) => ledger,
                None => {
                    let new_ledger = NewLinkedInRateLimit::new(
                        account_identifier.to_string(),
                        timezone.to_string(),
                        rate_limit_date,
                    )
                    .map_err(EngineError::Validation)?;
                    diesel::insert_into(linkedin_rate_limits::table)
                        .values(&new_ledger)
                        .get_result(conn)?
                }
            };

            if ledger.would_exceed(kind, cap) {
                return Ok(ClaimOutcome::CapExceeded);
            }

            let query = linkedin_rate_limits::table.filter(linkedin_rate_limits::id.eq(ledger.id));
            let updated: LinkedInRateLimit = match kind {
                LinkedInActionKind::Connection => diesel::update(query)
                    .set(linkedin_rate_limits::connections_sent.eq(linkedin_rate_limits::connections_sent + 1))
                    .get_result(conn)?,
                LinkedInActionKind::Message => diesel::update(query)
                    .set(linkedin_rate_limits::messages_sent.eq(linkedin_rate_limits::messages_sent + 1))
                    .get_result(conn)?,
                LinkedInActionKind::ProfileVisit => diesel::update(query)
                    .set(linkedin_rate_limits::profile_visits.eq(linkedin_rate_limits::profile_visits + 1))
                    .get_result(conn)?,
            };

            Ok(ClaimOutcome::Claimed(updated))
        })
    }

    /// Retrieves a ledger row by its UUID, for admin/diagnostic use.
    pub fn get_by_id(&self, id: Uuid) -> Result<Option<LinkedInRateLimit>, EngineError> {
        let conn = &mut self.dal.pool.get()?;
        linkedin_rate_limits::table
            .filter(linkedin_rate_limits::id.eq(id))
            .first(conn)
            .optional()
            .map_err(EngineError::from)
    }
}
