/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Per-account daily LinkedIn rate-limit ledger. "Today" is always computed
//! in the account's own timezone at action time — never cached — so a
//! ledger row is scoped to `(account_identifier, date)`.

use crate::schema::linkedin_rate_limits;
use chrono::NaiveDate;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkedInActionKind {
    Connection,
    Message,
    ProfileVisit,
}

/// A LinkedIn daily rate-limit ledger row.
#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize, Deserialize, ToSchema)]
#[diesel(table_name = linkedin_rate_limits)]
pub struct LinkedInRateLimit {
    pub id: Uuid,
    pub account_identifier: String,
    pub timezone: String,
    pub rate_limit_date: NaiveDate,
    pub connections_sent: i32,
    pub messages_sent: i32,
    pub profile_visits: i32,
}

impl LinkedInRateLimit {
    pub fn count_for(&self, kind: LinkedInActionKind) -> i32 {
        match kind {
            LinkedInActionKind::Connection => self.connections_sent,
            LinkedInActionKind::Message => self.messages_sent,
            LinkedInActionKind::ProfileVisit => self.profile_visits,
        }
    }

    /// Whether one more action of this kind would exceed `cap`.
    pub fn would_exceed(&self, kind: LinkedInActionKind, cap: i32) -> bool {
        self.count_for(kind) >= cap
    }
}

/// A new ledger row, created on first action of the day for an account.
#[derive(Debug, Clone, Insertable, Serialize, Deserialize)]
#[diesel(table_name = linkedin_rate_limits)]
pub struct NewLinkedInRateLimit {
    pub account_identifier: String,
    pub timezone: String,
    pub rate_limit_date: NaiveDate,
    pub connections_sent: i32,
    pub messages_sent: i32,
    pub profile_visits: i32,
}

impl NewLinkedInRateLimit {
    pub fn new(account_identifier: String, timezone: String, rate_limit_date: NaiveDate) -> Result<Self, String> {
        if account_identifier.trim().is_empty() {
            return Err("account_identifier cannot be empty".to_string());
        }
        if timezone.parse::<chrono_tz::Tz>().is_err() {
            return Err(format!("Invalid IANA timezone '{}'", timezone));
        }
        Ok(Self {
            account_identifier,
            timezone,
            rate_limit_date,
            connections_sent: 0,
            messages_sent: 0,
            profile_visits: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_invalid_timezone() {
        let result = NewLinkedInRateLimit::new(
            "acct-1".to_string(),
            "Mars/Olympus_Mons".to_string(),
            NaiveDate::from_ymd_opt(2026, 7, 28).unwrap(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_new_accepts_valid_timezone() {
        let result = NewLinkedInRateLimit::new(
            "acct-1".to_string(),
            "America/New_York".to_string(),
            NaiveDate::from_ymd_opt(2026, 7, 28).unwrap(),
        );
        assert!(result.is_ok());
    }

    fn ledger(connections: i32) -> LinkedInRateLimit {
        LinkedInRateLimit {
            id: Uuid::new_v4(),
            account_identifier: "acct-1".to_string(),
            timezone: "America/New_York".to_string(),
            rate_limit_date: NaiveDate::from_ymd_opt(2026, 7, 28).unwrap(),
            connections_sent: connections,
            messages_sent: 0,
            profile_visits: 0,
        }
    }

    #[test]
    fn test_would_exceed_at_cap() {
        assert!(ledger(20).would_exceed(LinkedInActionKind::Connection, 20));
    }

    #[test]
    fn test_would_not_exceed_below_cap() {
        assert!(!ledger(19).would_exceed(LinkedInActionKind::Connection, 20));
    }
}
