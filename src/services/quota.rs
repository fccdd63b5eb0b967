// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Quota ledger: entitlement checks and consumption accounting.
//!
//! The ledger answers "may this user do X right now" from the free-tier
//! base, any active story-pack windows, and the user's monthly counters.
//! It only reads and increments counters; the monthly zeroing belongs to an
//! external trigger.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::QuotaConfig;
use crate::db::FirestoreDb;
use crate::error::AppError;
use crate::models::quota::{decide, Limits, QuotaAction, QuotaDecision};
use crate::models::User;

/// All four counters with their effective limits, for the dashboard.
#[derive(Debug, Serialize)]
pub struct UsageSummary {
    pub as_of: DateTime<Utc>,
    pub actions: Vec<QuotaDecision>,
}

pub struct QuotaLedger {
    db: FirestoreDb,
    config: QuotaConfig,
}

impl QuotaLedger {
    pub fn new(db: FirestoreDb, config: QuotaConfig) -> Self {
        Self { db, config }
    }

    /// Effective limits for a user at `as_of`.
    pub fn limits_for(&self, user: &User, as_of: DateTime<Utc>) -> Limits {
        Limits::compute(&user.purchase_history, as_of, &self.config)
    }

    /// Decide whether `action` is currently allowed.
    pub fn can_perform(&self, user: &User, action: QuotaAction, now: DateTime<Utc>) -> QuotaDecision {
        decide(action, &user.usage, &self.limits_for(user, now))
    }

    /// Like [`can_perform`](Self::can_perform) but maps a denial to
    /// `QuotaExceeded` carrying usage and limit.
    pub fn ensure_allowed(
        &self,
        user: &User,
        action: QuotaAction,
        now: DateTime<Utc>,
    ) -> Result<QuotaDecision, AppError> {
        let decision = self.can_perform(user, action, now);
        if decision.allowed {
            Ok(decision)
        } else {
            Err(AppError::QuotaExceeded {
                action: action.as_str(),
                current_usage: decision.current_usage,
                limit: decision.limit,
            })
        }
    }

    /// Consume one unit for `action` via an atomic store increment.
    ///
    /// Used for consumption that is not already folded into a state
    /// transition's transaction.
    pub async fn record_consumption(
        &self,
        user_id: &str,
        action: QuotaAction,
    ) -> Result<(), AppError> {
        self.db.increment_usage(user_id, action).await
    }

    /// Current usage and limits across all quota-gated actions.
    pub fn usage_summary(&self, user: &User, now: DateTime<Utc>) -> UsageSummary {
        let actions = [
            QuotaAction::CreateStory,
            QuotaAction::UploadAssessment,
            QuotaAction::AttemptAssessment,
            QuotaAction::EnterCompetition,
        ]
        .into_iter()
        .map(|action| self.can_perform(user, action, now))
        .collect();

        UsageSummary {
            as_of: now,
            actions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::{Role, UsageCounters};

    fn make_user(stories_created: u32) -> User {
        User {
            user_id: "child-1".to_string(),
            role: Role::Child,
            age: Some(9),
            purchase_history: vec![],
            usage: UsageCounters {
                stories_created,
                ..Default::default()
            },
            created_at: "2025-01-01T00:00:00Z".to_string(),
        }
    }

    fn ledger() -> QuotaLedger {
        QuotaLedger::new(FirestoreDb::new_mock(), QuotaConfig::default())
    }

    #[test]
    fn test_denied_at_free_tier_limit() {
        let decision = ledger().can_perform(&make_user(3), QuotaAction::CreateStory, Utc::now());
        assert!(!decision.allowed);
        assert_eq!(decision.current_usage, 3);
        assert_eq!(decision.limit, 3);
    }

    #[test]
    fn test_ensure_allowed_maps_to_quota_exceeded() {
        let err = ledger()
            .ensure_allowed(&make_user(3), QuotaAction::CreateStory, Utc::now())
            .unwrap_err();
        match err {
            AppError::QuotaExceeded {
                action,
                current_usage,
                limit,
            } => {
                assert_eq!(action, "create_story");
                assert_eq!(current_usage, 3);
                assert_eq!(limit, 3);
            }
            other => panic!("expected QuotaExceeded, got {:?}", other),
        }
    }

    #[test]
    fn test_usage_summary_covers_all_actions() {
        let summary = ledger().usage_summary(&make_user(1), Utc::now());
        assert_eq!(summary.actions.len(), 4);
        assert!(summary.actions.iter().all(|d| d.allowed));
    }
}
