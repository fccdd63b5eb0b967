// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Pure quota math for the entitlement ledger.
//!
//! Effective limits are a free-tier base plus time-boxed purchase bonuses.
//! A story pack contributes for `purchase_window_days` from its purchase
//! timestamp and nothing afterwards; history is never pruned. The result is
//! deterministic and independent of purchase-list order.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::config::QuotaConfig;
use crate::models::user::{Purchase, PurchaseType, UsageCounters};

/// Quota-gated user actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotaAction {
    CreateStory,
    UploadAssessment,
    /// Total monthly assessment attempts across ALL sessions, not per story.
    AttemptAssessment,
    EnterCompetition,
}

impl QuotaAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuotaAction::CreateStory => "create_story",
            QuotaAction::UploadAssessment => "upload_assessment",
            QuotaAction::AttemptAssessment => "attempt_assessment",
            QuotaAction::EnterCompetition => "enter_competition",
        }
    }
}

/// Effective monthly limits for a user at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Limits {
    pub stories: u32,
    pub assessment_uploads: u32,
    pub total_assessment_attempts: u32,
    pub competition_entries: u32,
}

impl Limits {
    /// Compute effective limits from the free-tier base plus every purchase
    /// whose window contains `as_of`.
    ///
    /// The window is half-open: a bonus applies within
    /// `[purchased_at, purchased_at + window)`. Competition entries are fixed
    /// per month and never raised by purchases.
    pub fn compute(purchases: &[Purchase], as_of: DateTime<Utc>, config: &QuotaConfig) -> Limits {
        let window = Duration::days(config.purchase_window_days);

        let mut limits = Limits {
            stories: config.base_story_limit,
            assessment_uploads: config.base_assessment_uploads,
            total_assessment_attempts: config.base_assessment_attempts,
            competition_entries: config.competition_entries_per_month,
        };

        for purchase in purchases {
            if purchase.purchase_type != PurchaseType::StoryPack {
                continue;
            }
            let active = as_of >= purchase.purchased_at && as_of < purchase.purchased_at + window;
            if !active {
                continue;
            }
            limits.stories += purchase.benefits.stories_added;
            limits.assessment_uploads += purchase.benefits.assessments_added;
            limits.total_assessment_attempts += purchase.benefits.total_assessment_attempts_added;
        }

        limits
    }

    pub fn for_action(&self, action: QuotaAction) -> u32 {
        match action {
            QuotaAction::CreateStory => self.stories,
            QuotaAction::UploadAssessment => self.assessment_uploads,
            QuotaAction::AttemptAssessment => self.total_assessment_attempts,
            QuotaAction::EnterCompetition => self.competition_entries,
        }
    }
}

impl UsageCounters {
    pub fn for_action(&self, action: QuotaAction) -> u32 {
        match action {
            QuotaAction::CreateStory => self.stories_created,
            QuotaAction::UploadAssessment => self.assessment_uploads,
            QuotaAction::AttemptAssessment => self.assessment_attempts,
            QuotaAction::EnterCompetition => self.competition_entries,
        }
    }
}

/// Outcome of a quota check, returned to callers so denials can be rendered
/// with usage and limit.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct QuotaDecision {
    pub action: QuotaAction,
    pub allowed: bool,
    pub current_usage: u32,
    pub limit: u32,
}

/// Decide whether `action` is allowed given current usage and limits.
pub fn decide(action: QuotaAction, usage: &UsageCounters, limits: &Limits) -> QuotaDecision {
    let current_usage = usage.for_action(action);
    let limit = limits.for_action(action);
    QuotaDecision {
        action,
        allowed: current_usage < limit,
        current_usage,
        limit,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::PurchaseBenefits;
    use chrono::TimeZone;

    fn day(offset: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap() + Duration::days(offset)
    }

    fn story_pack(purchased_at: DateTime<Utc>) -> Purchase {
        Purchase {
            purchase_type: PurchaseType::StoryPack,
            purchased_at,
            benefits: PurchaseBenefits {
                stories_added: 5,
                assessments_added: 5,
                total_assessment_attempts_added: 15,
            },
        }
    }

    #[test]
    fn test_zero_purchases_uses_base() {
        let limits = Limits::compute(&[], day(0), &QuotaConfig::default());
        assert_eq!(limits.stories, 3);
        assert_eq!(limits.assessment_uploads, 3);
        assert_eq!(limits.total_assessment_attempts, 9);
        assert_eq!(limits.competition_entries, 1);
    }

    #[test]
    fn test_story_pack_active_within_window() {
        let purchases = vec![story_pack(day(0))];
        let limits = Limits::compute(&purchases, day(29), &QuotaConfig::default());
        assert_eq!(limits.stories, 8);
        assert_eq!(limits.assessment_uploads, 8);
        assert_eq!(limits.total_assessment_attempts, 24);
    }

    #[test]
    fn test_story_pack_expired_after_window() {
        let purchases = vec![story_pack(day(0))];
        let limits = Limits::compute(&purchases, day(31), &QuotaConfig::default());
        assert_eq!(limits.stories, 3);
        assert_eq!(limits.total_assessment_attempts, 9);
    }

    #[test]
    fn test_window_is_half_open_at_day_30() {
        let purchases = vec![story_pack(day(0))];
        // Exactly at purchase time: active
        assert_eq!(
            Limits::compute(&purchases, day(0), &QuotaConfig::default()).stories,
            8
        );
        // Exactly 30 days later: expired
        assert_eq!(
            Limits::compute(&purchases, day(30), &QuotaConfig::default()).stories,
            3
        );
    }

    #[test]
    fn test_competition_entries_never_raised_by_purchases() {
        let purchases = vec![story_pack(day(0)), story_pack(day(1))];
        let limits = Limits::compute(&purchases, day(2), &QuotaConfig::default());
        assert_eq!(limits.competition_entries, 1);
    }

    #[test]
    fn test_result_independent_of_purchase_order() {
        let a = story_pack(day(0));
        let b = story_pack(day(10));
        let expired = story_pack(day(-60));

        let forward = vec![a.clone(), b.clone(), expired.clone()];
        let reversed = vec![expired, b, a];

        let as_of = day(15);
        assert_eq!(
            Limits::compute(&forward, as_of, &QuotaConfig::default()),
            Limits::compute(&reversed, as_of, &QuotaConfig::default())
        );
        // Both packs active at day 15
        assert_eq!(
            Limits::compute(&forward, as_of, &QuotaConfig::default()).stories,
            13
        );
    }

    #[test]
    fn test_non_pack_purchase_grants_nothing() {
        let purchases = vec![Purchase {
            purchase_type: PurchaseType::Other,
            purchased_at: day(0),
            benefits: PurchaseBenefits {
                stories_added: 99,
                assessments_added: 99,
                total_assessment_attempts_added: 99,
            },
        }];
        let limits = Limits::compute(&purchases, day(1), &QuotaConfig::default());
        assert_eq!(limits.stories, 3);
    }

    #[test]
    fn test_decide_denies_at_limit() {
        let usage = UsageCounters {
            stories_created: 3,
            ..Default::default()
        };
        let limits = Limits::compute(&[], day(0), &QuotaConfig::default());
        let decision = decide(QuotaAction::CreateStory, &usage, &limits);
        assert!(!decision.allowed);
        assert_eq!(decision.current_usage, 3);
        assert_eq!(decision.limit, 3);
    }

    #[test]
    fn test_decide_allows_below_limit() {
        let usage = UsageCounters {
            stories_created: 2,
            ..Default::default()
        };
        let limits = Limits::compute(&[], day(0), &QuotaConfig::default());
        assert!(decide(QuotaAction::CreateStory, &usage, &limits).allowed);
    }
}
