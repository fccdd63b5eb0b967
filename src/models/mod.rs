// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data models stored in Firestore, plus the pure decision logic that
//! operates on them.

pub mod competition;
pub mod quota;
pub mod session;
pub mod user;

pub use competition::{
    Competition, CompetitionEntryRecord, CompetitionWithSubmissions, Phase, ReconcilePlan,
};
pub use quota::{Limits, QuotaAction, QuotaDecision};
pub use session::{
    AssessmentRecord, AssessmentResult, IntegrityRisk, SessionStatus, StorySession, StoryType,
    Turn,
};
pub use user::{Purchase, PurchaseType, Role, UsageCounters, User};
