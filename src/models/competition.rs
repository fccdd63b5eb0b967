// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Competition model: phase transitions and the duplicate-reconciliation
//! planner.
//!
//! Phases move forward only (`submission → judging → results → archived`),
//! no skipping, `archived` terminal. At most one competition may be active
//! at a time and at most one document should exist per calendar period.
//! New documents use the period key as their document id, which rules out
//! period duplicates for anything this service creates; `plan_reconciliation`
//! repairs data created before that convention or inserted out of band.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::time_utils::month_key;

/// Lifecycle phase of a monthly competition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Submission,
    Judging,
    Results,
    Archived,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Submission => "submission",
            Phase::Judging => "judging",
            Phase::Results => "results",
            Phase::Archived => "archived",
        }
    }

    /// The only phase reachable from this one. `None` for `archived`.
    pub fn successor(&self) -> Option<Phase> {
        match self {
            Phase::Submission => Some(Phase::Judging),
            Phase::Judging => Some(Phase::Results),
            Phase::Results => Some(Phase::Archived),
            Phase::Archived => None,
        }
    }

    /// Validate a requested transition.
    pub fn ensure_transition(&self, target: Phase) -> Result<(), AppError> {
        if self.successor() == Some(target) {
            Ok(())
        } else {
            Err(AppError::InvalidPhaseTransition {
                from: self.as_str().to_string(),
                to: target.as_str().to_string(),
            })
        }
    }
}

/// One monthly contest cycle stored in Firestore.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Competition {
    /// Document id. New competitions use the period key (`"2025-03"`).
    pub id: String,
    pub year: i32,
    /// Calendar month, 1-12.
    pub month: u32,
    pub phase: Phase,
    pub is_active: bool,
    #[serde(default)]
    pub total_submissions: u32,
    #[serde(default)]
    pub total_participants: u32,
    #[serde(default)]
    pub winners: Vec<Winner>,
    pub created_at: DateTime<Utc>,
}

impl Competition {
    pub fn period_key(&self) -> String {
        month_key(self.year, self.month)
    }

    /// Whether entries may be submitted right now.
    pub fn accepting_submissions(&self) -> bool {
        self.is_active && self.phase == Phase::Submission
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Winner {
    pub position: u32,
    pub child_id: String,
    pub session_id: String,
}

/// Join record: one document per competition entry, keyed by
/// `{competition_id}_{session_id}`. Kept alongside the entry list embedded
/// in the session so entry counting is a single filtered query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompetitionEntryRecord {
    pub competition_id: String,
    pub session_id: String,
    pub child_id: String,
    pub submitted_at: DateTime<Utc>,
}

/// A competition paired with its linked-submission count, the planner's
/// input unit.
#[derive(Debug, Clone)]
pub struct CompetitionWithSubmissions {
    pub competition: Competition,
    pub submission_count: u64,
}

/// Changes `reconcile_duplicates` will apply. Computed purely so it can be
/// tested without a store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcilePlan {
    /// Documents to delete outright (always zero linked submissions).
    pub delete: Vec<String>,
    /// Documents to demote: phase → archived, is_active → false.
    pub archive: Vec<String>,
    /// Periods that end up with no active competition after the plan runs.
    /// Surfaced as a warning, not repaired; creating a replacement is an
    /// explicit admin action.
    pub periods_without_active: Vec<String>,
}

impl ReconcilePlan {
    pub fn is_empty(&self) -> bool {
        self.delete.is_empty() && self.archive.is_empty()
    }

    pub fn change_count(&self) -> usize {
        self.delete.len() + self.archive.len()
    }
}

/// Plan the repair of duplicate and orphaned competition records.
///
/// Per `(year, month)` group with more than one document: the most recently
/// created document is the keeper; every other document is deleted if it has
/// zero linked submissions and archived otherwise. A keeper with zero
/// submissions alongside a duplicate that does have submissions is itself
/// deleted: the period's real data lives in the archived document, and a
/// competition with submissions is never deleted.
///
/// After grouping, if more than one surviving document is still active, only
/// the most recently created active one stays; the rest are archived.
///
/// Idempotent: applying the plan and re-planning yields an empty plan.
pub fn plan_reconciliation(records: &[CompetitionWithSubmissions]) -> ReconcilePlan {
    use std::collections::BTreeMap;

    let mut plan = ReconcilePlan::default();

    let mut groups: BTreeMap<String, Vec<&CompetitionWithSubmissions>> = BTreeMap::new();
    for record in records {
        groups
            .entry(record.competition.period_key())
            .or_default()
            .push(record);
    }

    // Survivors, with their effective active flag after the plan runs.
    let mut survivors: Vec<(&Competition, bool)> = Vec::new();

    for (period, mut group) in groups {
        // Most recently created first; id as tie-breaker for determinism.
        group.sort_by(|a, b| {
            b.competition
                .created_at
                .cmp(&a.competition.created_at)
                .then_with(|| b.competition.id.cmp(&a.competition.id))
        });

        if group.len() == 1 {
            let only = group[0];
            survivors.push((&only.competition, only.competition.is_active));
            continue;
        }

        let (keeper, losers) = group.split_first().expect("group is non-empty");
        let losers_have_submissions = losers.iter().any(|r| r.submission_count > 0);

        for loser in losers {
            if loser.submission_count == 0 {
                plan.delete.push(loser.competition.id.clone());
            } else {
                // Submissions reference this document; never delete it.
                if loser.competition.phase != Phase::Archived || loser.competition.is_active {
                    plan.archive.push(loser.competition.id.clone());
                }
                survivors.push((&loser.competition, false));
            }
        }

        if keeper.submission_count == 0 && losers_have_submissions {
            // Empty latecomer duplicating a period that already has real
            // entries. Matches the source behavior, which can leave the
            // period with no active competition at all.
            plan.delete.push(keeper.competition.id.clone());
            tracing::warn!(
                period = %period,
                competition_id = %keeper.competition.id,
                "Reconciliation deletes empty duplicate; period left without an active competition"
            );
        } else {
            survivors.push((&keeper.competition, keeper.competition.is_active));
        }
    }

    // Collection-wide single-active invariant.
    let mut active: Vec<&Competition> = survivors
        .iter()
        .filter(|(_, is_active)| *is_active)
        .map(|(c, _)| *c)
        .collect();
    if active.len() > 1 {
        active.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        for extra in &active[1..] {
            if !plan.archive.contains(&extra.id) {
                plan.archive.push(extra.id.clone());
            }
        }
        active.truncate(1);
    }

    // Flag periods whose documents all end up inactive.
    let active_periods: Vec<String> = active.iter().map(|c| c.period_key()).collect();
    let mut flagged = std::collections::BTreeSet::new();
    for (competition, _) in &survivors {
        let period = competition.period_key();
        if !active_periods.contains(&period) {
            flagged.insert(period);
        }
    }
    plan.periods_without_active = flagged.into_iter().collect();

    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn comp(id: &str, month: u32, day: u32, phase: Phase, is_active: bool) -> Competition {
        Competition {
            id: id.to_string(),
            year: 2025,
            month,
            phase,
            is_active,
            total_submissions: 0,
            total_participants: 0,
            winners: vec![],
            created_at: Utc.with_ymd_and_hms(2025, month, day, 0, 0, 0).unwrap(),
        }
    }

    fn with_subs(competition: Competition, submission_count: u64) -> CompetitionWithSubmissions {
        CompetitionWithSubmissions {
            competition,
            submission_count,
        }
    }

    /// Apply a plan in memory, mirroring what the service does to the store.
    fn apply(
        records: &[CompetitionWithSubmissions],
        plan: &ReconcilePlan,
    ) -> Vec<CompetitionWithSubmissions> {
        records
            .iter()
            .filter(|r| !plan.delete.contains(&r.competition.id))
            .map(|r| {
                let mut r = r.clone();
                if plan.archive.contains(&r.competition.id) {
                    r.competition.phase = Phase::Archived;
                    r.competition.is_active = false;
                }
                r
            })
            .collect()
    }

    #[test]
    fn test_phase_successors() {
        assert_eq!(Phase::Submission.successor(), Some(Phase::Judging));
        assert_eq!(Phase::Judging.successor(), Some(Phase::Results));
        assert_eq!(Phase::Results.successor(), Some(Phase::Archived));
        assert_eq!(Phase::Archived.successor(), None);
    }

    #[test]
    fn test_phase_transition_rejects_skips_and_backwards() {
        assert!(Phase::Submission.ensure_transition(Phase::Judging).is_ok());
        assert!(matches!(
            Phase::Submission.ensure_transition(Phase::Results),
            Err(AppError::InvalidPhaseTransition { .. })
        ));
        assert!(Phase::Judging.ensure_transition(Phase::Submission).is_err());
        assert!(Phase::Archived.ensure_transition(Phase::Archived).is_err());
    }

    #[test]
    fn test_no_duplicates_yields_empty_plan() {
        let records = vec![
            with_subs(comp("2025-02", 2, 1, Phase::Archived, false), 4),
            with_subs(comp("2025-03", 3, 1, Phase::Submission, true), 2),
        ];
        let plan = plan_reconciliation(&records);
        assert!(plan.is_empty());
        assert!(plan.periods_without_active.contains(&"2025-02".to_string()));
    }

    #[test]
    fn test_zero_submission_duplicate_is_deleted() {
        let records = vec![
            with_subs(comp("march-new", 3, 20, Phase::Submission, true), 3),
            with_subs(comp("march-old", 3, 1, Phase::Submission, false), 0),
        ];
        let plan = plan_reconciliation(&records);
        assert_eq!(plan.delete, vec!["march-old".to_string()]);
        assert!(plan.archive.is_empty());
    }

    #[test]
    fn test_duplicate_with_submissions_is_archived_not_deleted() {
        let records = vec![
            with_subs(comp("march-new", 3, 20, Phase::Submission, true), 3),
            with_subs(comp("march-old", 3, 1, Phase::Judging, false), 5),
        ];
        let plan = plan_reconciliation(&records);
        assert!(plan.delete.is_empty());
        assert_eq!(plan.archive, vec!["march-old".to_string()]);
    }

    // Scenario: two March 2025 documents, the older with 2 linked
    // submissions, the newer empty but active. The empty newcomer is
    // deleted, the older is archived, and the period ends with zero active
    // competitions.
    #[test]
    fn test_empty_keeper_deleted_when_older_has_submissions() {
        let records = vec![
            with_subs(comp("march-old", 3, 1, Phase::Submission, false), 2),
            with_subs(comp("march-new", 3, 20, Phase::Submission, true), 0),
        ];
        let plan = plan_reconciliation(&records);

        assert_eq!(plan.delete, vec!["march-new".to_string()]);
        assert_eq!(plan.archive, vec!["march-old".to_string()]);
        assert_eq!(plan.periods_without_active, vec!["2025-03".to_string()]);

        let after = apply(&records, &plan);
        assert_eq!(after.len(), 1);
        assert_eq!(after[0].competition.id, "march-old");
        assert_eq!(after[0].competition.phase, Phase::Archived);
        assert!(!after[0].competition.is_active);
    }

    #[test]
    fn test_multiple_actives_across_periods_keep_newest() {
        let records = vec![
            with_subs(comp("2025-02", 2, 1, Phase::Submission, true), 4),
            with_subs(comp("2025-03", 3, 1, Phase::Submission, true), 1),
        ];
        let plan = plan_reconciliation(&records);
        assert!(plan.delete.is_empty());
        assert_eq!(plan.archive, vec!["2025-02".to_string()]);
    }

    #[test]
    fn test_reconciliation_is_idempotent() {
        let records = vec![
            with_subs(comp("march-old", 3, 1, Phase::Submission, false), 2),
            with_subs(comp("march-new", 3, 20, Phase::Submission, true), 0),
            with_subs(comp("feb-a", 2, 1, Phase::Submission, true), 3),
            with_subs(comp("feb-b", 2, 10, Phase::Submission, true), 0),
        ];

        let first = plan_reconciliation(&records);
        assert!(!first.is_empty());

        let after = apply(&records, &first);
        let second = plan_reconciliation(&after);
        assert!(second.is_empty(), "second run must change nothing: {:?}", second);
    }

    #[test]
    fn test_never_deletes_competition_with_submissions() {
        let records = vec![
            with_subs(comp("a", 3, 1, Phase::Submission, true), 1),
            with_subs(comp("b", 3, 5, Phase::Submission, true), 7),
            with_subs(comp("c", 3, 9, Phase::Submission, false), 0),
        ];
        let plan = plan_reconciliation(&records);
        assert!(plan.delete.iter().all(|id| id == "c"));
    }

    #[test]
    fn test_all_empty_duplicates_keep_newest() {
        let records = vec![
            with_subs(comp("old", 3, 1, Phase::Submission, false), 0),
            with_subs(comp("new", 3, 20, Phase::Submission, true), 0),
        ];
        let plan = plan_reconciliation(&records);
        assert_eq!(plan.delete, vec!["old".to_string()]);
        assert!(plan.archive.is_empty());
        assert!(plan.periods_without_active.is_empty());
    }
}
