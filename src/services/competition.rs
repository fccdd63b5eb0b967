// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Competition lifecycle service.
//!
//! Owns the single-active-competition invariant, forward-only phase
//! transitions, entry submission (existing sessions and direct uploads),
//! stat recounts, and the duplicate-reconciliation maintenance operation.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::SessionConfig;
use crate::db::FirestoreDb;
use crate::error::{AppError, Result};
use crate::models::competition::{
    plan_reconciliation, Competition, CompetitionEntryRecord, CompetitionWithSubmissions, Phase,
};
use crate::models::quota::QuotaAction;
use crate::models::session::{word_count, CompetitionEntry, SessionStatus, StoryType};
use crate::models::User;
use crate::services::assessment::AssessmentGate;
use crate::services::quota::QuotaLedger;
use crate::services::story::{build_upload_session, CreatedUpload};
use crate::time_utils::month_key;

/// Outcome of a reconciliation run, for the admin caller.
#[derive(Debug, Serialize)]
pub struct ReconcileReport {
    pub deleted: usize,
    pub archived: usize,
    /// Periods left with no active competition. There is no recovery rule
    /// for this; an admin has to decide what the period should look like.
    pub periods_without_active: Vec<String>,
}

pub struct CompetitionService {
    db: FirestoreDb,
    config: SessionConfig,
    ledger: Arc<QuotaLedger>,
    gate: Arc<AssessmentGate>,
}

impl CompetitionService {
    pub fn new(
        db: FirestoreDb,
        config: SessionConfig,
        ledger: Arc<QuotaLedger>,
        gate: Arc<AssessmentGate>,
    ) -> Self {
        Self {
            db,
            config,
            ledger,
            gate,
        }
    }

    /// Create the competition for a calendar period.
    ///
    /// The period key doubles as the document id, so a duplicate create for
    /// the same (month, year) fails at the store. Creation is refused while
    /// another competition is active; advance or reconcile it first.
    pub async fn create_competition(
        &self,
        year: i32,
        month: u32,
        now: DateTime<Utc>,
    ) -> Result<Competition> {
        if !(1..=12).contains(&month) {
            return Err(AppError::BadRequest(format!("Invalid month: {}", month)));
        }

        let active = self.db.get_active_competitions().await?;
        if let Some(existing) = active.first() {
            return Err(AppError::BadRequest(format!(
                "Competition {} is still active; advance it to archived first",
                existing.id
            )));
        }

        let id = month_key(year, month);
        if self.db.get_competition(&id).await?.is_some() {
            return Err(AppError::BadRequest(format!(
                "Competition already exists for period {}",
                id
            )));
        }

        let competition = Competition {
            id,
            year,
            month,
            phase: Phase::Submission,
            is_active: true,
            total_submissions: 0,
            total_participants: 0,
            winners: vec![],
            created_at: now,
        };
        self.db.insert_competition(&competition).await?;

        tracing::info!(competition_id = %competition.id, "Competition created");
        Ok(competition)
    }

    /// The single active competition, if any. Multiple actives are a data
    /// defect repaired by reconciliation; until then the newest wins.
    pub async fn get_current(&self) -> Result<Option<Competition>> {
        let mut active = self.db.get_active_competitions().await?;
        if active.len() > 1 {
            tracing::warn!(
                count = active.len(),
                "Multiple active competitions found; run reconciliation"
            );
        }
        Ok(if active.is_empty() {
            None
        } else {
            Some(active.remove(0))
        })
    }

    /// The active competition in its submission phase. "No active
    /// competition" and "active but past submissions" block identically.
    async fn ensure_accepting(&self) -> Result<Competition> {
        match self.get_current().await? {
            Some(competition) if competition.accepting_submissions() => Ok(competition),
            _ => Err(AppError::NoActiveCompetition),
        }
    }

    /// Advance a competition to the immediate next phase.
    pub async fn advance_phase(&self, competition_id: &str, target: Phase) -> Result<Competition> {
        let mut competition = self
            .db
            .get_competition(competition_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Competition {}", competition_id)))?;

        competition.phase.ensure_transition(target)?;
        competition.phase = target;
        if target == Phase::Archived {
            competition.is_active = false;
        }
        self.db.set_competition(&competition).await?;

        tracing::info!(
            competition_id = %competition.id,
            phase = target.as_str(),
            "Competition phase advanced"
        );
        Ok(competition)
    }

    /// Enter an existing completed session into the current competition.
    pub async fn enter_session(
        &self,
        user: &User,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Competition> {
        let mut session = self
            .db
            .get_session(session_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Session {}", session_id)))?;
        super::ensure_session_owner(user, &session)?;

        if session.status != SessionStatus::Completed {
            return Err(AppError::SessionNotActive(session.status.as_str().to_string()));
        }

        self.ledger
            .ensure_allowed(user, QuotaAction::EnterCompetition, now)?;
        let competition = self.ensure_accepting().await?;

        if session
            .competition_entries
            .iter()
            .any(|e| e.competition_id == competition.id)
        {
            return Err(AppError::BadRequest(
                "Session is already entered in this competition".to_string(),
            ));
        }

        session.competition_entries.push(CompetitionEntry {
            competition_id: competition.id.clone(),
            submitted_at: now,
        });

        let entry = CompetitionEntryRecord {
            competition_id: competition.id.clone(),
            session_id: session.id.clone(),
            child_id: user.user_id.clone(),
            submitted_at: now,
        };
        self.db
            .enter_competition_atomic(&session, None, &entry)
            .await?;

        tracing::info!(
            competition_id = %competition.id,
            session_id = %session.id,
            "Competition entry recorded"
        );
        Ok(competition)
    }

    /// Create a pre-completed session from pasted content, enter it into
    /// the current competition, and run its first assessment.
    pub async fn upload_entry(
        &self,
        user: &User,
        title: String,
        content: String,
        now: DateTime<Utc>,
    ) -> Result<CreatedUpload> {
        self.ledger
            .ensure_allowed(user, QuotaAction::EnterCompetition, now)?;
        let competition = self.ensure_accepting().await?;

        let words = word_count(&content);
        let band = self.config.competition_word_band;
        if !band.contains(words) {
            return Err(AppError::WordCountOutOfRange {
                actual: words,
                min: band.min,
                max: band.max,
            });
        }

        let (mut session, turn) =
            build_upload_session(user, title, content, StoryType::Competition, now);
        session.competition_entries.push(CompetitionEntry {
            competition_id: competition.id.clone(),
            submitted_at: now,
        });

        let entry = CompetitionEntryRecord {
            competition_id: competition.id.clone(),
            session_id: session.id.clone(),
            child_id: user.user_id.clone(),
            submitted_at: now,
        };
        self.db
            .enter_competition_atomic(&session, Some(&turn), &entry)
            .await?;

        let assessment_error = self
            .gate
            .run_recording_failure(user, &mut session, &turn.child_input, now)
            .await?;

        Ok(CreatedUpload {
            session,
            assessment_error,
        })
    }

    /// Recount a competition's stats from its entry join records: total
    /// entries and distinct children.
    pub async fn update_stats(&self, competition_id: &str) -> Result<Competition> {
        let mut competition = self
            .db
            .get_competition(competition_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Competition {}", competition_id)))?;

        let entries = self.db.get_entries_for_competition(competition_id).await?;
        let participants: HashSet<&str> = entries.iter().map(|e| e.child_id.as_str()).collect();

        competition.total_submissions = entries.len() as u32;
        competition.total_participants = participants.len() as u32;
        self.db.set_competition(&competition).await?;

        Ok(competition)
    }

    /// Repair duplicate (month, year) documents and the single-active
    /// invariant. Idempotent; a second run reports zero changes.
    pub async fn reconcile_duplicates(&self) -> Result<ReconcileReport> {
        let competitions = self.db.list_competitions().await?;

        let mut records = Vec::with_capacity(competitions.len());
        for competition in competitions {
            let entries = self.db.get_entries_for_competition(&competition.id).await?;
            records.push(CompetitionWithSubmissions {
                competition,
                submission_count: entries.len() as u64,
            });
        }

        let plan = plan_reconciliation(&records);

        let archived: Vec<Competition> = records
            .iter()
            .filter(|r| plan.archive.contains(&r.competition.id))
            .map(|r| {
                let mut competition = r.competition.clone();
                competition.phase = Phase::Archived;
                competition.is_active = false;
                competition
            })
            .collect();

        if !plan.is_empty() {
            self.db.apply_reconcile_plan(&archived, &plan.delete).await?;
        }

        for period in &plan.periods_without_active {
            tracing::warn!(
                period = %period,
                "Period has no active competition after reconciliation"
            );
        }

        tracing::info!(
            deleted = plan.delete.len(),
            archived = archived.len(),
            "Competition reconciliation complete"
        );

        Ok(ReconcileReport {
            deleted: plan.delete.len(),
            archived: archived.len(),
            periods_without_active: plan.periods_without_active,
        })
    }
}
