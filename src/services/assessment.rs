// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Assessment gate: decides whether an assessment may run and applies its
//! outcome to the session.
//!
//! First assessments are free once a session is completed. Reassessments
//! need a remaining per-session attempt, an edit since the last run, and a
//! unit of the user's total monthly attempt budget. Anything below the
//! minimum word count is rejected before the collaborator is invoked.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::config::SessionConfig;
use crate::db::FirestoreDb;
use crate::error::AppError;
use crate::models::quota::QuotaAction;
use crate::models::session::{
    concatenated_child_text, word_count, AssessmentRecord, IntegrityRisk, SessionStatus,
    StorySession,
};
use crate::models::User;
use crate::services::collaborator::{AssessmentContext, StoryAssessor};
use crate::services::quota::QuotaLedger;

pub struct AssessmentGate {
    db: FirestoreDb,
    config: SessionConfig,
    assessor: Arc<dyn StoryAssessor>,
    ledger: Arc<QuotaLedger>,
}

impl AssessmentGate {
    pub fn new(
        db: FirestoreDb,
        config: SessionConfig,
        assessor: Arc<dyn StoryAssessor>,
        ledger: Arc<QuotaLedger>,
    ) -> Self {
        Self {
            db,
            config,
            assessor,
            ledger,
        }
    }

    /// Whether a completed prior assessment exists. A recorded failure does
    /// not count; the next run is still the first assessment.
    fn has_prior_assessment(session: &StorySession) -> bool {
        matches!(session.assessment, Some(AssessmentRecord::Completed { .. }))
    }

    /// Check every precondition for running an assessment now.
    pub fn can_assess(
        &self,
        user: &User,
        session: &StorySession,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        if session.status != SessionStatus::Completed {
            return Err(AppError::SessionNotActive(session.status.as_str().to_string()));
        }

        if Self::has_prior_assessment(session) {
            if session.assessment_attempts >= self.config.max_assessment_attempts {
                return Err(AppError::MaxAttemptsReached {
                    attempts: session.assessment_attempts,
                    max: self.config.max_assessment_attempts,
                });
            }
            if !session.needs_reassessment_unlock() {
                return Err(AppError::NoModificationSinceLastAssessment);
            }
        }

        self.ledger
            .ensure_allowed(user, QuotaAction::AttemptAssessment, now)?;
        Ok(())
    }

    /// Run the collaborator and persist the outcome: result onto the
    /// session, attempt counters bumped, `critical` risk escalating the
    /// status to `flagged`. One transaction; a collaborator failure leaves
    /// the session untouched.
    pub async fn run_assessment(
        &self,
        user: &User,
        session: &mut StorySession,
        content: &str,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let words = word_count(content);
        if words < self.config.assessment_min_words {
            return Err(AppError::InsufficientContent {
                actual: words,
                min: self.config.assessment_min_words,
            });
        }

        let context = AssessmentContext {
            child_age: user.age,
            title: session.title.clone(),
        };
        let result = self.assessor.assess(content, &context).await?;

        let risk = result.integrity_risk;
        session.assessment = Some(AssessmentRecord::Completed {
            result,
            assessed_at: now,
        });
        session.last_assessed_at = Some(now);
        session.assessment_attempts += 1;
        session.status = if risk == IntegrityRisk::Critical {
            SessionStatus::Flagged
        } else {
            SessionStatus::Completed
        };

        self.db.record_assessment_atomic(session).await?;

        tracing::info!(
            session_id = %session.id,
            attempts = session.assessment_attempts,
            risk = ?risk,
            "Assessment recorded"
        );
        Ok(())
    }

    /// First-assessment path for sessions that just became completed
    /// (turn-seven auto-assessment and both upload flows).
    ///
    /// The triggering write already succeeded, so nothing here may fail the
    /// caller: a blocked or failed assessment is recorded on the session as
    /// an error state and returned as a message. `None` means the
    /// assessment ran and was recorded.
    pub async fn run_recording_failure(
        &self,
        user: &User,
        session: &mut StorySession,
        content: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<String>, AppError> {
        let blocked = self
            .ledger
            .ensure_allowed(user, QuotaAction::AttemptAssessment, now)
            .err();

        let outcome = match blocked {
            Some(err) => Err(err),
            None => self.run_assessment(user, session, content, now).await,
        };

        match outcome {
            Ok(()) => Ok(None),
            Err(err) if err.is_domain_error() || matches!(err, AppError::CollaboratorUnavailable(_)) => {
                let message = err.to_string();
                tracing::warn!(
                    session_id = %session.id,
                    error = %message,
                    "Automatic assessment failed; recording error on session"
                );
                session.assessment = Some(AssessmentRecord::Failed {
                    error: message.clone(),
                    failed_at: now,
                });
                self.db.set_session(session).await?;
                Ok(Some(message))
            }
            // Store failures stay fatal.
            Err(err) => Err(err),
        }
    }

    /// User-requested reassessment of an existing session.
    pub async fn reassess(
        &self,
        user: &User,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> Result<StorySession, AppError> {
        let mut session = self
            .db
            .get_session(session_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Session {}", session_id)))?;
        super::ensure_session_owner(user, &session)?;

        self.can_assess(user, &session, now)?;

        let turns = self.db.get_turns_for_session(session_id).await?;
        let content = concatenated_child_text(&turns);
        self.run_assessment(user, &mut session, &content, now)
            .await?;
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QuotaConfig;
    use crate::models::session::{AssessmentResult, StoryType};
    use crate::models::user::Role;
    use crate::services::collaborator::ScriptedAssessor;
    use chrono::TimeZone;

    fn ts(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, hour, 0, 0).unwrap()
    }

    fn make_user() -> User {
        User {
            user_id: "child-1".to_string(),
            role: Role::Child,
            age: Some(9),
            purchase_history: vec![],
            usage: Default::default(),
            created_at: "2025-01-01T00:00:00Z".to_string(),
        }
    }

    fn completed_session() -> StorySession {
        StorySession {
            id: "session-1".to_string(),
            child_id: "child-1".to_string(),
            title: "The Lost Dragon".to_string(),
            status: SessionStatus::Completed,
            story_type: StoryType::Freestyle,
            current_turn: 8,
            api_calls_used: 7,
            max_api_calls: 7,
            total_words: 900,
            child_words: 450,
            assessment_attempts: 0,
            last_assessed_at: None,
            last_modified_at: ts(10),
            completed_at: Some(ts(10)),
            created_at: ts(8),
            assessment: None,
            competition_entries: vec![],
        }
    }

    fn prior_result() -> AssessmentRecord {
        AssessmentRecord::Completed {
            result: AssessmentResult {
                category_scores: serde_json::json!({}),
                integrity_risk: IntegrityRisk::Low,
                feedback: String::new(),
            },
            assessed_at: ts(11),
        }
    }

    fn gate() -> AssessmentGate {
        let db = FirestoreDb::new_mock();
        let ledger = Arc::new(QuotaLedger::new(db.clone(), QuotaConfig::default()));
        AssessmentGate::new(
            db,
            SessionConfig::default(),
            Arc::new(ScriptedAssessor::new(IntegrityRisk::Low)),
            ledger,
        )
    }

    #[test]
    fn test_first_assessment_allowed_once_completed() {
        assert!(gate()
            .can_assess(&make_user(), &completed_session(), ts(12))
            .is_ok());
    }

    #[test]
    fn test_assessment_rejected_on_active_session() {
        let mut session = completed_session();
        session.status = SessionStatus::Active;
        assert!(matches!(
            gate().can_assess(&make_user(), &session, ts(12)),
            Err(AppError::SessionNotActive(_))
        ));
    }

    #[test]
    fn test_reassessment_capped_at_max_attempts() {
        let mut session = completed_session();
        session.assessment = Some(prior_result());
        session.assessment_attempts = 3;
        session.last_modified_at = ts(13);
        session.last_assessed_at = Some(ts(11));
        assert!(matches!(
            gate().can_assess(&make_user(), &session, ts(14)),
            Err(AppError::MaxAttemptsReached { attempts: 3, max: 3 })
        ));
    }

    #[test]
    fn test_reassessment_requires_modification() {
        let mut session = completed_session();
        session.assessment = Some(prior_result());
        session.assessment_attempts = 1;
        session.last_assessed_at = Some(ts(11));
        session.last_modified_at = ts(10);

        let gate = gate();
        let user = make_user();
        // Same answer both times until an edit happens
        for _ in 0..2 {
            assert!(matches!(
                gate.can_assess(&user, &session, ts(12)),
                Err(AppError::NoModificationSinceLastAssessment)
            ));
        }
    }

    #[test]
    fn test_reassessment_unlocked_after_edit() {
        let mut session = completed_session();
        session.assessment = Some(prior_result());
        session.assessment_attempts = 1;
        session.last_assessed_at = Some(ts(11));
        session.last_modified_at = ts(12);
        assert!(gate().can_assess(&make_user(), &session, ts(13)).is_ok());
    }

    #[test]
    fn test_recorded_failure_does_not_count_as_prior_assessment() {
        let mut session = completed_session();
        session.assessment = Some(AssessmentRecord::Failed {
            error: "Collaborator unavailable: outage".to_string(),
            failed_at: ts(11),
        });
        // Still the first-assessment path: no modification requirement
        session.last_modified_at = ts(10);
        assert!(gate().can_assess(&make_user(), &session, ts(12)).is_ok());
    }

    #[test]
    fn test_assessment_blocked_by_monthly_attempt_budget() {
        let mut user = make_user();
        user.usage.assessment_attempts = 9;
        assert!(matches!(
            gate().can_assess(&user, &completed_session(), ts(12)),
            Err(AppError::QuotaExceeded { .. })
        ));
    }

    #[tokio::test]
    async fn test_run_assessment_rejects_short_content() {
        let gate = gate();
        let mut session = completed_session();
        let err = gate
            .run_assessment(&make_user(), &mut session, "only a few words here", ts(12))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::InsufficientContent { actual: 5, min: 50 }
        ));
        // Nothing recorded
        assert!(session.assessment.is_none());
        assert_eq!(session.assessment_attempts, 0);
    }
}
