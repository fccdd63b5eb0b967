// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

pub mod assessment;
pub mod collaborator;
pub mod competition;
pub mod quota;
pub mod story;

pub use assessment::AssessmentGate;
pub use collaborator::{LlmClient, StoryAssessor, StoryGenerator};
pub use competition::{CompetitionService, ReconcileReport};
pub use quota::{QuotaLedger, UsageSummary};
pub use story::{CreatedUpload, StoryService, TurnSubmission};

use crate::error::AppError;
use crate::models::session::StorySession;
use crate::models::user::{Role, User};

/// Owner-only access. A non-owner gets `NotFound` rather than `Forbidden`
/// so session ids are not probeable.
pub(crate) fn ensure_session_owner(user: &User, session: &StorySession) -> Result<(), AppError> {
    if session.child_id == user.user_id {
        Ok(())
    } else {
        Err(AppError::NotFound(format!("Session {}", session.id)))
    }
}

/// Read access: the owner, or a mentor/admin reviewer.
pub(crate) fn ensure_session_access(user: &User, session: &StorySession) -> Result<(), AppError> {
    if session.child_id == user.user_id || matches!(user.role, Role::Mentor | Role::Admin) {
        Ok(())
    } else {
        Err(AppError::NotFound(format!("Session {}", session.id)))
    }
}
