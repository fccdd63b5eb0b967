// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.
//!
//! Domain outcomes (quota, session state, assessment gating, competition
//! phases) are typed variants carrying enough data for the caller to render
//! actionable guidance. Only store/infrastructure failures map to 5xx.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Admin role required")]
    Forbidden,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    // ─── Quota Ledger ────────────────────────────────────────────
    #[error("Monthly limit reached for {action}: {current_usage}/{limit}")]
    QuotaExceeded {
        action: &'static str,
        current_usage: u32,
        limit: u32,
    },

    // ─── Story Session State Machine ─────────────────────────────
    #[error("Session is not active (status: {0})")]
    SessionNotActive(String),

    #[error("Turn limit reached: {used}/{max} API calls used")]
    TurnLimitReached { used: u32, max: u32 },

    #[error("Word count {actual} outside allowed range [{min}, {max}]")]
    WordCountOutOfRange { actual: u32, min: u32, max: u32 },

    #[error("Only the most recent turn can be deleted or edited")]
    OnlyLastTurnDeletable,

    // ─── Assessment Gate ─────────────────────────────────────────
    #[error("Maximum assessment attempts reached: {attempts}/{max}")]
    MaxAttemptsReached { attempts: u32, max: u32 },

    #[error("Story has not been modified since its last assessment")]
    NoModificationSinceLastAssessment,

    #[error("Content too short for assessment: {actual} words, {min} required")]
    InsufficientContent { actual: u32, min: u32 },

    // ─── Competition Lifecycle ───────────────────────────────────
    #[error("Cannot transition competition from {from} to {to}")]
    InvalidPhaseTransition { from: String, to: String },

    #[error("No competition is currently accepting submissions")]
    NoActiveCompetition,

    // ─── Infrastructure ──────────────────────────────────────────
    #[error("Collaborator unavailable: {0}")]
    CollaboratorUnavailable(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
    /// Present for quota/limit errors so the UI can show progress.
    #[serde(skip_serializing_if = "Option::is_none")]
    current_usage: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    limit: Option<u32>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut usage_pair = None;

        let (status, error, details) = match &self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized", None),
            AppError::InvalidToken => (StatusCode::UNAUTHORIZED, "invalid_token", None),
            AppError::Forbidden => (StatusCode::FORBIDDEN, "forbidden", None),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", Some(msg.clone())),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone()))
            }
            AppError::QuotaExceeded {
                current_usage,
                limit,
                ..
            } => {
                usage_pair = Some((*current_usage, *limit));
                (
                    StatusCode::TOO_MANY_REQUESTS,
                    "quota_exceeded",
                    Some(self.to_string()),
                )
            }
            AppError::SessionNotActive(_) => (
                StatusCode::CONFLICT,
                "session_not_active",
                Some(self.to_string()),
            ),
            AppError::TurnLimitReached { used, max } => {
                usage_pair = Some((*used, *max));
                (
                    StatusCode::CONFLICT,
                    "turn_limit_reached",
                    Some(self.to_string()),
                )
            }
            AppError::WordCountOutOfRange { .. } => (
                StatusCode::BAD_REQUEST,
                "word_count_out_of_range",
                Some(self.to_string()),
            ),
            AppError::OnlyLastTurnDeletable => (
                StatusCode::CONFLICT,
                "only_last_turn_deletable",
                Some(self.to_string()),
            ),
            AppError::MaxAttemptsReached { attempts, max } => {
                usage_pair = Some((*attempts, *max));
                (
                    StatusCode::CONFLICT,
                    "max_attempts_reached",
                    Some(self.to_string()),
                )
            }
            AppError::NoModificationSinceLastAssessment => (
                StatusCode::CONFLICT,
                "no_modification_since_last_assessment",
                Some("Edit the story before requesting another assessment".to_string()),
            ),
            AppError::InsufficientContent { .. } => (
                StatusCode::BAD_REQUEST,
                "insufficient_content",
                Some(self.to_string()),
            ),
            AppError::InvalidPhaseTransition { .. } => (
                StatusCode::CONFLICT,
                "invalid_phase_transition",
                Some(self.to_string()),
            ),
            AppError::NoActiveCompetition => (
                StatusCode::CONFLICT,
                "no_active_competition",
                Some(self.to_string()),
            ),
            AppError::CollaboratorUnavailable(msg) => {
                tracing::warn!(error = %msg, "Collaborator unavailable");
                (StatusCode::BAD_GATEWAY, "collaborator_unavailable", None)
            }
            AppError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "database_error", None)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
            current_usage: usage_pair.map(|(u, _)| u),
            limit: usage_pair.map(|(_, l)| l),
        };

        (status, Json(body)).into_response()
    }
}

impl AppError {
    /// True for domain outcomes the user can act on, false for
    /// infrastructure failures.
    pub fn is_domain_error(&self) -> bool {
        !matches!(
            self,
            AppError::CollaboratorUnavailable(_) | AppError::Database(_) | AppError::Internal(_)
        )
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
