// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API routes for authenticated users.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::session::{StorySession, Turn};
use crate::models::user::User;
use crate::time_utils::format_utc_rfc3339;
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    routing::{get, post, put},
    Extension, Json, Router,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::Validate;

/// API routes (require authentication via JWT).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/me/usage", get(get_usage))
        .route("/api/stories", get(list_stories).post(create_story))
        .route("/api/stories/{id}", get(get_story))
        .route(
            "/api/stories/{id}/turns",
            get(get_turns).post(submit_turn),
        )
        .route(
            "/api/stories/{id}/turns/{turn_id}",
            put(edit_turn).delete(delete_turn),
        )
        .route("/api/stories/{id}/assessment", post(request_assessment))
        .route("/api/uploads/assessment", post(upload_for_assessment))
        .route("/api/uploads/competition", post(upload_for_competition))
        .route("/api/competitions/current", get(get_current_competition))
        .route(
            "/api/competitions/current/entries",
            post(enter_competition),
        )
}

/// Fetch the caller's profile, creating a blank one on first contact.
///
/// The identity provider is the source of truth for identity and role;
/// this service only keeps counters and purchase history alongside.
pub(crate) async fn load_user(state: &AppState, auth: &AuthUser) -> Result<User> {
    if let Some(user) = state.db.get_user(&auth.user_id).await? {
        return Ok(user);
    }

    let user = User {
        user_id: auth.user_id.clone(),
        role: auth.role,
        age: None,
        purchase_history: vec![],
        usage: Default::default(),
        created_at: format_utc_rfc3339(chrono::Utc::now()),
    };
    state.db.upsert_user(&user).await?;
    tracing::info!(user_id = %user.user_id, "Created profile on first request");
    Ok(user)
}

// ─── Usage Dashboard ─────────────────────────────────────────

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ActionUsage {
    pub action: String,
    pub used: u32,
    pub limit: u32,
    pub allowed: bool,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct UsageResponse {
    pub as_of: String,
    pub actions: Vec<ActionUsage>,
}

/// Current usage and effective limits for every quota-gated action.
async fn get_usage(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<UsageResponse>> {
    let user = load_user(&state, &auth).await?;
    let summary = state.ledger.usage_summary(&user, chrono::Utc::now());

    Ok(Json(UsageResponse {
        as_of: format_utc_rfc3339(summary.as_of),
        actions: summary
            .actions
            .into_iter()
            .map(|d| ActionUsage {
                action: d.action.as_str().to_string(),
                used: d.current_usage,
                limit: d.limit,
                allowed: d.allowed,
            })
            .collect(),
    }))
}

// ─── Story Sessions ──────────────────────────────────────────

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SessionResponse {
    pub id: String,
    pub title: String,
    pub status: String,
    pub story_type: String,
    pub current_turn: u32,
    pub api_calls_used: u32,
    pub max_api_calls: u32,
    pub total_words: u32,
    pub child_words: u32,
    pub assessment_attempts: u32,
    /// True when the story was edited after its last assessment.
    pub needs_reassessment: bool,
    pub completed_at: Option<String>,
    pub created_at: String,
    #[cfg_attr(feature = "binding-generation", ts(type = "unknown | null"))]
    pub assessment: Option<serde_json::Value>,
    pub competition_ids: Vec<String>,
}

impl From<&StorySession> for SessionResponse {
    fn from(session: &StorySession) -> Self {
        SessionResponse {
            id: session.id.clone(),
            title: session.title.clone(),
            status: session.status.as_str().to_string(),
            story_type: session.story_type.as_str().to_string(),
            current_turn: session.current_turn,
            api_calls_used: session.api_calls_used,
            max_api_calls: session.max_api_calls,
            total_words: session.total_words,
            child_words: session.child_words,
            assessment_attempts: session.assessment_attempts,
            needs_reassessment: session.needs_reassessment_unlock(),
            completed_at: session.completed_at.map(format_utc_rfc3339),
            created_at: format_utc_rfc3339(session.created_at),
            assessment: session
                .assessment
                .as_ref()
                .and_then(|a| serde_json::to_value(a).ok()),
            competition_ids: session
                .competition_entries
                .iter()
                .map(|e| e.competition_id.clone())
                .collect(),
        }
    }
}

#[derive(Deserialize, Validate)]
pub struct CreateStoryRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
}

/// Start a new collaborative story session.
async fn create_story(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(body): Json<CreateStoryRequest>,
) -> Result<Json<SessionResponse>> {
    body.validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let user = load_user(&state, &auth).await?;
    let session = state
        .story
        .start_session(&user, body.title, chrono::Utc::now())
        .await?;

    Ok(Json(SessionResponse::from(&session)))
}

#[derive(Deserialize)]
struct StoriesQuery {
    /// Cursor for forward pagination (opaque token).
    cursor: Option<String>,
    #[serde(default = "default_per_page")]
    per_page: u32,
}

fn default_per_page() -> u32 {
    20
}

const MAX_PER_PAGE: u32 = 50;

fn parse_cursor(cursor: Option<&str>) -> Result<Option<chrono::DateTime<chrono::Utc>>> {
    cursor
        .map(|raw| {
            let invalid_cursor =
                || AppError::BadRequest("Invalid 'cursor' parameter".to_string());

            let decoded = URL_SAFE_NO_PAD.decode(raw).map_err(|_| invalid_cursor())?;
            let decoded_str = std::str::from_utf8(&decoded).map_err(|_| invalid_cursor())?;

            let (seconds, nanos) = decoded_str.split_once(':').ok_or_else(invalid_cursor)?;
            let seconds = seconds.parse::<i64>().map_err(|_| invalid_cursor())?;
            let nanos = nanos.parse::<u32>().map_err(|_| invalid_cursor())?;

            chrono::DateTime::from_timestamp(seconds, nanos).ok_or_else(invalid_cursor)
        })
        .transpose()
}

fn encode_cursor(created_at: chrono::DateTime<chrono::Utc>) -> String {
    let payload = format!(
        "{}:{}",
        created_at.timestamp(),
        created_at.timestamp_subsec_nanos()
    );
    URL_SAFE_NO_PAD.encode(payload)
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SessionsResponse {
    pub sessions: Vec<SessionResponse>,
    pub per_page: u32,
    pub next_cursor: Option<String>,
}

/// List the caller's story sessions, newest first.
async fn list_stories(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Query(params): Query<StoriesQuery>,
) -> Result<Json<SessionsResponse>> {
    let limit = params.per_page.clamp(1, MAX_PER_PAGE);
    let created_before = parse_cursor(params.cursor.as_deref())?;
    let user = load_user(&state, &auth).await?;

    let sessions = state.story.list_sessions(&user, created_before, limit).await?;

    let next_cursor = if sessions.len() as u32 == limit {
        sessions.last().map(|s| encode_cursor(s.created_at))
    } else {
        None
    };

    Ok(Json(SessionsResponse {
        sessions: sessions.iter().map(SessionResponse::from).collect(),
        per_page: limit,
        next_cursor,
    }))
}

/// Get one story session.
async fn get_story(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<SessionResponse>> {
    let user = load_user(&state, &auth).await?;
    let session = state.story.get_session(&user, &id).await?;
    Ok(Json(SessionResponse::from(&session)))
}

// ─── Turns ───────────────────────────────────────────────────

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct TurnResponse {
    pub id: String,
    pub turn_number: u32,
    pub child_input: String,
    pub ai_response: String,
    pub child_word_count: u32,
    pub ai_word_count: u32,
    pub created_at: String,
}

impl From<&Turn> for TurnResponse {
    fn from(turn: &Turn) -> Self {
        TurnResponse {
            id: turn.id.clone(),
            turn_number: turn.turn_number,
            child_input: turn.child_input.clone(),
            ai_response: turn.ai_response.clone(),
            child_word_count: turn.child_word_count,
            ai_word_count: turn.ai_word_count,
            created_at: format_utc_rfc3339(turn.created_at),
        }
    }
}

/// Get a session's turns in order.
async fn get_turns(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<Vec<TurnResponse>>> {
    let user = load_user(&state, &auth).await?;
    let turns = state.story.get_turns(&user, &id).await?;
    Ok(Json(turns.iter().map(TurnResponse::from).collect()))
}

#[derive(Deserialize, Validate)]
pub struct TurnContentRequest {
    #[validate(length(min = 1, max = 5000))]
    pub content: String,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct TurnSubmissionResponse {
    pub session: SessionResponse,
    pub turn: TurnResponse,
    /// Set when the completion-triggered assessment could not run.
    pub assessment_error: Option<String>,
}

/// Submit the next collaborative turn.
async fn submit_turn(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(body): Json<TurnContentRequest>,
) -> Result<Json<TurnSubmissionResponse>> {
    body.validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let user = load_user(&state, &auth).await?;
    let submission = state
        .story
        .submit_turn(&user, &id, body.content, chrono::Utc::now())
        .await?;

    Ok(Json(TurnSubmissionResponse {
        session: SessionResponse::from(&submission.session),
        turn: TurnResponse::from(&submission.turn),
        assessment_error: submission.assessment_error,
    }))
}

/// Replace the most recent turn's child input.
async fn edit_turn(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path((id, turn_id)): Path<(String, String)>,
    Json(body): Json<TurnContentRequest>,
) -> Result<Json<SessionResponse>> {
    body.validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let user = load_user(&state, &auth).await?;
    let session = state
        .story
        .edit_last_turn(&user, &id, &turn_id, body.content, chrono::Utc::now())
        .await?;

    Ok(Json(SessionResponse::from(&session)))
}

/// Delete the most recent turn.
async fn delete_turn(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path((id, turn_id)): Path<(String, String)>,
) -> Result<Json<SessionResponse>> {
    let user = load_user(&state, &auth).await?;
    let session = state
        .story
        .delete_last_turn(&user, &id, &turn_id, chrono::Utc::now())
        .await?;

    Ok(Json(SessionResponse::from(&session)))
}

// ─── Assessment ──────────────────────────────────────────────

/// Run (or re-run) the assessment for a completed session.
async fn request_assessment(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<SessionResponse>> {
    let user = load_user(&state, &auth).await?;
    let session = state
        .assessments
        .reassess(&user, &id, chrono::Utc::now())
        .await?;

    Ok(Json(SessionResponse::from(&session)))
}

// ─── Uploads ─────────────────────────────────────────────────

#[derive(Deserialize, Validate)]
pub struct UploadRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(min = 1, max = 50000))]
    pub content: String,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct UploadResponse {
    pub session: SessionResponse,
    pub assessment_error: Option<String>,
}

/// Upload pasted writing as a pre-completed session for assessment.
async fn upload_for_assessment(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(body): Json<UploadRequest>,
) -> Result<Json<UploadResponse>> {
    body.validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let user = load_user(&state, &auth).await?;
    let created = state
        .story
        .upload_for_assessment(&user, body.title, body.content, chrono::Utc::now())
        .await?;

    Ok(Json(UploadResponse {
        session: SessionResponse::from(&created.session),
        assessment_error: created.assessment_error,
    }))
}

/// Upload pasted writing directly as a competition entry.
async fn upload_for_competition(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(body): Json<UploadRequest>,
) -> Result<Json<UploadResponse>> {
    body.validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let user = load_user(&state, &auth).await?;
    let created = state
        .competitions
        .upload_entry(&user, body.title, body.content, chrono::Utc::now())
        .await?;

    Ok(Json(UploadResponse {
        session: SessionResponse::from(&created.session),
        assessment_error: created.assessment_error,
    }))
}

// ─── Competitions ────────────────────────────────────────────

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CompetitionResponse {
    pub id: String,
    pub year: i32,
    pub month: u32,
    pub phase: String,
    pub is_active: bool,
    pub total_submissions: u32,
    pub total_participants: u32,
    pub created_at: String,
}

impl From<&crate::models::competition::Competition> for CompetitionResponse {
    fn from(c: &crate::models::competition::Competition) -> Self {
        CompetitionResponse {
            id: c.id.clone(),
            year: c.year,
            month: c.month,
            phase: c.phase.as_str().to_string(),
            is_active: c.is_active,
            total_submissions: c.total_submissions,
            total_participants: c.total_participants,
            created_at: format_utc_rfc3339(c.created_at),
        }
    }
}

/// Get the currently active competition, if one exists.
async fn get_current_competition(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Option<CompetitionResponse>>> {
    let current = state.competitions.get_current().await?;
    Ok(Json(current.as_ref().map(CompetitionResponse::from)))
}

#[derive(Deserialize, Validate)]
pub struct EnterCompetitionRequest {
    #[validate(length(min = 1))]
    pub session_id: String,
}

/// Enter an existing completed session into the current competition.
async fn enter_competition(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(body): Json<EnterCompetitionRequest>,
) -> Result<Json<CompetitionResponse>> {
    body.validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let user = load_user(&state, &auth).await?;
    let competition = state
        .competitions
        .enter_session(&user, &body.session_id, chrono::Utc::now())
        .await?;

    Ok(Json(CompetitionResponse::from(&competition)))
}
