// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Admin-only routes: competition lifecycle, maintenance, and bulk cleanup.

use crate::error::Result;
use crate::models::competition::Phase;
use crate::models::session::SessionStatus;
use crate::routes::api::CompetitionResponse;
use crate::services::ReconcileReport;
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    routing::{delete, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Admin routes. Layered with `require_auth` then `require_admin` in
/// routes/mod.rs.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/admin/competitions", post(create_competition))
        .route(
            "/api/admin/competitions/reconcile",
            post(reconcile_competitions),
        )
        .route(
            "/api/admin/competitions/{id}/advance",
            post(advance_competition),
        )
        .route(
            "/api/admin/competitions/{id}/stats",
            post(update_competition_stats),
        )
        .route("/api/admin/sessions", delete(purge_sessions))
        .route("/api/admin/usage/reset", post(reset_usage))
}

// ─── Competition Lifecycle ───────────────────────────────────

#[derive(Deserialize)]
pub struct CreateCompetitionRequest {
    pub year: i32,
    pub month: u32,
}

/// Open the competition for a calendar period.
async fn create_competition(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateCompetitionRequest>,
) -> Result<Json<CompetitionResponse>> {
    let competition = state
        .competitions
        .create_competition(body.year, body.month, chrono::Utc::now())
        .await?;
    Ok(Json(CompetitionResponse::from(&competition)))
}

#[derive(Deserialize)]
pub struct AdvanceRequest {
    pub phase: Phase,
}

/// Move a competition to the next phase.
async fn advance_competition(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<AdvanceRequest>,
) -> Result<Json<CompetitionResponse>> {
    let competition = state.competitions.advance_phase(&id, body.phase).await?;
    Ok(Json(CompetitionResponse::from(&competition)))
}

/// Recount a competition's submission and participant totals.
async fn update_competition_stats(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<CompetitionResponse>> {
    let competition = state.competitions.update_stats(&id).await?;
    Ok(Json(CompetitionResponse::from(&competition)))
}

/// Repair duplicate competition documents for the same period.
async fn reconcile_competitions(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ReconcileReport>> {
    let report = state.competitions.reconcile_duplicates().await?;
    Ok(Json(report))
}

// ─── Maintenance ─────────────────────────────────────────────

#[derive(Deserialize)]
struct PurgeQuery {
    status: SessionStatus,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct PurgeResponse {
    pub deleted: usize,
}

/// Bulk-delete sessions in a given status (moderation cleanup).
async fn purge_sessions(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PurgeQuery>,
) -> Result<Json<PurgeResponse>> {
    let deleted = state
        .db
        .delete_sessions_by_status(params.status.as_str())
        .await?;

    tracing::info!(
        status = params.status.as_str(),
        deleted,
        "Bulk session purge complete"
    );
    Ok(Json(PurgeResponse { deleted }))
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ResetUsageResponse {
    pub users_reset: usize,
}

/// Zero every user's monthly counters. Called by the scheduled monthly job.
async fn reset_usage(State(state): State<Arc<AppState>>) -> Result<Json<ResetUsageResponse>> {
    let users_reset = state.db.reset_all_usage().await?;
    tracing::info!(users_reset, "Monthly usage counters reset");
    Ok(Json(ResetUsageResponse { users_reset }))
}
