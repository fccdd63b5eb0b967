// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Storynest API Server
//!
//! Backend for a children's creative-writing platform: collaborative story
//! sessions, quota entitlements, writing assessments, and monthly
//! competitions.

use std::sync::Arc;

use storynest::{
    config::Config,
    db::FirestoreDb,
    services::{AssessmentGate, CompetitionService, LlmClient, QuotaLedger, StoryService},
    AppState,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging();

    // Load configuration from environment
    let config = Config::from_env().expect("Failed to load configuration");
    tracing::info!(port = config.port, "Starting Storynest API");

    // Initialize Firestore database
    let db = FirestoreDb::new(&config.gcp_project_id)
        .await
        .expect("Failed to connect to Firestore");

    // One HTTP client serves both collaborator roles
    let collaborator = Arc::new(LlmClient::new(
        config.llm_api_url.clone(),
        config.llm_api_key.clone(),
        config.llm_model.clone(),
    ));
    tracing::info!(model = %config.llm_model, "Collaborator client initialized");

    let ledger = Arc::new(QuotaLedger::new(db.clone(), config.quota.clone()));
    let assessments = Arc::new(AssessmentGate::new(
        db.clone(),
        config.session.clone(),
        collaborator.clone(),
        ledger.clone(),
    ));
    let story = StoryService::new(
        db.clone(),
        config.session.clone(),
        collaborator,
        ledger.clone(),
        assessments.clone(),
    );
    let competitions = CompetitionService::new(
        db.clone(),
        config.session.clone(),
        ledger.clone(),
        assessments.clone(),
    );

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        db,
        ledger,
        story,
        assessments,
        competitions,
    });

    // Build router
    let app = storynest::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("storynest=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
