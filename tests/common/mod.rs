// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use std::sync::Arc;

use storynest::config::Config;
use storynest::db::FirestoreDb;
use storynest::middleware::auth::create_jwt;
use storynest::models::session::IntegrityRisk;
use storynest::models::user::Role;
use storynest::routes::create_router;
use storynest::services::collaborator::{ScriptedAssessor, ScriptedGenerator};
use storynest::services::{AssessmentGate, CompetitionService, QuotaLedger, StoryService};
use storynest::AppState;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Create a mock database connection (offline).
#[allow(dead_code)]
pub fn test_db_offline() -> FirestoreDb {
    FirestoreDb::new_mock()
}

/// Build state around a database with scripted collaborators.
#[allow(dead_code)]
pub fn build_state(db: FirestoreDb, risk: IntegrityRisk) -> Arc<AppState> {
    let config = Config::test_default();
    let generator = Arc::new(ScriptedGenerator::new(80));
    let assessor = Arc::new(ScriptedAssessor::new(risk));

    let ledger = Arc::new(QuotaLedger::new(db.clone(), config.quota.clone()));
    let assessments = Arc::new(AssessmentGate::new(
        db.clone(),
        config.session.clone(),
        assessor,
        ledger.clone(),
    ));
    let story = StoryService::new(
        db.clone(),
        config.session.clone(),
        generator,
        ledger.clone(),
        assessments.clone(),
    );
    let competitions = CompetitionService::new(
        db.clone(),
        config.session.clone(),
        ledger.clone(),
        assessments.clone(),
    );

    Arc::new(AppState {
        config,
        db,
        ledger,
        story,
        assessments,
        competitions,
    })
}

/// Create a test app with offline mock dependencies.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>) {
    let state = build_state(test_db_offline(), IntegrityRisk::Low);
    (create_router(state.clone()), state)
}

/// Create a test app backed by the Firestore emulator.
#[allow(dead_code)]
pub async fn create_emulator_app(risk: IntegrityRisk) -> (axum::Router, Arc<AppState>) {
    let state = build_state(test_db().await, risk);
    (create_router(state.clone()), state)
}

/// Mint a JWT for tests.
#[allow(dead_code)]
pub fn create_test_jwt(user_id: &str, role: Role, signing_key: &[u8]) -> String {
    create_jwt(user_id, role, signing_key).expect("Failed to create test JWT")
}
