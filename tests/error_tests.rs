// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::http::StatusCode;
use axum::response::IntoResponse;
use storynest::error::AppError;

#[test]
fn test_quota_exceeded_maps_to_429() {
    let err = AppError::QuotaExceeded {
        action: "create_story",
        current_usage: 3,
        limit: 3,
    };
    assert_eq!(err.into_response().status(), StatusCode::TOO_MANY_REQUESTS);
}

#[test]
fn test_state_conflicts_map_to_409() {
    let conflicts = [
        AppError::SessionNotActive("flagged".to_string()),
        AppError::TurnLimitReached { used: 7, max: 7 },
        AppError::OnlyLastTurnDeletable,
        AppError::MaxAttemptsReached { attempts: 3, max: 3 },
        AppError::NoModificationSinceLastAssessment,
        AppError::NoActiveCompetition,
        AppError::InvalidPhaseTransition {
            from: "results".to_string(),
            to: "submission".to_string(),
        },
    ];
    for err in conflicts {
        assert_eq!(err.into_response().status(), StatusCode::CONFLICT);
    }
}

#[test]
fn test_content_errors_map_to_400() {
    let err = AppError::WordCountOutOfRange {
        actual: 10,
        min: 30,
        max: 120,
    };
    assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);

    let err = AppError::InsufficientContent { actual: 20, min: 50 };
    assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
}

#[test]
fn test_collaborator_outage_maps_to_502() {
    let err = AppError::CollaboratorUnavailable("connection refused".to_string());
    assert_eq!(err.into_response().status(), StatusCode::BAD_GATEWAY);
}

#[test]
fn test_infrastructure_errors_map_to_500() {
    let err = AppError::Database("deadline exceeded".to_string());
    assert_eq!(
        err.into_response().status(),
        StatusCode::INTERNAL_SERVER_ERROR
    );
}

#[test]
fn test_is_domain_error_split() {
    assert!(AppError::NoActiveCompetition.is_domain_error());
    assert!(AppError::QuotaExceeded {
        action: "enter_competition",
        current_usage: 1,
        limit: 1,
    }
    .is_domain_error());

    assert!(!AppError::Database("x".to_string()).is_domain_error());
    assert!(!AppError::CollaboratorUnavailable("x".to_string()).is_domain_error());
    assert!(!AppError::Internal(anyhow::anyhow!("x")).is_domain_error());
}
