// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API input validation tests.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use storynest::models::user::Role;
use tower::ServiceExt;

mod common;

fn json_request(method: &str, uri: &str, token: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_story_title_too_long() {
    let (app, state) = common::create_test_app();
    let token = common::create_test_jwt("child-1", Role::Child, &state.config.jwt_signing_key);

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/stories",
            &token,
            serde_json::json!({ "title": "a".repeat(201) }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_empty_turn_content_rejected() {
    let (app, state) = common::create_test_app();
    let token = common::create_test_jwt("child-1", Role::Child, &state.config.jwt_signing_key);

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/stories/some-session/turns",
            &token,
            serde_json::json!({ "content": "" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_invalid_pagination_cursor() {
    let (app, state) = common::create_test_app();
    let token = common::create_test_jwt("child-1", Role::Child, &state.config.jwt_signing_key);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/stories?cursor=%21%21not-base64%21%21")
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_upload_without_title_rejected() {
    let (app, state) = common::create_test_app();
    let token = common::create_test_jwt("child-1", Role::Child, &state.config.jwt_signing_key);

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/uploads/assessment",
            &token,
            serde_json::json!({ "title": "", "content": "some story text" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_competition_month_out_of_range() {
    let (app, state) = common::create_test_app();
    let token = common::create_test_jwt("admin-1", Role::Admin, &state.config.jwt_signing_key);

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/admin/competitions",
            &token,
            serde_json::json!({ "year": 2025, "month": 13 }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_purge_rejects_unknown_status() {
    let (app, state) = common::create_test_app();
    let token = common::create_test_jwt("admin-1", Role::Admin, &state.config.jwt_signing_key);

    let response = app
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/api/admin/sessions?status=everything")
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
