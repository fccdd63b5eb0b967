// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Storynest: writing session and entitlement backend for a children's
//! creative-writing platform.
//!
//! This crate provides the API for collaborative story sessions, quota
//! accounting, writing assessments, and monthly competitions.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use std::sync::Arc;

use config::Config;
use db::FirestoreDb;
use services::{AssessmentGate, CompetitionService, QuotaLedger, StoryService};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: FirestoreDb,
    pub ledger: Arc<QuotaLedger>,
    pub story: StoryService,
    pub assessments: Arc<AssessmentGate>,
    pub competitions: CompetitionService,
}
