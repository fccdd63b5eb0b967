// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Language-model collaborator clients.
//!
//! The orchestrator treats text generation and assessment as opaque
//! services: a context goes in, text or a structured assessment comes out,
//! and any failure surfaces as `CollaboratorUnavailable` without corrupting
//! session state. Production talks to an OpenAI-compatible chat endpoint;
//! tests use the scripted implementations.

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::AppError;
use crate::models::session::{AssessmentResult, IntegrityRisk};

/// Context passed to the assessment collaborator.
#[derive(Debug, Clone)]
pub struct AssessmentContext {
    pub child_age: Option<u8>,
    pub title: String,
}

/// Produces the AI half of a collaborative turn.
#[async_trait]
pub trait StoryGenerator: Send + Sync {
    async fn generate_next_turn(
        &self,
        preceding_context: &str,
        turn_number: u32,
    ) -> Result<String, AppError>;
}

/// Scores a finished story and judges its integrity risk.
#[async_trait]
pub trait StoryAssessor: Send + Sync {
    async fn assess(
        &self,
        content: &str,
        context: &AssessmentContext,
    ) -> Result<AssessmentResult, AppError>;
}

// ─── HTTP Client ─────────────────────────────────────────────

/// Client for an OpenAI-compatible chat completions API.
#[derive(Clone)]
pub struct LlmClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

impl LlmClient {
    pub fn new(base_url: String, api_key: String, model: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
            api_key,
            model,
        }
    }

    async fn chat(&self, system: &str, user: &str) -> Result<String, AppError> {
        let url = format!("{}/chat/completions", self.base_url);

        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user},
            ],
        });

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::CollaboratorUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::CollaboratorUnavailable(format!(
                "API returned {}: {}",
                status, text
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| AppError::CollaboratorUnavailable(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| AppError::CollaboratorUnavailable("empty response".to_string()))
    }
}

#[async_trait]
impl StoryGenerator for LlmClient {
    async fn generate_next_turn(
        &self,
        preceding_context: &str,
        turn_number: u32,
    ) -> Result<String, AppError> {
        let system = "You are a creative-writing partner for a child. \
                      Continue the story with one short paragraph.";
        let user = format!("Turn {}. Story so far:\n{}", turn_number, preceding_context);
        self.chat(system, &user).await
    }
}

#[async_trait]
impl StoryAssessor for LlmClient {
    async fn assess(
        &self,
        content: &str,
        context: &AssessmentContext,
    ) -> Result<AssessmentResult, AppError> {
        let system = "You are a writing assessor for children's stories. \
                      Respond with a JSON object with keys category_scores, \
                      integrity_risk (low|medium|high|critical) and feedback.";
        let age = context
            .child_age
            .map(|a| a.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        let user = format!(
            "Title: {}\nChild age: {}\n\nStory:\n{}",
            context.title, age, content
        );

        let raw = self.chat(system, &user).await?;

        serde_json::from_str::<AssessmentResult>(&raw).map_err(|e| {
            AppError::CollaboratorUnavailable(format!("unparseable assessment: {}", e))
        })
    }
}

// ─── Scripted Implementations (for tests and offline mode) ───

/// Generator that returns a fixed response of a configurable word count.
pub struct ScriptedGenerator {
    response_words: u32,
    fail: bool,
}

impl ScriptedGenerator {
    pub fn new(response_words: u32) -> Self {
        Self {
            response_words,
            fail: false,
        }
    }

    /// Generator whose every call fails, for outage testing.
    pub fn failing() -> Self {
        Self {
            response_words: 0,
            fail: true,
        }
    }
}

#[async_trait]
impl StoryGenerator for ScriptedGenerator {
    async fn generate_next_turn(
        &self,
        _preceding_context: &str,
        turn_number: u32,
    ) -> Result<String, AppError> {
        if self.fail {
            return Err(AppError::CollaboratorUnavailable(
                "scripted outage".to_string(),
            ));
        }
        Ok(format!("response{} ", turn_number).repeat(self.response_words as usize))
    }
}

/// Assessor that returns a fixed integrity risk.
pub struct ScriptedAssessor {
    risk: IntegrityRisk,
    fail: bool,
}

impl ScriptedAssessor {
    pub fn new(risk: IntegrityRisk) -> Self {
        Self { risk, fail: false }
    }

    pub fn failing() -> Self {
        Self {
            risk: IntegrityRisk::Low,
            fail: true,
        }
    }
}

#[async_trait]
impl StoryAssessor for ScriptedAssessor {
    async fn assess(
        &self,
        _content: &str,
        _context: &AssessmentContext,
    ) -> Result<AssessmentResult, AppError> {
        if self.fail {
            return Err(AppError::CollaboratorUnavailable(
                "scripted outage".to_string(),
            ));
        }
        Ok(AssessmentResult {
            category_scores: serde_json::json!({"creativity": 8, "grammar": 7}),
            integrity_risk: self.risk,
            feedback: "Nice work; keep developing your characters.".to_string(),
        })
    }
}
