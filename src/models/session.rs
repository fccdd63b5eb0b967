// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Story session and turn models with the pure parts of the session state
//! machine.
//!
//! Transitions: `active → completed` (turn limit reached, or created
//! pre-completed by upload), `active → flagged` (critical integrity risk),
//! `completed → active` (last-turn deletion only), `active/completed →
//! review` (manual escalation). Aggregate word counts are always recomputed
//! from the turn list, never patched incrementally, so rollbacks cannot
//! drift.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Lifecycle status of a story session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Completed,
    Flagged,
    Review,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Completed => "completed",
            SessionStatus::Flagged => "flagged",
            SessionStatus::Review => "review",
        }
    }
}

/// How the session's content entered the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoryType {
    /// Built turn by turn with the collaborator.
    Freestyle,
    /// Pasted in already complete, for assessment.
    Uploaded,
    /// Pasted in already complete, entered into a competition.
    Competition,
}

impl StoryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoryType::Freestyle => "freestyle",
            StoryType::Uploaded => "uploaded",
            StoryType::Competition => "competition",
        }
    }
}

/// One writing attempt stored in Firestore.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorySession {
    /// Session id (also used as document ID)
    pub id: String,
    pub child_id: String,
    pub title: String,
    pub status: SessionStatus,
    pub story_type: StoryType,
    /// Next turn number to be written (1-based).
    pub current_turn: u32,
    pub api_calls_used: u32,
    pub max_api_calls: u32,
    pub total_words: u32,
    pub child_words: u32,
    #[serde(default)]
    pub assessment_attempts: u32,
    pub last_assessed_at: Option<DateTime<Utc>>,
    pub last_modified_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub assessment: Option<AssessmentRecord>,
    #[serde(default)]
    pub competition_entries: Vec<CompetitionEntry>,
}

/// Link from a session to a competition it was entered into.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompetitionEntry {
    pub competition_id: String,
    pub submitted_at: DateTime<Utc>,
}

/// One child-input/AI-response exchange. Owned by its session; `turn_number`
/// is unique per session and monotonically increasing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    /// Turn id (also used as document ID)
    pub id: String,
    pub session_id: String,
    pub turn_number: u32,
    pub child_input: String,
    pub ai_response: String,
    pub child_word_count: u32,
    pub ai_word_count: u32,
    pub created_at: DateTime<Utc>,
}

/// Outcome of an assessment run, or the error that prevented one.
///
/// A failed automatic assessment is recorded here instead of failing the
/// turn submission that triggered it; the turn already succeeded and is
/// never rolled back.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AssessmentRecord {
    Completed {
        result: AssessmentResult,
        assessed_at: DateTime<Utc>,
    },
    Failed {
        error: String,
        failed_at: DateTime<Utc>,
    },
}

/// Structured result from the opaque assessment collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssessmentResult {
    /// Per-category scores, passed through as-is.
    pub category_scores: serde_json::Value,
    pub integrity_risk: IntegrityRisk,
    pub feedback: String,
}

/// Plagiarism/AI-generation likelihood as judged by the collaborator.
/// `Critical` escalates the session to `flagged`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntegrityRisk {
    Low,
    Medium,
    High,
    Critical,
}

impl StorySession {
    /// Check that a turn may be submitted right now.
    pub fn ensure_turn_allowed(&self) -> Result<(), AppError> {
        if self.status != SessionStatus::Active {
            return Err(AppError::SessionNotActive(self.status.as_str().to_string()));
        }
        if self.api_calls_used >= self.max_api_calls {
            return Err(AppError::TurnLimitReached {
                used: self.api_calls_used,
                max: self.max_api_calls,
            });
        }
        Ok(())
    }

    /// Whether advancing past `max_turns` completes the session.
    pub fn completes_after_turn(&self, max_turns: u32) -> bool {
        self.current_turn + 1 > max_turns
    }

    /// True once the story has been edited after its last assessment, which
    /// unlocks a reassessment. Derived, never stored.
    pub fn needs_reassessment_unlock(&self) -> bool {
        match self.last_assessed_at {
            Some(assessed_at) => self.last_modified_at > assessed_at,
            None => true,
        }
    }

    /// Recompute `current_turn` and word aggregates from the surviving
    /// turns. Used after last-turn deletion and edits.
    pub fn recompute_from_turns(&mut self, turns: &[Turn]) {
        self.current_turn = turns.iter().map(|t| t.turn_number).max().unwrap_or(0) + 1;
        self.child_words = turns.iter().map(|t| t.child_word_count).sum();
        self.total_words = turns
            .iter()
            .map(|t| t.child_word_count + t.ai_word_count)
            .sum();
    }
}

/// Whitespace word count used for all banding decisions.
pub fn word_count(text: &str) -> u32 {
    text.split_whitespace().count() as u32
}

/// Child-authored text across turns, in turn order. This is what gets
/// assessed when a collaborative session completes.
pub fn concatenated_child_text(turns: &[Turn]) -> String {
    let mut sorted: Vec<&Turn> = turns.iter().collect();
    sorted.sort_by_key(|t| t.turn_number);
    sorted
        .iter()
        .map(|t| t.child_input.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}
