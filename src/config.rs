//! Application configuration loaded from environment variables.
//!
//! Quota bases and per-turn word-count bands are configuration inputs, not
//! constants baked into the state machines. The word-band table can be
//! overridden with `TURN_WORD_BANDS="min-max,min-max,..."` (one entry per
//! turn number).

use std::env;

/// An inclusive word-count range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WordBand {
    pub min: u32,
    pub max: u32,
}

impl WordBand {
    pub fn contains(&self, words: u32) -> bool {
        words >= self.min && words <= self.max
    }
}

/// Free-tier bases and purchase-window settings for the quota ledger.
#[derive(Debug, Clone)]
pub struct QuotaConfig {
    /// Stories a free user may start per calendar month.
    pub base_story_limit: u32,
    /// Assessment uploads per calendar month.
    pub base_assessment_uploads: u32,
    /// Total assessment attempts per calendar month, across all sessions.
    pub base_assessment_attempts: u32,
    /// Competition entries per calendar month. Fixed; purchases never raise it.
    pub competition_entries_per_month: u32,
    /// Days a story-pack purchase stays in effect.
    pub purchase_window_days: i64,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            base_story_limit: 3,
            base_assessment_uploads: 3,
            base_assessment_attempts: 9,
            competition_entries_per_month: 1,
            purchase_window_days: 30,
        }
    }
}

/// Story session state machine settings.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Turns after which a session completes.
    pub max_turns: u32,
    /// Collaborator calls allowed per session.
    pub max_api_calls: u32,
    /// Word band required of the child's input, indexed by turn number - 1.
    pub turn_word_bands: Vec<WordBand>,
    /// Fixed band applied when editing the last turn.
    pub edit_word_band: WordBand,
    /// Minimum child-authored words before an assessment may run.
    pub assessment_min_words: u32,
    /// Band required of pasted competition uploads.
    pub competition_word_band: WordBand,
    /// How many preceding turns are sent to the collaborator as context.
    pub context_window_turns: usize,
    /// Reassessments allowed per session.
    pub max_assessment_attempts: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_turns: 7,
            max_api_calls: 7,
            turn_word_bands: default_turn_bands(7),
            edit_word_band: WordBand { min: 60, max: 100 },
            assessment_min_words: 50,
            competition_word_band: WordBand {
                min: 100,
                max: 2000,
            },
            context_window_turns: 4,
            max_assessment_attempts: 3,
        }
    }
}

impl SessionConfig {
    /// Band for a given 1-based turn number. Turns past the table reuse the
    /// last entry.
    pub fn band_for_turn(&self, turn_number: u32) -> WordBand {
        let idx = (turn_number.max(1) as usize - 1).min(self.turn_word_bands.len() - 1);
        self.turn_word_bands[idx]
    }
}

/// Opening turns accept shorter input; later turns expect more developed
/// writing.
fn default_turn_bands(max_turns: u32) -> Vec<WordBand> {
    (1..=max_turns)
        .map(|turn| match turn {
            1..=2 => WordBand { min: 30, max: 120 },
            3..=5 => WordBand { min: 40, max: 150 },
            _ => WordBand { min: 50, max: 200 },
        })
        .collect()
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Frontend URL for CORS
    pub frontend_url: String,
    /// GCP project ID
    pub gcp_project_id: String,
    /// Server port
    pub port: u16,
    /// JWT signing key for session tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,
    /// Language-model collaborator endpoint (OpenAI-compatible)
    pub llm_api_url: String,
    /// Language-model collaborator API key
    pub llm_api_key: String,
    /// Model name sent to the collaborator
    pub llm_model: String,
    /// Quota ledger settings
    pub quota: QuotaConfig,
    /// Story session settings
    pub session: SessionConfig,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let mut session = SessionConfig::default();
        if let Ok(raw) = env::var("TURN_WORD_BANDS") {
            session.turn_word_bands = parse_band_table(&raw)?;
        }

        Ok(Self {
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            jwt_signing_key: env::var("JWT_SIGNING_KEY")
                .map_err(|_| ConfigError::Missing("JWT_SIGNING_KEY"))?
                .into_bytes(),
            llm_api_url: env::var("LLM_API_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            llm_api_key: env::var("LLM_API_KEY").map_err(|_| ConfigError::Missing("LLM_API_KEY"))?,
            llm_model: env::var("LLM_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            quota: QuotaConfig {
                base_story_limit: parse_env_u32("BASE_STORY_LIMIT", 3),
                base_assessment_uploads: parse_env_u32("BASE_ASSESSMENT_UPLOADS", 3),
                base_assessment_attempts: parse_env_u32("BASE_ASSESSMENT_ATTEMPTS", 9),
                ..QuotaConfig::default()
            },
            session,
        })
    }

    /// Default config for tests only.
    pub fn test_default() -> Self {
        Self {
            frontend_url: "http://localhost:5173".to_string(),
            gcp_project_id: "test-project".to_string(),
            port: 8080,
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
            llm_api_url: "http://localhost:9999/v1".to_string(),
            llm_api_key: "test_key".to_string(),
            llm_model: "test-model".to_string(),
            quota: QuotaConfig::default(),
            session: SessionConfig::default(),
        }
    }
}

fn parse_env_u32(name: &str, default: u32) -> u32 {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Parse `"30-120,30-120,40-150"` into a band table.
fn parse_band_table(raw: &str) -> Result<Vec<WordBand>, ConfigError> {
    let bands: Vec<WordBand> = raw
        .split(',')
        .map(|entry| {
            let (min, max) = entry
                .trim()
                .split_once('-')
                .ok_or(ConfigError::Invalid("TURN_WORD_BANDS"))?;
            let min: u32 = min.parse().map_err(|_| ConfigError::Invalid("TURN_WORD_BANDS"))?;
            let max: u32 = max.parse().map_err(|_| ConfigError::Invalid("TURN_WORD_BANDS"))?;
            if min > max {
                return Err(ConfigError::Invalid("TURN_WORD_BANDS"));
            }
            Ok(WordBand { min, max })
        })
        .collect::<Result<_, _>>()?;

    if bands.is_empty() {
        return Err(ConfigError::Invalid("TURN_WORD_BANDS"));
    }
    Ok(bands)
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}
