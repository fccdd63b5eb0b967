//! User model: identity, role, purchase history, and monthly usage counters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Role attached to the authenticated identity. The identity provider is
/// trusted; no credential checks happen in this service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Child,
    Mentor,
    Admin,
}

/// User profile stored in Firestore.
///
/// `purchase_history` is an append-only audit log fed by the purchase event
/// feed; expired entries stay in it forever and simply contribute no bonus.
/// `usage` counters are zeroed by an external monthly job, never by this
/// service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// User id (also used as document ID)
    pub user_id: String,
    pub role: Role,
    /// Child's age, passed to the assessment collaborator as context
    pub age: Option<u8>,
    #[serde(default)]
    pub purchase_history: Vec<Purchase>,
    #[serde(default)]
    pub usage: UsageCounters,
    /// When user first signed up (RFC3339)
    pub created_at: String,
}

/// One purchase event, appended by the purchase feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Purchase {
    pub purchase_type: PurchaseType,
    pub purchased_at: DateTime<Utc>,
    #[serde(default)]
    pub benefits: PurchaseBenefits,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseType {
    /// Time-boxed bundle that raises monthly quota limits for 30 days.
    StoryPack,
    /// Recorded for audit only; grants no quota bonus.
    Other,
}

/// Quota deltas granted by a purchase while its window is open.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PurchaseBenefits {
    #[serde(default)]
    pub stories_added: u32,
    #[serde(default)]
    pub assessments_added: u32,
    #[serde(default)]
    pub total_assessment_attempts_added: u32,
}

/// Monthly consumption counters.
///
/// Incremented via Firestore field transforms only (never read-modify-write)
/// so concurrent requests from the same user cannot lose updates.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct UsageCounters {
    #[serde(default)]
    pub stories_created: u32,
    #[serde(default)]
    pub assessment_uploads: u32,
    #[serde(default)]
    pub assessment_attempts: u32,
    #[serde(default)]
    pub competition_entries: u32,
}
