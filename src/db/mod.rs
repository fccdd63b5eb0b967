//! Database layer (Firestore).

pub mod firestore;

pub use firestore::FirestoreDb;

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "users";
    pub const STORY_SESSIONS: &str = "story_sessions";
    pub const TURNS: &str = "turns";
    pub const COMPETITIONS: &str = "competitions";
    /// Join collection: one document per competition entry (keyed by
    /// `{competition_id}_{session_id}`), for entry counting.
    pub const COMPETITION_ENTRIES: &str = "competition_entries";
}
