// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Users (profile, purchase history, monthly usage counters)
//! - Story sessions and their turns
//! - Competitions and the competition-entry join collection
//!
//! Counter bumps use Firestore field transforms so they stay atomic under
//! concurrent requests. Every state transition that touches more than one
//! field or document runs inside a single transaction: a submitted turn or
//! an assessment either commits with all its side effects or not at all.

use crate::db::collections;
use crate::error::AppError;
use crate::models::competition::CompetitionEntryRecord;
use crate::models::{Competition, QuotaAction, StorySession, Turn, User};
use futures_util::{stream, StreamExt};

const MAX_CONCURRENT_DB_OPS: usize = 50;
// Firestore limits batch/transaction writes to 500 operations.
// We use a safe limit of 400 to allow headroom.
const BATCH_SIZE: usize = 400;

/// Usage counter field path for an action.
fn usage_field(action: QuotaAction) -> &'static str {
    match action {
        QuotaAction::CreateStory => "usage.stories_created",
        QuotaAction::UploadAssessment => "usage.assessment_uploads",
        QuotaAction::AttemptAssessment => "usage.assessment_attempts",
        QuotaAction::EnterCompetition => "usage.competition_entries",
    }
}

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    // ─── User Operations ─────────────────────────────────────────

    /// Get a user by id.
    pub async fn get_user(&self, user_id: &str) -> Result<Option<User>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(user_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create or update a user.
    pub async fn upsert_user(&self, user: &User) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::USERS)
            .document_id(&user.user_id)
            .object(user)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Atomically bump a monthly usage counter by 1.
    ///
    /// Field transform, not read-modify-write: two tabs hammering the same
    /// account cannot lose an increment. Counters only ever go up here; the
    /// monthly reset is a separate maintenance operation.
    pub async fn increment_usage(
        &self,
        user_id: &str,
        action: QuotaAction,
    ) -> Result<(), AppError> {
        let client = self.get_client()?;
        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        client
            .fluent()
            .update()
            .in_col(collections::USERS)
            .document_id(user_id)
            .transforms(|t| t.fields([t.field(usage_field(action)).increment(1)]))
            .only_transform()
            .add_to_transaction(&mut transaction)
            .map_err(|e| AppError::Database(format!("Failed to add usage transform: {}", e)))?;

        transaction
            .commit()
            .await
            .map_err(|e| AppError::Database(format!("Transaction commit failed: {}", e)))?;
        Ok(())
    }

    /// Zero the monthly usage counters for every user.
    ///
    /// Invoked by the external monthly reset trigger; this is the only code
    /// path that ever lowers a counter. Returns the number of users reset.
    pub async fn reset_all_usage(&self) -> Result<usize, AppError> {
        let users: Vec<User> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::USERS)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let count = users.len();
        let client = self.get_client()?;

        stream::iter(users)
            .map(|mut user| async move {
                user.usage = Default::default();
                let _: () = client
                    .fluent()
                    .update()
                    .fields(firestore::paths!(User::usage))
                    .in_col(collections::USERS)
                    .document_id(&user.user_id.clone())
                    .object(&user)
                    .execute()
                    .await
                    .map_err(|e| AppError::Database(e.to_string()))?;
                Ok::<_, AppError>(())
            })
            .buffer_unordered(MAX_CONCURRENT_DB_OPS)
            .collect::<Vec<Result<(), AppError>>>()
            .await
            .into_iter()
            .collect::<Result<Vec<()>, AppError>>()?;

        Ok(count)
    }

    // ─── Story Session Operations ────────────────────────────────

    /// Get a session by id.
    pub async fn get_session(&self, session_id: &str) -> Result<Option<StorySession>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::STORY_SESSIONS)
            .obj()
            .one(session_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// List a child's sessions, newest first, with cursor pagination.
    pub async fn get_sessions_for_child(
        &self,
        child_id: &str,
        created_before: Option<chrono::DateTime<chrono::Utc>>,
        limit: u32,
    ) -> Result<Vec<StorySession>, AppError> {
        let child_id = child_id.to_string();
        let query = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::STORY_SESSIONS);

        let query = if let Some(before) = created_before {
            query.filter(move |q| {
                q.for_all([
                    q.field("child_id").eq(child_id.clone()),
                    q.field("created_at").less_than(before),
                ])
            })
        } else {
            query.filter(move |q| q.field("child_id").eq(child_id.clone()))
        };

        query
            .order_by([(
                "created_at",
                firestore::FirestoreQueryDirection::Descending,
            )])
            .limit(limit)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Plain session write (status flips, assessment-error records, edits
    /// whose counters were recomputed from turns).
    pub async fn set_session(&self, session: &StorySession) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::STORY_SESSIONS)
            .document_id(&session.id)
            .object(session)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Atomically create a session and consume one unit of the relevant
    /// quota. Upload sessions also write their pasted content's turn in the
    /// same transaction.
    pub async fn create_session_with_usage(
        &self,
        session: &StorySession,
        upload_turn: Option<&Turn>,
        action: QuotaAction,
    ) -> Result<(), AppError> {
        let client = self.get_client()?;
        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        client
            .fluent()
            .update()
            .in_col(collections::STORY_SESSIONS)
            .document_id(&session.id)
            .object(session)
            .add_to_transaction(&mut transaction)
            .map_err(|e| AppError::Database(format!("Failed to add session write: {}", e)))?;

        if let Some(turn) = upload_turn {
            client
                .fluent()
                .update()
                .in_col(collections::TURNS)
                .document_id(&turn.id)
                .object(turn)
                .add_to_transaction(&mut transaction)
                .map_err(|e| AppError::Database(format!("Failed to add turn write: {}", e)))?;
        }

        client
            .fluent()
            .update()
            .in_col(collections::USERS)
            .document_id(&session.child_id)
            .transforms(|t| t.fields([t.field(usage_field(action)).increment(1)]))
            .only_transform()
            .add_to_transaction(&mut transaction)
            .map_err(|e| AppError::Database(format!("Failed to add usage transform: {}", e)))?;

        transaction
            .commit()
            .await
            .map_err(|e| AppError::Database(format!("Transaction commit failed: {}", e)))?;
        Ok(())
    }

    /// Get all turns for a session, ordered by turn number.
    pub async fn get_turns_for_session(&self, session_id: &str) -> Result<Vec<Turn>, AppError> {
        let session_id = session_id.to_string();
        self.get_client()?
            .fluent()
            .select()
            .from(collections::TURNS)
            .filter(move |q| q.field("session_id").eq(session_id.clone()))
            .order_by([(
                "turn_number",
                firestore::FirestoreQueryDirection::Ascending,
            )])
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Atomically persist a submitted turn and the updated session.
    ///
    /// Re-reads the session inside the transaction and verifies the turn
    /// number is still the expected one; a concurrent submission from a
    /// second tab loses the race and gets `false` instead of a duplicate
    /// turn. Firestore retries on write conflicts, so the check holds.
    pub async fn submit_turn_atomic(
        &self,
        session: &StorySession,
        turn: &Turn,
    ) -> Result<bool, AppError> {
        let client = self.get_client()?;
        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        let current: Option<StorySession> = client
            .fluent()
            .select()
            .by_id_in(collections::STORY_SESSIONS)
            .obj()
            .one(&session.id)
            .await
            .map_err(|e| {
                AppError::Database(format!("Failed to read session in transaction: {}", e))
            })?;

        let Some(current) = current else {
            let _ = transaction.rollback().await;
            return Err(AppError::NotFound(format!("Session {}", session.id)));
        };

        if current.current_turn != turn.turn_number {
            tracing::debug!(
                session_id = %session.id,
                expected = turn.turn_number,
                actual = current.current_turn,
                "Concurrent turn submission lost the race"
            );
            let _ = transaction.rollback().await;
            return Ok(false);
        }

        client
            .fluent()
            .update()
            .in_col(collections::TURNS)
            .document_id(&turn.id)
            .object(turn)
            .add_to_transaction(&mut transaction)
            .map_err(|e| AppError::Database(format!("Failed to add turn write: {}", e)))?;

        client
            .fluent()
            .update()
            .in_col(collections::STORY_SESSIONS)
            .document_id(&session.id)
            .object(session)
            .add_to_transaction(&mut transaction)
            .map_err(|e| AppError::Database(format!("Failed to add session write: {}", e)))?;

        transaction
            .commit()
            .await
            .map_err(|e| AppError::Database(format!("Transaction commit failed: {}", e)))?;
        Ok(true)
    }

    /// Atomically delete a turn and write the rolled-back session.
    pub async fn delete_turn_atomic(
        &self,
        turn_id: &str,
        session: &StorySession,
    ) -> Result<(), AppError> {
        let client = self.get_client()?;
        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        client
            .fluent()
            .delete()
            .from(collections::TURNS)
            .document_id(turn_id)
            .add_to_transaction(&mut transaction)
            .map_err(|e| AppError::Database(format!("Failed to add turn delete: {}", e)))?;

        client
            .fluent()
            .update()
            .in_col(collections::STORY_SESSIONS)
            .document_id(&session.id)
            .object(session)
            .add_to_transaction(&mut transaction)
            .map_err(|e| AppError::Database(format!("Failed to add session write: {}", e)))?;

        transaction
            .commit()
            .await
            .map_err(|e| AppError::Database(format!("Transaction commit failed: {}", e)))?;
        Ok(())
    }

    /// Atomically write an edited turn and its session's recomputed
    /// aggregates.
    pub async fn update_turn_atomic(
        &self,
        turn: &Turn,
        session: &StorySession,
    ) -> Result<(), AppError> {
        let client = self.get_client()?;
        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        client
            .fluent()
            .update()
            .in_col(collections::TURNS)
            .document_id(&turn.id)
            .object(turn)
            .add_to_transaction(&mut transaction)
            .map_err(|e| AppError::Database(format!("Failed to add turn write: {}", e)))?;

        client
            .fluent()
            .update()
            .in_col(collections::STORY_SESSIONS)
            .document_id(&session.id)
            .object(session)
            .add_to_transaction(&mut transaction)
            .map_err(|e| AppError::Database(format!("Failed to add session write: {}", e)))?;

        transaction
            .commit()
            .await
            .map_err(|e| AppError::Database(format!("Transaction commit failed: {}", e)))?;
        Ok(())
    }

    /// Atomically persist an assessment result onto the session and consume
    /// one unit of the monthly attempt budget.
    pub async fn record_assessment_atomic(&self, session: &StorySession) -> Result<(), AppError> {
        let client = self.get_client()?;
        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        client
            .fluent()
            .update()
            .in_col(collections::STORY_SESSIONS)
            .document_id(&session.id)
            .object(session)
            .add_to_transaction(&mut transaction)
            .map_err(|e| AppError::Database(format!("Failed to add session write: {}", e)))?;

        client
            .fluent()
            .update()
            .in_col(collections::USERS)
            .document_id(&session.child_id)
            .transforms(|t| {
                t.fields([t
                    .field(usage_field(QuotaAction::AttemptAssessment))
                    .increment(1)])
            })
            .only_transform()
            .add_to_transaction(&mut transaction)
            .map_err(|e| AppError::Database(format!("Failed to add usage transform: {}", e)))?;

        transaction
            .commit()
            .await
            .map_err(|e| AppError::Database(format!("Transaction commit failed: {}", e)))?;
        Ok(())
    }

    /// Admin bulk session deletion, filtered by status. Deletes each
    /// session's turns as well. Returns the number of sessions deleted.
    pub async fn delete_sessions_by_status(&self, status: &str) -> Result<usize, AppError> {
        let status = status.to_string();
        let sessions: Vec<StorySession> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::STORY_SESSIONS)
            .filter(move |q| q.field("status").eq(status.clone()))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let count = sessions.len();

        let session_ids: Vec<String> = sessions.iter().map(|s| s.id.clone()).collect();
        let turns: Vec<Vec<Turn>> = stream::iter(session_ids)
            .map(|session_id| async move { self.get_turns_for_session(&session_id).await })
            .buffer_unordered(MAX_CONCURRENT_DB_OPS)
            .collect::<Vec<Result<Vec<Turn>, AppError>>>()
            .await
            .into_iter()
            .collect::<Result<_, AppError>>()?;
        let turns: Vec<Turn> = turns.into_iter().flatten().collect();

        self.batch_delete(&turns, collections::TURNS, |t: &Turn| t.id.clone())
            .await?;
        self.batch_delete(&sessions, collections::STORY_SESSIONS, |s: &StorySession| {
            s.id.clone()
        })
        .await?;

        tracing::info!(count, turns_deleted = turns.len(), "Bulk session deletion complete");
        Ok(count)
    }

    // ─── Competition Operations ──────────────────────────────────

    /// Create a competition. The document id is the period key, so a second
    /// create for the same (month, year) fails instead of duplicating.
    pub async fn insert_competition(&self, competition: &Competition) -> Result<(), AppError> {
        let _: Competition = self
            .get_client()?
            .fluent()
            .insert()
            .into(collections::COMPETITIONS)
            .document_id(&competition.id)
            .object(competition)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Get a competition by id.
    pub async fn get_competition(&self, id: &str) -> Result<Option<Competition>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::COMPETITIONS)
            .obj()
            .one(id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// All competition documents (for reconciliation).
    pub async fn list_competitions(&self) -> Result<Vec<Competition>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::COMPETITIONS)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Competitions currently marked active, newest first.
    pub async fn get_active_competitions(&self) -> Result<Vec<Competition>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::COMPETITIONS)
            .filter(|q| q.field("is_active").eq(true))
            .order_by([(
                "created_at",
                firestore::FirestoreQueryDirection::Descending,
            )])
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Plain competition write.
    pub async fn set_competition(&self, competition: &Competition) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::COMPETITIONS)
            .document_id(&competition.id)
            .object(competition)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Entry join records for a competition.
    pub async fn get_entries_for_competition(
        &self,
        competition_id: &str,
    ) -> Result<Vec<CompetitionEntryRecord>, AppError> {
        let competition_id = competition_id.to_string();
        self.get_client()?
            .fluent()
            .select()
            .from(collections::COMPETITION_ENTRIES)
            .filter(move |q| q.field("competition_id").eq(competition_id.clone()))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Atomically record a competition entry: session write, the pasted
    /// content's turn for upload entries, entry join document, entry-quota
    /// consumption, and the competition's submission counter, in one
    /// transaction.
    pub async fn enter_competition_atomic(
        &self,
        session: &StorySession,
        upload_turn: Option<&Turn>,
        entry: &CompetitionEntryRecord,
    ) -> Result<(), AppError> {
        let client = self.get_client()?;
        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        client
            .fluent()
            .update()
            .in_col(collections::STORY_SESSIONS)
            .document_id(&session.id)
            .object(session)
            .add_to_transaction(&mut transaction)
            .map_err(|e| AppError::Database(format!("Failed to add session write: {}", e)))?;

        if let Some(turn) = upload_turn {
            client
                .fluent()
                .update()
                .in_col(collections::TURNS)
                .document_id(&turn.id)
                .object(turn)
                .add_to_transaction(&mut transaction)
                .map_err(|e| AppError::Database(format!("Failed to add turn write: {}", e)))?;
        }

        let entry_doc_id = format!("{}_{}", entry.competition_id, entry.session_id);
        client
            .fluent()
            .update()
            .in_col(collections::COMPETITION_ENTRIES)
            .document_id(&entry_doc_id)
            .object(entry)
            .add_to_transaction(&mut transaction)
            .map_err(|e| AppError::Database(format!("Failed to add entry write: {}", e)))?;

        client
            .fluent()
            .update()
            .in_col(collections::USERS)
            .document_id(&entry.child_id)
            .transforms(|t| {
                t.fields([t
                    .field(usage_field(QuotaAction::EnterCompetition))
                    .increment(1)])
            })
            .only_transform()
            .add_to_transaction(&mut transaction)
            .map_err(|e| AppError::Database(format!("Failed to add usage transform: {}", e)))?;

        client
            .fluent()
            .update()
            .in_col(collections::COMPETITIONS)
            .document_id(&entry.competition_id)
            .transforms(|t| t.fields([t.field("total_submissions").increment(1)]))
            .only_transform()
            .add_to_transaction(&mut transaction)
            .map_err(|e| AppError::Database(format!("Failed to add stats transform: {}", e)))?;

        transaction
            .commit()
            .await
            .map_err(|e| AppError::Database(format!("Transaction commit failed: {}", e)))?;
        Ok(())
    }

    /// Apply a reconciliation plan: archive demotions and deletions in
    /// chunked transactions.
    pub async fn apply_reconcile_plan(
        &self,
        archived: &[Competition],
        delete_ids: &[String],
    ) -> Result<(), AppError> {
        let client = self.get_client()?;

        enum Op<'a> {
            Archive(&'a Competition),
            Delete(&'a String),
        }

        let ops: Vec<Op> = archived
            .iter()
            .map(Op::Archive)
            .chain(delete_ids.iter().map(Op::Delete))
            .collect();

        for chunk in ops.chunks(BATCH_SIZE) {
            let mut transaction = client
                .begin_transaction()
                .await
                .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

            for op in chunk {
                match op {
                    Op::Archive(competition) => {
                        client
                            .fluent()
                            .update()
                            .in_col(collections::COMPETITIONS)
                            .document_id(&competition.id)
                            .object(*competition)
                            .add_to_transaction(&mut transaction)
                            .map_err(|e| {
                                AppError::Database(format!(
                                    "Failed to add competition write: {}",
                                    e
                                ))
                            })?;
                    }
                    Op::Delete(id) => {
                        client
                            .fluent()
                            .delete()
                            .from(collections::COMPETITIONS)
                            .document_id(*id)
                            .add_to_transaction(&mut transaction)
                            .map_err(|e| {
                                AppError::Database(format!(
                                    "Failed to add competition delete: {}",
                                    e
                                ))
                            })?;
                    }
                }
            }

            transaction.commit().await.map_err(|e| {
                AppError::Database(format!("Failed to commit reconciliation batch: {}", e))
            })?;
        }

        Ok(())
    }

    // ─── Helper Methods ────────────────────────────────────────────

    /// Helper to batch delete documents using transactions.
    async fn batch_delete<T, F>(
        &self,
        items: &[T],
        collection: &str,
        id_extractor: F,
    ) -> Result<(), AppError>
    where
        F: Fn(&T) -> String,
    {
        let client = self.get_client()?;

        for chunk in items.chunks(BATCH_SIZE) {
            let mut transaction = client
                .begin_transaction()
                .await
                .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

            for item in chunk {
                let doc_id = id_extractor(item);
                client
                    .fluent()
                    .delete()
                    .from(collection)
                    .document_id(&doc_id)
                    .add_to_transaction(&mut transaction)
                    .map_err(|e| {
                        AppError::Database(format!(
                            "Failed to add deletion to transaction for {}: {}",
                            collection, e
                        ))
                    })?;
            }

            transaction.commit().await.map_err(|e| {
                AppError::Database(format!("Failed to commit batch deletion: {}", e))
            })?;
        }

        Ok(())
    }
}
