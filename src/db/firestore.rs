// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper implementing [`Store`].
//!
//! Collections:
//! - `pets` (keyed by pet id)
//! - `activities` (keyed by activity id)
//! - `activity_client_ids` (create-only claims keyed by client id)
//! - `activity_closes` (create-only claims keyed by activity id)
//!
//! Uniqueness comes from the claim documents: Firestore rejects a second
//! create of the same document id, so only one writer can own a client id
//! or close a given activity. Pet read-modify-write cycles are serialized
//! per pet within the process.

use crate::db::{activity_not_found, collections, pet_not_found, CloseOutcome, InsertOutcome, Store};
use crate::error::AppError;
use crate::models::{Activity, ActivityFilter, Mood, Pet, PetProfileUpdate, XpAward};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use firestore::errors::FirestoreError;
use firestore::paths;
use futures_util::{stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

const MAX_CONCURRENT_DB_OPS: usize = 50;

/// Per-pet write locks.
pub type PetLocks = Arc<DashMap<Uuid, Arc<Mutex<()>>>>;

/// Create-only marker document.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Claim {
    activity_id: Uuid,
    claimed_at: DateTime<Utc>,
}

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
    pet_locks: PetLocks,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self::with_client(Some(client)))
    }

    /// Connect to the emulator without credentials.
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

        Ok(Self::with_client(Some(client)))
    }

    /// Offline client for tests. Every operation returns a database error.
    pub fn new_mock() -> Self {
        Self::with_client(None)
    }

    fn with_client(client: Option<firestore::FirestoreDb>) -> Self {
        Self {
            client,
            pet_locks: Arc::new(DashMap::new()),
        }
    }

    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    fn pet_lock(&self, pet_id: Uuid) -> Arc<Mutex<()>> {
        self.pet_locks
            .entry(pet_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn write_pet(&self, pet: &Pet) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::PETS)
            .document_id(pet.id.to_string())
            .object(pet)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Read-modify-write a pet under its lock.
    async fn update_pet<F>(&self, pet_id: Uuid, f: F) -> Result<Pet, AppError>
    where
        F: FnOnce(&mut Pet) -> Result<(), AppError> + Send,
    {
        let lock = self.pet_lock(pet_id);
        let _guard = lock.lock().await;

        let mut pet = self
            .get_pet(pet_id)
            .await?
            .ok_or_else(|| pet_not_found(pet_id))?;
        f(&mut pet)?;
        self.write_pet(&pet).await?;
        Ok(pet)
    }

    // ─── Claims ──────────────────────────────────────────────────

    /// Create a claim document. Returns `false` if it already exists.
    async fn try_claim(
        &self,
        collection: &str,
        key: Uuid,
        activity_id: Uuid,
    ) -> Result<bool, AppError> {
        let claim = Claim {
            activity_id,
            claimed_at: Utc::now(),
        };

        let result: Result<Claim, FirestoreError> = self
            .get_client()?
            .fluent()
            .insert()
            .into(collection)
            .document_id(key.to_string())
            .object(&claim)
            .execute()
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(FirestoreError::DataConflictError(_)) => Ok(false),
            Err(e) => Err(AppError::Database(format!(
                "Failed to claim {}/{}: {}",
                collection, key, e
            ))),
        }
    }

    async fn get_claim(&self, collection: &str, key: Uuid) -> Result<Option<Claim>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collection)
            .obj()
            .one(&key.to_string())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Remove a claim after a failed unit of work so the operation can be retried.
    async fn release_claim(&self, collection: &str, key: Uuid) {
        let result = match self.get_client() {
            Ok(client) => client
                .fluent()
                .delete()
                .from(collection)
                .document_id(key.to_string())
                .execute()
                .await
                .map_err(|e| AppError::Database(e.to_string())),
            Err(e) => Err(e),
        };

        if let Err(e) = result {
            tracing::error!(collection, key = %key, error = %e, "Failed to release claim");
        }
    }

    // ─── Unit of Work ────────────────────────────────────────────

    /// Write the pet and activity in one transaction.
    ///
    /// With `activity_fields_only`, only the close fields of the activity are
    /// written so a concurrent payload amendment survives.
    async fn commit_pet_and_activity(
        &self,
        pet: Option<&Pet>,
        activity: &Activity,
        activity_fields_only: bool,
    ) -> Result<(), AppError> {
        let client = self.get_client()?;

        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        if let Some(pet) = pet {
            client
                .fluent()
                .update()
                .in_col(collections::PETS)
                .document_id(pet.id.to_string())
                .object(pet)
                .add_to_transaction(&mut transaction)
                .map_err(|e| {
                    AppError::Database(format!("Failed to add pet to transaction: {}", e))
                })?;
        }

        let activity_write = if activity_fields_only {
            client
                .fluent()
                .update()
                .fields(paths!(Activity::{ended_at, duration_seconds, xp_earned}))
                .in_col(collections::ACTIVITIES)
                .document_id(activity.id.to_string())
                .object(activity)
                .add_to_transaction(&mut transaction)
        } else {
            client
                .fluent()
                .update()
                .in_col(collections::ACTIVITIES)
                .document_id(activity.id.to_string())
                .object(activity)
                .add_to_transaction(&mut transaction)
        };
        activity_write.map_err(|e| {
            AppError::Database(format!("Failed to add activity to transaction: {}", e))
        })?;

        transaction
            .commit()
            .await
            .map_err(|e| AppError::Database(format!("Transaction commit failed: {}", e)))?;

        Ok(())
    }
}

#[async_trait]
impl Store for FirestoreDb {
    // ─── Pet Operations ──────────────────────────────────────────

    async fn get_pet(&self, pet_id: Uuid) -> Result<Option<Pet>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::PETS)
            .obj()
            .one(&pet_id.to_string())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn get_pets_by_owner(&self, user_id: Uuid) -> Result<Vec<Pet>, AppError> {
        let owner = user_id.to_string();
        let mut pets: Vec<Pet> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::PETS)
            .filter(move |q| q.for_all([q.field("user_id").eq(owner.clone())]))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        pets.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(pets)
    }

    async fn create_pet(&self, pet: &Pet) -> Result<(), AppError> {
        self.write_pet(pet).await
    }

    async fn add_xp(&self, pet_id: Uuid, amount: u64) -> Result<Pet, AppError> {
        self.update_pet(pet_id, |pet| pet.add_xp(amount)).await
    }

    async fn set_streak(&self, pet_id: Uuid, days: u32) -> Result<(), AppError> {
        self.update_pet(pet_id, |pet| {
            pet.streak_days = days;
            Ok(())
        })
        .await?;
        Ok(())
    }

    async fn set_mood(&self, pet_id: Uuid, mood: Mood) -> Result<(), AppError> {
        self.update_pet(pet_id, |pet| {
            pet.mood = mood;
            Ok(())
        })
        .await?;
        Ok(())
    }

    async fn update_pet_profile(
        &self,
        pet_id: Uuid,
        update: &PetProfileUpdate,
        now: DateTime<Utc>,
    ) -> Result<Pet, AppError> {
        let lock = self.pet_lock(pet_id);
        let _guard = lock.lock().await;

        let mut pet = self
            .get_pet(pet_id)
            .await?
            .ok_or_else(|| pet_not_found(pet_id))?;
        pet.apply_profile(update, now);

        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .fields(paths!(Pet::{name, breed, avatar_url, birth_date, updated_at}))
            .in_col(collections::PETS)
            .document_id(pet_id.to_string())
            .object(&pet)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(pet)
    }

    async fn delete_pet(&self, pet_id: Uuid) -> Result<(), AppError> {
        let lock = self.pet_lock(pet_id);
        let _guard = lock.lock().await;

        if self.get_pet(pet_id).await?.is_none() {
            return Err(pet_not_found(pet_id));
        }

        let client = self.get_client()?;
        let pet_key = pet_id.to_string();
        let activities: Vec<Activity> = client
            .fluent()
            .select()
            .from(collections::ACTIVITIES)
            .filter(move |q| q.for_all([q.field("pet_id").eq(pet_key.clone())]))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let removed = activities.len();
        stream::iter(activities)
            .map(|activity| async move {
                client
                    .fluent()
                    .delete()
                    .from(collections::ACTIVITIES)
                    .document_id(activity.id.to_string())
                    .execute()
                    .await
                    .map_err(|e| AppError::Database(e.to_string()))
            })
            .buffer_unordered(MAX_CONCURRENT_DB_OPS)
            .collect::<Vec<Result<(), AppError>>>()
            .await
            .into_iter()
            .collect::<Result<Vec<()>, AppError>>()?;

        client
            .fluent()
            .delete()
            .from(collections::PETS)
            .document_id(pet_id.to_string())
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        tracing::info!(pet_id = %pet_id, activities = removed, "Deleted pet");
        Ok(())
    }

    // ─── Activity Operations ─────────────────────────────────────

    async fn get_activity(&self, activity_id: Uuid) -> Result<Option<Activity>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::ACTIVITIES)
            .obj()
            .one(&activity_id.to_string())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn get_activity_by_client_id(
        &self,
        client_id: Uuid,
    ) -> Result<Option<Activity>, AppError> {
        match self
            .get_claim(collections::ACTIVITY_CLIENT_IDS, client_id)
            .await?
        {
            Some(claim) => self.get_activity(claim.activity_id).await,
            None => Ok(None),
        }
    }

    /// One equality query per pet, then filtering and pagination in memory.
    async fn list_activities(&self, filter: &ActivityFilter) -> Result<Vec<Activity>, AppError> {
        let client = self.get_client()?;

        let per_pet = stream::iter(filter.pet_ids.clone())
            .map(|pet_id| async move {
                let pet_key = pet_id.to_string();
                client
                    .fluent()
                    .select()
                    .from(collections::ACTIVITIES)
                    .filter(move |q| q.for_all([q.field("pet_id").eq(pet_key.clone())]))
                    .obj::<Activity>()
                    .query()
                    .await
                    .map_err(|e| AppError::Database(e.to_string()))
            })
            .buffer_unordered(MAX_CONCURRENT_DB_OPS)
            .collect::<Vec<Result<Vec<Activity>, AppError>>>()
            .await
            .into_iter()
            .collect::<Result<Vec<Vec<Activity>>, AppError>>()?;

        let matching = per_pet
            .into_iter()
            .flatten()
            .filter(|a| filter.matches(a))
            .collect();

        Ok(filter.paginate(matching))
    }

    async fn amend_payload(
        &self,
        activity_id: Uuid,
        game_data: serde_json::Value,
    ) -> Result<Activity, AppError> {
        let mut activity = self
            .get_activity(activity_id)
            .await?
            .ok_or_else(|| activity_not_found(activity_id))?;
        activity.game_data = Some(game_data);

        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .fields(paths!(Activity::{game_data}))
            .in_col(collections::ACTIVITIES)
            .document_id(activity_id.to_string())
            .object(&activity)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(activity)
    }

    async fn delete_activity(&self, activity_id: Uuid) -> Result<(), AppError> {
        if self.get_activity(activity_id).await?.is_none() {
            return Err(activity_not_found(activity_id));
        }

        self.get_client()?
            .fluent()
            .delete()
            .from(collections::ACTIVITIES)
            .document_id(activity_id.to_string())
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── Atomic Units ────────────────────────────────────────────

    async fn insert_activity_atomic(
        &self,
        activity: &Activity,
        award: Option<XpAward>,
    ) -> Result<InsertOutcome, AppError> {
        if let Some(client_id) = activity.client_id {
            if !self
                .try_claim(collections::ACTIVITY_CLIENT_IDS, client_id, activity.id)
                .await?
            {
                tracing::debug!(client_id = %client_id, "Client id already claimed");
                return self
                    .get_activity_by_client_id(client_id)
                    .await?
                    .map(InsertOutcome::Duplicate)
                    .ok_or_else(|| {
                        AppError::NotFound(format!(
                            "Activity for client id {} was deleted",
                            client_id
                        ))
                    });
            }
        }

        let result = async {
            let lock = self.pet_lock(activity.pet_id);
            let _guard = lock.lock().await;

            let mut pet = self
                .get_pet(activity.pet_id)
                .await?
                .ok_or_else(|| pet_not_found(activity.pet_id))?;

            let pet = match award {
                Some(award) => {
                    pet.apply_award(&award)?;
                    Some(pet)
                }
                None => None,
            };

            self.commit_pet_and_activity(pet.as_ref(), activity, false)
                .await
        }
        .await;

        if let Err(e) = result {
            if let Some(client_id) = activity.client_id {
                self.release_claim(collections::ACTIVITY_CLIENT_IDS, client_id)
                    .await;
            }
            return Err(e);
        }

        tracing::info!(
            activity_id = %activity.id,
            pet_id = %activity.pet_id,
            xp = activity.xp_earned,
            "Activity stored atomically"
        );
        Ok(InsertOutcome::Created(activity.clone()))
    }

    async fn close_activity_atomic(
        &self,
        closed: &Activity,
        award: XpAward,
    ) -> Result<CloseOutcome, AppError> {
        if !self
            .try_claim(collections::ACTIVITY_CLOSES, closed.id, closed.id)
            .await?
        {
            tracing::debug!(activity_id = %closed.id, "Activity close already claimed");
            return self
                .get_activity(closed.id)
                .await?
                .map(CloseOutcome::AlreadyClosed)
                .ok_or_else(|| activity_not_found(closed.id));
        }

        let result = async {
            let lock = self.pet_lock(closed.pet_id);
            let _guard = lock.lock().await;

            let mut pet = self
                .get_pet(closed.pet_id)
                .await?
                .ok_or_else(|| pet_not_found(closed.pet_id))?;
            let mut stored = self
                .get_activity(closed.id)
                .await?
                .ok_or_else(|| activity_not_found(closed.id))?;

            if !stored.is_open() {
                return Ok(CloseOutcome::AlreadyClosed(stored));
            }

            pet.apply_award(&award)?;
            stored.ended_at = closed.ended_at;
            stored.duration_seconds = closed.duration_seconds;
            stored.xp_earned = closed.xp_earned;

            self.commit_pet_and_activity(Some(&pet), &stored, true)
                .await?;
            Ok(CloseOutcome::Closed(stored))
        }
        .await;

        match result {
            Ok(outcome) => {
                if matches!(outcome, CloseOutcome::Closed(_)) {
                    tracing::info!(
                        activity_id = %closed.id,
                        pet_id = %closed.pet_id,
                        xp = award.xp,
                        "Activity closed atomically"
                    );
                }
                Ok(outcome)
            }
            Err(e) => {
                self.release_claim(collections::ACTIVITY_CLOSES, closed.id)
                    .await;
                Err(e)
            }
        }
    }
}
