// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Persistence layer.
//!
//! The service talks to storage through [`Store`]. Two backends exist:
//! [`MemoryDb`] for local runs and tests, and [`FirestoreDb`] for production.

pub mod firestore;
pub mod memory;

pub use self::firestore::FirestoreDb;
pub use self::memory::MemoryDb;

use crate::error::AppError;
use crate::models::{Activity, ActivityFilter, Mood, Pet, PetProfileUpdate, XpAward};
use chrono::{DateTime, Utc};
use async_trait::async_trait;
use uuid::Uuid;

/// Collection names as constants.
pub mod collections {
    pub const PETS: &str = "pets";
    pub const ACTIVITIES: &str = "activities";
    /// Client-id claims (keyed by client_id), enforcing one activity per client id
    pub const ACTIVITY_CLIENT_IDS: &str = "activity_client_ids";
    /// Close claims (keyed by activity id), enforcing one XP award per activity
    pub const ACTIVITY_CLOSES: &str = "activity_closes";
}

/// Result of inserting an activity.
#[derive(Debug, Clone)]
pub enum InsertOutcome {
    Created(Activity),
    /// Another activity already carries this client id; it is returned unchanged.
    Duplicate(Activity),
}

impl InsertOutcome {
    pub fn into_activity(self) -> Activity {
        match self {
            InsertOutcome::Created(a) | InsertOutcome::Duplicate(a) => a,
        }
    }
}

/// Result of closing an activity.
#[derive(Debug, Clone)]
pub enum CloseOutcome {
    Closed(Activity),
    /// The activity had already been closed; no XP was awarded.
    AlreadyClosed(Activity),
}

impl CloseOutcome {
    pub fn into_activity(self) -> Activity {
        match self {
            CloseOutcome::Closed(a) | CloseOutcome::AlreadyClosed(a) => a,
        }
    }
}

/// Storage operations used by the services.
///
/// `insert_activity_atomic` and `close_activity_atomic` are the only writes
/// that touch pet progression; each is a single unit of work.
#[async_trait]
pub trait Store: Send + Sync {
    // ─── Pets ────────────────────────────────────────────────────

    async fn get_pet(&self, pet_id: Uuid) -> Result<Option<Pet>, AppError>;

    async fn get_pets_by_owner(&self, user_id: Uuid) -> Result<Vec<Pet>, AppError>;

    async fn create_pet(&self, pet: &Pet) -> Result<(), AppError>;

    /// Add XP to a pet and recompute its level.
    async fn add_xp(&self, pet_id: Uuid, amount: u64) -> Result<Pet, AppError>;

    async fn set_streak(&self, pet_id: Uuid, days: u32) -> Result<(), AppError>;

    async fn set_mood(&self, pet_id: Uuid, mood: Mood) -> Result<(), AppError>;

    /// Apply profile changes. Progression fields are never written.
    async fn update_pet_profile(
        &self,
        pet_id: Uuid,
        update: &PetProfileUpdate,
        now: DateTime<Utc>,
    ) -> Result<Pet, AppError>;

    /// Delete a pet and its activities. Client-id claims survive.
    async fn delete_pet(&self, pet_id: Uuid) -> Result<(), AppError>;

    // ─── Activities ──────────────────────────────────────────────

    async fn get_activity(&self, activity_id: Uuid) -> Result<Option<Activity>, AppError>;

    async fn get_activity_by_client_id(
        &self,
        client_id: Uuid,
    ) -> Result<Option<Activity>, AppError>;

    /// Activities matching `filter`, newest first, paginated.
    async fn list_activities(&self, filter: &ActivityFilter) -> Result<Vec<Activity>, AppError>;

    /// Replace an activity's payload. Timing and XP are left untouched.
    async fn amend_payload(
        &self,
        activity_id: Uuid,
        game_data: serde_json::Value,
    ) -> Result<Activity, AppError>;

    async fn delete_activity(&self, activity_id: Uuid) -> Result<(), AppError>;

    // ─── Atomic Units ────────────────────────────────────────────

    /// Store a new activity, applying `award` to its pet in the same unit of work.
    ///
    /// If the activity carries a client id that is already taken, nothing is
    /// written and the existing activity is returned.
    async fn insert_activity_atomic(
        &self,
        activity: &Activity,
        award: Option<XpAward>,
    ) -> Result<InsertOutcome, AppError>;

    /// Persist the close fields of `closed` and apply `award` to its pet.
    ///
    /// At most one call per activity succeeds; later calls see `AlreadyClosed`.
    async fn close_activity_atomic(
        &self,
        closed: &Activity,
        award: XpAward,
    ) -> Result<CloseOutcome, AppError>;
}

pub(crate) fn pet_not_found(pet_id: Uuid) -> AppError {
    AppError::NotFound(format!("Pet {} not found", pet_id))
}

pub(crate) fn activity_not_found(activity_id: Uuid) -> AppError {
    AppError::NotFound(format!("Activity {} not found", activity_id))
}
