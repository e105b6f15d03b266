// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Pet management: creation, lookup with mood refresh, and stats.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::db::Store;
use crate::error::{AppError, Result};
use crate::models::{ActivityFilter, Pet, PetProfileUpdate, PetStats};
use crate::services::catalog::GameCatalog;

/// Request body for creating a pet.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreatePetInput {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    pub pet_type_id: String,
    #[serde(default)]
    #[validate(length(max = 100))]
    pub breed: Option<String>,
    #[serde(default)]
    #[validate(url)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
}

#[derive(Clone)]
pub struct PetService {
    store: Arc<dyn Store>,
    catalog: Arc<GameCatalog>,
}

impl PetService {
    pub fn new(store: Arc<dyn Store>, catalog: Arc<GameCatalog>) -> Self {
        Self { store, catalog }
    }

    pub async fn create_pet(
        &self,
        user_id: Uuid,
        input: CreatePetInput,
        now: DateTime<Utc>,
    ) -> Result<Pet> {
        input
            .validate()
            .map_err(|e| AppError::BadRequest(format!("Invalid pet: {}", e)))?;

        if !self.catalog.has_pet_type(&input.pet_type_id) {
            return Err(AppError::BadRequest(format!(
                "Unknown pet type '{}'",
                input.pet_type_id
            )));
        }

        let mut pet = Pet::new(user_id, &input.pet_type_id, &input.name, now);
        pet.breed = input.breed;
        pet.avatar_url = input.avatar_url;
        pet.birth_date = input.birth_date;
        self.store.create_pet(&pet).await?;

        tracing::info!(user_id = %user_id, pet_id = %pet.id, pet_type = %pet.pet_type_id, "Pet created");
        Ok(pet)
    }

    pub async fn list_pets(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<Vec<Pet>> {
        let mut pets = self.store.get_pets_by_owner(user_id).await?;
        for pet in &mut pets {
            pet.mood = pet.current_mood(now);
        }
        Ok(pets)
    }

    /// Load an owned pet with its mood recomputed as of `now`.
    ///
    /// The cached mood is written back only when it changed.
    pub async fn get_pet(&self, user_id: Uuid, pet_id: Uuid, now: DateTime<Utc>) -> Result<Pet> {
        let mut pet = self.owned_pet(user_id, pet_id).await?;

        let mood = pet.current_mood(now);
        if mood != pet.mood {
            self.store.set_mood(pet.id, mood).await?;
            tracing::debug!(pet_id = %pet.id, ?mood, "Refreshed cached mood");
            pet.mood = mood;
        }
        Ok(pet)
    }

    /// Change an owned pet's profile. Progression is untouched.
    pub async fn update_pet(
        &self,
        user_id: Uuid,
        pet_id: Uuid,
        update: PetProfileUpdate,
        now: DateTime<Utc>,
    ) -> Result<Pet> {
        self.owned_pet(user_id, pet_id).await?;
        update
            .validate()
            .map_err(|e| AppError::BadRequest(format!("Invalid pet: {}", e)))?;

        let mut pet = self.store.update_pet_profile(pet_id, &update, now).await?;
        pet.mood = pet.current_mood(now);

        tracing::info!(user_id = %user_id, pet_id = %pet_id, "Pet updated");
        Ok(pet)
    }

    /// Delete an owned pet along with its activities.
    pub async fn delete_pet(&self, user_id: Uuid, pet_id: Uuid) -> Result<()> {
        self.owned_pet(user_id, pet_id).await?;
        self.store.delete_pet(pet_id).await?;

        tracing::info!(user_id = %user_id, pet_id = %pet_id, "Pet deleted");
        Ok(())
    }

    pub async fn pet_stats(&self, user_id: Uuid, pet_id: Uuid) -> Result<PetStats> {
        let pet = self.owned_pet(user_id, pet_id).await?;

        let filter = ActivityFilter {
            pet_ids: vec![pet.id],
            limit: u32::MAX,
            ..Default::default()
        };
        let activities = self.store.list_activities(&filter).await?;

        Ok(PetStats::for_pet(&pet, &activities))
    }

    async fn owned_pet(&self, user_id: Uuid, pet_id: Uuid) -> Result<Pet> {
        let pet = self
            .store
            .get_pet(pet_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Pet {} not found", pet_id)))?;

        if !pet.is_owned_by(user_id) {
            return Err(AppError::Unauthorized(format!(
                "Pet {} belongs to another user",
                pet_id
            )));
        }
        Ok(pet)
    }
}
