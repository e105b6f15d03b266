// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process store backed by concurrent maps.
//!
//! Atomic operations never hold a map guard across an `.await`, and always
//! lock in the order client ids -> pets -> activities, so each one is a
//! single critical section.

use crate::db::{activity_not_found, pet_not_found, CloseOutcome, InsertOutcome, Store};
use crate::error::AppError;
use crate::models::{Activity, ActivityFilter, Mood, Pet, PetProfileUpdate, XpAward};
use chrono::{DateTime, Utc};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

/// In-memory database.
#[derive(Default)]
pub struct MemoryDb {
    pets: DashMap<Uuid, Pet>,
    activities: DashMap<Uuid, Activity>,
    /// client_id -> activity id. Kept when an activity is deleted so a
    /// re-submitted client id cannot earn XP twice.
    client_ids: DashMap<Uuid, Uuid>,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    fn update_pet<F>(&self, pet_id: Uuid, f: F) -> Result<Pet, AppError>
    where
        F: FnOnce(&mut Pet) -> Result<(), AppError>,
    {
        let mut pet = self.pets.get_mut(&pet_id).ok_or_else(|| pet_not_found(pet_id))?;
        let mut updated = pet.clone();
        f(&mut updated)?;
        *pet = updated.clone();
        Ok(updated)
    }
}

#[async_trait]
impl Store for MemoryDb {
    async fn get_pet(&self, pet_id: Uuid) -> Result<Option<Pet>, AppError> {
        Ok(self.pets.get(&pet_id).map(|p| p.clone()))
    }

    async fn get_pets_by_owner(&self, user_id: Uuid) -> Result<Vec<Pet>, AppError> {
        let mut pets: Vec<Pet> = self
            .pets
            .iter()
            .filter(|p| p.user_id == user_id)
            .map(|p| p.clone())
            .collect();
        pets.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(pets)
    }

    async fn create_pet(&self, pet: &Pet) -> Result<(), AppError> {
        self.pets.insert(pet.id, pet.clone());
        Ok(())
    }

    async fn add_xp(&self, pet_id: Uuid, amount: u64) -> Result<Pet, AppError> {
        self.update_pet(pet_id, |pet| pet.add_xp(amount))
    }

    async fn set_streak(&self, pet_id: Uuid, days: u32) -> Result<(), AppError> {
        self.update_pet(pet_id, |pet| {
            pet.streak_days = days;
            Ok(())
        })?;
        Ok(())
    }

    async fn set_mood(&self, pet_id: Uuid, mood: Mood) -> Result<(), AppError> {
        self.update_pet(pet_id, |pet| {
            pet.mood = mood;
            Ok(())
        })?;
        Ok(())
    }

    async fn update_pet_profile(
        &self,
        pet_id: Uuid,
        update: &PetProfileUpdate,
        now: DateTime<Utc>,
    ) -> Result<Pet, AppError> {
        self.update_pet(pet_id, |pet| {
            pet.apply_profile(update, now);
            Ok(())
        })
    }

    async fn delete_pet(&self, pet_id: Uuid) -> Result<(), AppError> {
        // An insert holding the pet guard finishes before the removal, so
        // the sweep below sees its activity.
        self.pets
            .remove(&pet_id)
            .ok_or_else(|| pet_not_found(pet_id))?;
        self.activities.retain(|_, a| a.pet_id != pet_id);
        Ok(())
    }

    async fn get_activity(&self, activity_id: Uuid) -> Result<Option<Activity>, AppError> {
        Ok(self.activities.get(&activity_id).map(|a| a.clone()))
    }

    async fn get_activity_by_client_id(
        &self,
        client_id: Uuid,
    ) -> Result<Option<Activity>, AppError> {
        let Some(activity_id) = self.client_ids.get(&client_id).map(|id| *id) else {
            return Ok(None);
        };
        self.get_activity(activity_id).await
    }

    async fn list_activities(&self, filter: &ActivityFilter) -> Result<Vec<Activity>, AppError> {
        let matching: Vec<Activity> = self
            .activities
            .iter()
            .filter(|a| filter.matches(a))
            .map(|a| a.clone())
            .collect();
        Ok(filter.paginate(matching))
    }

    async fn amend_payload(
        &self,
        activity_id: Uuid,
        game_data: serde_json::Value,
    ) -> Result<Activity, AppError> {
        let mut activity = self
            .activities
            .get_mut(&activity_id)
            .ok_or_else(|| activity_not_found(activity_id))?;
        activity.game_data = Some(game_data);
        Ok(activity.clone())
    }

    async fn delete_activity(&self, activity_id: Uuid) -> Result<(), AppError> {
        self.activities
            .remove(&activity_id)
            .map(|_| ())
            .ok_or_else(|| activity_not_found(activity_id))
    }

    async fn insert_activity_atomic(
        &self,
        activity: &Activity,
        award: Option<XpAward>,
    ) -> Result<InsertOutcome, AppError> {
        let claim = match activity.client_id {
            Some(client_id) => match self.client_ids.entry(client_id) {
                Entry::Occupied(existing) => {
                    let existing_id = *existing.get();
                    drop(existing);
                    return self
                        .activities
                        .get(&existing_id)
                        .map(|a| InsertOutcome::Duplicate(a.clone()))
                        .ok_or_else(|| {
                            AppError::NotFound(format!(
                                "Activity for client id {} was deleted",
                                client_id
                            ))
                        });
                }
                Entry::Vacant(vacant) => Some(vacant),
            },
            None => None,
        };

        let mut pet = self
            .pets
            .get_mut(&activity.pet_id)
            .ok_or_else(|| pet_not_found(activity.pet_id))?;

        if let Some(award) = award {
            let mut updated = pet.clone();
            updated.apply_award(&award)?;
            *pet = updated;
        }

        self.activities.insert(activity.id, activity.clone());
        if let Some(vacant) = claim {
            vacant.insert(activity.id);
        }

        Ok(InsertOutcome::Created(activity.clone()))
    }

    async fn close_activity_atomic(
        &self,
        closed: &Activity,
        award: XpAward,
    ) -> Result<CloseOutcome, AppError> {
        let mut pet = self
            .pets
            .get_mut(&closed.pet_id)
            .ok_or_else(|| pet_not_found(closed.pet_id))?;
        let mut stored = self
            .activities
            .get_mut(&closed.id)
            .ok_or_else(|| activity_not_found(closed.id))?;

        if !stored.is_open() {
            return Ok(CloseOutcome::AlreadyClosed(stored.clone()));
        }

        let mut updated = pet.clone();
        updated.apply_award(&award)?;

        stored.ended_at = closed.ended_at;
        stored.duration_seconds = closed.duration_seconds;
        stored.xp_earned = closed.xp_earned;
        *pet = updated;

        Ok(CloseOutcome::Closed(stored.clone()))
    }
}
