// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Pet aggregate and the XP award applied to it.

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use uuid::Uuid;
use validator::Validate;

use crate::error::AppError;
use crate::models::progression::{level_for_xp, mood_at, next_streak, Mood};

/// Pet record stored in the `pets` collection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "mobile/src/types/generated/")
)]
pub struct Pet {
    pub id: Uuid,
    /// Owning user
    pub user_id: Uuid,
    pub pet_type_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub breed: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<NaiveDate>,
    /// Cumulative XP, never decreases
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub total_xp: u64,
    /// Cached `level_for_xp(total_xp)`
    pub level: u32,
    /// Cached mood; recomputed on read
    pub mood: Mood,
    pub streak_days: u32,
    pub last_activity_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Owner-editable pet details. A `None` field is left unchanged.
///
/// There are no progression fields here: XP, level, streak and
/// last-activity time only change through an award.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct PetProfileUpdate {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[validate(length(max = 100))]
    pub breed: Option<String>,
    #[validate(url)]
    pub avatar_url: Option<String>,
    pub birth_date: Option<NaiveDate>,
}

/// XP earned by closing one activity, applied to a pet inside a store transaction.
#[derive(Debug, Clone, Copy)]
pub struct XpAward {
    pub xp: u64,
    pub awarded_at: DateTime<Utc>,
    /// Calendar day boundary used for the streak.
    pub day_boundary: FixedOffset,
}

impl Pet {
    pub fn new(user_id: Uuid, pet_type_id: &str, name: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            pet_type_id: pet_type_id.to_string(),
            name: name.to_string(),
            breed: None,
            avatar_url: None,
            birth_date: None,
            total_xp: 0,
            level: 1,
            mood: mood_at(None, now),
            streak_days: 0,
            last_activity_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.user_id == user_id
    }

    /// Add XP and recompute the cached level.
    pub fn add_xp(&mut self, amount: u64) -> Result<(), AppError> {
        self.total_xp = self.total_xp.checked_add(amount).ok_or_else(|| {
            AppError::Internal(anyhow::anyhow!(
                "XP overflow for pet {} adding {}",
                self.id,
                amount
            ))
        })?;
        self.level = level_for_xp(self.total_xp);
        Ok(())
    }

    /// Apply a completed-activity award: XP, level, streak and last-activity time.
    ///
    /// The streak is computed against the *previous* last-activity time.
    pub fn apply_award(&mut self, award: &XpAward) -> Result<(), AppError> {
        self.add_xp(award.xp)?;
        self.streak_days = next_streak(
            self.streak_days,
            self.last_activity_at,
            award.awarded_at,
            &award.day_boundary,
        );
        self.last_activity_at = Some(award.awarded_at);
        self.mood = mood_at(self.last_activity_at, award.awarded_at);
        self.updated_at = award.awarded_at;
        Ok(())
    }

    /// Apply the set fields of `update`, touching only profile data.
    pub fn apply_profile(&mut self, update: &PetProfileUpdate, now: DateTime<Utc>) {
        if let Some(name) = &update.name {
            self.name = name.clone();
        }
        if let Some(breed) = &update.breed {
            self.breed = Some(breed.clone());
        }
        if let Some(avatar_url) = &update.avatar_url {
            self.avatar_url = Some(avatar_url.clone());
        }
        if let Some(birth_date) = update.birth_date {
            self.birth_date = Some(birth_date);
        }
        self.updated_at = now;
    }

    /// Mood as of `now`, independent of the cached value.
    pub fn current_mood(&self, now: DateTime<Utc>) -> Mood {
        mood_at(self.last_activity_at, now)
    }
}
