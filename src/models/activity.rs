// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Play-session activity model and per-game payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use uuid::Uuid;

use crate::models::game_type::XpFamily;

/// Stored activity record.
///
/// An activity is either open (`ended_at` is `None`) or closed. Closing sets
/// `ended_at`, `duration_seconds` and `xp_earned` once; only `game_data`
/// may change afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "mobile/src/types/generated/")
)]
pub struct Activity {
    pub id: Uuid,
    pub pet_id: Uuid,
    pub game_type_id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    /// Whole seconds between start and end, present iff `ended_at` is.
    #[cfg_attr(feature = "binding-generation", ts(type = "number | null"))]
    pub duration_seconds: Option<i64>,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub xp_earned: u64,
    /// Game-specific data, opaque to storage
    pub game_data: Option<serde_json::Value>,
    /// Identifier assigned by an offline client, used for deduplication
    pub client_id: Option<Uuid>,
    pub synced_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Activity {
    /// Build a new open activity.
    pub fn open(
        pet_id: Uuid,
        game_type_id: &str,
        started_at: DateTime<Utc>,
        game_data: Option<serde_json::Value>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            pet_id,
            game_type_id: game_type_id.to_string(),
            started_at,
            ended_at: None,
            duration_seconds: None,
            xp_earned: 0,
            game_data,
            client_id: None,
            synced_at: None,
            created_at: now,
        }
    }

    pub fn is_open(&self) -> bool {
        self.ended_at.is_none()
    }

    /// Close the activity, scoring it with `score` once the duration is known.
    ///
    /// Returns the XP earned.
    pub fn close_with<F>(&mut self, ended_at: DateTime<Utc>, score: F) -> u64
    where
        F: FnOnce(&Activity) -> u64,
    {
        self.ended_at = Some(ended_at);
        self.duration_seconds = Some(
            ended_at
                .signed_duration_since(self.started_at)
                .num_seconds(),
        );
        self.xp_earned = score(self);
        self.xp_earned
    }

    /// Distance reported by the client, if the payload carries one.
    pub fn distance_meters(&self) -> Option<f64> {
        self.game_data
            .as_ref()
            .and_then(|v| v.get("distance_meters"))
            .and_then(|v| v.as_f64())
    }
}

/// Payload for duration-based games such as walks.
///
/// A missing or `null` field reads as its default, so optional details never
/// cost the walk its distance bonus.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WalkGameData {
    #[serde(default, deserialize_with = "null_as_default")]
    pub distance_meters: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub route: Vec<Vec<f64>>,
    #[serde(default)]
    pub avg_speed_kmh: Option<f64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub new_zones_discovered: Vec<String>,
    #[serde(default)]
    pub weather: Option<String>,
}

/// Payload for count-based games such as fetch.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FetchGameData {
    #[serde(default, deserialize_with = "null_as_default")]
    pub throws: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub returns: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub success_rate: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub max_combo: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub frenzy_mode_activated: bool,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Decoded game payload.
#[derive(Debug, Clone, PartialEq)]
pub enum GamePayload {
    Walk(WalkGameData),
    Fetch(FetchGameData),
    /// Missing, malformed, or for a game without a scoring family.
    Unknown,
}

impl GamePayload {
    /// Decode raw game data for the given family. Never fails.
    pub fn decode(family: Option<XpFamily>, raw: Option<&serde_json::Value>) -> Self {
        let Some(raw) = raw else {
            return GamePayload::Unknown;
        };
        let decoded = match family {
            Some(XpFamily::Duration) => WalkGameData::deserialize(raw).map(GamePayload::Walk),
            Some(XpFamily::Count) => FetchGameData::deserialize(raw).map(GamePayload::Fetch),
            None => return GamePayload::Unknown,
        };
        decoded.unwrap_or(GamePayload::Unknown)
    }
}

/// Query filter for listing activities.
#[derive(Debug, Clone, Default)]
pub struct ActivityFilter {
    /// Pets to include. The service always fills this with owned pets.
    pub pet_ids: Vec<Uuid>,
    pub game_type_id: Option<String>,
    /// Inclusive lower bound on `started_at`
    pub started_after: Option<DateTime<Utc>>,
    /// Inclusive upper bound on `started_at`
    pub started_before: Option<DateTime<Utc>>,
    pub limit: u32,
    pub offset: u32,
}

impl ActivityFilter {
    /// Whether an activity matches every predicate except pagination.
    pub fn matches(&self, activity: &Activity) -> bool {
        self.pet_ids.contains(&activity.pet_id)
            && self
                .game_type_id
                .as_deref()
                .is_none_or(|g| g == activity.game_type_id)
            && self
                .started_after
                .is_none_or(|after| activity.started_at >= after)
            && self
                .started_before
                .is_none_or(|before| activity.started_at <= before)
    }

    /// Sort newest first and apply offset/limit.
    pub fn paginate(&self, mut activities: Vec<Activity>) -> Vec<Activity> {
        activities.sort_by(|a, b| {
            b.started_at
                .cmp(&a.started_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        activities
            .into_iter()
            .skip(self.offset as usize)
            .take(self.limit as usize)
            .collect()
    }
}
