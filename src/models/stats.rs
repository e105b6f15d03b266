//! Per-pet statistics for the pet detail screen.
//!
//! Computed on read from the pet's completed activities and cached level data.

use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::models::progression::{level_progress, xp_to_next_level};
use crate::models::{Activity, Pet};

/// Aggregate statistics for one pet.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "mobile/src/types/generated/")
)]
pub struct PetStats {
    /// Completed activities only
    pub total_activities: u32,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub total_duration_seconds: i64,
    pub total_distance_meters: f64,
    pub current_streak: u32,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub xp_to_next_level: u64,
    pub level_progress: f64,
}

impl PetStats {
    /// Fold one activity into the totals. Open activities are ignored.
    ///
    /// Returns `true` if the activity was counted.
    pub fn record_activity(&mut self, activity: &Activity) -> bool {
        let Some(duration) = activity.duration_seconds else {
            return false;
        };

        self.total_activities += 1;
        self.total_duration_seconds += duration.max(0);
        self.total_distance_meters += activity.distance_meters().unwrap_or(0.0);
        true
    }

    /// Build stats for `pet` from its activities.
    pub fn for_pet<'a, I>(pet: &Pet, activities: I) -> Self
    where
        I: IntoIterator<Item = &'a Activity>,
    {
        let mut stats = Self {
            current_streak: pet.streak_days,
            xp_to_next_level: xp_to_next_level(pet.total_xp),
            level_progress: level_progress(pet.total_xp),
            ..Default::default()
        };
        for activity in activities {
            stats.record_activity(activity);
        }
        stats
    }
}
