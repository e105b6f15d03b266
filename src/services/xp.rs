// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! XP calculation for completed activities.
//!
//! Scoring runs inline in user-facing writes, so bad catalog data or a
//! malformed payload reduces XP instead of failing the request.

use crate::models::{Activity, GamePayload, GameType, XpFamily};
use serde::Deserialize;

/// Formula coefficients. Each family reads the keys it needs; missing keys are 0.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct XpConfig {
    base_xp_per_minute: f64,
    distance_bonus_per_km: f64,
    xp_per_throw: u64,
    combo_bonus: u64,
    frenzy_multiplier: f64,
}

/// Combo length that earns one combo bonus.
const COMBO_STEP: u32 = 5;

/// XP earned by `activity` under `game_type`'s formula.
pub fn calculate_xp(game_type: &GameType, activity: &Activity) -> u64 {
    let config = match XpConfig::deserialize(&game_type.xp_config) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(
                game_type = %game_type.id,
                error = %e,
                "Unparseable xp_config, awarding 0 XP"
            );
            return 0;
        }
    };

    let family = game_type.xp_family();
    let payload = GamePayload::decode(family, activity.game_data.as_ref());

    match family {
        Some(XpFamily::Duration) => duration_xp(&config, activity, &payload),
        Some(XpFamily::Count) => count_xp(&config, &payload),
        None => 0,
    }
}

fn duration_xp(config: &XpConfig, activity: &Activity, payload: &GamePayload) -> u64 {
    let minutes_xp = match (activity.ended_at, activity.duration_seconds) {
        (Some(_), Some(seconds)) => floor_xp(seconds as f64 / 60.0 * config.base_xp_per_minute),
        _ => 0,
    };

    let distance_xp = match payload {
        GamePayload::Walk(walk) => {
            floor_xp(walk.distance_meters / 1000.0 * config.distance_bonus_per_km)
        }
        _ => 0,
    };

    minutes_xp.saturating_add(distance_xp)
}

fn count_xp(config: &XpConfig, payload: &GamePayload) -> u64 {
    let GamePayload::Fetch(fetch) = payload else {
        return 0;
    };

    let throws_xp = u64::from(fetch.throws).saturating_mul(config.xp_per_throw);
    let combo_xp = u64::from(fetch.max_combo / COMBO_STEP).saturating_mul(config.combo_bonus);
    let total = throws_xp.saturating_add(combo_xp);

    if fetch.frenzy_mode_activated {
        floor_xp(total as f64 * config.frenzy_multiplier)
    } else {
        total
    }
}

/// Truncate a real-valued XP term, treating negatives and NaN as 0.
fn floor_xp(value: f64) -> u64 {
    if value.is_finite() && value > 0.0 {
        value.floor() as u64
    } else {
        0
    }
}
