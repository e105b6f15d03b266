// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Pet progression rules: leveling, daily streaks and mood decay.
//!
//! Everything here is a pure function of its inputs. Callers pass "now"
//! explicitly so the rules can be evaluated deterministically in tests.

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// XP needed to go from level 1 to level 2. Later thresholds grow quadratically.
const XP_LEVEL_UNIT: u64 = 100;

// ─── Leveling ────────────────────────────────────────────────

/// Cumulative XP required to reach `level`.
///
/// Level 1 starts at 0 XP; level `L > 1` starts at `(L - 1)^2 * 100`.
pub fn xp_for_level(level: u32) -> u64 {
    if level <= 1 {
        return 0;
    }
    let steps = u64::from(level - 1);
    steps.saturating_mul(steps).saturating_mul(XP_LEVEL_UNIT)
}

/// Level reached with `xp` cumulative experience (always at least 1).
pub fn level_for_xp(xp: u64) -> u32 {
    // Start from the integer square root estimate and correct for float error.
    let mut level = ((xp / XP_LEVEL_UNIT) as f64).sqrt() as u32 + 1;
    while level > 1 && xp_for_level(level) > xp {
        level -= 1;
    }
    loop {
        let next = xp_for_level(level + 1);
        // A saturated threshold no longer tells levels apart.
        if next > xp || next == u64::MAX {
            break;
        }
        level += 1;
    }
    level
}

/// XP still missing before the next level is reached.
pub fn xp_to_next_level(xp: u64) -> u64 {
    xp_for_level(level_for_xp(xp) + 1).saturating_sub(xp)
}

/// Fraction of the current level already completed, in `[0, 1]`.
pub fn level_progress(xp: u64) -> f64 {
    let level = level_for_xp(xp);
    let floor = xp_for_level(level);
    let ceiling = xp_for_level(level + 1);
    // Unreachable with a strictly increasing threshold curve; kept as a guard.
    if ceiling <= floor {
        return 0.0;
    }
    (xp.saturating_sub(floor) as f64 / (ceiling - floor) as f64).clamp(0.0, 1.0)
}

// ─── Streaks ─────────────────────────────────────────────────

/// Next streak length after an activity completes at `now`.
///
/// Days are calendar dates at `day_boundary`, not 24-hour windows.
pub fn next_streak(
    previous: u32,
    last_activity_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    day_boundary: &FixedOffset,
) -> u32 {
    let Some(last) = last_activity_at else {
        return 1;
    };

    let last_day = last.with_timezone(day_boundary).date_naive();
    let today = now.with_timezone(day_boundary).date_naive();

    match (today - last_day).num_days() {
        0 => previous.max(1),
        1 => previous.saturating_add(1),
        _ => 1,
    }
}

// ─── Mood ────────────────────────────────────────────────────

/// Pet mood, derived from time since the last completed activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "mobile/src/types/generated/")
)]
pub enum Mood {
    Happy,
    Content,
    Tired,
    Sad,
    Bored,
}

/// Mood at `now` given the last activity time.
pub fn mood_at(last_activity_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Mood {
    let Some(last) = last_activity_at else {
        return Mood::Bored;
    };

    let elapsed = now.signed_duration_since(last).max(chrono::Duration::zero());

    match elapsed.num_seconds() / 3600 {
        0..=5 => Mood::Happy,
        6..=11 => Mood::Content,
        12..=23 => Mood::Tired,
        24..=47 => Mood::Sad,
        _ => Mood::Bored,
    }
}
