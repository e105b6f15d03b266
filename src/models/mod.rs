// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data models for the application.

pub mod activity;
pub mod game_type;
pub mod pet;
pub mod progression;
pub mod stats;

pub use activity::{Activity, ActivityFilter, FetchGameData, GamePayload, WalkGameData};
pub use game_type::{GameType, PetType, XpFamily};
pub use pet::{Pet, PetProfileUpdate, XpAward};
pub use progression::Mood;
pub use stats::PetStats;
