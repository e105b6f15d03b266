// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Game type and pet type reference data.

use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Scoring family that decides which XP formula applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "mobile/src/types/generated/")
)]
pub enum XpFamily {
    /// XP from minutes played plus a distance bonus
    Duration,
    /// XP from throws and combos, with an optional frenzy multiplier
    Count,
}

/// A kind of play session (walk, fetch, ...).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "mobile/src/types/generated/")
)]
pub struct GameType {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    /// Formula coefficients; parsed per award so bad data only zeroes XP.
    #[serde(default)]
    pub xp_config: serde_json::Value,
    #[serde(default)]
    pub supported_pet_types: Vec<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Explicit scoring family; inferred from the id when absent.
    #[serde(default)]
    pub family: Option<XpFamily>,
}

fn default_enabled() -> bool {
    true
}

impl GameType {
    /// Scoring family for this game, if any.
    pub fn xp_family(&self) -> Option<XpFamily> {
        self.family.or(match self.id.as_str() {
            "walk" => Some(XpFamily::Duration),
            "fetch" => Some(XpFamily::Count),
            _ => None,
        })
    }

    pub fn supports_pet_type(&self, pet_type_id: &str) -> bool {
        self.supported_pet_types.iter().any(|p| p == pet_type_id)
    }
}

/// A species of pet (dog, cat, ...).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "mobile/src/types/generated/")
)]
pub struct PetType {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub icon: Option<String>,
}
