// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Game type and pet type catalog loaded at startup.

use crate::error::AppError;
use crate::models::{GameType, PetType};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// On-disk catalog layout.
#[derive(Deserialize)]
struct CatalogFile {
    #[serde(default)]
    pet_types: Vec<PetType>,
    #[serde(default)]
    game_types: Vec<GameType>,
}

/// Read-only lookup of game types and pet types.
#[derive(Default, Clone)]
pub struct GameCatalog {
    game_types: Vec<GameType>,
    by_id: HashMap<String, usize>,
    pet_types: Vec<PetType>,
}

impl GameCatalog {
    /// Load the catalog from a JSON file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, CatalogError> {
        let json_data =
            fs::read_to_string(path.as_ref()).map_err(|e| CatalogError::IoError(e.to_string()))?;
        Self::load_from_json(&json_data)
    }

    /// Load the catalog from a JSON string.
    pub fn load_from_json(json_data: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = serde_json::from_str(json_data)
            .map_err(|e| CatalogError::ParseError(e.to_string()))?;
        let catalog = Self::new(file.game_types, file.pet_types)?;

        tracing::info!(
            game_types = catalog.game_types.len(),
            pet_types = catalog.pet_types.len(),
            "Loaded game catalog"
        );
        Ok(catalog)
    }

    /// Build a catalog from in-memory definitions.
    pub fn new(game_types: Vec<GameType>, pet_types: Vec<PetType>) -> Result<Self, CatalogError> {
        let mut by_id = HashMap::with_capacity(game_types.len());
        for (idx, game_type) in game_types.iter().enumerate() {
            if by_id.insert(game_type.id.clone(), idx).is_some() {
                return Err(CatalogError::DuplicateId(game_type.id.clone()));
            }
        }

        Ok(Self {
            game_types,
            by_id,
            pet_types,
        })
    }

    /// Look up a game type by id, enabled or not.
    pub fn get_game_type(&self, id: &str) -> Option<&GameType> {
        self.by_id.get(id).map(|&idx| &self.game_types[idx])
    }

    /// Resolve a game type a pet of `pet_type_id` may play.
    ///
    /// Unknown, disabled and incompatible game types are all rejected
    /// with `InvalidGameType`.
    pub fn playable_game_type(&self, id: &str, pet_type_id: &str) -> Result<&GameType, AppError> {
        let game_type = self
            .get_game_type(id)
            .filter(|g| g.enabled)
            .ok_or_else(|| AppError::InvalidGameType(format!("Unknown game type '{}'", id)))?;

        if !game_type.supports_pet_type(pet_type_id) {
            return Err(AppError::InvalidGameType(format!(
                "Game type '{}' is not available for pet type '{}'",
                id, pet_type_id
            )));
        }

        Ok(game_type)
    }

    pub fn list_enabled_game_types(&self) -> Vec<&GameType> {
        self.game_types.iter().filter(|g| g.enabled).collect()
    }

    pub fn pet_types(&self) -> &[PetType] {
        &self.pet_types
    }

    pub fn has_pet_type(&self, id: &str) -> bool {
        self.pet_types.iter().any(|p| p.id == id)
    }
}

/// Errors from catalog loading.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Failed to read file: {0}")]
    IoError(String),

    #[error("Failed to parse catalog: {0}")]
    ParseError(String),

    #[error("Duplicate game type id: {0}")]
    DuplicateId(String),
}
