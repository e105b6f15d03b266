// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Pettime: play sessions that keep a virtual pet happy
//!
//! This crate provides the backend API that records play activities,
//! scores them into XP, and keeps each pet's level, streak and mood
//! consistent when offline clients sync.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use config::Config;
use db::Store;
use services::{ActivityService, GameCatalog, PetService};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub catalog: Arc<GameCatalog>,
    pub activity_service: ActivityService,
    pub pet_service: PetService,
}

impl AppState {
    /// Wire services around a store and catalog.
    pub fn new(config: Config, store: Arc<dyn Store>, catalog: GameCatalog) -> Self {
        let catalog = Arc::new(catalog);
        let activity_service =
            ActivityService::new(store.clone(), catalog.clone(), config.streak_day_boundary);
        let pet_service = PetService::new(store, catalog.clone());

        Self {
            config,
            catalog,
            activity_service,
            pet_service,
        }
    }
}
