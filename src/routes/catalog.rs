// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Public catalog routes.

use crate::models::{GameType, PetType};
use crate::AppState;
use axum::{extract::State, routing::get, Json, Router};
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/v1/game-types", get(list_game_types))
        .route("/api/v1/pet-types", get(list_pet_types))
}

/// Enabled game types only.
async fn list_game_types(State(state): State<Arc<AppState>>) -> Json<Vec<GameType>> {
    Json(
        state
            .activity_service
            .list_game_types()
            .into_iter()
            .cloned()
            .collect(),
    )
}

async fn list_pet_types(State(state): State<Arc<AppState>>) -> Json<Vec<PetType>> {
    Json(state.catalog.pet_types().to_vec())
}
