// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Pet routes for authenticated users.

use crate::error::Result;
use crate::middleware::auth::AuthUser;
use crate::models::{Pet, PetProfileUpdate, PetStats};
use crate::routes::activities::parse_uuid;
use crate::services::CreatePetInput;
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Extension, Json, Router,
};
use chrono::Utc;
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/v1/pets", get(list_pets).post(create_pet))
        .route(
            "/api/v1/pets/{id}",
            get(get_pet).put(update_pet).delete(delete_pet),
        )
        .route("/api/v1/pets/{id}/stats", get(get_pet_stats))
}

async fn list_pets(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<Pet>>> {
    Ok(Json(
        state
            .pet_service
            .list_pets(user.user_id, Utc::now())
            .await?,
    ))
}

async fn create_pet(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(input): Json<CreatePetInput>,
) -> Result<(StatusCode, Json<Pet>)> {
    let pet = state
        .pet_service
        .create_pet(user.user_id, input, Utc::now())
        .await?;
    Ok((StatusCode::CREATED, Json(pet)))
}

/// Get a pet with its mood as of now.
async fn get_pet(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<Pet>> {
    let id = parse_uuid("id", &id)?;
    let pet = state
        .pet_service
        .get_pet(user.user_id, id, Utc::now())
        .await?;
    Ok(Json(pet))
}

async fn update_pet(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(update): Json<PetProfileUpdate>,
) -> Result<Json<Pet>> {
    let id = parse_uuid("id", &id)?;
    let pet = state
        .pet_service
        .update_pet(user.user_id, id, update, Utc::now())
        .await?;
    Ok(Json(pet))
}

async fn delete_pet(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    let id = parse_uuid("id", &id)?;
    state.pet_service.delete_pet(user.user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn get_pet_stats(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<PetStats>> {
    let id = parse_uuid("id", &id)?;
    Ok(Json(state.pet_service.pet_stats(user.user_id, id).await?))
}
