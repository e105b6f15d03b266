// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Activity routes for authenticated users.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::Activity;
use crate::services::{
    CreateActivityInput, ListActivitiesInput, SyncActivityInput, UpdateActivityInput,
};
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

/// Activity routes (require authentication via JWT).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/v1/activities",
            post(create_activity).get(list_activities),
        )
        .route("/api/v1/activities/sync", post(sync_activities))
        .route(
            "/api/v1/activities/{id}",
            get(get_activity)
                .put(update_activity)
                .delete(delete_activity),
        )
}

// ─── Parsing ─────────────────────────────────────────────────

pub(crate) fn parse_uuid(field: &str, raw: &str) -> Result<Uuid> {
    raw.parse()
        .map_err(|_| AppError::BadRequest(format!("Invalid '{}': must be a UUID", field)))
}

pub(crate) fn parse_timestamp(field: &str, raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| {
            AppError::BadRequest(format!("Invalid '{}': must be RFC3339 datetime", field))
        })
}

fn parse_optional_timestamp(field: &str, raw: Option<&str>) -> Result<Option<DateTime<Utc>>> {
    raw.map(|raw| parse_timestamp(field, raw)).transpose()
}

// ─── Create / Read ───────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateActivityRequest {
    pub pet_id: String,
    pub game_type_id: String,
    pub started_at: String,
    pub ended_at: Option<String>,
    pub game_data: Option<serde_json::Value>,
    pub client_id: Option<String>,
}

impl TryFrom<CreateActivityRequest> for CreateActivityInput {
    type Error = AppError;

    fn try_from(req: CreateActivityRequest) -> Result<Self> {
        Ok(Self {
            pet_id: parse_uuid("pet_id", &req.pet_id)?,
            game_type_id: req.game_type_id,
            started_at: parse_timestamp("started_at", &req.started_at)?,
            ended_at: parse_optional_timestamp("ended_at", req.ended_at.as_deref())?,
            game_data: req.game_data,
            client_id: req
                .client_id
                .as_deref()
                .map(|raw| parse_uuid("client_id", raw))
                .transpose()?,
        })
    }
}

async fn create_activity(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<CreateActivityRequest>,
) -> Result<(StatusCode, Json<Activity>)> {
    let input = CreateActivityInput::try_from(req)?;
    let activity = state
        .activity_service
        .create_activity(user.user_id, input, Utc::now())
        .await?;
    Ok((StatusCode::CREATED, Json(activity)))
}

async fn get_activity(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<Activity>> {
    let id = parse_uuid("id", &id)?;
    let activity = state.activity_service.get_activity(user.user_id, id).await?;
    Ok(Json(activity))
}

#[derive(Debug, Deserialize)]
struct ActivitiesQuery {
    pet_id: Option<String>,
    game_type_id: Option<String>,
    /// Inclusive lower bound on start time (RFC3339)
    started_after: Option<String>,
    /// Inclusive upper bound on start time (RFC3339)
    started_before: Option<String>,
    limit: Option<u32>,
    offset: Option<u32>,
}

/// List the caller's activities with optional filtering.
async fn list_activities(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<ActivitiesQuery>,
) -> Result<Json<Vec<Activity>>> {
    tracing::debug!(
        user_id = %user.user_id,
        pet_id = ?params.pet_id,
        game_type = ?params.game_type_id,
        limit = ?params.limit,
        offset = ?params.offset,
        "Listing activities"
    );

    let input = ListActivitiesInput {
        pet_id: params
            .pet_id
            .as_deref()
            .map(|raw| parse_uuid("pet_id", raw))
            .transpose()?,
        game_type_id: params.game_type_id,
        started_after: parse_optional_timestamp("started_after", params.started_after.as_deref())?,
        started_before: parse_optional_timestamp(
            "started_before",
            params.started_before.as_deref(),
        )?,
        limit: params.limit,
        offset: params.offset,
    };

    let activities = state
        .activity_service
        .list_activities(user.user_id, input)
        .await?;
    Ok(Json(activities))
}

// ─── Update / Delete ─────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct UpdateActivityRequest {
    pub ended_at: Option<String>,
    pub game_data: Option<serde_json::Value>,
}

async fn update_activity(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(req): Json<UpdateActivityRequest>,
) -> Result<Json<Activity>> {
    let id = parse_uuid("id", &id)?;
    let input = UpdateActivityInput {
        ended_at: parse_optional_timestamp("ended_at", req.ended_at.as_deref())?,
        game_data: req.game_data,
    };

    let activity = state
        .activity_service
        .update_activity(user.user_id, id, input, Utc::now())
        .await?;
    Ok(Json(activity))
}

async fn delete_activity(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    let id = parse_uuid("id", &id)?;
    state
        .activity_service
        .delete_activity(user.user_id, id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// ─── Sync ────────────────────────────────────────────────────

/// Items are kept as raw JSON so one malformed entry does not reject the batch.
#[derive(Debug, Deserialize)]
pub struct SyncRequest {
    pub activities: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct SyncActivityRequest {
    client_id: String,
    pet_id: String,
    game_type_id: String,
    started_at: String,
    ended_at: Option<String>,
    game_data: Option<serde_json::Value>,
}

impl TryFrom<SyncActivityRequest> for SyncActivityInput {
    type Error = AppError;

    fn try_from(req: SyncActivityRequest) -> Result<Self> {
        Ok(Self {
            client_id: parse_uuid("client_id", &req.client_id)?,
            pet_id: parse_uuid("pet_id", &req.pet_id)?,
            game_type_id: req.game_type_id,
            started_at: parse_timestamp("started_at", &req.started_at)?,
            ended_at: parse_optional_timestamp("ended_at", req.ended_at.as_deref())?,
            game_data: req.game_data,
        })
    }
}

fn parse_sync_item(raw: serde_json::Value) -> Result<SyncActivityInput> {
    let req: SyncActivityRequest = serde_json::from_value(raw)
        .map_err(|e| AppError::BadRequest(format!("Malformed sync item: {}", e)))?;
    SyncActivityInput::try_from(req)
}

async fn sync_activities(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<SyncRequest>,
) -> Result<Json<Vec<Activity>>> {
    let items: Vec<SyncActivityInput> = req
        .activities
        .into_iter()
        .enumerate()
        .filter_map(|(index, raw)| match parse_sync_item(raw) {
            Ok(item) => Some(item),
            Err(e) => {
                tracing::warn!(user_id = %user.user_id, index, error = %e, "Skipping unparseable sync item");
                None
            }
        })
        .collect();

    let activities = state
        .activity_service
        .sync_activities(user.user_id, items, Utc::now())
        .await?;
    Ok(Json(activities))
}
