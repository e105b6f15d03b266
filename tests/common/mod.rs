// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::body::Body;
use axum::http::{header, Request};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use pettime::config::Config;
use pettime::db::{FirestoreDb, MemoryDb, Store};
use pettime::middleware::Claims;
use pettime::models::Pet;
use pettime::routes::create_router;
use pettime::services::GameCatalog;
use pettime::AppState;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// The bundled catalog (walk and fetch for dogs, laser disabled for cats).
#[allow(dead_code)]
pub fn test_catalog() -> GameCatalog {
    GameCatalog::load_from_file("data/game_catalog.json").expect("Failed to load bundled catalog")
}

/// Create a test app backed by a fresh in-memory store.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>, Arc<MemoryDb>) {
    let store = Arc::new(MemoryDb::new());
    let state = Arc::new(AppState::new(
        Config::test_default(),
        store.clone(),
        test_catalog(),
    ));

    (create_router(state.clone()), state, store)
}

/// Create a signed session token for `user_id`.
#[allow(dead_code)]
pub fn create_test_jwt(user_id: Uuid, signing_key: &[u8]) -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as usize;

    let claims = Claims {
        sub: user_id.to_string(),
        exp: now + 86400,
        iat: now,
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(signing_key),
    )
    .unwrap()
}

/// Store a fresh pet owned by `user_id`.
#[allow(dead_code)]
pub async fn seed_pet(store: &dyn Store, user_id: Uuid, pet_type_id: &str) -> Pet {
    let pet = Pet::new(user_id, pet_type_id, "Biscuit", chrono::Utc::now());
    store.create_pet(&pet).await.unwrap();
    pet
}

/// Build an authenticated JSON request.
#[allow(dead_code)]
pub fn authed_request(
    method: &str,
    uri: &str,
    token: &str,
    body: Option<serde_json::Value>,
) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token));

    match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Read a response body as JSON.
#[allow(dead_code)]
pub async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}
