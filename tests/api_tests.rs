// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! HTTP API tests.
//!
//! These tests verify that:
//! 1. Protected routes reject requests without valid tokens
//! 2. Catalog routes are public
//! 3. Activity and pet routes map service errors to the right status codes

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use pettime::middleware::SESSION_COOKIE;
use serde_json::json;
use tower::ServiceExt;
use uuid::Uuid;

mod common;
use common::{authed_request, body_json, create_test_app, create_test_jwt, seed_pet};

// ─── Authentication ──────────────────────────────────────────

#[tokio::test]
async fn test_protected_route_without_token() {
    let (app, _, _) = create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/activities")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_protected_route_with_invalid_token() {
    let (app, _, _) = create_test_app();

    let response = app
        .oneshot(authed_request("GET", "/api/v1/pets", "invalid.token.here", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_token_signed_with_other_key() {
    let (app, _, _) = create_test_app();
    let token = create_test_jwt(Uuid::new_v4(), b"some_other_key_that_is_long_enough");

    let response = app
        .oneshot(authed_request("GET", "/api/v1/pets", &token, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_session_cookie_accepted() {
    let (app, state, _) = create_test_app();
    let token = create_test_jwt(Uuid::new_v4(), &state.config.jwt_signing_key);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/pets")
                .header(header::COOKIE, format!("{}={}", SESSION_COOKIE, token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!([]));
}

#[tokio::test]
async fn test_public_routes() {
    let (app, _, _) = create_test_app();

    let health = app
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(health.status(), StatusCode::OK);
    assert!(health.headers().contains_key("x-content-type-options"));

    let game_types = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/v1/game-types")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(game_types.status(), StatusCode::OK);
    let body = body_json(game_types).await;
    let ids: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|g| g["id"].as_str().unwrap())
        .collect();
    assert!(ids.contains(&"walk"));
    assert!(ids.contains(&"fetch"));
    assert!(!ids.contains(&"laser"));

    let pet_types = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/pet-types")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(pet_types.status(), StatusCode::OK);
    assert_eq!(body_json(pet_types).await.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_cors_preflight() {
    let (app, _, _) = create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/api/v1/activities")
                .header(header::ORIGIN, "http://localhost:8081")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response
        .headers()
        .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
}

// ─── Pets ────────────────────────────────────────────────────

#[tokio::test]
async fn test_create_and_fetch_pet() {
    let (app, state, _) = create_test_app();
    let user_id = Uuid::new_v4();
    let token = create_test_jwt(user_id, &state.config.jwt_signing_key);

    let response = app
        .clone()
        .oneshot(authed_request(
            "POST",
            "/api/v1/pets",
            &token,
            Some(json!({"name": "Rex", "pet_type_id": "dog"})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let pet = body_json(response).await;
    assert_eq!(pet["level"], 1);
    assert_eq!(pet["mood"], "bored");

    let uri = format!("/api/v1/pets/{}/stats", pet["id"].as_str().unwrap());
    let stats = app
        .clone()
        .oneshot(authed_request("GET", &uri, &token, None))
        .await
        .unwrap();
    assert_eq!(stats.status(), StatusCode::OK);
    assert_eq!(body_json(stats).await["xp_to_next_level"], 100);

    let invalid = app
        .oneshot(authed_request(
            "POST",
            "/api/v1/pets",
            &token,
            Some(json!({"name": "", "pet_type_id": "dog"})),
        ))
        .await
        .unwrap();
    assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_update_and_delete_pet() {
    use pettime::db::Store;

    let (app, state, store) = create_test_app();
    let owner = Uuid::new_v4();
    let owner_token = create_test_jwt(owner, &state.config.jwt_signing_key);
    let stranger_token = create_test_jwt(Uuid::new_v4(), &state.config.jwt_signing_key);
    let pet = seed_pet(store.as_ref(), owner, "dog").await;
    store.add_xp(pet.id, 150).await.unwrap();
    let uri = format!("/api/v1/pets/{}", pet.id);

    let updated = app
        .clone()
        .oneshot(authed_request(
            "PUT",
            &uri,
            &owner_token,
            Some(json!({"name": "Rex", "breed": "Beagle", "birth_date": "2021-03-14"})),
        ))
        .await
        .unwrap();
    assert_eq!(updated.status(), StatusCode::OK);
    let updated = body_json(updated).await;
    assert_eq!(updated["name"], "Rex");
    assert_eq!(updated["breed"], "Beagle");
    assert_eq!(updated["birth_date"], "2021-03-14");
    assert_eq!(updated["total_xp"], 150);
    assert_eq!(updated["level"], 2);

    for (method, token, body, expected) in [
        ("PUT", &stranger_token, Some(json!({"name": "Mine"})), StatusCode::FORBIDDEN),
        ("PUT", &owner_token, Some(json!({"name": ""})), StatusCode::BAD_REQUEST),
        ("DELETE", &stranger_token, None, StatusCode::FORBIDDEN),
        ("DELETE", &owner_token, None, StatusCode::NO_CONTENT),
        ("DELETE", &owner_token, None, StatusCode::NOT_FOUND),
        ("GET", &owner_token, None, StatusCode::NOT_FOUND),
    ] {
        let response = app
            .clone()
            .oneshot(authed_request(method, &uri, token, body))
            .await
            .unwrap();
        assert_eq!(response.status(), expected, "{} {}", method, uri);
    }
}

// ─── Activities ──────────────────────────────────────────────

#[tokio::test]
async fn test_create_close_and_list_activity() {
    let (app, state, store) = create_test_app();
    let user_id = Uuid::new_v4();
    let token = create_test_jwt(user_id, &state.config.jwt_signing_key);
    let pet = seed_pet(store.as_ref(), user_id, "dog").await;

    let response = app
        .clone()
        .oneshot(authed_request(
            "POST",
            "/api/v1/activities",
            &token,
            Some(json!({
                "pet_id": pet.id,
                "game_type_id": "walk",
                "started_at": "2025-06-02T18:00:00Z",
                "game_data": {"distance_meters": 1000.0}
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = body_json(response).await;
    assert!(created["ended_at"].is_null());

    let uri = format!("/api/v1/activities/{}", created["id"].as_str().unwrap());
    let closed = app
        .clone()
        .oneshot(authed_request(
            "PUT",
            &uri,
            &token,
            Some(json!({"ended_at": "2025-06-02T18:10:00Z"})),
        ))
        .await
        .unwrap();
    assert_eq!(closed.status(), StatusCode::OK);
    let closed = body_json(closed).await;
    assert_eq!(closed["duration_seconds"], 600);
    assert_eq!(closed["xp_earned"], 30);

    let list = app
        .oneshot(authed_request(
            "GET",
            &format!("/api/v1/activities?pet_id={}&limit=10", pet.id),
            &token,
            None,
        ))
        .await
        .unwrap();
    assert_eq!(list.status(), StatusCode::OK);
    assert_eq!(body_json(list).await.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_list_filters_by_game_type_and_time_window() {
    let (app, state, store) = create_test_app();
    let user_id = Uuid::new_v4();
    let token = create_test_jwt(user_id, &state.config.jwt_signing_key);
    let pet = seed_pet(store.as_ref(), user_id, "dog").await;

    for (game, started_at) in [
        ("walk", "2025-06-01T09:00:00Z"),
        ("walk", "2025-06-02T09:00:00Z"),
        ("fetch", "2025-06-02T12:00:00Z"),
        ("walk", "2025-06-03T09:00:00Z"),
        ("walk", "2025-06-04T09:00:00Z"),
    ] {
        let response = app
            .clone()
            .oneshot(authed_request(
                "POST",
                "/api/v1/activities",
                &token,
                Some(json!({"pet_id": pet.id, "game_type_id": game, "started_at": started_at})),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let list = app
        .clone()
        .oneshot(authed_request(
            "GET",
            "/api/v1/activities?game_type_id=walk\
             &started_after=2025-06-02T09:00:00Z&started_before=2025-06-03T09:00:00Z",
            &token,
            None,
        ))
        .await
        .unwrap();
    assert_eq!(list.status(), StatusCode::OK);
    let list = body_json(list).await;
    let starts: Vec<&str> = list
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["started_at"].as_str().unwrap())
        .collect();
    assert_eq!(starts, ["2025-06-03T09:00:00Z", "2025-06-02T09:00:00Z"]);

    let fetches = app
        .clone()
        .oneshot(authed_request(
            "GET",
            "/api/v1/activities?game_type_id=fetch",
            &token,
            None,
        ))
        .await
        .unwrap();
    assert_eq!(body_json(fetches).await.as_array().unwrap().len(), 1);

    let bad = app
        .oneshot(authed_request(
            "GET",
            "/api/v1/activities?started_after=yesterday",
            &token,
            None,
        ))
        .await
        .unwrap();
    assert_eq!(bad.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_activity_error_statuses() {
    let (app, state, store) = create_test_app();
    let owner = Uuid::new_v4();
    let pet = seed_pet(store.as_ref(), owner, "dog").await;
    let stranger_token = create_test_jwt(Uuid::new_v4(), &state.config.jwt_signing_key);
    let owner_token = create_test_jwt(owner, &state.config.jwt_signing_key);

    let cases = [
        (
            &stranger_token,
            json!({"pet_id": pet.id, "game_type_id": "walk", "started_at": "2025-06-02T18:00:00Z"}),
            StatusCode::FORBIDDEN,
        ),
        (
            &owner_token,
            json!({"pet_id": Uuid::new_v4(), "game_type_id": "walk", "started_at": "2025-06-02T18:00:00Z"}),
            StatusCode::NOT_FOUND,
        ),
        (
            &owner_token,
            json!({"pet_id": pet.id, "game_type_id": "swim", "started_at": "2025-06-02T18:00:00Z"}),
            StatusCode::BAD_REQUEST,
        ),
        (
            &owner_token,
            json!({"pet_id": pet.id, "game_type_id": "walk", "started_at": "not a time"}),
            StatusCode::BAD_REQUEST,
        ),
        (
            &owner_token,
            json!({"pet_id": "nope", "game_type_id": "walk", "started_at": "2025-06-02T18:00:00Z"}),
            StatusCode::BAD_REQUEST,
        ),
        (
            &owner_token,
            json!({
                "pet_id": pet.id, "game_type_id": "walk",
                "started_at": "2025-06-02T18:00:00Z", "ended_at": "2025-06-02T17:00:00Z"
            }),
            StatusCode::BAD_REQUEST,
        ),
    ];

    for (token, body, expected) in cases {
        let response = app
            .clone()
            .oneshot(authed_request("POST", "/api/v1/activities", token, Some(body.clone())))
            .await
            .unwrap();
        assert_eq!(response.status(), expected, "body: {}", body);
    }

    let bad_id = app
        .clone()
        .oneshot(authed_request("GET", "/api/v1/activities/not-a-uuid", &owner_token, None))
        .await
        .unwrap();
    assert_eq!(bad_id.status(), StatusCode::BAD_REQUEST);

    let missing = app
        .oneshot(authed_request(
            "GET",
            &format!("/api/v1/activities/{}", Uuid::new_v4()),
            &owner_token,
            None,
        ))
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(missing).await["error"], "not_found");
}

#[tokio::test]
async fn test_sync_skips_unparseable_items() {
    let (app, state, store) = create_test_app();
    let user_id = Uuid::new_v4();
    let token = create_test_jwt(user_id, &state.config.jwt_signing_key);
    let pet = seed_pet(store.as_ref(), user_id, "dog").await;
    let client_id = Uuid::new_v4();

    let body = json!({
        "activities": [
            {
                "client_id": client_id,
                "pet_id": pet.id,
                "game_type_id": "fetch",
                "started_at": "2025-06-02T18:00:00Z",
                "ended_at": "2025-06-02T18:05:00Z",
                "game_data": {"throws": 20, "max_combo": 5}
            },
            {
                "client_id": "garbage",
                "pet_id": pet.id,
                "game_type_id": "fetch",
                "started_at": "2025-06-02T18:00:00Z"
            },
            {"unexpected": true}
        ]
    });

    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(authed_request(
                "POST",
                "/api/v1/activities/sync",
                &token,
                Some(body.clone()),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let synced = body_json(response).await;
        let synced = synced.as_array().unwrap();
        assert_eq!(synced.len(), 1);
        assert_eq!(synced[0]["client_id"], json!(client_id));
        assert_eq!(synced[0]["xp_earned"], 25);
    }

    let stored = pettime::db::Store::get_pet(store.as_ref(), pet.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.total_xp, 25);
}

#[tokio::test]
async fn test_delete_activity() {
    let (app, state, store) = create_test_app();
    let user_id = Uuid::new_v4();
    let token = create_test_jwt(user_id, &state.config.jwt_signing_key);
    let pet = seed_pet(store.as_ref(), user_id, "dog").await;

    let created = app
        .clone()
        .oneshot(authed_request(
            "POST",
            "/api/v1/activities",
            &token,
            Some(json!({
                "pet_id": pet.id,
                "game_type_id": "walk",
                "started_at": "2025-06-02T18:00:00Z",
                "ended_at": "2025-06-02T18:05:00Z"
            })),
        ))
        .await
        .unwrap();
    let uri = format!(
        "/api/v1/activities/{}",
        body_json(created).await["id"].as_str().unwrap()
    );

    let deleted = app
        .clone()
        .oneshot(authed_request("DELETE", &uri, &token, None))
        .await
        .unwrap();
    assert_eq!(deleted.status(), StatusCode::NO_CONTENT);

    let gone = app
        .oneshot(authed_request("GET", &uri, &token, None))
        .await
        .unwrap();
    assert_eq!(gone.status(), StatusCode::NOT_FOUND);
}
