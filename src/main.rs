// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Pettime API Server
//!
//! Records pet play sessions and reconciles XP, streaks and mood for
//! online and offline clients.

use pettime::{
    config::{Config, StorageBackend},
    db::{FirestoreDb, MemoryDb, Store},
    services::GameCatalog,
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured JSON logging for GCP
    init_logging()?;

    let config = Config::from_env()?;
    tracing::info!(
        port = config.port,
        backend = ?config.storage_backend,
        "Starting Pettime API"
    );

    let store: Arc<dyn Store> = match config.storage_backend {
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory store; data is lost on restart");
            Arc::new(MemoryDb::new())
        }
        StorageBackend::Firestore => Arc::new(FirestoreDb::new(&config.gcp_project_id).await?),
    };

    tracing::info!(path = %config.game_catalog_path, "Loading game catalog");
    let catalog = GameCatalog::load_from_file(&config.game_catalog_path)?;

    let state = Arc::new(AppState::new(config.clone(), store, catalog));
    let app = pettime::routes::create_router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() -> anyhow::Result<()> {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("pettime=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .with(format)
        .init();
    Ok(())
}
