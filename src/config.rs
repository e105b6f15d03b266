//! Application configuration loaded from environment variables.
//!
//! Values are read once at startup. A `.env` file is honored for local
//! development.

use chrono::{FixedOffset, Offset, Utc};
use std::env;

/// Which persistence backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    /// Process-local maps; state is lost on restart
    Memory,
    Firestore,
}

impl std::str::FromStr for StorageBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(StorageBackend::Memory),
            "firestore" => Ok(StorageBackend::Firestore),
            _ => Err(ConfigError::Invalid("STORAGE_BACKEND", s.to_string())),
        }
    }
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Frontend URL allowed by CORS
    pub frontend_url: String,
    /// GCP project ID (Firestore backend)
    pub gcp_project_id: String,
    /// Server port
    pub port: u16,
    pub storage_backend: StorageBackend,
    /// Path to the game/pet type catalog
    pub game_catalog_path: String,
    /// Offset that defines calendar days for streaks
    pub streak_day_boundary: FixedOffset,
    /// JWT verification key for session tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,
}

impl Config {
    /// Default config for testing only.
    pub fn test_default() -> Self {
        Self {
            frontend_url: "http://localhost:8081".to_string(),
            gcp_project_id: "test-project".to_string(),
            port: 8080,
            storage_backend: StorageBackend::Memory,
            game_catalog_path: "data/game_catalog.json".to_string(),
            streak_day_boundary: utc_offset(),
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let storage_backend = env::var("STORAGE_BACKEND")
            .unwrap_or_else(|_| "memory".to_string())
            .parse()?;

        let offset_minutes: i32 = match env::var("STREAK_UTC_OFFSET_MINUTES") {
            Ok(raw) => raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid("STREAK_UTC_OFFSET_MINUTES", raw))?,
            Err(_) => 0,
        };
        let streak_day_boundary = offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| {
                ConfigError::Invalid("STREAK_UTC_OFFSET_MINUTES", offset_minutes.to_string())
            })?;

        Ok(Self {
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:8081".to_string()),
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            storage_backend,
            game_catalog_path: env::var("GAME_CATALOG_PATH")
                .unwrap_or_else(|_| "data/game_catalog.json".to_string()),
            streak_day_boundary,
            jwt_signing_key: env::var("JWT_SIGNING_KEY")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("JWT_SIGNING_KEY"))?
                .into_bytes(),
        })
    }
}

fn utc_offset() -> FixedOffset {
    Utc.fix()
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}
