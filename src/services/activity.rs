// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Activity reconciliation service.
//!
//! Handles the core workflow:
//! 1. Check that the caller owns the pet
//! 2. Resolve the game type for the pet's type
//! 3. Close the activity and score it (if an end time is known)
//! 4. Persist the activity and the pet's award as one store unit
//!
//! This is the only code that changes pet XP, level, streak or last-activity.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Utc};
use uuid::Uuid;

use crate::db::{CloseOutcome, InsertOutcome, Store};
use crate::error::{AppError, Result};
use crate::models::{Activity, ActivityFilter, GameType, Pet, XpAward};
use crate::services::catalog::GameCatalog;
use crate::services::xp::calculate_xp;

/// Page size when the caller does not ask for one.
pub const DEFAULT_LIST_LIMIT: u32 = 50;
/// Largest page a caller may request.
pub const MAX_LIST_LIMIT: u32 = 100;

/// New activity, either open or already completed.
#[derive(Debug, Clone)]
pub struct CreateActivityInput {
    pub pet_id: Uuid,
    pub game_type_id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub game_data: Option<serde_json::Value>,
    pub client_id: Option<Uuid>,
}

/// Changes to an existing activity.
#[derive(Debug, Clone, Default)]
pub struct UpdateActivityInput {
    /// Closes the activity if it is still open; ignored otherwise.
    pub ended_at: Option<DateTime<Utc>>,
    /// Replaces the payload without rescoring.
    pub game_data: Option<serde_json::Value>,
}

/// Activity recorded offline and submitted in a sync batch.
#[derive(Debug, Clone)]
pub struct SyncActivityInput {
    pub client_id: Uuid,
    pub pet_id: Uuid,
    pub game_type_id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub game_data: Option<serde_json::Value>,
}

impl From<SyncActivityInput> for CreateActivityInput {
    fn from(input: SyncActivityInput) -> Self {
        Self {
            pet_id: input.pet_id,
            game_type_id: input.game_type_id,
            started_at: input.started_at,
            ended_at: input.ended_at,
            game_data: input.game_data,
            client_id: Some(input.client_id),
        }
    }
}

/// Listing options. Unset values use the defaults.
#[derive(Debug, Clone, Default)]
pub struct ListActivitiesInput {
    /// Restrict to one pet; otherwise all of the caller's pets.
    pub pet_id: Option<Uuid>,
    pub game_type_id: Option<String>,
    pub started_after: Option<DateTime<Utc>>,
    pub started_before: Option<DateTime<Utc>>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// Clamp a requested page size. Zero means "use the default".
pub fn normalize_limit(limit: Option<u32>) -> u32 {
    match limit {
        None | Some(0) => DEFAULT_LIST_LIMIT,
        Some(n) => n.min(MAX_LIST_LIMIT),
    }
}

/// Activity reconciler.
#[derive(Clone)]
pub struct ActivityService {
    store: Arc<dyn Store>,
    catalog: Arc<GameCatalog>,
    day_boundary: FixedOffset,
}

impl ActivityService {
    pub fn new(store: Arc<dyn Store>, catalog: Arc<GameCatalog>, day_boundary: FixedOffset) -> Self {
        Self {
            store,
            catalog,
            day_boundary,
        }
    }

    // ─── Ownership ───────────────────────────────────────────────

    /// Load a pet, failing unless `user_id` owns it.
    async fn owned_pet(&self, user_id: Uuid, pet_id: Uuid) -> Result<Pet> {
        let pet = self
            .store
            .get_pet(pet_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Pet {} not found", pet_id)))?;

        if !pet.is_owned_by(user_id) {
            tracing::warn!(user_id = %user_id, pet_id = %pet_id, "Pet access denied");
            return Err(AppError::Unauthorized(format!(
                "Pet {} belongs to another user",
                pet_id
            )));
        }
        Ok(pet)
    }

    async fn owned_activity(&self, user_id: Uuid, activity_id: Uuid) -> Result<(Activity, Pet)> {
        let activity = self
            .store
            .get_activity(activity_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Activity {} not found", activity_id)))?;
        let pet = self.owned_pet(user_id, activity.pet_id).await?;
        Ok((activity, pet))
    }

    fn award(&self, xp: u64, now: DateTime<Utc>) -> XpAward {
        XpAward {
            xp,
            awarded_at: now,
            day_boundary: self.day_boundary,
        }
    }

    // ─── Operations ──────────────────────────────────────────────

    /// Record a new activity, scoring it immediately if it is already complete.
    ///
    /// A client id that was seen before returns the existing activity unchanged.
    pub async fn create_activity(
        &self,
        user_id: Uuid,
        input: CreateActivityInput,
        now: DateTime<Utc>,
    ) -> Result<Activity> {
        let pet = self.owned_pet(user_id, input.pet_id).await?;
        let game_type = self
            .catalog
            .playable_game_type(&input.game_type_id, &pet.pet_type_id)?;

        if let Some(ended_at) = input.ended_at {
            check_ordering(input.started_at, ended_at)?;
        }

        let mut activity = Activity::open(
            pet.id,
            &game_type.id,
            input.started_at,
            input.game_data,
            now,
        );
        if let Some(client_id) = input.client_id {
            activity.client_id = Some(client_id);
            activity.synced_at = Some(now);
        }

        let award = input.ended_at.map(|ended_at| {
            let xp = activity.close_with(ended_at, |a| calculate_xp(game_type, a));
            self.award(xp, now)
        });

        match self.store.insert_activity_atomic(&activity, award).await? {
            InsertOutcome::Created(activity) => {
                tracing::info!(
                    user_id = %user_id,
                    pet_id = %activity.pet_id,
                    activity_id = %activity.id,
                    game_type = %activity.game_type_id,
                    xp = activity.xp_earned,
                    closed = !activity.is_open(),
                    "Activity created"
                );
                Ok(activity)
            }
            InsertOutcome::Duplicate(existing) => {
                tracing::debug!(
                    user_id = %user_id,
                    activity_id = %existing.id,
                    client_id = ?existing.client_id,
                    "Duplicate client id, returning existing activity"
                );
                if existing.pet_id != pet.id {
                    self.owned_pet(user_id, existing.pet_id).await?;
                }
                Ok(existing)
            }
        }
    }

    pub async fn get_activity(&self, user_id: Uuid, activity_id: Uuid) -> Result<Activity> {
        let (activity, _) = self.owned_activity(user_id, activity_id).await?;
        Ok(activity)
    }

    /// List the caller's activities, newest first.
    pub async fn list_activities(
        &self,
        user_id: Uuid,
        input: ListActivitiesInput,
    ) -> Result<Vec<Activity>> {
        let pet_ids = match input.pet_id {
            Some(pet_id) => {
                self.owned_pet(user_id, pet_id).await?;
                vec![pet_id]
            }
            None => self
                .store
                .get_pets_by_owner(user_id)
                .await?
                .into_iter()
                .map(|p| p.id)
                .collect(),
        };

        if pet_ids.is_empty() {
            return Ok(Vec::new());
        }

        let filter = ActivityFilter {
            pet_ids,
            game_type_id: input.game_type_id,
            started_after: input.started_after,
            started_before: input.started_before,
            limit: normalize_limit(input.limit),
            offset: input.offset.unwrap_or(0),
        };

        self.store.list_activities(&filter).await
    }

    /// Close an open activity and/or replace its payload.
    ///
    /// Closing awards XP at most once; closing an already-closed activity is a
    /// no-op. A payload change never rescores.
    pub async fn update_activity(
        &self,
        user_id: Uuid,
        activity_id: Uuid,
        input: UpdateActivityInput,
        now: DateTime<Utc>,
    ) -> Result<Activity> {
        let (mut activity, _pet) = self.owned_activity(user_id, activity_id).await?;

        if let Some(ended_at) = input.ended_at {
            if activity.is_open() {
                check_ordering(activity.started_at, ended_at)?;
                activity = self.close(activity, ended_at, now).await?;
            } else {
                tracing::debug!(activity_id = %activity_id, "Activity already closed, ignoring end time");
            }
        }

        if let Some(game_data) = input.game_data {
            activity = self.store.amend_payload(activity_id, game_data).await?;
        }

        Ok(activity)
    }

    async fn close(
        &self,
        activity: Activity,
        ended_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Activity> {
        // Scored against the stored definition even if it was disabled since.
        let game_type: Option<&GameType> = self.catalog.get_game_type(&activity.game_type_id);
        if game_type.is_none() {
            tracing::warn!(
                activity_id = %activity.id,
                game_type = %activity.game_type_id,
                "Game type missing from catalog, closing with 0 XP"
            );
        }

        let mut closed = activity;
        let xp = closed.close_with(ended_at, |a| game_type.map_or(0, |g| calculate_xp(g, a)));

        match self
            .store
            .close_activity_atomic(&closed, self.award(xp, now))
            .await?
        {
            CloseOutcome::Closed(activity) => {
                tracing::info!(
                    pet_id = %activity.pet_id,
                    activity_id = %activity.id,
                    xp = activity.xp_earned,
                    "Activity closed"
                );
                Ok(activity)
            }
            CloseOutcome::AlreadyClosed(activity) => {
                tracing::debug!(activity_id = %activity.id, "Concurrent close lost, no XP awarded");
                Ok(activity)
            }
        }
    }

    /// Delete an activity. XP already awarded is kept.
    pub async fn delete_activity(&self, user_id: Uuid, activity_id: Uuid) -> Result<()> {
        let (activity, _) = self.owned_activity(user_id, activity_id).await?;
        self.store.delete_activity(activity.id).await?;

        tracing::info!(
            user_id = %user_id,
            pet_id = %activity.pet_id,
            activity_id = %activity_id,
            "Activity deleted"
        );
        Ok(())
    }

    /// Reconcile a batch of offline activities.
    ///
    /// Returns the created or previously-synced activity for each item that
    /// succeeded. Failing items are logged and skipped.
    pub async fn sync_activities(
        &self,
        user_id: Uuid,
        items: Vec<SyncActivityInput>,
        now: DateTime<Utc>,
    ) -> Result<Vec<Activity>> {
        let total = items.len();
        let mut synced = Vec::with_capacity(total);

        for item in items {
            let client_id = item.client_id;
            match self.sync_one(user_id, item, now).await {
                Ok(activity) => synced.push(activity),
                Err(e) => {
                    tracing::warn!(
                        user_id = %user_id,
                        client_id = %client_id,
                        error = %e,
                        "Skipping activity in sync batch"
                    );
                }
            }
        }

        tracing::info!(
            user_id = %user_id,
            submitted = total,
            synced = synced.len(),
            "Sync batch reconciled"
        );
        Ok(synced)
    }

    async fn sync_one(
        &self,
        user_id: Uuid,
        item: SyncActivityInput,
        now: DateTime<Utc>,
    ) -> Result<Activity> {
        if let Some(existing) = self.store.get_activity_by_client_id(item.client_id).await? {
            self.owned_pet(user_id, existing.pet_id).await?;
            tracing::debug!(
                client_id = %item.client_id,
                activity_id = %existing.id,
                "Activity already synced"
            );
            return Ok(existing);
        }

        self.create_activity(user_id, item.into(), now).await
    }

    /// Enabled game types.
    pub fn list_game_types(&self) -> Vec<&GameType> {
        self.catalog.list_enabled_game_types()
    }
}

fn check_ordering(started_at: DateTime<Utc>, ended_at: DateTime<Utc>) -> Result<()> {
    if ended_at < started_at {
        return Err(AppError::BadRequest(format!(
            "ended_at {} is before started_at {}",
            ended_at.to_rfc3339(),
            started_at.to_rfc3339()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryDb;
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    const CATALOG: &str = r#"{
        "pet_types": [{"id": "dog", "name": "Dog"}, {"id": "cat", "name": "Cat"}],
        "game_types": [
            {"id": "walk", "name": "Walk", "supported_pet_types": ["dog"],
             "xp_config": {"base_xp_per_minute": 2, "distance_bonus_per_km": 10}},
            {"id": "fetch", "name": "Fetch", "supported_pet_types": ["dog"],
             "xp_config": {"xp_per_throw": 1, "combo_bonus": 5, "frenzy_multiplier": 2.0}}
        ]
    }"#;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap()
    }

    async fn setup() -> (ActivityService, Arc<MemoryDb>, Pet) {
        let store = Arc::new(MemoryDb::new());
        let catalog = Arc::new(GameCatalog::load_from_json(CATALOG).unwrap());
        let pet = Pet::new(Uuid::new_v4(), "dog", "Rex", t0());
        store.create_pet(&pet).await.unwrap();

        let service = ActivityService::new(
            store.clone(),
            catalog,
            FixedOffset::east_opt(0).unwrap(),
        );
        (service, store, pet)
    }

    fn walk(pet: &Pet, minutes: Option<i64>, meters: f64) -> CreateActivityInput {
        CreateActivityInput {
            pet_id: pet.id,
            game_type_id: "walk".to_string(),
            started_at: t0(),
            ended_at: minutes.map(|m| t0() + Duration::minutes(m)),
            game_data: Some(json!({ "distance_meters": meters })),
            client_id: None,
        }
    }

    #[test]
    fn test_normalize_limit() {
        assert_eq!(normalize_limit(None), 50);
        assert_eq!(normalize_limit(Some(0)), 50);
        assert_eq!(normalize_limit(Some(10)), 10);
        assert_eq!(normalize_limit(Some(500)), 100);
    }

    #[tokio::test]
    async fn test_create_closed_activity_awards_xp() {
        let (service, store, pet) = setup().await;
        let now = t0() + Duration::minutes(10);

        let activity = service
            .create_activity(pet.user_id, walk(&pet, Some(10), 1000.0), now)
            .await
            .unwrap();

        assert_eq!(activity.duration_seconds, Some(600));
        assert_eq!(activity.xp_earned, 30);

        let pet = store.get_pet(pet.id).await.unwrap().unwrap();
        assert_eq!(pet.total_xp, 30);
        assert_eq!(pet.streak_days, 1);
        assert_eq!(pet.last_activity_at, Some(now));
    }

    #[tokio::test]
    async fn test_create_open_activity_leaves_pet_untouched() {
        let (service, store, pet) = setup().await;

        let activity = service
            .create_activity(pet.user_id, walk(&pet, None, 1000.0), t0())
            .await
            .unwrap();

        assert!(activity.is_open());
        assert_eq!(activity.xp_earned, 0);
        let stored = store.get_pet(pet.id).await.unwrap().unwrap();
        assert_eq!(stored.total_xp, 0);
        assert!(stored.last_activity_at.is_none());
    }

    #[tokio::test]
    async fn test_create_rejects_end_before_start() {
        let (service, _, pet) = setup().await;
        let result = service
            .create_activity(pet.user_id, walk(&pet, Some(-5), 0.0), t0())
            .await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_create_checks_ownership_before_game_type() {
        let (service, _, pet) = setup().await;
        let mut input = walk(&pet, None, 0.0);
        input.game_type_id = "swim".to_string();

        let stranger = Uuid::new_v4();
        assert!(matches!(
            service.create_activity(stranger, input.clone(), t0()).await,
            Err(AppError::Unauthorized(_))
        ));
        assert!(matches!(
            service.create_activity(pet.user_id, input, t0()).await,
            Err(AppError::InvalidGameType(_))
        ));
    }

    #[tokio::test]
    async fn test_update_closes_once_then_amends() {
        let (service, store, pet) = setup().await;
        let open = service
            .create_activity(pet.user_id, walk(&pet, None, 1000.0), t0())
            .await
            .unwrap();

        let close = UpdateActivityInput {
            ended_at: Some(t0() + Duration::minutes(10)),
            game_data: None,
        };
        let closed = service
            .update_activity(pet.user_id, open.id, close.clone(), t0() + Duration::minutes(10))
            .await
            .unwrap();
        assert_eq!(closed.xp_earned, 30);

        let again = service
            .update_activity(pet.user_id, open.id, close, t0() + Duration::minutes(20))
            .await
            .unwrap();
        assert_eq!(again.xp_earned, 30);
        assert_eq!(store.get_pet(pet.id).await.unwrap().unwrap().total_xp, 30);

        let amended = service
            .update_activity(
                pet.user_id,
                open.id,
                UpdateActivityInput {
                    ended_at: None,
                    game_data: Some(json!({"distance_meters": 9000.0})),
                },
                t0() + Duration::minutes(30),
            )
            .await
            .unwrap();
        assert_eq!(amended.xp_earned, 30);
        assert_eq!(amended.distance_meters(), Some(9000.0));
        assert_eq!(store.get_pet(pet.id).await.unwrap().unwrap().total_xp, 30);
    }

    #[tokio::test]
    async fn test_sync_is_idempotent() {
        let (service, store, pet) = setup().await;
        let item = SyncActivityInput {
            client_id: Uuid::new_v4(),
            pet_id: pet.id,
            game_type_id: "fetch".to_string(),
            started_at: t0(),
            ended_at: Some(t0() + Duration::minutes(2)),
            game_data: Some(json!({"throws": 20, "max_combo": 5})),
        };
        let now = t0() + Duration::minutes(3);

        let first = service
            .sync_activities(pet.user_id, vec![item.clone()], now)
            .await
            .unwrap();
        let second = service
            .sync_activities(pet.user_id, vec![item], now)
            .await
            .unwrap();

        assert_eq!(first.len(), 1);
        assert_eq!(first, second);
        assert_eq!(first[0].xp_earned, 25);
        assert_eq!(first[0].synced_at, Some(now));
        assert_eq!(store.get_pet(pet.id).await.unwrap().unwrap().total_xp, 25);
    }

    #[tokio::test]
    async fn test_sync_skips_failing_items() {
        let (service, _, pet) = setup().await;
        let good = SyncActivityInput {
            client_id: Uuid::new_v4(),
            pet_id: pet.id,
            game_type_id: "walk".to_string(),
            started_at: t0(),
            ended_at: Some(t0() + Duration::minutes(5)),
            game_data: None,
        };
        let unknown_game = SyncActivityInput {
            client_id: Uuid::new_v4(),
            game_type_id: "swim".to_string(),
            ..good.clone()
        };
        let missing_pet = SyncActivityInput {
            client_id: Uuid::new_v4(),
            pet_id: Uuid::new_v4(),
            ..good.clone()
        };

        let synced = service
            .sync_activities(pet.user_id, vec![unknown_game, good.clone(), missing_pet], t0())
            .await
            .unwrap();

        assert_eq!(synced.len(), 1);
        assert_eq!(synced[0].client_id, Some(good.client_id));
    }

    #[tokio::test]
    async fn test_list_requires_ownership_and_paginates() {
        let (service, _, pet) = setup().await;
        for minutes in [5, 10, 15] {
            service
                .create_activity(pet.user_id, walk(&pet, Some(minutes), 0.0), t0())
                .await
                .unwrap();
        }

        let all = service
            .list_activities(pet.user_id, ListActivitiesInput::default())
            .await
            .unwrap();
        assert_eq!(all.len(), 3);

        let page = service
            .list_activities(
                pet.user_id,
                ListActivitiesInput {
                    pet_id: Some(pet.id),
                    limit: Some(2),
                    offset: Some(2),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(page.len(), 1);

        assert!(matches!(
            service
                .list_activities(
                    Uuid::new_v4(),
                    ListActivitiesInput {
                        pet_id: Some(pet.id),
                        ..Default::default()
                    },
                )
                .await,
            Err(AppError::Unauthorized(_))
        ));
        assert!(service
            .list_activities(Uuid::new_v4(), ListActivitiesInput::default())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_delete_keeps_xp() {
        let (service, store, pet) = setup().await;
        let activity = service
            .create_activity(pet.user_id, walk(&pet, Some(10), 0.0), t0())
            .await
            .unwrap();

        assert!(matches!(
            service.delete_activity(Uuid::new_v4(), activity.id).await,
            Err(AppError::Unauthorized(_))
        ));
        service.delete_activity(pet.user_id, activity.id).await.unwrap();

        assert!(matches!(
            service.get_activity(pet.user_id, activity.id).await,
            Err(AppError::NotFound(_))
        ));
        assert_eq!(store.get_pet(pet.id).await.unwrap().unwrap().total_xp, 20);
    }

    #[tokio::test]
    async fn test_list_game_types_only_enabled() {
        let (service, _, _) = setup().await;
        let ids: Vec<&str> = service
            .list_game_types()
            .iter()
            .map(|g| g.id.as_str())
            .collect();
        assert_eq!(ids, vec!["walk", "fetch"]);
    }
}
