// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod activity;
pub mod catalog;
pub mod pet;
pub mod xp;

pub use activity::{
    ActivityService, CreateActivityInput, ListActivitiesInput, SyncActivityInput,
    UpdateActivityInput,
};
pub use catalog::{CatalogError, GameCatalog};
pub use pet::{CreatePetInput, PetService};
pub use xp::calculate_xp;
