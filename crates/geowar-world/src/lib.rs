//! Canonical world state store for the GeoWar simulation.
//!
//! This crate owns the entity graph: players, territories, armies, battles,
//! alliances and world events. Every other component receives copies for computation
//! and hands back results that the store commits atomically.
//!
//! # Modules
//!
//! - [`error`] -- Error types for store operations.
//! - [`state`] -- [`WorldState`]: private entity maps, mutation methods and
//!   derived queries.
//! - [`store`] -- [`WorldStore`]: shared handle with concurrent reads and
//!   serialized writes.
//! - [`snapshot`] -- JSON persistence contract.
//! - [`starting_world`] -- Default nine-territory starting map.

pub mod error;
pub mod snapshot;
pub mod starting_world;
pub mod state;
pub mod store;

// Re-export primary types at crate root.
pub use error::WorldError;
pub use starting_world::{StartingTerritoryIds, create_starting_world};
pub use state::{ArmyUpsert, PlayerRemoval, WorldState};
pub use store::WorldStore;
