//! Error types for the `geowar-world` crate.
//!
//! Every fallible store operation returns [`WorldError`]. Removals of
//! unknown ids are not errors; they are no-ops.

use geowar_types::{ArmyId, BattleId, PlayerId, TerritoryId};

/// Errors that can occur during world-state operations.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    /// A player was not found in the store.
    #[error("player not found: {0}")]
    PlayerNotFound(PlayerId),

    /// A territory was not found in the store.
    #[error("territory not found: {0}")]
    TerritoryNotFound(TerritoryId),

    /// An army was not found in the store.
    #[error("army not found: {0}")]
    ArmyNotFound(ArmyId),

    /// A battle was not found in the store.
    #[error("battle not found: {0}")]
    BattleNotFound(BattleId),

    /// The territory still hosts armies and cannot be removed.
    #[error("territory {territory} still hosts {armies} armies")]
    TerritoryOccupied {
        /// The territory.
        territory: TerritoryId,
        /// Number of armies stationed there.
        armies: usize,
    },

    /// A finished battle cannot be modified.
    #[error("battle {0} is finished and immutable")]
    BattleFinished(BattleId),

    /// A snapshot could not be encoded or decoded.
    #[error("snapshot serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}
