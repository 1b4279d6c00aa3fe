//! Persistence boundary: JSON encoding of the full entity set.
//!
//! Loading and saving are delegated to an external store; this module only
//! defines the serialize/deserialize contract.

use geowar_types::WorldSnapshot;

use crate::error::WorldError;
use crate::state::WorldState;

/// Encode a snapshot as JSON.
pub fn to_json(snapshot: &WorldSnapshot) -> Result<String, WorldError> {
    Ok(serde_json::to_string(snapshot)?)
}

/// Decode a snapshot from JSON.
pub fn from_json(json: &str) -> Result<WorldSnapshot, WorldError> {
    Ok(serde_json::from_str(json)?)
}

/// Decode a snapshot and rebuild a validated [`WorldState`] from it.
pub fn load_world(json: &str) -> Result<WorldState, WorldError> {
    WorldState::from_snapshot(from_json(json)?)
}
