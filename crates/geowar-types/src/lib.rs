//! Shared type definitions for the GeoWar simulation core.
//!
//! This crate is the single source of truth for the entity model used across
//! the workspace. Types flow to `TypeScript` via `ts-rs` for the UI
//! collaborators that render the map and panels.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers for all entity identifiers
//! - [`enums`] -- Statuses, unit/building/defense kinds, resource kinds
//! - [`resources`] -- Dense and sparse resource vectors
//! - [`structs`] -- Players, territories, armies, alliances, battles, events, notifications
//! - [`messages`] -- Push-channel envelopes, outbound intents, world snapshots

pub mod enums;
pub mod ids;
pub mod messages;
pub mod resources;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::{
    AllianceRole, ArmyStatus, BattleStatus, BuildingType, ChatChannel, DefenseType, EffectTarget,
    GameEventType, NotificationType, ResourceKind, TerritoryStatus, UnitType, UnknownResource,
    Winner,
};
pub use ids::{
    AllianceId, ArmyId, BattleId, BuildingId, ChatMessageId, DefenseId, GameEventId, NotificationId,
    OperationId, PlayerId, TerritoryId, UnitId,
};
pub use messages::{
    AllianceDisbanded, ArmyDisbanded, BattleEnded, Command, EntityRef, EntitySnapshot, OutboundFrame, PlayerLeft,
    PushEnvelope, PushMessage, SnapshotRequest, UnitOrder, WorldSnapshot,
};
pub use resources::{ResourceBonus, Resources, TerritoryResources};
pub use structs::{
    Alliance, AllianceMember, Army, Battle, BattleResult, BattleRound, BattleSide, Building, ChatMessage, Defense, Entity,
    GameEvent, GameEventEffect, GeoCoordinates, NEUTRAL_SIDE, Notification, Player, Territory,
    Unit, EXPERIENCE_PER_LEVEL,
};
