//! Wire messages exchanged with the authoritative side.
//!
//! Inbound: [`PushEnvelope`] frames carrying a typed [`PushMessage`] with a
//! full entity snapshot. Outbound: [`OutboundIntent`] frames carrying a
//! [`Command`] tagged with the client-generated [`OperationId`] the
//! authority echoes back on its canonical update.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{BuildingType, DefenseType, UnitType};
use crate::ids::{
    AllianceId, ArmyId, BattleId, GameEventId, OperationId, PlayerId, TerritoryId,
};
use crate::structs::{
    Alliance, Army, Battle, BattleResult, ChatMessage, Entity, GameEvent, Notification, Player, Territory,
};

// ---------------------------------------------------------------------------
// Entity references
// ---------------------------------------------------------------------------

/// Identifies one stored entity of any kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum EntityRef {
    /// A player.
    Player(PlayerId),
    /// A territory.
    Territory(TerritoryId),
    /// An army.
    Army(ArmyId),
    /// A battle.
    Battle(BattleId),
    /// A world event.
    GameEvent(GameEventId),
    /// An alliance.
    Alliance(AllianceId),
}

impl core::fmt::Display for EntityRef {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Player(id) => write!(f, "player:{id}"),
            Self::Territory(id) => write!(f, "territory:{id}"),
            Self::Army(id) => write!(f, "army:{id}"),
            Self::Battle(id) => write!(f, "battle:{id}"),
            Self::GameEvent(id) => write!(f, "game_event:{id}"),
            Self::Alliance(id) => write!(f, "alliance:{id}"),
        }
    }
}

/// A full copy of one stored entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum EntitySnapshot {
    /// A player.
    Player(Player),
    /// A territory.
    Territory(Box<Territory>),
    /// An army.
    Army(Army),
    /// A battle.
    Battle(Box<Battle>),
    /// A world event.
    GameEvent(GameEvent),
    /// An alliance.
    Alliance(Alliance),
}

impl EntitySnapshot {
    /// Reference to the entity this snapshot describes.
    pub fn entity_ref(&self) -> EntityRef {
        match self {
            Self::Player(p) => EntityRef::Player(p.id),
            Self::Territory(t) => EntityRef::Territory(t.id),
            Self::Army(a) => EntityRef::Army(a.id),
            Self::Battle(b) => EntityRef::Battle(b.id),
            Self::GameEvent(e) => EntityRef::GameEvent(e.id),
            Self::Alliance(a) => EntityRef::Alliance(a.id),
        }
    }

    fn timestamps(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        match self {
            Self::Player(p) => (p.created_at(), p.updated_at()),
            Self::Territory(t) => (t.created_at(), t.updated_at()),
            Self::Army(a) => (a.created_at(), a.updated_at()),
            Self::Battle(b) => (b.created_at(), b.updated_at()),
            Self::GameEvent(e) => (e.created_at(), e.updated_at()),
            Self::Alliance(a) => (a.created_at(), a.updated_at()),
        }
    }

    fn set_timestamps(&mut self, created: DateTime<Utc>, updated: DateTime<Utc>) {
        match self {
            Self::Player(p) => p.set_timestamps(created, updated),
            Self::Territory(t) => t.set_timestamps(created, updated),
            Self::Army(a) => a.set_timestamps(created, updated),
            Self::Battle(b) => b.set_timestamps(created, updated),
            Self::GameEvent(e) => e.set_timestamps(created, updated),
            Self::Alliance(a) => a.set_timestamps(created, updated),
        }
    }

    /// Whether `other` describes the same entity state, ignoring the
    /// entity-level timestamps (the authority stamps its own).
    pub fn same_state(&self, other: &Self) -> bool {
        if self.entity_ref() != other.entity_ref() {
            return false;
        }
        let (created, updated) = self.timestamps();
        let mut normalized = other.clone();
        normalized.set_timestamps(created, updated);
        *self == normalized
    }
}

// ---------------------------------------------------------------------------
// World snapshot (persistence boundary and resync payload)
// ---------------------------------------------------------------------------

/// The complete entity set of the world at one instant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct WorldSnapshot {
    /// Tick the snapshot was taken at.
    pub tick: u64,
    /// All players.
    pub players: Vec<Player>,
    /// All territories.
    pub territories: Vec<Territory>,
    /// All armies.
    pub armies: Vec<Army>,
    /// All battles, finished ones included.
    pub battles: Vec<Battle>,
    /// All world events, expired ones included.
    pub events: Vec<GameEvent>,
    /// All alliances.
    #[serde(default)]
    pub alliances: Vec<Alliance>,
}

// ---------------------------------------------------------------------------
// Push channel
// ---------------------------------------------------------------------------

/// Payload of a `battle_ended` push message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct BattleEnded {
    /// The finished battle.
    pub battle_id: BattleId,
    /// Its outcome.
    pub result: BattleResult,
}

/// Payload of a `player_left` push message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct PlayerLeft {
    /// The departing player.
    pub player_id: PlayerId,
}

/// Payload of an `army_disbanded` push message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct ArmyDisbanded {
    /// The removed army.
    pub army_id: ArmyId,
}

/// Payload of an `alliance_disbanded` push message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct AllianceDisbanded {
    /// The removed alliance.
    pub alliance_id: AllianceId,
}

/// A typed message from the real-time push channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum PushMessage {
    /// A player connected or was created.
    PlayerJoined(Player),
    /// A player left the world; their holdings are released.
    PlayerLeft(PlayerLeft),
    /// Canonical territory state.
    TerritoryUpdated(Box<Territory>),
    /// Canonical army state.
    ArmyUpdated(Army),
    /// An army was removed.
    ArmyDisbanded(ArmyDisbanded),
    /// A battle was declared.
    BattleStarted(Box<Battle>),
    /// A battle changed state.
    BattleUpdated(Box<Battle>),
    /// A battle finished.
    BattleEnded(Box<BattleEnded>),
    /// A world event started or changed.
    GameEvent(GameEvent),
    /// Canonical alliance state.
    AllianceUpdated(Alliance),
    /// An alliance lost its last member.
    AllianceDisbanded(AllianceDisbanded),
    /// A chat line.
    ChatMessage(ChatMessage),
    /// A notification for the local player.
    Notification(Notification),
    /// Full world state, sent in answer to a resync request.
    StateSnapshot(Box<WorldSnapshot>),
}

impl PushMessage {
    /// Short kind name used in logs.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::PlayerJoined(_) => "player_joined",
            Self::PlayerLeft(_) => "player_left",
            Self::TerritoryUpdated(_) => "territory_updated",
            Self::ArmyUpdated(_) => "army_updated",
            Self::ArmyDisbanded(_) => "army_disbanded",
            Self::BattleStarted(_) => "battle_started",
            Self::BattleUpdated(_) => "battle_updated",
            Self::BattleEnded(_) => "battle_ended",
            Self::GameEvent(_) => "game_event",
            Self::AllianceUpdated(_) => "alliance_updated",
            Self::AllianceDisbanded(_) => "alliance_disbanded",
            Self::ChatMessage(_) => "chat_message",
            Self::Notification(_) => "notification",
            Self::StateSnapshot(_) => "state_snapshot",
        }
    }
}

/// One inbound frame: a push message plus ordering metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct PushEnvelope {
    /// Server-assigned, monotonically increasing sequence number.
    pub sequence: u64,
    /// Echo of the client operation this update answers, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub op_id: Option<OperationId>,
    /// The message itself.
    #[serde(flatten)]
    pub message: PushMessage,
}

// ---------------------------------------------------------------------------
// Outbound
// ---------------------------------------------------------------------------

/// A batch of identical units to raise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct UnitOrder {
    /// Unit kind.
    #[serde(rename = "type")]
    pub unit_type: UnitType,
    /// Number of units.
    pub quantity: u32,
}

/// A player intent, as sent upstream and as executed locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "command", rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum Command {
    /// Raise a new army on an owned territory.
    CreateArmy {
        /// Acting player.
        player_id: PlayerId,
        /// Army name.
        name: String,
        /// Territory to raise the army on.
        location: TerritoryId,
        /// Initial units; an army needs at least one.
        units: Vec<UnitOrder>,
    },
    /// Move an army to an adjacent territory.
    MoveArmy {
        /// Acting player.
        player_id: PlayerId,
        /// Army to move.
        army_id: ArmyId,
        /// Destination.
        target: TerritoryId,
    },
    /// Attack an adjacent territory.
    Attack {
        /// Acting player.
        player_id: PlayerId,
        /// Attacking army.
        army_id: ArmyId,
        /// Target territory.
        target: TerritoryId,
    },
    /// Add units to an army.
    RecruitUnits {
        /// Acting player.
        player_id: PlayerId,
        /// Receiving army.
        army_id: ArmyId,
        /// Unit kind.
        unit_type: UnitType,
        /// Number of units.
        quantity: u32,
    },
    /// Dissolve an army.
    DisbandArmy {
        /// Acting player.
        player_id: PlayerId,
        /// Army to dissolve.
        army_id: ArmyId,
    },
    /// Construct a building.
    BuildStructure {
        /// Acting player.
        player_id: PlayerId,
        /// Territory to build on.
        territory_id: TerritoryId,
        /// Building kind.
        building_type: BuildingType,
        /// Starting level.
        level: u32,
    },
    /// Construct a defense.
    BuildDefense {
        /// Acting player.
        player_id: PlayerId,
        /// Territory to fortify.
        territory_id: TerritoryId,
        /// Defense kind.
        defense_type: DefenseType,
        /// Starting level.
        level: u32,
    },
    /// Found a new alliance led by the acting player.
    CreateAlliance {
        /// Acting player.
        player_id: PlayerId,
        /// Alliance name.
        name: String,
        /// Short tag, unique across alliances.
        tag: String,
        /// Free-form description.
        #[serde(default)]
        description: String,
        /// Whether anyone may join.
        is_open: bool,
        /// Minimum reputation to join.
        #[serde(default)]
        required_reputation: i64,
    },
    /// Join an open alliance.
    JoinAlliance {
        /// Acting player.
        player_id: PlayerId,
        /// Alliance to join.
        alliance_id: AllianceId,
    },
    /// Leave the player's alliance.
    LeaveAlliance {
        /// Acting player.
        player_id: PlayerId,
    },
}

/// Kind of state the client asks for after (re)connecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "mode", rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum SnapshotRequest {
    /// Everything.
    Full,
    /// Everything after the given sequence number.
    Since {
        /// Highest sequence number already applied.
        sequence: u64,
    },
}

/// One outbound frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum OutboundFrame {
    /// A player intent tagged with its operation id.
    Intent {
        /// Client operation id, echoed on the canonical update.
        op_id: OperationId,
        /// The intent.
        command: Command,
    },
    /// Resync request.
    Resync(SnapshotRequest),
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::enums::ChatChannel;
    use crate::ids::ChatMessageId;

    #[test]
    fn push_envelope_wire_shape() {
        let now = Utc::now();
        let chat = ChatMessage {
            id: ChatMessageId::new(),
            sender_id: PlayerId::new(),
            sender_name: String::from("ada"),
            content: String::from("gg"),
            channel: ChatChannel::Global,
            recipient_id: None,
            created_at: now,
            updated_at: now,
        };
        let envelope = PushEnvelope {
            sequence: 7,
            op_id: None,
            message: PushMessage::ChatMessage(chat),
        };
        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(value.get("type").and_then(|v| v.as_str()), Some("chat_message"));
        assert_eq!(value.get("sequence").and_then(serde_json::Value::as_u64), Some(7));
        assert!(value.get("payload").is_some());

        let back: PushEnvelope = serde_json::from_value(value).unwrap();
        assert_eq!(back, envelope);
    }

    #[test]
    fn same_state_ignores_timestamps() {
        let now = Utc::now();
        let a = Player::new("ada", now);
        let mut b = a.clone();
        b.updated_at = now + chrono::Duration::seconds(5);
        assert!(EntitySnapshot::Player(a.clone()).same_state(&EntitySnapshot::Player(b.clone())));

        b.reputation = 3;
        assert!(!EntitySnapshot::Player(a).same_state(&EntitySnapshot::Player(b)));
    }
}
