//! Core entity structs for the GeoWar simulation core.
//!
//! Every entity carries an id plus `created_at` / `updated_at`. Ownership is
//! denormalized onto the owned side (`Territory::owner_id`,
//! `Army::owner_id`); a player's territories and armies are derived by
//! querying the store, never stored on the player.

use core::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use ts_rs::TS;

use crate::enums::{
    AllianceRole, ArmyStatus, BattleStatus, BuildingType, ChatChannel, DefenseType, EffectTarget,
    GameEventType, NotificationType, ResourceKind, TerritoryStatus, UnitType, Winner,
};
use crate::ids::{
    AllianceId, ArmyId, BattleId, BuildingId, ChatMessageId, DefenseId, GameEventId, NotificationId,
    PlayerId, TerritoryId, UnitId,
};
use crate::resources::{ResourceBonus, Resources, TerritoryResources};

/// Common accessors shared by every stored entity kind.
pub trait Entity {
    /// The typed identifier of this entity kind.
    type Id: Copy + Ord + fmt::Display;

    /// The entity's identifier.
    fn id(&self) -> Self::Id;

    /// When the entity was first created.
    fn created_at(&self) -> DateTime<Utc>;

    /// When the entity was last modified.
    fn updated_at(&self) -> DateTime<Utc>;

    /// Overwrite both timestamps.
    fn set_timestamps(&mut self, created_at: DateTime<Utc>, updated_at: DateTime<Utc>);

    /// Bump `updated_at`.
    fn touch(&mut self, at: DateTime<Utc>) {
        let created = self.created_at();
        self.set_timestamps(created, at);
    }
}

macro_rules! impl_entity {
    ($ty:ty, $id:ty) => {
        impl Entity for $ty {
            type Id = $id;

            fn id(&self) -> Self::Id {
                self.id
            }

            fn created_at(&self) -> DateTime<Utc> {
                self.created_at
            }

            fn updated_at(&self) -> DateTime<Utc> {
                self.updated_at
            }

            fn set_timestamps(&mut self, created_at: DateTime<Utc>, updated_at: DateTime<Utc>) {
                self.created_at = created_at;
                self.updated_at = updated_at;
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Player
// ---------------------------------------------------------------------------

/// A player account inside the shared world.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct Player {
    /// Unique player identifier.
    pub id: PlayerId,
    /// Display name.
    pub username: String,
    /// Premium currency balance.
    #[ts(as = "String")]
    pub currency: Decimal,
    /// Player level, derived from experience.
    pub level: u32,
    /// Accumulated experience points.
    pub experience: u64,
    /// Standing with other players; may go negative.
    pub reputation: i64,
    /// Fungible resource balances.
    pub resources: Resources,
    /// Whether the player is currently connected.
    pub is_online: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

impl_entity!(Player, PlayerId);

/// Experience needed per player level.
pub const EXPERIENCE_PER_LEVEL: u64 = 1000;

impl Player {
    /// Create a fresh level-1 player with empty balances.
    pub fn new(username: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: PlayerId::new(),
            username: username.into(),
            currency: Decimal::ZERO,
            level: 1,
            experience: 0,
            reputation: 0,
            resources: Resources::ZERO,
            is_online: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Grant experience and raise the level when a threshold is crossed.
    ///
    /// The level never decreases: `level = max(level, experience / 1000 + 1)`.
    pub fn add_experience(&mut self, amount: u64) {
        self.experience = self.experience.saturating_add(amount);
        let earned = self
            .experience
            .checked_div(EXPERIENCE_PER_LEVEL)
            .unwrap_or(0)
            .saturating_add(1);
        let earned = u32::try_from(earned).unwrap_or(u32::MAX);
        self.level = self.level.max(earned);
    }
}

// ---------------------------------------------------------------------------
// Territory
// ---------------------------------------------------------------------------

/// Geographic anchor of a territory (display only).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct GeoCoordinates {
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lng: f64,
    /// Optional bounding box `[[south, west], [north, east]]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounds: Option<[[f64; 2]; 2]>,
}

/// A claimable region of the world map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct Territory {
    /// Unique territory identifier.
    pub id: TerritoryId,
    /// Display name.
    pub name: String,
    /// ISO country code.
    pub country_code: String,
    /// Owning player, `None` when unclaimed.
    pub owner_id: Option<PlayerId>,
    /// Inhabitants; base food production scales with it.
    pub population: u64,
    /// Gross domestic product; base gold production scales with it.
    #[ts(as = "String")]
    pub gdp: Decimal,
    /// Combined power of the armies stationed here, maintained by the store.
    pub military_power: u64,
    /// Stockpile and production metadata.
    pub resources: TerritoryResources,
    /// Constructed buildings.
    #[serde(default)]
    pub buildings: Vec<Building>,
    /// Constructed fortifications.
    #[serde(default)]
    pub defenses: Vec<Defense>,
    /// Map anchor.
    pub coordinates: GeoCoordinates,
    /// Adjacent territories.
    #[serde(default)]
    pub neighbors: Vec<TerritoryId>,
    /// Control status.
    pub status: TerritoryStatus,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

impl_entity!(Territory, TerritoryId);

impl Territory {
    /// Whether `other` is listed as adjacent.
    pub fn is_adjacent_to(&self, other: TerritoryId) -> bool {
        self.neighbors.contains(&other)
    }
}

// ---------------------------------------------------------------------------
// Military
// ---------------------------------------------------------------------------

/// A stack of identical units inside an army.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct Unit {
    /// Unique unit-stack identifier.
    pub id: UnitId,
    /// Unit kind.
    #[serde(rename = "type")]
    pub unit_type: UnitType,
    /// Number of units in the stack.
    pub quantity: u32,
    /// Condition, 0 to 100.
    pub health: u32,
    /// Attack rating per unit.
    pub attack: u32,
    /// Defense rating per unit.
    pub defense: u32,
    /// Movement speed.
    pub speed: u32,
    /// Upkeep per unit per tick.
    pub upkeep_cost: Resources,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

impl_entity!(Unit, UnitId);

/// A mobile collection of units under one owner, stationed on a territory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct Army {
    /// Unique army identifier.
    pub id: ArmyId,
    /// Display name.
    pub name: String,
    /// Commanding player.
    pub owner_id: PlayerId,
    /// Ordered unit stacks.
    pub units: Vec<Unit>,
    /// Territory the army currently occupies.
    pub location: TerritoryId,
    /// Current orders.
    pub status: ArmyStatus,
    /// Morale, 0 to 100.
    pub morale: u32,
    /// Combat experience.
    pub experience: u64,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

impl_entity!(Army, ArmyId);

impl Army {
    /// Sum of unit quantities across all stacks.
    pub fn total_quantity(&self) -> u64 {
        self.units
            .iter()
            .map(|unit| u64::from(unit.quantity))
            .fold(0_u64, u64::saturating_add)
    }

    /// An army with no units left is dissolved and must leave the store.
    pub fn is_dissolved(&self) -> bool {
        self.total_quantity() == 0
    }

    /// Drop unit stacks whose quantity reached zero.
    pub fn prune_empty_units(&mut self) {
        self.units.retain(|unit| unit.quantity > 0);
    }
}

// ---------------------------------------------------------------------------
// Alliances
// ---------------------------------------------------------------------------

/// One player's membership in an alliance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct AllianceMember {
    /// The member.
    pub player_id: PlayerId,
    /// Rank inside the alliance.
    pub role: AllianceRole,
    /// When the player joined.
    pub joined_at: DateTime<Utc>,
    /// Resources contributed so far.
    #[ts(as = "String")]
    pub contribution: Decimal,
}

/// A named group of players that do not fight each other.
///
/// Membership lives here only; a player belongs to at most one alliance and
/// finds it through the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct Alliance {
    /// Unique alliance identifier.
    pub id: AllianceId,
    /// Display name.
    pub name: String,
    /// Short tag shown next to member names.
    pub tag: String,
    /// Current leader.
    pub leader_id: PlayerId,
    /// Members in join order, leader included.
    pub members: Vec<AllianceMember>,
    /// Free-form description.
    pub description: String,
    /// Whether players may join without an invitation.
    pub is_open: bool,
    /// Minimum reputation needed to join.
    pub required_reputation: i64,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

impl_entity!(Alliance, AllianceId);

impl Alliance {
    /// Found a new alliance led by `leader`.
    pub fn found(
        name: impl Into<String>,
        tag: impl Into<String>,
        leader: PlayerId,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: AllianceId::new(),
            name: name.into(),
            tag: tag.into(),
            leader_id: leader,
            members: vec![AllianceMember {
                player_id: leader,
                role: AllianceRole::Leader,
                joined_at: now,
                contribution: Decimal::ZERO,
            }],
            description: String::new(),
            is_open: true,
            required_reputation: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether `player` is a member.
    pub fn is_member(&self, player: PlayerId) -> bool {
        self.members.iter().any(|m| m.player_id == player)
    }

    /// Add `player` as a plain member. Returns `false` if already present.
    pub fn admit(&mut self, player: PlayerId, now: DateTime<Utc>) -> bool {
        if self.is_member(player) {
            return false;
        }
        self.members.push(AllianceMember {
            player_id: player,
            role: AllianceRole::Member,
            joined_at: now,
            contribution: Decimal::ZERO,
        });
        true
    }

    /// Remove `player`. When the leader leaves, the longest-serving officer
    /// takes over, or the longest-serving member when there is no officer.
    ///
    /// Returns `false` if `player` was not a member.
    pub fn dismiss(&mut self, player: PlayerId) -> bool {
        let before = self.members.len();
        self.members.retain(|m| m.player_id != player);
        if self.members.len() == before {
            return false;
        }
        if self.leader_id == player {
            let successor = self
                .members
                .iter()
                .find(|m| m.role == AllianceRole::Officer)
                .map(|m| m.player_id)
                .or_else(|| self.members.first().map(|m| m.player_id));
            if let Some(next) = successor {
                self.leader_id = next;
                for member in &mut self.members {
                    if member.player_id == next {
                        member.role = AllianceRole::Leader;
                    }
                }
            }
        }
        true
    }

    /// An alliance without members is disbanded.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Structures
// ---------------------------------------------------------------------------

/// An economic building attached to one territory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct Building {
    /// Unique building identifier.
    pub id: BuildingId,
    /// Building kind.
    #[serde(rename = "type")]
    pub building_type: BuildingType,
    /// Upgrade level, starting at 1.
    pub level: u32,
    /// Territory the building stands on.
    pub territory_id: TerritoryId,
    /// Per-tick production added while active.
    #[serde(default)]
    pub production_bonus: ResourceBonus,
    /// Only active buildings contribute production.
    pub is_active: bool,
    /// Upgrade progress percentage, when upgrading.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upgrade_progress: Option<u32>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

impl_entity!(Building, BuildingId);

/// A fortification attached to one territory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct Defense {
    /// Unique defense identifier.
    pub id: DefenseId,
    /// Defense kind.
    #[serde(rename = "type")]
    pub defense_type: DefenseType,
    /// Upgrade level, starting at 1.
    pub level: u32,
    /// Territory the defense protects.
    pub territory_id: TerritoryId,
    /// Structural health.
    pub health: u32,
    /// Damage dealt per engagement.
    pub damage: u32,
    /// Engagement range in territories.
    pub range: u32,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

impl_entity!(Defense, DefenseId);

// ---------------------------------------------------------------------------
// Battles
// ---------------------------------------------------------------------------

/// The defending party of a battle: a player, or nobody for unclaimed land.
///
/// On the wire this is a plain string, either a player id or `"neutral"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BattleSide {
    /// A player defends the territory.
    Player(PlayerId),
    /// The territory is unclaimed.
    Neutral,
}

/// Wire sentinel for [`BattleSide::Neutral`].
pub const NEUTRAL_SIDE: &str = "neutral";

impl BattleSide {
    /// The defending side for a territory with the given owner.
    pub const fn from_owner(owner: Option<PlayerId>) -> Self {
        match owner {
            Some(player) => Self::Player(player),
            None => Self::Neutral,
        }
    }

    /// The defending player, if any.
    pub const fn player(self) -> Option<PlayerId> {
        match self {
            Self::Player(player) => Some(player),
            Self::Neutral => None,
        }
    }
}

impl fmt::Display for BattleSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Player(player) => write!(f, "{player}"),
            Self::Neutral => f.write_str(NEUTRAL_SIDE),
        }
    }
}

impl Serialize for BattleSide {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for BattleSide {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        if raw == NEUTRAL_SIDE {
            return Ok(Self::Neutral);
        }
        raw.parse::<PlayerId>()
            .map(Self::Player)
            .map_err(serde::de::Error::custom)
    }
}

/// One round of a round-based battle. Atomic resolution never fills these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct BattleRound {
    /// 1-based round number.
    pub round_number: u32,
    /// Damage dealt by the attacker.
    pub attacker_damage: u64,
    /// Damage dealt by the defender.
    pub defender_damage: u64,
    /// Attacker losses by unit type.
    pub attacker_losses: std::collections::BTreeMap<UnitType, u32>,
    /// Defender losses by unit type.
    pub defender_losses: std::collections::BTreeMap<UnitType, u32>,
}

/// Final outcome written onto a finished battle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct BattleResult {
    /// Which side won.
    pub winner: Winner,
    /// True exactly when the attacker won.
    pub territory_conquered: bool,
    /// Attacker roster after losses.
    pub attacker_remaining_units: Vec<Unit>,
    /// Defender roster after losses.
    pub defender_remaining_units: Vec<Unit>,
    /// Spoils granted to the winner.
    #[serde(default)]
    pub rewards: ResourceBonus,
}

/// A battle over one territory.
///
/// The two armies are copies taken when the battle was declared; resolving
/// the battle never touches the live armies in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct Battle {
    /// Unique battle identifier.
    pub id: BattleId,
    /// Attacking player.
    pub attacker_id: PlayerId,
    /// Defending player or the neutral sentinel.
    #[ts(as = "String")]
    pub defender_id: BattleSide,
    /// Contested territory.
    pub territory_id: TerritoryId,
    /// Attacker snapshot at declaration.
    pub attacker_army: Army,
    /// Defender snapshot at declaration.
    pub defender_army: Army,
    /// Lifecycle state.
    pub status: BattleStatus,
    /// Round log (empty under atomic resolution).
    #[serde(default)]
    pub rounds: Vec<BattleRound>,
    /// Outcome, present once finished.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<BattleResult>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

impl_entity!(Battle, BattleId);

// ---------------------------------------------------------------------------
// World events
// ---------------------------------------------------------------------------

/// A single modifier carried by a [`GameEvent`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct GameEventEffect {
    /// Domain being modified.
    pub target: EffectTarget,
    /// Percentage modifier, e.g. `-30` or `25`.
    #[ts(as = "String")]
    pub modifier: Decimal,
    /// Restrict a resource effect to one kind; `None` means all kinds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<ResourceKind>,
}

/// A time-bound world event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct GameEvent {
    /// Unique event identifier.
    pub id: GameEventId,
    /// Event kind.
    #[serde(rename = "type")]
    pub event_type: GameEventType,
    /// Headline.
    pub title: String,
    /// Long description.
    pub description: String,
    /// Territories the effects apply to.
    pub affected_territories: Vec<TerritoryId>,
    /// Lifetime in hours from `created_at`.
    #[serde(rename = "duration")]
    pub duration_hours: u32,
    /// Modifiers applied while active.
    pub effects: Vec<GameEventEffect>,
    /// Cleared once the lifetime has elapsed.
    pub is_active: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

impl_entity!(GameEvent, GameEventId);

impl GameEvent {
    /// Whether the event's lifetime has elapsed at `now`.
    ///
    /// Expiry is strict: an event exactly `duration_hours` old is still live.
    pub fn has_expired(&self, now: DateTime<Utc>) -> bool {
        let lifetime = chrono::Duration::hours(i64::from(self.duration_hours));
        now.signed_duration_since(self.created_at) > lifetime
    }

    /// Whether the event touches `territory`.
    pub fn affects(&self, territory: TerritoryId) -> bool {
        self.affected_territories.contains(&territory)
    }
}

// ---------------------------------------------------------------------------
// Notifications and chat
// ---------------------------------------------------------------------------

/// A message for one player, created as a side effect of simulation events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct Notification {
    /// Unique notification identifier.
    pub id: NotificationId,
    /// Recipient.
    pub player_id: PlayerId,
    /// Category.
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    /// Headline.
    pub title: String,
    /// Body text.
    pub message: String,
    /// Read flag, owned by the UI layer.
    pub is_read: bool,
    /// Optional deep link.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_url: Option<String>,
    /// Optional structured payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

impl_entity!(Notification, NotificationId);

impl Notification {
    /// Build an unread notification.
    pub fn new(
        player_id: PlayerId,
        notification_type: NotificationType,
        title: impl Into<String>,
        message: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: NotificationId::new(),
            player_id,
            notification_type,
            title: title.into(),
            message: message.into(),
            is_read: false,
            action_url: None,
            data: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Attach a structured payload.
    #[must_use]
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// A chat line relayed by the push channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct ChatMessage {
    /// Unique message identifier.
    pub id: ChatMessageId,
    /// Author.
    pub sender_id: PlayerId,
    /// Author display name.
    pub sender_name: String,
    /// Text.
    pub content: String,
    /// Audience.
    pub channel: ChatChannel,
    /// Recipient of a private message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient_id: Option<PlayerId>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

impl_entity!(ChatMessage, ChatMessageId);
