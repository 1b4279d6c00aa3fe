//! Enumeration types for the GeoWar simulation core.
//!
//! Wire names follow the push-channel protocol: resource kinds are
//! camelCase (`rareEarth`), every other enum is `snake_case`
//! (`under_attack`, `power_plant`).

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ---------------------------------------------------------------------------
// Resources
// ---------------------------------------------------------------------------

/// One of the seven fungible resource kinds held by players and territories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub enum ResourceKind {
    /// Currency-like resource; base production is a fraction of GDP.
    Gold,
    /// Fuel for vehicles and industry.
    Oil,
    /// Construction and armament material.
    Steel,
    /// Feeds population and troops; base production scales with population.
    Food,
    /// Fissile material for the nuclear program.
    Uranium,
    /// Rare-earth metals for electronics.
    RareEarth,
    /// Power for buildings.
    Electricity,
}

impl ResourceKind {
    /// All resource kinds in canonical order.
    pub const ALL: [Self; 7] = [
        Self::Gold,
        Self::Oil,
        Self::Steel,
        Self::Food,
        Self::Uranium,
        Self::RareEarth,
        Self::Electricity,
    ];

    /// The wire name of this resource kind.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Gold => "gold",
            Self::Oil => "oil",
            Self::Steel => "steel",
            Self::Food => "food",
            Self::Uranium => "uranium",
            Self::RareEarth => "rareEarth",
            Self::Electricity => "electricity",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string does not name a known [`ResourceKind`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownResource(pub String);

impl fmt::Display for UnknownResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown resource kind: {}", self.0)
    }
}

impl std::error::Error for UnknownResource {}

impl FromStr for ResourceKind {
    type Err = UnknownResource;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gold" => Ok(Self::Gold),
            "oil" => Ok(Self::Oil),
            "steel" => Ok(Self::Steel),
            "food" => Ok(Self::Food),
            "uranium" => Ok(Self::Uranium),
            "rareEarth" | "rare_earth" | "rare-earth" => Ok(Self::RareEarth),
            "electricity" => Ok(Self::Electricity),
            other => Err(UnknownResource(other.to_owned())),
        }
    }
}

// ---------------------------------------------------------------------------
// Territory
// ---------------------------------------------------------------------------

/// Control status of a territory.
///
/// After an ownership change the target state is `Neutral` exactly when the
/// territory has no owner; `Contested` and `UnderAttack` are transient
/// states during active conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum TerritoryStatus {
    /// Unclaimed.
    Neutral,
    /// Held by a player, no active conflict.
    Owned,
    /// Claimed by more than one side.
    Contested,
    /// Target of a battle that has not finished yet.
    UnderAttack,
    /// Temporarily immune to attack.
    Protected,
}

// ---------------------------------------------------------------------------
// Military
// ---------------------------------------------------------------------------

/// What an army is currently doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum ArmyStatus {
    /// Stationed, no orders.
    Idle,
    /// Travelling to another territory.
    Moving,
    /// Committed to an attack.
    Attacking,
    /// Dug in; receives the defensive bonus in combat.
    Defending,
    /// Falling back.
    Retreating,
}

/// The eleven kinds of military unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum UnitType {
    /// Foot soldiers.
    Infantry,
    /// Armoured ground vehicle.
    Tank,
    /// Long-range ground guns.
    Artillery,
    /// Rotary-wing aircraft.
    Helicopter,
    /// Air-superiority aircraft.
    Fighter,
    /// Strategic bomber.
    Bomber,
    /// Underwater vessel.
    Submarine,
    /// Surface escort vessel.
    Destroyer,
    /// Aircraft carrier.
    Carrier,
    /// Conventional missile battery.
    Missile,
    /// Nuclear weapon.
    Nuke,
}

impl UnitType {
    /// All unit types in canonical order.
    pub const ALL: [Self; 11] = [
        Self::Infantry,
        Self::Tank,
        Self::Artillery,
        Self::Helicopter,
        Self::Fighter,
        Self::Bomber,
        Self::Submarine,
        Self::Destroyer,
        Self::Carrier,
        Self::Missile,
        Self::Nuke,
    ];
}

/// Lifecycle of a battle: `Preparing -> InProgress -> Finished`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum BattleStatus {
    /// Declared, armies snapshotted, not yet fighting.
    Preparing,
    /// Fighting; counted by the active-battles query.
    InProgress,
    /// Resolved. Immutable from here on.
    Finished,
}

/// Outcome of a resolved battle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum Winner {
    /// The attacking side won; the target territory is conquered.
    Attacker,
    /// The defending side held.
    Defender,
    /// Neither side cleared the victory margin.
    Draw,
}

// ---------------------------------------------------------------------------
// Structures
// ---------------------------------------------------------------------------

/// Economic and military buildings that can be constructed on a territory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum BuildingType {
    /// Seat of government.
    Headquarters,
    /// Trains infantry.
    Barracks,
    /// Heavy industry.
    Factory,
    /// Oil processing.
    Refinery,
    /// Food production.
    Farm,
    /// Ore and rare-earth extraction.
    Mine,
    /// Electricity generation.
    PowerPlant,
    /// Research facility.
    ResearchLab,
    /// Finance.
    Bank,
    /// Naval facility.
    Port,
    /// Air facility.
    Airport,
}

/// Fortifications that can be constructed on a territory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum DefenseType {
    /// Static wall.
    Wall,
    /// Gun turret.
    Turret,
    /// Anti-aircraft battery.
    AntiAir,
    /// Missile interception.
    MissileDefense,
    /// Hardened bunker.
    Bunker,
    /// Early-warning radar.
    Radar,
}

// ---------------------------------------------------------------------------
// World events
// ---------------------------------------------------------------------------

/// Kind of time-bound world event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum GameEventType {
    /// Earthquake, flood, storm.
    NaturalDisaster,
    /// Temporary production surge.
    EconomicBoom,
    /// Population-wide disease.
    Pandemic,
    /// Political upheaval.
    Revolution,
    /// New deposits found.
    Discovery,
    /// Formal declaration of war.
    WarDeclaration,
}

/// The domain a [`GameEventEffect`](crate::GameEventEffect) modifies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum EffectTarget {
    /// Resource production (optionally scoped to one resource).
    Resources,
    /// Military strength.
    Military,
    /// Population.
    Population,
    /// Army morale.
    Morale,
}

// ---------------------------------------------------------------------------
// Alliances
// ---------------------------------------------------------------------------

/// Rank of a player inside an alliance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum AllianceRole {
    /// Founder or successor; exactly one per alliance.
    Leader,
    /// Next in line when the leader leaves.
    Officer,
    /// Regular member.
    Member,
}

// ---------------------------------------------------------------------------
// Notifications and chat
// ---------------------------------------------------------------------------

/// Category of a player notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum NotificationType {
    /// A battle targeting one of the player's territories was declared.
    AttackIncoming,
    /// A battle the player took part in has finished.
    BattleResult,
    /// The player lost a territory.
    TerritoryLost,
    /// The player conquered a territory.
    TerritoryGained,
    /// Invitation to an alliance.
    AllianceInvite,
    /// A resource balance hit zero.
    ResourceDepleted,
    /// A building or defense was constructed.
    BuildingComplete,
    /// A research project finished.
    ResearchComplete,
    /// Generic achievement.
    Achievement,
}

/// Audience of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum ChatChannel {
    /// Everyone.
    Global,
    /// Alliance members.
    Alliance,
    /// One recipient.
    Private,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_kind_wire_names() {
        let json = serde_json::to_string(&ResourceKind::RareEarth).ok();
        assert_eq!(json.as_deref(), Some("\"rareEarth\""));
        for kind in ResourceKind::ALL {
            assert_eq!(kind.as_str().parse::<ResourceKind>().ok(), Some(kind));
        }
    }

    #[test]
    fn unknown_resource_is_rejected() {
        assert!("plutonium".parse::<ResourceKind>().is_err());
    }

    #[test]
    fn statuses_are_snake_case() {
        let json = serde_json::to_string(&TerritoryStatus::UnderAttack).ok();
        assert_eq!(json.as_deref(), Some("\"under_attack\""));
        let json = serde_json::to_string(&BattleStatus::InProgress).ok();
        assert_eq!(json.as_deref(), Some("\"in_progress\""));
    }
}
