//! Player intents: validation and application against the world state.
//!
//! Every intent validates fully before it writes anything, so a rejected
//! intent leaves the store untouched. Rejections carry a human-readable
//! reason via [`CommandError`]'s `Display`.
//!
//! Alliance intents live here too: allies cannot attack each other's
//! territory.

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use geowar_combat::{army_power, declare};
use geowar_ledger::{LedgerError, deduct};
use geowar_types::{
    Alliance, AllianceId, Army, ArmyId, ArmyStatus, BattleId, BattleSide, Building, BuildingId, BuildingType, Command,
    Defense, DefenseId, DefenseType, Entity, EntityRef, Notification, NotificationType, Player,
    PlayerId, ResourceBonus, Resources, Territory, TerritoryId, TerritoryStatus, UnitOrder, UnitType,
};
use geowar_world::{WorldError, WorldState};

use crate::costs::{building_cost, defense_cost, recruit_cost, total_cost, unit_profile};

/// Morale of a newly raised army.
pub const STARTING_MORALE: u32 = 100;

/// Why an intent was rejected.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// The acting player does not exist.
    #[error("player {0} not found")]
    PlayerNotFound(PlayerId),

    /// A referenced territory does not exist.
    #[error("territory {0} not found")]
    TerritoryNotFound(TerritoryId),

    /// A referenced army does not exist.
    #[error("army {0} not found")]
    ArmyNotFound(ArmyId),

    /// The player does not own the army.
    #[error("army {army} does not belong to player {player}")]
    NotArmyOwner {
        /// Acting player.
        player: PlayerId,
        /// The army.
        army: ArmyId,
    },

    /// The player does not own the territory.
    #[error("territory {territory} does not belong to player {player}")]
    NotTerritoryOwner {
        /// Acting player.
        player: PlayerId,
        /// The territory.
        territory: TerritoryId,
    },

    /// The target does not border the army's location.
    #[error("territory {to} is not adjacent to {from}")]
    NotAdjacent {
        /// Current location.
        from: TerritoryId,
        /// Requested target.
        to: TerritoryId,
    },

    /// Players cannot attack their own territory.
    #[error("territory {0} already belongs to the attacker")]
    OwnTerritory(TerritoryId),

    /// The target belongs to an ally.
    #[error("territory {0} belongs to an ally")]
    AlliedTerritory(TerritoryId),

    /// The territory is temporarily immune to attack.
    #[error("territory {0} is protected")]
    TerritoryProtected(TerritoryId),

    /// The army is committed to a battle.
    #[error("army {0} is engaged in battle")]
    ArmyEngaged(ArmyId),

    /// The army has no units.
    #[error("army {0} has no units")]
    EmptyArmy(ArmyId),

    /// An army needs at least one unit order.
    #[error("an army needs at least one unit")]
    NoUnits,

    /// Army names must not be blank.
    #[error("army name must not be empty")]
    EmptyName,

    /// A referenced alliance does not exist.
    #[error("alliance {0} not found")]
    AllianceNotFound(AllianceId),

    /// The player already belongs to an alliance.
    #[error("player {player} is already in alliance {alliance}")]
    AlreadyInAlliance {
        /// Acting player.
        player: PlayerId,
        /// Their current alliance.
        alliance: AllianceId,
    },

    /// The player belongs to no alliance.
    #[error("player {0} is not in an alliance")]
    NotInAlliance(PlayerId),

    /// The alliance only accepts invited players.
    #[error("alliance {0} is closed")]
    AllianceClosed(AllianceId),

    /// The player's reputation is below the alliance's requirement.
    #[error("reputation {actual} is below the required {required}")]
    InsufficientReputation {
        /// Alliance requirement.
        required: i64,
        /// Player reputation.
        actual: i64,
    },

    /// Another alliance already uses the tag.
    #[error("alliance tag {0} is taken")]
    TagTaken(String),

    /// Quantities must be positive.
    #[error("quantity of {unit_type:?} must be positive")]
    InvalidQuantity {
        /// The unit type ordered.
        unit_type: UnitType,
    },

    /// Levels start at 1.
    #[error("level must be at least 1")]
    InvalidLevel,

    /// The total price does not fit the decimal range.
    #[error("cost overflow")]
    CostOverflow,

    /// The player cannot pay.
    #[error("insufficient resources: {source}")]
    Ledger {
        /// The ledger failure.
        #[from]
        source: LedgerError,
    },

    /// The store refused the write.
    #[error("world error: {source}")]
    World {
        /// The store failure.
        #[from]
        source: WorldError,
    },
}

impl CommandError {
    /// Human-readable rejection reason.
    pub fn reason(&self) -> String {
        self.to_string()
    }
}

/// What an accepted intent did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    /// A new army was raised.
    ArmyCreated {
        /// Paying player.
        player: PlayerId,
        /// The new army.
        army: ArmyId,
    },
    /// An army changed location.
    ArmyMoved {
        /// The army.
        army: ArmyId,
        /// Where it came from.
        from: TerritoryId,
        /// Where it is now.
        to: TerritoryId,
    },
    /// A battle was declared.
    BattleDeclared {
        /// The battle.
        battle: BattleId,
        /// The attacking army.
        army: ArmyId,
        /// The target territory.
        territory: TerritoryId,
    },
    /// Units were added to an army.
    UnitsRecruited {
        /// Paying player.
        player: PlayerId,
        /// Receiving army.
        army: ArmyId,
    },
    /// An army was removed.
    ArmyDisbanded {
        /// The army.
        army: ArmyId,
    },
    /// A building was added.
    StructureBuilt {
        /// Paying player.
        player: PlayerId,
        /// Territory built on.
        territory: TerritoryId,
        /// The building.
        building: BuildingId,
    },
    /// A defense was added.
    DefenseBuilt {
        /// Paying player.
        player: PlayerId,
        /// Territory fortified.
        territory: TerritoryId,
        /// The defense.
        defense: DefenseId,
    },
    /// A new alliance was founded.
    AllianceCreated {
        /// Founder and leader.
        player: PlayerId,
        /// The alliance.
        alliance: AllianceId,
    },
    /// A player joined an alliance.
    AllianceJoined {
        /// New member.
        player: PlayerId,
        /// The alliance.
        alliance: AllianceId,
    },
    /// A player left an alliance.
    AllianceLeft {
        /// Former member.
        player: PlayerId,
        /// The alliance, gone if it was the last member.
        alliance: AllianceId,
    },
}

impl CommandOutcome {
    /// The army raised by a `create_army` intent.
    pub const fn created_army(&self) -> Option<ArmyId> {
        match self {
            Self::ArmyCreated { army, .. } => Some(*army),
            _ => None,
        }
    }

    /// The battle declared by an `attack` intent.
    pub const fn declared_battle(&self) -> Option<BattleId> {
        match self {
            Self::BattleDeclared { battle, .. } => Some(*battle),
            _ => None,
        }
    }

    /// The alliance an alliance intent acted on.
    pub const fn alliance(&self) -> Option<AllianceId> {
        match self {
            Self::AllianceCreated { alliance, .. }
            | Self::AllianceJoined { alliance, .. }
            | Self::AllianceLeft { alliance, .. } => Some(*alliance),
            _ => None,
        }
    }

    /// Stored entities the intent created, changed or removed.
    pub fn affected(&self) -> Vec<EntityRef> {
        match *self {
            Self::ArmyCreated { player, army } | Self::UnitsRecruited { player, army } => {
                vec![EntityRef::Player(player), EntityRef::Army(army)]
            }
            Self::ArmyMoved { army, from, to } => vec![
                EntityRef::Army(army),
                EntityRef::Territory(from),
                EntityRef::Territory(to),
            ],
            Self::BattleDeclared {
                battle,
                army,
                territory,
            } => vec![
                EntityRef::Battle(battle),
                EntityRef::Army(army),
                EntityRef::Territory(territory),
            ],
            Self::ArmyDisbanded { army } => vec![EntityRef::Army(army)],
            Self::StructureBuilt {
                player, territory, ..
            }
            | Self::DefenseBuilt {
                player, territory, ..
            } => vec![EntityRef::Player(player), EntityRef::Territory(territory)],
            Self::AllianceCreated { alliance, .. }
            | Self::AllianceJoined { alliance, .. }
            | Self::AllianceLeft { alliance, .. } => vec![EntityRef::Alliance(alliance)],
        }
    }
}

/// Apply any [`Command`].
pub fn execute(
    world: &mut WorldState,
    command: &Command,
    now: DateTime<Utc>,
) -> Result<CommandOutcome, CommandError> {
    match command {
        Command::CreateArmy {
            player_id,
            name,
            location,
            units,
        } => create_army(world, *player_id, name, *location, units, now),
        Command::MoveArmy {
            player_id,
            army_id,
            target,
        } => move_army(world, *player_id, *army_id, *target, now),
        Command::Attack {
            player_id,
            army_id,
            target,
        } => attack(world, *player_id, *army_id, *target, now),
        Command::RecruitUnits {
            player_id,
            army_id,
            unit_type,
            quantity,
        } => recruit_units(world, *player_id, *army_id, *unit_type, *quantity, now),
        Command::DisbandArmy { player_id, army_id } => disband_army(world, *player_id, *army_id),
        Command::BuildStructure {
            player_id,
            territory_id,
            building_type,
            level,
        } => build_structure(world, *player_id, *territory_id, *building_type, *level, now),
        Command::BuildDefense {
            player_id,
            territory_id,
            defense_type,
            level,
        } => build_defense(world, *player_id, *territory_id, *defense_type, *level, now),
        Command::CreateAlliance {
            player_id,
            name,
            tag,
            description,
            is_open,
            required_reputation,
        } => create_alliance(
            world,
            *player_id,
            AllianceCharter {
                name,
                tag,
                description,
                is_open: *is_open,
                required_reputation: *required_reputation,
            },
            now,
        ),
        Command::JoinAlliance {
            player_id,
            alliance_id,
        } => join_alliance(world, *player_id, *alliance_id, now),
        Command::LeaveAlliance { player_id } => leave_alliance(world, *player_id, now),
    }
}

// ---------------------------------------------------------------------------
// Players
// ---------------------------------------------------------------------------

/// Register a new online player holding `starting` balances.
pub fn join_player(
    world: &mut WorldState,
    username: &str,
    starting: Resources,
    now: DateTime<Utc>,
) -> Result<PlayerId, CommandError> {
    let username = username.trim();
    if username.is_empty() {
        return Err(CommandError::EmptyName);
    }
    let mut player = Player::new(username, now);
    player.resources = starting;
    player.is_online = true;
    let player_id = player.id;
    world.upsert_player(player);
    info!(player_id = %player_id, username, "Player joined");
    Ok(player_id)
}

// ---------------------------------------------------------------------------
// Armies
// ---------------------------------------------------------------------------

/// Raise a new idle army on a territory the player owns, paying for the
/// initial units.
pub fn create_army(
    world: &mut WorldState,
    player_id: PlayerId,
    name: &str,
    location: TerritoryId,
    orders: &[UnitOrder],
    now: DateTime<Utc>,
) -> Result<CommandOutcome, CommandError> {
    let player = require_player(world, player_id)?;
    owned_territory(world, player_id, location)?;
    let name = name.trim();
    if name.is_empty() {
        return Err(CommandError::EmptyName);
    }
    if orders.is_empty() {
        return Err(CommandError::NoUnits);
    }
    if let Some(order) = orders.iter().find(|order| order.quantity == 0) {
        return Err(CommandError::InvalidQuantity {
            unit_type: order.unit_type,
        });
    }

    let prices: Vec<ResourceBonus> = orders
        .iter()
        .map(|order| recruit_cost(order.unit_type, order.quantity))
        .collect();
    let cost = total_cost(&prices).ok_or(CommandError::CostOverflow)?;
    let payer = charged(player, &cost, now)?;

    let army = Army {
        id: ArmyId::new(),
        name: name.to_owned(),
        owner_id: player_id,
        units: orders
            .iter()
            .map(|order| unit_profile(order.unit_type).muster(order.unit_type, order.quantity, now))
            .collect(),
        location,
        status: ArmyStatus::Idle,
        morale: STARTING_MORALE,
        experience: 0,
        created_at: now,
        updated_at: now,
    };
    let army_id = army.id;

    world.upsert_army(army)?;
    world.upsert_player(payer);
    info!(player_id = %player_id, army_id = %army_id, territory = %location, "Army created");
    Ok(CommandOutcome::ArmyCreated {
        player: player_id,
        army: army_id,
    })
}

/// Move an army to an adjacent territory. The army is `moving` until the
/// next tick.
pub fn move_army(
    world: &mut WorldState,
    player_id: PlayerId,
    army_id: ArmyId,
    target: TerritoryId,
    now: DateTime<Utc>,
) -> Result<CommandOutcome, CommandError> {
    require_player(world, player_id)?;
    let army = owned_army(world, player_id, army_id)?;
    if army.status == ArmyStatus::Attacking {
        return Err(CommandError::ArmyEngaged(army_id));
    }
    let from = army.location;
    require_adjacent(world, from, target)?;

    let mut army = army.clone();
    army.location = target;
    army.status = ArmyStatus::Moving;
    army.touch(now);
    world.upsert_army(army)?;
    debug!(army_id = %army_id, from = %from, to = %target, "Army moving");
    Ok(CommandOutcome::ArmyMoved {
        army: army_id,
        from,
        to: target,
    })
}

/// Declare a battle against an adjacent territory the player does not own.
///
/// The battle starts in `preparing` with copies of both armies. The
/// defender is the owner's strongest army on the target, or an empty
/// garrison when there is none.
pub fn attack(
    world: &mut WorldState,
    player_id: PlayerId,
    army_id: ArmyId,
    target: TerritoryId,
    now: DateTime<Utc>,
) -> Result<CommandOutcome, CommandError> {
    require_player(world, player_id)?;
    let army = owned_army(world, player_id, army_id)?;
    if army.status == ArmyStatus::Attacking {
        return Err(CommandError::ArmyEngaged(army_id));
    }
    if army.is_dissolved() {
        return Err(CommandError::EmptyArmy(army_id));
    }
    let territory = require_adjacent(world, army.location, target)?;
    if territory.owner_id == Some(player_id) {
        return Err(CommandError::OwnTerritory(target));
    }
    if territory
        .owner_id
        .is_some_and(|owner| world.are_allied(player_id, owner))
    {
        return Err(CommandError::AlliedTerritory(target));
    }
    if territory.status == TerritoryStatus::Protected {
        return Err(CommandError::TerritoryProtected(target));
    }

    let defender = BattleSide::from_owner(territory.owner_id);
    let defender_army = defending_army(world, territory, now);

    let mut attacker_army = army.clone();
    attacker_army.status = ArmyStatus::Attacking;
    attacker_army.touch(now);
    let battle = declare(&attacker_army, &defender_army, defender, target, now);
    let battle_id = battle.id;

    let mut territory = territory.clone();
    territory.status = TerritoryStatus::UnderAttack;
    territory.touch(now);

    world.upsert_battle(battle)?;
    world.upsert_army(attacker_army)?;
    world.upsert_territory(territory.clone());
    if let BattleSide::Player(owner) = defender {
        world.push_notification(Notification::new(
            owner,
            NotificationType::AttackIncoming,
            "Attack incoming",
            format!("{} is under attack", territory.name),
            now,
        ));
    }

    info!(
        battle_id = %battle_id,
        attacker = %player_id,
        defender = %defender,
        territory = %target,
        "Battle declared"
    );
    Ok(CommandOutcome::BattleDeclared {
        battle: battle_id,
        army: army_id,
        territory: target,
    })
}

/// Pay for and append a new stack of units to an army that is not
/// attacking.
pub fn recruit_units(
    world: &mut WorldState,
    player_id: PlayerId,
    army_id: ArmyId,
    unit_type: UnitType,
    quantity: u32,
    now: DateTime<Utc>,
) -> Result<CommandOutcome, CommandError> {
    let player = require_player(world, player_id)?;
    let army = owned_army(world, player_id, army_id)?;
    if army.status == ArmyStatus::Attacking {
        return Err(CommandError::ArmyEngaged(army_id));
    }
    if quantity == 0 {
        return Err(CommandError::InvalidQuantity { unit_type });
    }

    let payer = charged(player, &recruit_cost(unit_type, quantity), now)?;
    let mut army = army.clone();
    army.units
        .push(unit_profile(unit_type).muster(unit_type, quantity, now));
    army.touch(now);

    world.upsert_army(army)?;
    world.upsert_player(payer);
    debug!(army_id = %army_id, ?unit_type, quantity, "Units recruited");
    Ok(CommandOutcome::UnitsRecruited {
        player: player_id,
        army: army_id,
    })
}

/// Remove an army that is not committed to a battle.
pub fn disband_army(
    world: &mut WorldState,
    player_id: PlayerId,
    army_id: ArmyId,
) -> Result<CommandOutcome, CommandError> {
    require_player(world, player_id)?;
    let army = owned_army(world, player_id, army_id)?;
    if army.status == ArmyStatus::Attacking {
        return Err(CommandError::ArmyEngaged(army_id));
    }
    world.remove_army(army_id);
    info!(army_id = %army_id, "Army disbanded");
    Ok(CommandOutcome::ArmyDisbanded { army: army_id })
}

// ---------------------------------------------------------------------------
// Alliances
// ---------------------------------------------------------------------------

/// Terms of a new alliance.
#[derive(Debug, Clone, Copy)]
pub struct AllianceCharter<'a> {
    /// Display name.
    pub name: &'a str,
    /// Short tag, unique across alliances ignoring case.
    pub tag: &'a str,
    /// Free-form description.
    pub description: &'a str,
    /// Whether anyone may join.
    pub is_open: bool,
    /// Minimum reputation to join.
    pub required_reputation: i64,
}

/// Found an alliance with the acting player as leader.
pub fn create_alliance(
    world: &mut WorldState,
    player_id: PlayerId,
    charter: AllianceCharter<'_>,
    now: DateTime<Utc>,
) -> Result<CommandOutcome, CommandError> {
    require_player(world, player_id)?;
    require_unaligned(world, player_id)?;
    let name = charter.name.trim();
    let tag = charter.tag.trim();
    if name.is_empty() || tag.is_empty() {
        return Err(CommandError::EmptyName);
    }
    if world.alliances().any(|a| a.tag.eq_ignore_ascii_case(tag)) {
        return Err(CommandError::TagTaken(tag.to_string()));
    }

    let mut alliance = Alliance::found(name, tag, player_id, now);
    alliance.description = charter.description.to_string();
    alliance.is_open = charter.is_open;
    alliance.required_reputation = charter.required_reputation;
    let alliance_id = alliance.id;
    world.upsert_alliance(alliance, now);
    info!(player_id = %player_id, alliance_id = %alliance_id, tag, "Alliance founded");
    Ok(CommandOutcome::AllianceCreated {
        player: player_id,
        alliance: alliance_id,
    })
}

/// Join an open alliance whose reputation requirement the player meets.
pub fn join_alliance(
    world: &mut WorldState,
    player_id: PlayerId,
    alliance_id: AllianceId,
    now: DateTime<Utc>,
) -> Result<CommandOutcome, CommandError> {
    let reputation = require_player(world, player_id)?.reputation;
    require_unaligned(world, player_id)?;
    let alliance = world
        .alliance(alliance_id)
        .ok_or(CommandError::AllianceNotFound(alliance_id))?;
    if !alliance.is_open {
        return Err(CommandError::AllianceClosed(alliance_id));
    }
    if reputation < alliance.required_reputation {
        return Err(CommandError::InsufficientReputation {
            required: alliance.required_reputation,
            actual: reputation,
        });
    }

    let mut alliance = alliance.clone();
    alliance.admit(player_id, now);
    alliance.touch(now);
    world.upsert_alliance(alliance, now);
    debug!(player_id = %player_id, alliance_id = %alliance_id, "Alliance joined");
    Ok(CommandOutcome::AllianceJoined {
        player: player_id,
        alliance: alliance_id,
    })
}

/// Leave the player's alliance. Leadership passes on; the last member
/// leaving disbands it.
pub fn leave_alliance(
    world: &mut WorldState,
    player_id: PlayerId,
    now: DateTime<Utc>,
) -> Result<CommandOutcome, CommandError> {
    require_player(world, player_id)?;
    let alliance_id = world
        .leave_alliance(player_id, now)
        .ok_or(CommandError::NotInAlliance(player_id))?;
    debug!(player_id = %player_id, alliance_id = %alliance_id, "Alliance left");
    Ok(CommandOutcome::AllianceLeft {
        player: player_id,
        alliance: alliance_id,
    })
}

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

/// Pay for and add an inactive building to an owned territory.
pub fn build_structure(
    world: &mut WorldState,
    player_id: PlayerId,
    territory_id: TerritoryId,
    building_type: BuildingType,
    level: u32,
    now: DateTime<Utc>,
) -> Result<CommandOutcome, CommandError> {
    let player = require_player(world, player_id)?;
    let territory = owned_territory(world, player_id, territory_id)?;
    if level == 0 {
        return Err(CommandError::InvalidLevel);
    }
    let payer = charged(player, &building_cost(building_type, level), now)?;

    let building = Building {
        id: BuildingId::new(),
        building_type,
        level,
        territory_id,
        production_bonus: ResourceBonus::new(),
        is_active: false,
        upgrade_progress: None,
        created_at: now,
        updated_at: now,
    };
    let building_id = building.id;
    let mut territory = territory.clone();
    territory.buildings.push(building);
    territory.touch(now);

    world.upsert_territory(territory);
    world.upsert_player(payer);
    info!(territory = %territory_id, ?building_type, level, "Structure built");
    Ok(CommandOutcome::StructureBuilt {
        player: player_id,
        territory: territory_id,
        building: building_id,
    })
}

/// Pay for and add a defense to an owned territory.
///
/// Stats scale with level: health `100 * level`, damage `10 * level`,
/// range 1.
pub fn build_defense(
    world: &mut WorldState,
    player_id: PlayerId,
    territory_id: TerritoryId,
    defense_type: DefenseType,
    level: u32,
    now: DateTime<Utc>,
) -> Result<CommandOutcome, CommandError> {
    let player = require_player(world, player_id)?;
    let territory = owned_territory(world, player_id, territory_id)?;
    if level == 0 {
        return Err(CommandError::InvalidLevel);
    }
    let payer = charged(player, &defense_cost(defense_type, level), now)?;

    let defense = Defense {
        id: DefenseId::new(),
        defense_type,
        level,
        territory_id,
        health: level.saturating_mul(100),
        damage: level.saturating_mul(10),
        range: 1,
        created_at: now,
        updated_at: now,
    };
    let defense_id = defense.id;
    let mut territory = territory.clone();
    territory.defenses.push(defense);
    territory.touch(now);

    world.upsert_territory(territory);
    world.upsert_player(payer);
    info!(territory = %territory_id, ?defense_type, level, "Defense built");
    Ok(CommandOutcome::DefenseBuilt {
        player: player_id,
        territory: territory_id,
        defense: defense_id,
    })
}

// ---------------------------------------------------------------------------
// Validation helpers
// ---------------------------------------------------------------------------

fn require_player(world: &WorldState, id: PlayerId) -> Result<&Player, CommandError> {
    world.player(id).ok_or(CommandError::PlayerNotFound(id))
}

fn require_unaligned(world: &WorldState, player: PlayerId) -> Result<(), CommandError> {
    world.alliance_of(player).map_or(Ok(()), |alliance| {
        Err(CommandError::AlreadyInAlliance {
            player,
            alliance: alliance.id,
        })
    })
}

fn owned_army(world: &WorldState, player: PlayerId, army: ArmyId) -> Result<&Army, CommandError> {
    let found = world.army(army).ok_or(CommandError::ArmyNotFound(army))?;
    if found.owner_id != player {
        return Err(CommandError::NotArmyOwner { player, army });
    }
    Ok(found)
}

fn owned_territory(
    world: &WorldState,
    player: PlayerId,
    territory: TerritoryId,
) -> Result<&Territory, CommandError> {
    let found = world
        .territory(territory)
        .ok_or(CommandError::TerritoryNotFound(territory))?;
    if found.owner_id != Some(player) {
        return Err(CommandError::NotTerritoryOwner { player, territory });
    }
    Ok(found)
}

/// Look up `to` and check that it borders `from`.
fn require_adjacent(
    world: &WorldState,
    from: TerritoryId,
    to: TerritoryId,
) -> Result<&Territory, CommandError> {
    let target = world
        .territory(to)
        .ok_or(CommandError::TerritoryNotFound(to))?;
    let origin = world
        .territory(from)
        .ok_or(CommandError::TerritoryNotFound(from))?;
    if from == to || !origin.is_adjacent_to(to) {
        return Err(CommandError::NotAdjacent { from, to });
    }
    Ok(target)
}

/// A copy of `player` with `cost` deducted.
fn charged(player: &Player, cost: &ResourceBonus, now: DateTime<Utc>) -> Result<Player, CommandError> {
    let mut payer = player.clone();
    deduct(&mut payer.resources, cost)?;
    payer.touch(now);
    Ok(payer)
}

fn defending_army(world: &WorldState, territory: &Territory, now: DateTime<Utc>) -> Army {
    territory
        .owner_id
        .and_then(|owner| {
            world
                .armies_in_territory(territory.id)
                .into_iter()
                .filter(|army| army.owner_id == owner)
                .max_by_key(|army| army_power(&army.units))
                .cloned()
        })
        .unwrap_or_else(|| garrison(territory, now))
}

/// Placeholder defender for a territory nobody is holding.
fn garrison(territory: &Territory, now: DateTime<Utc>) -> Army {
    Army {
        id: ArmyId::new(),
        name: format!("{} garrison", territory.name),
        owner_id: territory
            .owner_id
            .unwrap_or_else(|| PlayerId::from(uuid::Uuid::nil())),
        units: Vec::new(),
        location: territory.id,
        status: ArmyStatus::Defending,
        morale: STARTING_MORALE,
        experience: 0,
        created_at: now,
        updated_at: now,
    }
}
