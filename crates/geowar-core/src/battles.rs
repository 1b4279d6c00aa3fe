//! Writing a resolved battle back into the world.
//!
//! The resolver only ever sees the snapshot copies held on the battle.
//! [`settle`] is the single place where its output reaches the live armies
//! and territory. Losses are counted per unit type and taken from the live
//! rosters, so units recruited after the battle was declared survive it.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::{debug, info};

use geowar_combat::{BattleLifecycle, CombatError};
use geowar_types::{
    Army, ArmyId, ArmyStatus, Battle, BattleId, BattleSide, Entity, Notification,
    NotificationType, PlayerId, UnitType, Winner,
};
use geowar_world::{ArmyUpsert, WorldError, WorldState};

/// Errors raised while settling one battle.
#[derive(Debug, thiserror::Error)]
pub enum SettlementError {
    /// The battle is not in a state that can be resolved.
    #[error("combat error: {source}")]
    Combat {
        /// The state machine failure.
        #[from]
        source: CombatError,
    },

    /// The store refused a write or a referenced entity is gone.
    #[error("world error: {source}")]
    World {
        /// The store failure.
        #[from]
        source: WorldError,
    },
}

/// Rewards applied by [`settle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettlementRules {
    /// Experience granted to the winning player and army.
    pub victory_experience: u64,
}

impl Default for SettlementRules {
    fn default() -> Self {
        Self {
            victory_experience: 100,
        }
    }
}

/// What [`settle`] changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementReport {
    /// The battle.
    pub battle_id: BattleId,
    /// Who won.
    pub winner: Winner,
    /// Whether the territory changed hands.
    pub territory_conquered: bool,
    /// Armies removed because no units survived.
    pub dissolved_armies: Vec<ArmyId>,
}

/// Resolve an in-progress battle and commit the outcome.
///
/// - per-type losses are taken from the live armies, which return to
///   `idle`; armies left without units are removed,
/// - a defending army that has left the territory is not touched,
/// - an attacker win transfers the territory and moves the attacking army
///   onto it; otherwise the territory's status is restored,
/// - the winner gains experience,
/// - `battle_result` notifications go to both players, plus
///   `territory_gained`/`territory_lost` on conquest.
///
/// The store is not touched when an error is returned.
pub fn settle(
    world: &mut WorldState,
    battle_id: BattleId,
    now: DateTime<Utc>,
    rules: SettlementRules,
) -> Result<SettlementReport, SettlementError> {
    let mut battle = world
        .battle(battle_id)
        .cloned()
        .ok_or(WorldError::BattleNotFound(battle_id))?;
    let territory = world
        .territory(battle.territory_id)
        .cloned()
        .ok_or(WorldError::TerritoryNotFound(battle.territory_id))?;

    let outcome = battle.fight()?;
    battle.conclude(&outcome, now)?;

    let attacker_army = world.army(battle.attacker_army.id).cloned();
    let defender_army = world
        .army(battle.defender_army.id)
        .filter(|army| army.location == battle.territory_id)
        .cloned();
    if defender_army.is_none() && world.army(battle.defender_army.id).is_some() {
        debug!(
            battle_id = %battle_id,
            army_id = %battle.defender_army.id,
            "Defender left the territory before the battle was settled"
        );
    }
    let conquered = outcome.territory_conquered() && attacker_army.is_some();
    let previous_owner = territory.owner_id;

    let mut dissolved_armies = Vec::new();
    if let Some(army) = attacker_army {
        let location = if conquered { territory.id } else { army.location };
        let gain = if outcome.winner == Winner::Attacker {
            rules.victory_experience
        } else {
            0
        };
        let army = returned(army, &outcome.attacker_losses, location, gain, now);
        if world.upsert_army(army)? == ArmyUpsert::Dissolved {
            dissolved_armies.push(battle.attacker_army.id);
        }
    }
    if let Some(army) = defender_army {
        let location = army.location;
        let gain = if outcome.winner == Winner::Defender {
            rules.victory_experience
        } else {
            0
        };
        let army = returned(army, &outcome.defender_losses, location, gain, now);
        if world.upsert_army(army)? == ArmyUpsert::Dissolved {
            dissolved_armies.push(battle.defender_army.id);
        }
    }

    let owner = if conquered {
        Some(battle.attacker_id)
    } else {
        previous_owner
    };
    world.set_territory_owner(territory.id, owner, now)?;

    let winning_player = match outcome.winner {
        Winner::Attacker => Some(battle.attacker_id),
        Winner::Defender => battle.defender_id.player(),
        Winner::Draw => None,
    };
    if let Some(mut player) = winning_player.and_then(|id| world.player(id).cloned()) {
        player.add_experience(rules.victory_experience);
        player.touch(now);
        world.upsert_player(player);
    }

    notify(world, &battle, &territory.name, conquered, previous_owner, now);
    world.upsert_battle(battle)?;

    info!(
        battle_id = %battle_id,
        winner = ?outcome.winner,
        conquered,
        dissolved = dissolved_armies.len(),
        "Battle settled"
    );
    Ok(SettlementReport {
        battle_id,
        winner: outcome.winner,
        territory_conquered: conquered,
        dissolved_armies,
    })
}

/// The live army after the battle: losses taken, idle, at `location`.
fn returned(
    mut army: Army,
    losses: &BTreeMap<UnitType, u32>,
    location: geowar_types::TerritoryId,
    experience: u64,
    now: DateTime<Utc>,
) -> Army {
    take_losses(&mut army, losses);
    army.location = location;
    army.status = ArmyStatus::Idle;
    army.experience = army.experience.saturating_add(experience);
    army.touch(now);
    army
}

/// Remove `losses` from the roster, earliest stacks of each type first.
fn take_losses(army: &mut Army, losses: &BTreeMap<UnitType, u32>) {
    let mut owed = losses.clone();
    for unit in &mut army.units {
        if let Some(left) = owed.get_mut(&unit.unit_type) {
            let taken = (*left).min(unit.quantity);
            unit.quantity = unit.quantity.saturating_sub(taken);
            *left = left.saturating_sub(taken);
        }
    }
    army.prune_empty_units();
}

fn notify(
    world: &mut WorldState,
    battle: &Battle,
    territory_name: &str,
    conquered: bool,
    previous_owner: Option<PlayerId>,
    now: DateTime<Utc>,
) {
    let winner = battle.result.as_ref().map_or(Winner::Draw, |r| r.winner);
    let data = json!({ "battleId": battle.id, "winner": winner });

    let mut participants = vec![battle.attacker_id];
    if let BattleSide::Player(defender) = battle.defender_id {
        participants.push(defender);
    }
    for player in participants {
        world.push_notification(
            Notification::new(
                player,
                NotificationType::BattleResult,
                "Battle finished",
                format!("The battle for {territory_name} ended: {winner:?}"),
                now,
            )
            .with_data(data.clone()),
        );
    }

    if conquered {
        world.push_notification(Notification::new(
            battle.attacker_id,
            NotificationType::TerritoryGained,
            "Territory conquered",
            format!("You now control {territory_name}"),
            now,
        ));
        if let Some(loser) = previous_owner {
            world.push_notification(Notification::new(
                loser,
                NotificationType::TerritoryLost,
                "Territory lost",
                format!("{territory_name} has fallen"),
                now,
            ));
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use geowar_types::{BattleStatus, Player, TerritoryStatus, UnitOrder, UnitType};
    use geowar_world::create_starting_world;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::commands::{attack, create_army, move_army, recruit_units};

    fn begin(world: &mut WorldState, id: BattleId) {
        let mut battle = world.battle(id).cloned().unwrap();
        battle.begin(Utc::now()).unwrap();
        world.upsert_battle(battle).unwrap();
    }

    fn player(world: &mut WorldState, name: &str) -> PlayerId {
        let mut player = Player::new(name, Utc::now());
        player.resources.gold = dec!(100000);
        player.resources.food = dec!(100000);
        let id = player.id;
        world.upsert_player(player);
        id
    }

    fn army(world: &mut WorldState, owner: PlayerId, at: geowar_types::TerritoryId, n: u32) -> ArmyId {
        let orders = [UnitOrder {
            unit_type: UnitType::Infantry,
            quantity: n,
        }];
        create_army(world, owner, "Host", at, &orders, Utc::now())
            .unwrap()
            .created_army()
            .unwrap()
    }

    fn declare(world: &mut WorldState, owner: PlayerId, army: ArmyId, target: geowar_types::TerritoryId) -> BattleId {
        attack(world, owner, army, target, Utc::now())
            .unwrap()
            .declared_battle()
            .unwrap()
    }

    #[test]
    fn conquest_of_neutral_territory() {
        let (mut world, ids) = create_starting_world();
        let now = Utc::now();
        let ada = player(&mut world, "ada");
        world.set_territory_owner(ids.france, Some(ada), now).unwrap();
        let army_id = army(&mut world, ada, ids.france, 10);
        let battle_id = declare(&mut world, ada, army_id, ids.germany);
        world.drain_notifications();

        assert!(settle(&mut world, battle_id, now, SettlementRules::default()).is_err());
        begin(&mut world, battle_id);
        let report = settle(&mut world, battle_id, now, SettlementRules::default()).unwrap();

        assert_eq!(report.winner, Winner::Attacker);
        assert!(report.territory_conquered);
        let germany = world.territory(ids.germany).unwrap();
        assert_eq!(germany.owner_id, Some(ada));
        assert_eq!(germany.status, TerritoryStatus::Owned);
        let army = world.army(army_id).unwrap();
        assert_eq!(army.location, ids.germany);
        assert_eq!(army.status, ArmyStatus::Idle);
        assert_eq!(army.total_quantity(), 10);
        assert_eq!(army.experience, 100);
        assert_eq!(world.player(ada).unwrap().experience, 100);
        assert_eq!(world.battle(battle_id).unwrap().status, BattleStatus::Finished);

        let kinds: Vec<NotificationType> = world
            .drain_notifications()
            .into_iter()
            .map(|n| n.notification_type)
            .collect();
        assert_eq!(
            kinds,
            vec![NotificationType::BattleResult, NotificationType::TerritoryGained]
        );
    }

    #[test]
    fn failed_attack_keeps_owner_and_applies_losses() {
        let (mut world, ids) = create_starting_world();
        let now = Utc::now();
        let ada = player(&mut world, "ada");
        let bob = player(&mut world, "bob");
        world.set_territory_owner(ids.france, Some(ada), now).unwrap();
        world.set_territory_owner(ids.germany, Some(bob), now).unwrap();
        let attacker = army(&mut world, ada, ids.france, 10);
        let defender = army(&mut world, bob, ids.germany, 40);

        let battle_id = declare(&mut world, ada, attacker, ids.germany);
        begin(&mut world, battle_id);
        let report = settle(&mut world, battle_id, now, SettlementRules::default()).unwrap();

        assert_eq!(report.winner, Winner::Defender);
        assert!(!report.territory_conquered);
        let germany = world.territory(ids.germany).unwrap();
        assert_eq!(germany.owner_id, Some(bob));
        assert_eq!(germany.status, TerritoryStatus::Owned);

        // attacker loses 8 of 10, defender loses 8 of 40
        assert_eq!(world.army(attacker).unwrap().total_quantity(), 2);
        assert_eq!(world.army(attacker).unwrap().location, ids.france);
        assert_eq!(world.army(defender).unwrap().total_quantity(), 32);
        assert_eq!(world.player(bob).unwrap().experience, 100);
        assert_eq!(world.player(ada).unwrap().experience, 0);

        let lost = world
            .drain_notifications()
            .iter()
            .filter(|n| n.notification_type == NotificationType::TerritoryLost)
            .count();
        assert_eq!(lost, 0);
    }

    #[test]
    fn defender_reinforcements_survive_settlement() {
        let (mut world, ids) = create_starting_world();
        let now = Utc::now();
        let ada = player(&mut world, "ada");
        let bob = player(&mut world, "bob");
        world.set_territory_owner(ids.france, Some(ada), now).unwrap();
        world.set_territory_owner(ids.germany, Some(bob), now).unwrap();
        let attacker = army(&mut world, ada, ids.france, 10);
        let defender = army(&mut world, bob, ids.germany, 40);

        let battle_id = declare(&mut world, ada, attacker, ids.germany);
        recruit_units(&mut world, bob, defender, UnitType::Tank, 5, now).unwrap();
        begin(&mut world, battle_id);
        settle(&mut world, battle_id, now, SettlementRules::default()).unwrap();

        let army = world.army(defender).unwrap();
        assert_eq!(army.total_quantity(), 37);
        let tanks: u32 = army
            .units
            .iter()
            .filter(|u| u.unit_type == UnitType::Tank)
            .map(|u| u.quantity)
            .sum();
        assert_eq!(tanks, 5);
    }

    #[test]
    fn defender_that_moved_away_is_untouched() {
        let (mut world, ids) = create_starting_world();
        let now = Utc::now();
        let ada = player(&mut world, "ada");
        let bob = player(&mut world, "bob");
        world.set_territory_owner(ids.france, Some(ada), now).unwrap();
        world.set_territory_owner(ids.germany, Some(bob), now).unwrap();
        let attacker = army(&mut world, ada, ids.france, 10);
        let defender = army(&mut world, bob, ids.germany, 40);

        let battle_id = declare(&mut world, ada, attacker, ids.germany);
        move_army(&mut world, bob, defender, ids.austria, now).unwrap();
        let before = world.army(defender).cloned().unwrap();
        begin(&mut world, battle_id);
        settle(&mut world, battle_id, now, SettlementRules::default()).unwrap();

        assert_eq!(world.army(defender), Some(&before));
        assert_eq!(world.army(attacker).unwrap().total_quantity(), 2);
    }

    #[test]
    fn finished_battle_cannot_settle_twice() {
        let (mut world, ids) = create_starting_world();
        let now = Utc::now();
        let ada = player(&mut world, "ada");
        world.set_territory_owner(ids.france, Some(ada), now).unwrap();
        let army_id = army(&mut world, ada, ids.france, 3);
        let battle_id = declare(&mut world, ada, army_id, ids.spain);
        begin(&mut world, battle_id);
        settle(&mut world, battle_id, now, SettlementRules::default()).unwrap();

        let before = world.clone();
        let again = settle(&mut world, battle_id, now, SettlementRules::default());
        assert!(matches!(again, Err(SettlementError::Combat { .. })));
        assert_eq!(world, before);
    }

    #[test]
    fn unknown_battle_is_an_error() {
        let (mut world, _) = create_starting_world();
        let result = settle(&mut world, BattleId::new(), Utc::now(), SettlementRules::default());
        assert!(matches!(
            result,
            Err(SettlementError::World {
                source: WorldError::BattleNotFound(_)
            })
        ));
    }
}
