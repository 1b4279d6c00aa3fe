//! Tick cycle: the phase loop that advances the GeoWar world.
//!
//! Each tick runs through these phases:
//!
//! 1. **Clock** -- advance the tick counter and derive simulated time.
//! 2. **Production** -- run the ledger for every owned territory, apply
//!    active event modifiers, credit the owner and stock the territory up
//!    to its storage capacity.
//! 3. **Expiry** -- deactivate world events whose duration has elapsed.
//! 4. **Movement** -- armies that moved since the last tick arrive.
//! 5. **Battles** -- in-progress battles are resolved and settled, then
//!    preparing battles begin (and resolve on the next tick).
//!
//! A failure in one territory or one battle is logged and counted; it never
//! stops the remaining entities from being processed. Only a clock failure
//! aborts the tick.

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use geowar_combat::BattleLifecycle;
use geowar_ledger::{LedgerError, apply_event_modifiers, credit, produce, stockpile};
use geowar_types::{
    ArmyId, ArmyStatus, BattleId, BattleStatus, Entity, GameEventId, PlayerId, TerritoryId,
};
use geowar_world::{WorldError, WorldState};

use crate::battles::{SettlementError, SettlementReport, SettlementRules, settle};
use crate::clock::{ClockError, WorldClock};

/// Errors that abort a tick.
#[derive(Debug, thiserror::Error)]
pub enum TickError {
    /// A clock operation failed.
    #[error("clock error: {source}")]
    Clock {
        /// The underlying clock error.
        #[from]
        source: ClockError,
    },
}

/// Summary of a single tick's execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickSummary {
    /// The tick number that was executed.
    pub tick: u64,
    /// Simulated time of the tick.
    pub now: DateTime<Utc>,
    /// Territories whose production was credited.
    pub territories_produced: usize,
    /// Territories whose production failed.
    pub production_failures: usize,
    /// Events that expired this tick.
    pub events_expired: Vec<GameEventId>,
    /// Armies that finished moving.
    pub armies_arrived: usize,
    /// Battles moved from `preparing` to `in_progress`.
    pub battles_started: Vec<BattleId>,
    /// Battles resolved this tick.
    pub battles_settled: Vec<SettlementReport>,
    /// Battles that could not be advanced.
    pub battle_failures: usize,
}

/// Why one territory's production was skipped.
#[derive(Debug, thiserror::Error)]
enum ProductionError {
    #[error("owner {0} not found")]
    OwnerMissing(PlayerId),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Execute one complete tick against `world`.
pub fn run_tick(
    world: &mut WorldState,
    clock: &mut WorldClock,
    rules: SettlementRules,
) -> Result<TickSummary, TickError> {
    // --- Phase 1: Clock ---
    let tick = clock.advance()?;
    let now = clock.now()?;
    info!(tick, %now, "Tick started");

    // --- Phase 2: Production ---
    let (territories_produced, production_failures) = phase_production(world, tick, now);

    // --- Phase 3: Expiry ---
    let events_expired = world.expire_events(now);
    for id in &events_expired {
        debug!(tick, event_id = %id, "Event expired");
    }

    // --- Phase 4: Movement ---
    let armies_arrived = phase_movement(world, tick, now);

    // --- Phase 5: Battles ---
    let (battles_settled, battles_started, battle_failures) = phase_battles(world, tick, now, rules);

    info!(
        tick,
        produced = territories_produced,
        production_failures,
        expired = events_expired.len(),
        settled = battles_settled.len(),
        started = battles_started.len(),
        battle_failures,
        "Tick complete"
    );

    Ok(TickSummary {
        tick,
        now,
        territories_produced,
        production_failures,
        events_expired,
        armies_arrived,
        battles_started,
        battles_settled,
        battle_failures,
    })
}

/// Phase 2: credit each owned territory's production to its owner.
fn phase_production(world: &mut WorldState, tick: u64, now: DateTime<Utc>) -> (usize, usize) {
    let owned: Vec<TerritoryId> = world
        .territories()
        .filter(|t| t.owner_id.is_some())
        .map(|t| t.id)
        .collect();

    let mut produced = 0_usize;
    let mut failures = 0_usize;
    for id in owned {
        match produce_territory(world, id, now) {
            Ok(()) => produced = produced.saturating_add(1),
            Err(err) => {
                failures = failures.saturating_add(1);
                warn!(tick, territory = %id, %err, "Production failed");
            }
        }
    }
    (produced, failures)
}

fn produce_territory(
    world: &mut WorldState,
    id: TerritoryId,
    now: DateTime<Utc>,
) -> Result<(), ProductionError> {
    let Some(mut territory) = world.territory(id).cloned() else {
        return Ok(());
    };
    let Some(owner_id) = territory.owner_id else {
        return Ok(());
    };
    let mut owner = world
        .player(owner_id)
        .cloned()
        .ok_or(ProductionError::OwnerMissing(owner_id))?;

    let events = world.active_events_for(id);
    let delta = apply_event_modifiers(
        produce(&territory),
        events.iter().flat_map(|event| event.effects.iter()),
    );
    credit(&mut owner.resources, &delta)?;
    let resources = &mut territory.resources;
    stockpile(&mut resources.stock, &delta, &resources.storage_capacity)?;

    owner.touch(now);
    territory.resources.production_rates = delta;
    territory.touch(now);
    world.upsert_player(owner);
    world.upsert_territory(territory);
    Ok(())
}

/// Phase 4: armies that were ordered to move are now idle at their target.
fn phase_movement(world: &mut WorldState, tick: u64, now: DateTime<Utc>) -> usize {
    let moving: Vec<ArmyId> = world
        .armies()
        .filter(|army| army.status == ArmyStatus::Moving)
        .map(|army| army.id)
        .collect();

    let mut arrived = 0_usize;
    for id in moving {
        let Some(mut army) = world.army(id).cloned() else {
            continue;
        };
        army.status = ArmyStatus::Idle;
        army.touch(now);
        match world.upsert_army(army) {
            Ok(_) => arrived = arrived.saturating_add(1),
            Err(err) => warn!(tick, army_id = %id, %err, "Army arrival failed"),
        }
    }
    arrived
}

/// Phase 5: settle in-progress battles, then begin preparing ones.
fn phase_battles(
    world: &mut WorldState,
    tick: u64,
    now: DateTime<Utc>,
    rules: SettlementRules,
) -> (Vec<SettlementReport>, Vec<BattleId>, usize) {
    let in_progress: Vec<BattleId> = world
        .battles_with_status(BattleStatus::InProgress)
        .iter()
        .map(|b| b.id)
        .collect();
    let preparing: Vec<BattleId> = world
        .battles_with_status(BattleStatus::Preparing)
        .iter()
        .map(|b| b.id)
        .collect();

    let mut failures = 0_usize;
    let mut settled = Vec::with_capacity(in_progress.len());
    for id in in_progress {
        match settle(world, id, now, rules) {
            Ok(report) => settled.push(report),
            Err(err) => {
                failures = failures.saturating_add(1);
                warn!(tick, battle_id = %id, %err, "Battle settlement failed");
            }
        }
    }

    let mut started = Vec::with_capacity(preparing.len());
    for id in preparing {
        match begin_battle(world, id, now) {
            Ok(()) => {
                debug!(tick, battle_id = %id, "Battle started");
                started.push(id);
            }
            Err(err) => {
                failures = failures.saturating_add(1);
                warn!(tick, battle_id = %id, %err, "Battle could not start");
            }
        }
    }
    (settled, started, failures)
}

fn begin_battle(
    world: &mut WorldState,
    id: BattleId,
    now: DateTime<Utc>,
) -> Result<(), SettlementError> {
    let mut battle = world
        .battle(id)
        .cloned()
        .ok_or(WorldError::BattleNotFound(id))?;
    battle.begin(now)?;
    world.upsert_battle(battle)?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeDelta;
    use geowar_types::{
        EffectTarget, GameEvent, GameEventEffect, GameEventType, Player, ResourceKind,
    };
    use geowar_world::create_starting_world;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use super::*;

    fn clock() -> WorldClock {
        WorldClock::new(DateTime::from_timestamp(1_800_000_000, 0).unwrap(), 3600).unwrap()
    }

    #[test]
    fn production_credits_owner_only() {
        let (mut world, ids) = create_starting_world();
        let mut clock = clock();
        let player = Player::new("ada", clock.now().unwrap());
        let player_id = player.id;
        world.upsert_player(player);
        world
            .set_territory_owner(ids.portugal, Some(player_id), clock.now().unwrap())
            .unwrap();

        let summary = run_tick(&mut world, &mut clock, SettlementRules::default()).unwrap();
        assert_eq!(summary.tick, 1);
        assert_eq!(summary.territories_produced, 1);
        assert_eq!(summary.production_failures, 0);

        // Portugal: gdp 250 -> 2.5 gold, population 10M -> 10000 food
        let resources = world.player(player_id).unwrap().resources;
        assert_eq!(resources.gold, dec!(2.5));
        assert_eq!(resources.food, dec!(10000));
        let portugal = world.territory(ids.portugal).unwrap();
        assert_eq!(portugal.resources.production_rates.gold, dec!(2.5));
        assert!(world.territory(ids.spain).unwrap().resources.production_rates.is_zero());
    }

    #[test]
    fn territory_stock_fills_up_to_capacity() {
        let (mut world, ids) = create_starting_world();
        let mut clock = clock();
        let player = Player::new("ada", clock.now().unwrap());
        let player_id = player.id;
        world.upsert_player(player);
        world
            .set_territory_owner(ids.portugal, Some(player_id), clock.now().unwrap())
            .unwrap();

        for _ in 0..3 {
            run_tick(&mut world, &mut clock, SettlementRules::default()).unwrap();
        }
        let stock = world.territory(ids.portugal).unwrap().resources.stock;
        assert_eq!(stock.gold, dec!(7.5));
        assert_eq!(stock.food, dec!(30000));

        // capacity is population / 100 = 100000 per resource
        for _ in 0..9 {
            run_tick(&mut world, &mut clock, SettlementRules::default()).unwrap();
        }
        let stock = world.territory(ids.portugal).unwrap().resources.stock;
        assert_eq!(stock.food, dec!(100000));
        assert_eq!(stock.gold, dec!(30));
        assert_eq!(world.player(player_id).unwrap().resources.food, dec!(120000));
    }

    #[test]
    fn event_modifiers_scale_production() {
        let (mut world, ids) = create_starting_world();
        let mut clock = clock();
        let now = clock.now().unwrap();
        let player = Player::new("ada", now);
        let player_id = player.id;
        world.upsert_player(player);
        world.set_territory_owner(ids.portugal, Some(player_id), now).unwrap();
        world.upsert_event(GameEvent {
            id: GameEventId::new(),
            event_type: GameEventType::EconomicBoom,
            title: String::from("Boom"),
            description: String::new(),
            affected_territories: vec![ids.portugal],
            duration_hours: 48,
            effects: vec![GameEventEffect {
                target: EffectTarget::Resources,
                modifier: dec!(100),
                resource: Some(ResourceKind::Gold),
            }],
            is_active: true,
            created_at: now,
            updated_at: now,
        });

        run_tick(&mut world, &mut clock, SettlementRules::default()).unwrap();
        let resources = world.player(player_id).unwrap().resources;
        assert_eq!(resources.gold, dec!(5));
        assert_eq!(resources.food, dec!(10000));
    }

    #[test]
    fn missing_owner_is_isolated() {
        let (mut world, ids) = create_starting_world();
        let mut clock = clock();
        let now = clock.now().unwrap();
        let player = Player::new("ada", now);
        let player_id = player.id;
        world.upsert_player(player);
        world.set_territory_owner(ids.spain, Some(player_id), now).unwrap();
        world.set_territory_owner(ids.italy, Some(PlayerId::new()), now).unwrap();

        let summary = run_tick(&mut world, &mut clock, SettlementRules::default()).unwrap();
        assert_eq!(summary.territories_produced, 1);
        assert_eq!(summary.production_failures, 1);
        assert!(world.player(player_id).unwrap().resources.gold > Decimal::ZERO);
    }

    #[test]
    fn events_expire_after_duration() {
        let (mut world, _ids) = create_starting_world();
        let mut clock = clock();
        let now = clock.now().unwrap();
        let id = GameEventId::new();
        world.upsert_event(GameEvent {
            id,
            event_type: GameEventType::Pandemic,
            title: String::from("Flu"),
            description: String::new(),
            affected_territories: Vec::new(),
            duration_hours: 2,
            effects: Vec::new(),
            is_active: true,
            created_at: now,
            updated_at: now,
        });

        // One hour per tick: elapsed must exceed two hours.
        for _ in 0..2 {
            let summary = run_tick(&mut world, &mut clock, SettlementRules::default()).unwrap();
            assert!(summary.events_expired.is_empty());
        }
        let summary = run_tick(&mut world, &mut clock, SettlementRules::default()).unwrap();
        assert_eq!(summary.events_expired, vec![id]);
        assert!(!world.event(id).unwrap().is_active);
        assert_eq!(clock.now().unwrap(), now + TimeDelta::hours(3));
    }

    #[test]
    fn idle_world_ticks_cleanly() {
        let (mut world, _ids) = create_starting_world();
        let mut clock = clock();
        let before = world.clone();
        let summary = run_tick(&mut world, &mut clock, SettlementRules::default()).unwrap();
        assert_eq!(summary.territories_produced, 0);
        assert_eq!(summary.battle_failures, 0);
        assert_eq!(world, before);
    }

    #[test]
    fn clock_overflow_aborts_tick() {
        let (mut world, _ids) = create_starting_world();
        let mut clock =
            WorldClock::from_parts(u64::MAX, DateTime::from_timestamp(0, 0).unwrap(), 1).unwrap();
        let result = run_tick(&mut world, &mut clock, SettlementRules::default());
        assert!(matches!(result, Err(TickError::Clock { .. })));
    }
}
