//! Unit catalogue and construction costs.
//!
//! | Unit | Attack | Defense | Speed | Cost per unit |
//! |------|--------|---------|-------|---------------|
//! | infantry | 10 | 10 | 5 | 10 gold, 5 food |
//! | tank | 40 | 30 | 4 | 50 gold, 20 steel, 10 oil |
//! | artillery | 35 | 10 | 3 | 40 gold, 15 steel |
//! | helicopter | 30 | 15 | 8 | 60 gold, 10 steel, 15 oil |
//! | fighter | 45 | 20 | 10 | 80 gold, 20 steel, 20 oil |
//! | bomber | 60 | 10 | 7 | 100 gold, 25 steel, 25 oil |
//! | submarine | 40 | 25 | 6 | 90 gold, 40 steel, 10 oil |
//! | destroyer | 45 | 40 | 6 | 110 gold, 50 steel, 15 oil |
//! | carrier | 20 | 60 | 4 | 200 gold, 100 steel, 30 oil |
//! | missile | 70 | 5 | 12 | 120 gold, 10 steel, 5 rare earth |
//! | nuke | 500 | 0 | 12 | 1000 gold, 50 uranium, 20 rare earth |
//!
//! Buildings and defenses cost their base price multiplied by the level.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use geowar_types::{
    BuildingType, DefenseType, ResourceBonus, ResourceKind, Resources, Unit, UnitId, UnitType,
};

use ResourceKind::{Electricity, Food, Gold, Oil, RareEarth, Steel, Uranium};

/// Health of a freshly recruited stack.
pub const FULL_HEALTH: u32 = 100;

/// Combat stats, upkeep and price of one unit of a given type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitProfile {
    /// Attack per unit.
    pub attack: u32,
    /// Defense per unit.
    pub defense: u32,
    /// Movement speed.
    pub speed: u32,
    upkeep: &'static [(ResourceKind, i64)],
    cost: &'static [(ResourceKind, i64)],
}

impl UnitProfile {
    /// Per-unit upkeep.
    pub fn upkeep(&self) -> Resources {
        self.upkeep
            .iter()
            .map(|(kind, amount)| (*kind, Decimal::from(*amount)))
            .collect()
    }

    /// Price of one unit.
    pub fn cost(&self) -> ResourceBonus {
        priced(self.cost, 1)
    }

    /// A new full-health stack of `quantity` units.
    pub fn muster(&self, unit_type: UnitType, quantity: u32, now: DateTime<Utc>) -> Unit {
        Unit {
            id: UnitId::new(),
            unit_type,
            quantity,
            health: FULL_HEALTH,
            attack: self.attack,
            defense: self.defense,
            speed: self.speed,
            upkeep_cost: self.upkeep(),
            created_at: now,
            updated_at: now,
        }
    }
}

const fn profile(
    attack: u32,
    defense: u32,
    speed: u32,
    upkeep: &'static [(ResourceKind, i64)],
    cost: &'static [(ResourceKind, i64)],
) -> UnitProfile {
    UnitProfile {
        attack,
        defense,
        speed,
        upkeep,
        cost,
    }
}

const INFANTRY: UnitProfile = profile(10, 10, 5, &[(Gold, 1), (Food, 1)], &[(Gold, 10), (Food, 5)]);
const TANK: UnitProfile = profile(
    40,
    30,
    4,
    &[(Gold, 3), (Oil, 2)],
    &[(Gold, 50), (Steel, 20), (Oil, 10)],
);
const ARTILLERY: UnitProfile =
    profile(35, 10, 3, &[(Gold, 2), (Steel, 1)], &[(Gold, 40), (Steel, 15)]);
const HELICOPTER: UnitProfile = profile(
    30,
    15,
    8,
    &[(Gold, 3), (Oil, 3)],
    &[(Gold, 60), (Steel, 10), (Oil, 15)],
);
const FIGHTER: UnitProfile = profile(
    45,
    20,
    10,
    &[(Gold, 4), (Oil, 4)],
    &[(Gold, 80), (Steel, 20), (Oil, 20)],
);
const BOMBER: UnitProfile = profile(
    60,
    10,
    7,
    &[(Gold, 5), (Oil, 5)],
    &[(Gold, 100), (Steel, 25), (Oil, 25)],
);
const SUBMARINE: UnitProfile = profile(
    40,
    25,
    6,
    &[(Gold, 4), (Oil, 3)],
    &[(Gold, 90), (Steel, 40), (Oil, 10)],
);
const DESTROYER: UnitProfile = profile(
    45,
    40,
    6,
    &[(Gold, 5), (Oil, 4)],
    &[(Gold, 110), (Steel, 50), (Oil, 15)],
);
const CARRIER: UnitProfile = profile(
    20,
    60,
    4,
    &[(Gold, 10), (Oil, 8), (Electricity, 2)],
    &[(Gold, 200), (Steel, 100), (Oil, 30)],
);
const MISSILE: UnitProfile = profile(
    70,
    5,
    12,
    &[(Gold, 2), (Electricity, 1)],
    &[(Gold, 120), (Steel, 10), (RareEarth, 5)],
);
const NUKE: UnitProfile = profile(
    500,
    0,
    12,
    &[(Gold, 20), (Uranium, 1), (Electricity, 5)],
    &[(Gold, 1000), (Uranium, 50), (RareEarth, 20)],
);

/// Catalogue entry for `unit_type`.
pub const fn unit_profile(unit_type: UnitType) -> &'static UnitProfile {
    match unit_type {
        UnitType::Infantry => &INFANTRY,
        UnitType::Tank => &TANK,
        UnitType::Artillery => &ARTILLERY,
        UnitType::Helicopter => &HELICOPTER,
        UnitType::Fighter => &FIGHTER,
        UnitType::Bomber => &BOMBER,
        UnitType::Submarine => &SUBMARINE,
        UnitType::Destroyer => &DESTROYER,
        UnitType::Carrier => &CARRIER,
        UnitType::Missile => &MISSILE,
        UnitType::Nuke => &NUKE,
    }
}

/// Price of `quantity` units of `unit_type`.
pub fn recruit_cost(unit_type: UnitType, quantity: u32) -> ResourceBonus {
    priced(unit_profile(unit_type).cost, i64::from(quantity))
}

/// Price of a building of `building_type` at `level`.
pub fn building_cost(building_type: BuildingType, level: u32) -> ResourceBonus {
    let base: &[(ResourceKind, i64)] = match building_type {
        BuildingType::Headquarters => &[(Gold, 500), (Steel, 100)],
        BuildingType::Barracks => &[(Gold, 150), (Steel, 50)],
        BuildingType::Factory => &[(Gold, 250), (Steel, 100), (Electricity, 20)],
        BuildingType::Refinery => &[(Gold, 250), (Steel, 80)],
        BuildingType::Farm => &[(Gold, 100), (Food, 20)],
        BuildingType::Mine => &[(Gold, 200), (Steel, 40)],
        BuildingType::PowerPlant => &[(Gold, 300), (Steel, 120), (Uranium, 5)],
        BuildingType::ResearchLab => &[(Gold, 400), (RareEarth, 10), (Electricity, 30)],
        BuildingType::Bank => &[(Gold, 600)],
        BuildingType::Port => &[(Gold, 300), (Steel, 150)],
        BuildingType::Airport => &[(Gold, 350), (Steel, 150), (Oil, 50)],
    };
    priced(base, i64::from(level))
}

/// Price of a defense of `defense_type` at `level`.
pub fn defense_cost(defense_type: DefenseType, level: u32) -> ResourceBonus {
    let base: &[(ResourceKind, i64)] = match defense_type {
        DefenseType::Wall => &[(Gold, 100), (Steel, 50)],
        DefenseType::Turret => &[(Gold, 150), (Steel, 75)],
        DefenseType::AntiAir => &[(Gold, 200), (Steel, 80), (Electricity, 10)],
        DefenseType::MissileDefense => &[(Gold, 400), (Steel, 100), (RareEarth, 15)],
        DefenseType::Bunker => &[(Gold, 180), (Steel, 120)],
        DefenseType::Radar => &[(Gold, 120), (Electricity, 25)],
    };
    priced(base, i64::from(level))
}

/// Total price of several purchases. `None` on overflow.
pub fn total_cost<'a>(costs: impl IntoIterator<Item = &'a ResourceBonus>) -> Option<ResourceBonus> {
    let mut total = ResourceBonus::new();
    for cost in costs {
        for (kind, amount) in cost.iter() {
            total.set(kind, total.get(kind).checked_add(amount)?);
        }
    }
    Some(total)
}

fn priced(base: &[(ResourceKind, i64)], multiplier: i64) -> ResourceBonus {
    base.iter()
        .map(|(kind, amount)| {
            (
                *kind,
                Decimal::from(*amount).saturating_mul(Decimal::from(multiplier)),
            )
        })
        .collect()
}
