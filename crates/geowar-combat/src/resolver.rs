//! Atomic combat resolution between two army snapshots.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use geowar_types::{Army, ArmyStatus, Unit, UnitType, Winner};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Power multiplier for a defender whose army status is `defending` (1.5).
pub const DEFENSIVE_BONUS: Decimal = Decimal::from_parts(15, 0, 0, false, 1);

/// Remaining-power ratio a side must exceed to win outright (1.2).
pub const VICTORY_MARGIN: Decimal = Decimal::from_parts(12, 0, 0, false, 1);

/// Full health.
const MAX_HEALTH: u32 = 100;

// ---------------------------------------------------------------------------
// CombatResult
// ---------------------------------------------------------------------------

/// Outcome of [`resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CombatResult {
    /// Which side won.
    pub winner: Winner,
    /// Power of the attacker before losses.
    pub attacker_power: Decimal,
    /// Power of the defender before losses, bonus included.
    pub defender_effective_power: Decimal,
    /// Share of its units the attacker loses (before health scaling).
    pub attacker_loss_ratio: Decimal,
    /// Share of its units the defender loses (before health scaling).
    pub defender_loss_ratio: Decimal,
    /// Attacker losses summed per unit type.
    pub attacker_losses: BTreeMap<UnitType, u32>,
    /// Defender losses summed per unit type.
    pub defender_losses: BTreeMap<UnitType, u32>,
    /// Attacker stacks still standing.
    pub attacker_remaining_units: Vec<Unit>,
    /// Defender stacks still standing.
    pub defender_remaining_units: Vec<Unit>,
}

impl CombatResult {
    /// Whether the attacker takes the territory.
    pub fn territory_conquered(&self) -> bool {
        self.winner == Winner::Attacker
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Sum of `(attack + defense) * quantity` over `units`.
pub fn army_power(units: &[Unit]) -> u64 {
    units
        .iter()
        .map(|unit| {
            u64::from(unit.attack)
                .saturating_add(u64::from(unit.defense))
                .saturating_mul(u64::from(unit.quantity))
        })
        .fold(0_u64, u64::saturating_add)
}

/// Resolve a battle between two army snapshots.
///
/// Deterministic and side-effect free. When both sides have zero power the
/// result is a draw with no losses.
pub fn resolve(attacker: &Army, defender: &Army) -> CombatResult {
    let attacker_power = Decimal::from(army_power(&attacker.units));
    let defender_bonus = if defender.status == ArmyStatus::Defending {
        DEFENSIVE_BONUS
    } else {
        Decimal::ONE
    };
    let defender_effective_power =
        Decimal::from(army_power(&defender.units)).saturating_mul(defender_bonus);

    let total = attacker_power.saturating_add(defender_effective_power);
    let Some(attacker_loss_ratio) = defender_effective_power.checked_div(total) else {
        return stalemate(attacker, defender);
    };
    // Derived by complement so the two ratios always sum to exactly one.
    let defender_loss_ratio = Decimal::ONE.saturating_sub(attacker_loss_ratio);

    let (attacker_losses, attacker_remaining_units) =
        apply_losses(&attacker.units, attacker_loss_ratio);
    let (defender_losses, defender_remaining_units) =
        apply_losses(&defender.units, defender_loss_ratio);

    let winner = decide_winner(
        army_power(&attacker_remaining_units),
        army_power(&defender_remaining_units),
    );

    tracing::debug!(
        attacker_army = %attacker.id,
        defender_army = %defender.id,
        %attacker_power,
        %defender_effective_power,
        ?winner,
        "combat resolved"
    );

    CombatResult {
        winner,
        attacker_power,
        defender_effective_power,
        attacker_loss_ratio,
        defender_loss_ratio,
        attacker_losses,
        defender_losses,
        attacker_remaining_units,
        defender_remaining_units,
    }
}

// ---------------------------------------------------------------------------
// Internal resolution
// ---------------------------------------------------------------------------

fn stalemate(attacker: &Army, defender: &Army) -> CombatResult {
    let standing = |units: &[Unit]| -> Vec<Unit> {
        units.iter().filter(|u| u.quantity > 0).cloned().collect()
    };
    CombatResult {
        winner: Winner::Draw,
        attacker_power: Decimal::ZERO,
        defender_effective_power: Decimal::ZERO,
        attacker_loss_ratio: Decimal::ZERO,
        defender_loss_ratio: Decimal::ZERO,
        attacker_losses: BTreeMap::new(),
        defender_losses: BTreeMap::new(),
        attacker_remaining_units: standing(&attacker.units),
        defender_remaining_units: standing(&defender.units),
    }
}

/// `floor(quantity * ratio * health / 100)`, never more than the stack holds.
fn stack_losses(unit: &Unit, ratio: Decimal) -> u32 {
    let health = Decimal::from(unit.health.min(MAX_HEALTH));
    let raw = Decimal::from(unit.quantity)
        .saturating_mul(ratio)
        .saturating_mul(health)
        .checked_div(Decimal::ONE_HUNDRED)
        .unwrap_or(Decimal::ZERO)
        .floor();
    raw.to_u32().unwrap_or(0).min(unit.quantity)
}

/// Take losses from every stack and drop the stacks that reach zero.
fn apply_losses(units: &[Unit], ratio: Decimal) -> (BTreeMap<UnitType, u32>, Vec<Unit>) {
    let mut losses: BTreeMap<UnitType, u32> = BTreeMap::new();
    let mut remaining = Vec::with_capacity(units.len());

    for unit in units {
        let lost = stack_losses(unit, ratio);
        let entry = losses.entry(unit.unit_type).or_insert(0);
        *entry = entry.saturating_add(lost);

        let quantity = unit.quantity.saturating_sub(lost);
        if quantity > 0 {
            let mut survivor = unit.clone();
            survivor.quantity = quantity;
            remaining.push(survivor);
        }
    }

    (losses, remaining)
}

fn decide_winner(attacker_remaining: u64, defender_remaining: u64) -> Winner {
    let attacker = Decimal::from(attacker_remaining);
    let defender = Decimal::from(defender_remaining);
    if attacker > defender.saturating_mul(VICTORY_MARGIN) {
        Winner::Attacker
    } else if defender > attacker.saturating_mul(VICTORY_MARGIN) {
        Winner::Defender
    } else {
        Winner::Draw
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
