//! Per-tick production for a single territory.
//!
//! [`produce`] is the base contract: GDP and population yield gold and food,
//! and every active building adds its bonus vector. [`apply_event_modifiers`]
//! scales a delta by the resource effects of the world events touching the
//! territory.

use rust_decimal::Decimal;

use geowar_types::{EffectTarget, GameEventEffect, ResourceKind, Resources, Territory};

/// Fraction of GDP credited to gold each tick.
pub const GDP_GOLD_RATE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Fraction of population credited to food each tick.
pub const POPULATION_FOOD_RATE: Decimal = Decimal::from_parts(1, 0, 0, false, 3);

const ONE_HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// Compute the resources `territory` yields in one tick.
///
/// Inactive buildings contribute nothing, and bonus entries that are zero or
/// negative are skipped. Saturates instead of failing on absurd inputs.
pub fn produce(territory: &Territory) -> Resources {
    let mut delta = Resources::ZERO;

    delta.gold = territory.gdp.saturating_mul(GDP_GOLD_RATE);
    delta.food = Decimal::from(territory.population).saturating_mul(POPULATION_FOOD_RATE);

    for building in territory.buildings.iter().filter(|b| b.is_active) {
        for (kind, bonus) in building.production_bonus.iter() {
            if bonus <= Decimal::ZERO {
                continue;
            }
            let slot = delta.get_mut(kind);
            *slot = slot.saturating_add(bonus);
        }
    }

    delta
}

/// Scale `delta` by every resource-targeted effect in `effects`.
///
/// A modifier of `-30` keeps 70% of the affected resource, `25` yields 125%.
/// An effect without a named resource applies to all seven. Effects that
/// target military, population or morale are ignored here. Each resource is
/// floored at zero afterwards.
pub fn apply_event_modifiers<'a>(
    delta: Resources,
    effects: impl IntoIterator<Item = &'a GameEventEffect>,
) -> Resources {
    let mut out = delta;

    for effect in effects {
        if effect.target != EffectTarget::Resources {
            continue;
        }
        let factor = ONE_HUNDRED
            .saturating_add(effect.modifier)
            .checked_div(ONE_HUNDRED)
            .unwrap_or(Decimal::ONE);
        match effect.resource {
            Some(kind) => scale(&mut out, kind, factor),
            None => {
                for kind in ResourceKind::ALL {
                    scale(&mut out, kind, factor);
                }
            }
        }
    }

    for kind in ResourceKind::ALL {
        let slot = out.get_mut(kind);
        *slot = (*slot).max(Decimal::ZERO);
    }

    out
}

fn scale(resources: &mut Resources, kind: ResourceKind, factor: Decimal) {
    let slot = resources.get_mut(kind);
    *slot = slot.saturating_mul(factor);
}
