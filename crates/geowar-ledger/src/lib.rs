//! Resource production and balance arithmetic for the GeoWar simulation.
//!
//! The ledger is pure: it computes per-tick production deltas for a
//! territory and performs checked arithmetic on resource balances. It never
//! touches the world store; callers commit the results themselves.
//!
//! # Modules
//!
//! - [`production`] -- Base production, building bonuses and event modifiers.
//! - [`balance`] -- Crediting, stockpiling, affordability checks and deductions.
//!
//! # Production
//!
//! | Source | Resource | Amount |
//! |--------|----------|--------|
//! | GDP | gold | `gdp * 0.01` |
//! | Population | food | `population * 0.001` |
//! | Active building | any | each positive `production_bonus` entry |
//!
//! # Usage
//!
//! ```
//! use geowar_ledger::{balance, production};
//! use geowar_types::{ResourceBonus, ResourceKind, Resources};
//! use rust_decimal::Decimal;
//!
//! let mut wallet = Resources::ZERO;
//! let mut delta = Resources::ZERO;
//! delta.gold = Decimal::new(50, 0);
//! balance::credit(&mut wallet, &delta).ok();
//!
//! let cost: ResourceBonus = [(ResourceKind::Gold, Decimal::new(20, 0))].into_iter().collect();
//! assert!(balance::can_afford(&wallet, &cost));
//! balance::deduct(&mut wallet, &cost).ok();
//! assert_eq!(wallet.gold, Decimal::new(30, 0));
//! ```

pub mod balance;
pub mod production;

pub use balance::{can_afford, credit, deduct, shortages, stockpile};
pub use production::{GDP_GOLD_RATE, POPULATION_FOOD_RATE, apply_event_modifiers, produce};

use rust_decimal::Decimal;

use geowar_types::ResourceKind;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can occur when changing a resource balance.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    /// Adding the delta would overflow the decimal range.
    #[error("resource {resource} overflowed")]
    Overflow {
        /// The resource that overflowed.
        resource: ResourceKind,
    },

    /// The balance does not cover the requested cost.
    #[error("insufficient {resource}: need {required}, have {available}")]
    Insufficient {
        /// The resource that ran short.
        resource: ResourceKind,
        /// Amount the cost asks for.
        required: Decimal,
        /// Amount held.
        available: Decimal,
    },
}
