//! Deterministic battle resolution for the GeoWar simulation.
//!
//! Combat is a pure function of two army snapshots. The resolver never
//! mutates the armies it is given; the caller commits the remaining rosters
//! back to the world store.
//!
//! ## Combat flow
//!
//! 1. Power of each side: sum of `(attack + defense) * quantity`
//! 2. Defender power is multiplied by [`DEFENSIVE_BONUS`] when its army is
//!    dug in (`defending`)
//! 3. Each side loses a share of every unit stack proportional to the
//!    opposing side's share of total power, scaled by stack health
//! 4. The winner is decided on remaining power with a [`VICTORY_MARGIN`];
//!    anything closer is a draw
//!
//! # Modules
//!
//! - [`resolver`] -- [`resolve`] and [`army_power`].
//! - [`lifecycle`] -- The `preparing -> in_progress -> finished` battle
//!   state machine.

pub mod lifecycle;
pub mod resolver;

pub use lifecycle::{BattleLifecycle, declare};
pub use resolver::{CombatResult, DEFENSIVE_BONUS, VICTORY_MARGIN, army_power, resolve};

use geowar_types::{BattleId, BattleStatus};

/// Errors raised by the battle state machine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CombatError {
    /// The requested transition is not allowed from the current status.
    #[error("battle {battle_id} cannot go from {from:?} to {to:?}")]
    InvalidTransition {
        /// The battle.
        battle_id: BattleId,
        /// Current status.
        from: BattleStatus,
        /// Requested status.
        to: BattleStatus,
    },
}
