//! World clock, tick cycle, player intents and battle settlement for the
//! GeoWar simulation.
//!
//! # Modules
//!
//! - [`clock`] -- Tick counter and simulated time.
//! - [`config`] -- Configuration loading from `geowar-config.yaml` into
//!   strongly-typed structs.
//! - [`operator`] -- Pause, resume, speed and stop controls shared with the
//!   tick loop.
//! - [`costs`] -- Unit catalogue and construction prices.
//! - [`commands`] -- Validation and application of player intents.
//! - [`battles`] -- Writing resolved battles back into the world.
//! - [`tick`] -- The phase loop that advances the world by one tick.
//! - [`runner`] -- The async loop around [`tick::run_tick`].

pub mod battles;
pub mod clock;
pub mod commands;
pub mod config;
pub mod costs;
pub mod operator;
pub mod runner;
pub mod tick;

pub use battles::{SettlementError, SettlementReport, SettlementRules, settle};
pub use clock::{ClockError, WorldClock};
pub use commands::{CommandError, CommandOutcome, execute};
pub use config::{ConfigError, GeowarConfig};
pub use operator::{OperatorState, SimulationEndReason};
pub use runner::{
    NoOpCallback, RunnerError, SimulationResult, TickCallback, log_simulation_end, run_simulation,
};
pub use tick::{TickError, TickSummary, run_tick};
