//! Operator control state for runtime simulation management.
//!
//! Shared atomic state read by the tick loop on every iteration. The
//! operator can pause/resume, change the speed multiplier and request a
//! clean shutdown without stopping the process.
//!
//! # Architecture
//!
//! All mutable control fields use [`std::sync::atomic`] types so the state
//! can sit behind an [`Arc`](std::sync::Arc) shared between the tick loop and
//! whatever drives it, without locks on the hot path.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, Notify};

use crate::config::SimulationConfig;

/// Speed is stored in thousandths.
const SPEED_SCALE: u64 = 1000;

/// Reason why the simulation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SimulationEndReason {
    /// Reached the configured `max_ticks` limit.
    MaxTicksReached,
    /// An operator issued a stop command.
    OperatorStop,
}

/// Shared operator control state.
#[derive(Debug)]
pub struct OperatorState {
    /// Whether the simulation is currently paused.
    paused: AtomicBool,

    /// Notification used to wake the tick loop when resumed.
    resume_notify: Notify,

    /// Whether a stop has been requested.
    stop_requested: AtomicBool,

    /// Tick interval at speed 1, in milliseconds.
    base_interval_ms: AtomicU64,

    /// Speed multiplier in thousandths (1000 = normal speed).
    speed_permille: AtomicU64,

    /// Wall-clock time when the simulation started.
    started_at: DateTime<Utc>,

    /// Maximum number of ticks (0 = unlimited).
    max_ticks: u64,

    /// Reason the simulation ended, if it has.
    end_reason: Mutex<Option<SimulationEndReason>>,
}

impl OperatorState {
    /// Create a new operator state from configuration.
    ///
    /// A non-positive configured speed falls back to 1.
    pub fn new(config: &SimulationConfig) -> Self {
        Self {
            paused: AtomicBool::new(config.start_paused),
            resume_notify: Notify::new(),
            stop_requested: AtomicBool::new(false),
            base_interval_ms: AtomicU64::new(config.tick_interval_ms),
            speed_permille: AtomicU64::new(speed_to_permille(config.speed).unwrap_or(SPEED_SCALE)),
            started_at: Utc::now(),
            max_ticks: config.max_ticks,
            end_reason: Mutex::new(None),
        }
    }

    // -----------------------------------------------------------------------
    // Pause / Resume
    // -----------------------------------------------------------------------

    /// Check whether the simulation is paused.
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    /// Pause the simulation. The tick loop sleeps until resumed.
    pub fn pause(&self) {
        self.paused.store(true, Ordering::Release);
    }

    /// Resume the simulation and wake the tick loop.
    pub fn resume(&self) {
        self.paused.store(false, Ordering::Release);
        self.resume_notify.notify_one();
    }

    /// Wait until the simulation is no longer paused.
    ///
    /// Returns immediately if not paused.
    pub async fn wait_if_paused(&self) {
        while self.paused.load(Ordering::Acquire) {
            self.resume_notify.notified().await;
        }
    }

    // -----------------------------------------------------------------------
    // Stop
    // -----------------------------------------------------------------------

    /// Request a clean simulation stop. Also wakes a paused loop so it can
    /// observe the request.
    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::Release);
        self.paused.store(false, Ordering::Release);
        self.resume_notify.notify_one();
    }

    /// Check whether a stop has been requested.
    pub fn is_stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::Acquire)
    }

    /// Record the reason the simulation ended.
    pub async fn set_end_reason(&self, reason: SimulationEndReason) {
        let mut guard = self.end_reason.lock().await;
        *guard = Some(reason);
    }

    /// Get the reason the simulation ended, if it has.
    pub async fn end_reason(&self) -> Option<SimulationEndReason> {
        *self.end_reason.lock().await
    }

    // -----------------------------------------------------------------------
    // Speed
    // -----------------------------------------------------------------------

    /// Tick interval at speed 1, in milliseconds.
    pub fn base_interval_ms(&self) -> u64 {
        self.base_interval_ms.load(Ordering::Acquire)
    }

    /// Set the base tick interval. Returns the previous value.
    pub fn set_base_interval_ms(&self, ms: u64) -> u64 {
        self.base_interval_ms.swap(ms, Ordering::AcqRel)
    }

    /// Current speed multiplier.
    pub fn speed(&self) -> Decimal {
        let permille = self.speed_permille.load(Ordering::Acquire);
        Decimal::from_i128_with_scale(i128::from(permille), 3)
    }

    /// Set the speed multiplier.
    ///
    /// Returns the previous multiplier, or `None` if the value was rejected
    /// (zero, negative, or below one thousandth).
    pub fn set_speed(&self, speed: Decimal) -> Option<Decimal> {
        let permille = speed_to_permille(speed)?;
        let prev = self.speed();
        self.speed_permille.store(permille, Ordering::Release);
        tracing::info!(speed = %speed, previous = %prev, "Simulation speed changed");
        Some(prev)
    }

    /// Wall-clock milliseconds between ticks: `base_interval_ms / speed`.
    pub fn effective_interval_ms(&self) -> u64 {
        let permille = self.speed_permille.load(Ordering::Acquire);
        self.base_interval_ms()
            .saturating_mul(SPEED_SCALE)
            .checked_div(permille)
            .unwrap_or(0)
    }

    // -----------------------------------------------------------------------
    // Boundaries
    // -----------------------------------------------------------------------

    /// Returns `true` if `max_ticks > 0` and `current_tick >= max_ticks`.
    pub const fn tick_limit_reached(&self, current_tick: u64) -> bool {
        self.max_ticks > 0 && current_tick >= self.max_ticks
    }

    /// Get the configured max ticks.
    pub const fn max_ticks(&self) -> u64 {
        self.max_ticks
    }

    /// Return the wall-clock start time.
    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }
}

fn speed_to_permille(speed: Decimal) -> Option<u64> {
    if speed <= Decimal::ZERO {
        return None;
    }
    speed
        .checked_mul(Decimal::from(SPEED_SCALE))?
        .round()
        .to_u64()
        .filter(|permille| *permille > 0)
}
