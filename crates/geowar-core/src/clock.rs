//! World clock for the GeoWar simulation.
//!
//! The tick counter is the single source of truth for simulated time:
//! `now = epoch + tick * seconds_per_tick`. Nothing else stores the current
//! simulated instant.

use chrono::{DateTime, TimeDelta, Utc};

/// Errors that can occur during clock operations.
#[derive(Debug, thiserror::Error)]
pub enum ClockError {
    /// Tick counter would overflow.
    #[error("tick counter overflow: cannot advance beyond u64::MAX")]
    TickOverflow,

    /// Simulated time left the representable range.
    #[error("simulated time overflow at tick {tick}")]
    TimeOverflow {
        /// The tick whose instant could not be computed.
        tick: u64,
    },

    /// Invalid time configuration.
    #[error("invalid time configuration: {reason}")]
    InvalidConfig {
        /// Explanation of what is wrong with the configuration.
        reason: String,
    },
}

/// World clock tracking the simulation's temporal state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorldClock {
    /// Current tick number (0-indexed, incremented at the start of each tick).
    tick: u64,

    /// Simulated instant of tick 0.
    epoch: DateTime<Utc>,

    /// Simulated seconds that pass per tick.
    seconds_per_tick: u64,
}

impl WorldClock {
    /// Create a clock at tick 0.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::InvalidConfig`] if `seconds_per_tick` is 0.
    pub fn new(epoch: DateTime<Utc>, seconds_per_tick: u64) -> Result<Self, ClockError> {
        Self::from_parts(0, epoch, seconds_per_tick)
    }

    /// Create a clock from explicit parameters (state restoration, tests).
    pub fn from_parts(
        tick: u64,
        epoch: DateTime<Utc>,
        seconds_per_tick: u64,
    ) -> Result<Self, ClockError> {
        if seconds_per_tick == 0 {
            return Err(ClockError::InvalidConfig {
                reason: "seconds_per_tick must be at least 1".to_owned(),
            });
        }
        Ok(Self {
            tick,
            epoch,
            seconds_per_tick,
        })
    }

    /// Advance the clock by one tick. Returns the new tick number.
    pub fn advance(&mut self) -> Result<u64, ClockError> {
        self.tick = self.tick.checked_add(1).ok_or(ClockError::TickOverflow)?;
        Ok(self.tick)
    }

    /// Return the current tick number.
    pub const fn tick(&self) -> u64 {
        self.tick
    }

    /// Return the simulated instant of tick 0.
    pub const fn epoch(&self) -> DateTime<Utc> {
        self.epoch
    }

    /// Return the configured simulated seconds per tick.
    pub const fn seconds_per_tick(&self) -> u64 {
        self.seconds_per_tick
    }

    /// The simulated instant of the current tick.
    pub fn now(&self) -> Result<DateTime<Utc>, ClockError> {
        let overflow = || ClockError::TimeOverflow { tick: self.tick };
        let seconds = self
            .tick
            .checked_mul(self.seconds_per_tick)
            .and_then(|s| i64::try_from(s).ok())
            .ok_or_else(overflow)?;
        let elapsed = TimeDelta::try_seconds(seconds).ok_or_else(overflow)?;
        self.epoch.checked_add_signed(elapsed).ok_or_else(overflow)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn epoch() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn clock_starts_at_tick_zero() {
        let clock = WorldClock::new(epoch(), 1).unwrap();
        assert_eq!(clock.tick(), 0);
        assert_eq!(clock.now().unwrap(), epoch());
    }

    #[test]
    fn simulated_time_follows_tick() {
        let mut clock = WorldClock::new(epoch(), 60).unwrap();
        for _ in 0..3 {
            clock.advance().unwrap();
        }
        assert_eq!(clock.tick(), 3);
        assert_eq!(clock.now().unwrap(), epoch() + TimeDelta::minutes(3));
    }

    #[test]
    fn zero_seconds_per_tick_is_rejected() {
        assert!(WorldClock::new(epoch(), 0).is_err());
    }

    #[test]
    fn overflow_is_reported() {
        let mut clock = WorldClock::from_parts(u64::MAX, epoch(), 1).unwrap();
        assert!(matches!(clock.advance(), Err(ClockError::TickOverflow)));
        assert!(matches!(clock.now(), Err(ClockError::TimeOverflow { .. })));
    }
}
