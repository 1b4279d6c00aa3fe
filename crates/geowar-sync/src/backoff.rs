//! Reconnection delays.
//!
//! Attempt `n` (1-based) waits `base * 2^(n-1)`. After `max_attempts`
//! reconnection attempts the policy gives up.

use std::time::Duration;

use geowar_core::config::SyncConfig;

/// Exponential reconnection policy with a capped attempt count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    base: Duration,
    max_attempts: u32,
}

impl Backoff {
    /// Create a policy.
    pub const fn new(base: Duration, max_attempts: u32) -> Self {
        Self { base, max_attempts }
    }

    /// Build the policy from the `sync` config section.
    pub const fn from_config(config: &SyncConfig) -> Self {
        Self::new(
            Duration::from_millis(config.reconnect_base_ms),
            config.max_reconnect_attempts,
        )
    }

    /// Delay before reconnection attempt `attempt` (1-based), or `None` once
    /// the attempt cap is exceeded.
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt > self.max_attempts {
            return None;
        }
        let factor = 2_u32.checked_pow(attempt.checked_sub(1)?)?;
        self.base.checked_mul(factor)
    }

    /// Maximum number of reconnection attempts.
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), 5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delays_double_per_attempt() {
        let backoff = Backoff::default();
        let delays: Vec<Option<Duration>> = (1..=3).map(|n| backoff.delay_for(n)).collect();
        assert_eq!(
            delays,
            vec![
                Some(Duration::from_secs(1)),
                Some(Duration::from_secs(2)),
                Some(Duration::from_secs(4)),
            ]
        );
    }

    #[test]
    fn gives_up_after_cap() {
        let backoff = Backoff::new(Duration::from_millis(100), 5);
        assert_eq!(backoff.delay_for(5), Some(Duration::from_millis(1600)));
        assert_eq!(backoff.delay_for(6), None);
        assert_eq!(backoff.delay_for(0), None);
    }

    #[test]
    fn built_from_config() {
        let config = SyncConfig {
            reconnect_base_ms: 250,
            max_reconnect_attempts: 2,
            ..SyncConfig::default()
        };
        let backoff = Backoff::from_config(&config);
        assert_eq!(backoff.delay_for(2), Some(Duration::from_millis(500)));
        assert_eq!(backoff.max_attempts(), 2);
    }
}
