//! Simulation loop runner with operator controls.
//!
//! [`run_simulation`] drives the tick loop with support for:
//!
//! - **Bounded simulation**: stop after `max_ticks`
//! - **Pause/resume**: the loop halts between ticks; nothing is dropped
//! - **Variable speed**: the interval is re-read from the operator every tick
//! - **Operator stop**: clean stop before the next tick
//!
//! The world store's write guard is held only while [`run_tick`] runs and
//! the notification outbox is drained, so observers can read between ticks
//! and while the loop sleeps.
//!
//! [`run_tick`]: crate::tick::run_tick

use std::sync::Arc;

use tracing::{info, warn};

use geowar_types::Notification;
use geowar_world::{WorldState, WorldStore};

use crate::battles::SettlementRules;
use crate::clock::WorldClock;
use crate::operator::{OperatorState, SimulationEndReason};
use crate::tick::{self, TickError, TickSummary};

/// Errors that can occur during the simulation run.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// A tick execution failed.
    #[error("tick error: {source}")]
    Tick {
        /// The underlying tick error.
        #[from]
        source: TickError,
    },
}

/// Result of the simulation run.
#[derive(Debug)]
pub struct SimulationResult {
    /// The reason the simulation ended.
    pub end_reason: SimulationEndReason,
    /// The last tick summary, if any tick completed.
    pub final_summary: Option<TickSummary>,
    /// Total number of ticks executed.
    pub total_ticks: u64,
}

/// Callback invoked after each tick completes.
///
/// The callback runs under a read guard: it sees the world exactly as the
/// tick left it. `notifications` is everything the outbox held after the
/// tick; the outbox itself is empty by then, so each notification reaches
/// the callback once.
pub trait TickCallback: Send {
    /// Called after a tick completes successfully.
    fn on_tick(&mut self, summary: &TickSummary, world: &WorldState, notifications: &[Notification]);
}

/// A no-op tick callback.
pub struct NoOpCallback;

impl TickCallback for NoOpCallback {
    fn on_tick(&mut self, _summary: &TickSummary, _world: &WorldState, _notifications: &[Notification]) {}
}

/// Run the simulation loop until a termination condition is met.
///
/// # Errors
///
/// Returns [`RunnerError`] if a tick execution fails unrecoverably.
pub async fn run_simulation(
    store: &WorldStore,
    clock: &mut WorldClock,
    operator: &Arc<OperatorState>,
    rules: SettlementRules,
    callback: &mut dyn TickCallback,
) -> Result<SimulationResult, RunnerError> {
    let mut last_summary: Option<TickSummary> = None;
    let mut total_ticks: u64 = 0;

    info!(
        start_tick = clock.tick(),
        max_ticks = operator.max_ticks(),
        interval_ms = operator.effective_interval_ms(),
        speed = %operator.speed(),
        "Simulation starting"
    );

    loop {
        // --- Check pause ---
        if operator.is_paused() {
            info!(tick = clock.tick(), "Simulation paused, waiting for resume...");
            operator.wait_if_paused().await;
            info!(tick = clock.tick(), "Simulation resumed");
        }

        // --- Check stop request (before tick) ---
        if operator.is_stop_requested() {
            info!("Operator stop requested");
            let reason = SimulationEndReason::OperatorStop;
            operator.set_end_reason(reason).await;
            return Ok(SimulationResult {
                end_reason: reason,
                final_summary: last_summary,
                total_ticks,
            });
        }

        // --- Execute tick ---
        let (summary, notifications) = {
            let mut world = store.write().await;
            let summary = tick::run_tick(&mut world, clock, rules)?;
            (summary, world.drain_notifications())
        };
        total_ticks = total_ticks.saturating_add(1);

        // --- Notify callback ---
        {
            let world = store.read().await;
            callback.on_tick(&summary, &world, &notifications);
        }

        // --- Check tick limit (after tick) ---
        if operator.tick_limit_reached(summary.tick) {
            info!(
                tick = summary.tick,
                max_ticks = operator.max_ticks(),
                "Tick limit reached"
            );
            let reason = SimulationEndReason::MaxTicksReached;
            operator.set_end_reason(reason).await;
            return Ok(SimulationResult {
                end_reason: reason,
                final_summary: Some(summary),
                total_ticks,
            });
        }

        last_summary = Some(summary);

        // --- Sleep for tick interval ---
        let interval_ms = operator.effective_interval_ms();
        if interval_ms > 0 {
            tokio::time::sleep(tokio::time::Duration::from_millis(interval_ms)).await;
        }
    }
}

/// Log the simulation end sequence.
pub fn log_simulation_end(result: &SimulationResult) {
    info!(
        reason = ?result.end_reason,
        total_ticks = result.total_ticks,
        final_tick = result.final_summary.as_ref().map(|s| s.tick),
        "Simulation ended"
    );

    if let Some(ref summary) = result.final_summary {
        info!(
            tick = summary.tick,
            now = %summary.now,
            battles_settled = summary.battles_settled.len(),
            "Final tick summary"
        );
    } else {
        warn!("Simulation ended with no ticks executed");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::DateTime;
    use geowar_types::Player;
    use geowar_world::create_starting_world;

    use super::*;
    use crate::config::SimulationConfig;

    fn operator(max_ticks: u64) -> Arc<OperatorState> {
        Arc::new(OperatorState::new(&SimulationConfig {
            tick_interval_ms: 0,
            max_ticks,
            ..SimulationConfig::default()
        }))
    }

    fn clock() -> WorldClock {
        WorldClock::new(DateTime::from_timestamp(1_800_000_000, 0).unwrap(), 1).unwrap()
    }

    fn store() -> WorldStore {
        WorldStore::new(create_starting_world().0)
    }

    #[tokio::test]
    async fn bounded_by_max_ticks() {
        let store = store();
        let mut clock = clock();
        let operator = operator(5);
        let mut cb = NoOpCallback;

        let result = run_simulation(&store, &mut clock, &operator, SettlementRules::default(), &mut cb)
            .await
            .unwrap();

        assert_eq!(result.end_reason, SimulationEndReason::MaxTicksReached);
        assert_eq!(result.total_ticks, 5);
        assert_eq!(clock.tick(), 5);
        assert_eq!(operator.end_reason().await, Some(SimulationEndReason::MaxTicksReached));
    }

    #[tokio::test]
    async fn operator_stop() {
        let store = store();
        let mut clock = clock();
        let operator = operator(0);
        operator.request_stop();
        let mut cb = NoOpCallback;

        let result = run_simulation(&store, &mut clock, &operator, SettlementRules::default(), &mut cb)
            .await
            .unwrap();

        assert_eq!(result.end_reason, SimulationEndReason::OperatorStop);
        assert_eq!(result.total_ticks, 0);
        assert_eq!(clock.tick(), 0);
    }

    #[tokio::test]
    async fn tick_callback_is_called() {
        struct CountCallback {
            count: u64,
            territories: usize,
            notified: usize,
        }
        impl TickCallback for CountCallback {
            fn on_tick(&mut self, _summary: &TickSummary, world: &WorldState, notifications: &[Notification]) {
                self.count = self.count.saturating_add(1);
                self.territories = world.territory_count();
                self.notified = self.notified.saturating_add(notifications.len());
            }
        }

        let store = store();
        store
            .write()
            .await
            .push_notification(Notification::new(
                geowar_types::PlayerId::new(),
                geowar_types::NotificationType::Achievement,
                "Welcome",
                "The war begins",
                chrono::Utc::now(),
            ));
        let mut clock = clock();
        let operator = operator(3);
        let mut cb = CountCallback {
            count: 0,
            territories: 0,
            notified: 0,
        };

        let _ = run_simulation(&store, &mut clock, &operator, SettlementRules::default(), &mut cb)
            .await
            .unwrap();

        assert_eq!(cb.count, 3);
        assert_eq!(cb.territories, 9);
        assert_eq!(cb.notified, 1);
        assert!(store.read().await.pending_notifications().is_empty());
    }

    #[tokio::test]
    async fn pause_keeps_state_until_resumed() {
        let (mut world, ids) = create_starting_world();
        let now = chrono::Utc::now();
        let player = Player::new("ada", now);
        let player_id = player.id;
        world.upsert_player(player);
        world.set_territory_owner(ids.france, Some(player_id), now).unwrap();
        let store = WorldStore::new(world);

        let operator = Arc::new(OperatorState::new(&SimulationConfig {
            tick_interval_ms: 0,
            max_ticks: 2,
            start_paused: true,
            ..SimulationConfig::default()
        }));
        let handle = {
            let store = store.clone();
            let operator = Arc::clone(&operator);
            tokio::spawn(async move {
                let mut clock = clock();
                let mut cb = NoOpCallback;
                run_simulation(&store, &mut clock, &operator, SettlementRules::default(), &mut cb)
                    .await
            })
        };

        tokio::task::yield_now().await;
        let paused_gold = store.read().await.player(player_id).map(|p| p.resources.gold);
        assert_eq!(paused_gold, Some(rust_decimal::Decimal::ZERO));

        operator.resume();
        let result = handle.await.unwrap().unwrap();
        assert_eq!(result.total_ticks, 2);
        let gold = store.read().await.player(player_id).map(|p| p.resources.gold);
        assert!(gold > paused_gold);
    }
}
