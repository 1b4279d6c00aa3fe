//! Tick callback that reports progress through `tracing` and delivers
//! queued notifications.

use geowar_core::{TickCallback, TickSummary};
use geowar_types::Notification;
use geowar_world::WorldState;
use tracing::{debug, info};

/// Logs every tick and delivers the notifications drained after it.
#[derive(Debug, Default)]
pub struct LogCallback {
    delivered: usize,
    battles_settled: usize,
}

impl LogCallback {
    /// Create a callback that has delivered nothing.
    pub const fn new() -> Self {
        Self {
            delivered: 0,
            battles_settled: 0,
        }
    }

    /// Battles settled across all ticks seen.
    pub const fn battles_settled(&self) -> usize {
        self.battles_settled
    }

    /// Notifications delivered across all ticks seen.
    pub const fn delivered(&self) -> usize {
        self.delivered
    }

    fn deliver(notification: &Notification) {
        info!(
            player_id = %notification.player_id,
            kind = ?notification.notification_type,
            title = notification.title,
            "Notification"
        );
    }
}

impl TickCallback for LogCallback {
    fn on_tick(&mut self, summary: &TickSummary, _world: &WorldState, notifications: &[Notification]) {
        debug!(
            tick = summary.tick,
            now = %summary.now,
            produced = summary.territories_produced,
            production_failures = summary.production_failures,
            arrived = summary.armies_arrived,
            "Tick complete"
        );
        for report in &summary.battles_settled {
            info!(
                tick = summary.tick,
                battle_id = %report.battle_id,
                winner = ?report.winner,
                conquered = report.territory_conquered,
                "Battle settled"
            );
        }
        self.battles_settled = self
            .battles_settled
            .saturating_add(summary.battles_settled.len());

        for notification in notifications {
            Self::deliver(notification);
        }
        self.delivered = self.delivered.saturating_add(notifications.len());
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use geowar_core::{
        GeowarConfig, OperatorState, SettlementRules, WorldClock, run_simulation,
    };
    use geowar_types::NotificationType;
    use geowar_world::{WorldStore, create_starting_world};
    use chrono::Utc;

    use super::*;

    #[tokio::test]
    async fn outbox_is_empty_after_delivery() {
        let store = WorldStore::new(create_starting_world().0);
        store.write().await.push_notification(Notification::new(
            geowar_types::PlayerId::new(),
            NotificationType::BattleResult,
            "Battle",
            "Won",
            Utc::now(),
        ));
        let mut config = GeowarConfig::default().simulation;
        config.tick_interval_ms = 0;
        config.max_ticks = 2;
        let operator = Arc::new(OperatorState::new(&config));
        let mut clock = WorldClock::new(Utc::now(), 1).unwrap();
        let mut callback = LogCallback::new();

        run_simulation(&store, &mut clock, &operator, SettlementRules::default(), &mut callback)
            .await
            .unwrap();

        assert_eq!(callback.delivered(), 1);
        assert_eq!(callback.battles_settled(), 0);
        assert!(store.read().await.pending_notifications().is_empty());
    }
}
