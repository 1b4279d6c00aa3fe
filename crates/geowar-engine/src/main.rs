//! Simulation host for GeoWar.
//!
//! Wires configuration, logging, the world store, the tick loop and the
//! optional push channel together, then runs until the tick limit is
//! reached or the operator stops the simulation (Ctrl-C).
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `geowar-config.yaml`
//! 2. Initialize structured logging (tracing)
//! 3. Create the world clock
//! 4. Seed the starting world and players
//! 5. Create operator state
//! 6. Start the push-channel supervisor when sync is enabled
//! 7. Run the simulation loop
//! 8. Log the result

mod callback;
mod error;

use std::path::Path;
use std::sync::Arc;

use anyhow::Context as _;
use chrono::Utc;
use geowar_core::commands::join_player;
use geowar_core::config::{LoggingConfig, SyncConfig};
use geowar_core::{GeowarConfig, OperatorState, WorldClock, log_simulation_end, run_simulation};
use geowar_sync::{Backoff, SyncHandle, SyncSupervisor, WsTransport};
use geowar_world::{WorldState, WorldStore, create_starting_world};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::callback::LogCallback;
use crate::error::EngineError;

/// Config file looked up relative to the working directory.
const CONFIG_PATH: &str = "geowar-config.yaml";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Load configuration.
    let config = load_config(Path::new(CONFIG_PATH)).context("loading configuration")?;

    // 2. Initialize structured logging.
    init_logging(&config.logging);
    info!(
        world_name = config.world.name,
        tick_interval_ms = config.simulation.tick_interval_ms,
        seconds_per_tick = config.simulation.seconds_per_tick,
        max_ticks = config.simulation.max_ticks,
        "geowar-engine starting"
    );

    // 3. Create world clock.
    let epoch = config.world.epoch.unwrap_or_else(Utc::now);
    let mut clock = WorldClock::new(epoch, config.simulation.seconds_per_tick)
        .map_err(EngineError::from)?;
    info!(epoch = %clock.epoch(), "World clock initialized");

    // 4. Seed the world.
    let world = seed_world(&config).map_err(EngineError::from)?;
    info!(
        territories = world.territory_count(),
        players = world.player_count(),
        "World seeded"
    );
    let store = WorldStore::new(world);

    // 5. Create operator state.
    let operator = Arc::new(OperatorState::new(&config.simulation));
    info!(
        speed = %operator.speed(),
        paused = operator.is_paused(),
        "Operator state initialized"
    );
    spawn_stop_on_ctrl_c(Arc::clone(&operator));

    // 6. Push channel.
    let _sync = start_sync(&config.sync, &store)?;

    // 7. Run the simulation.
    let mut callback = LogCallback::new();
    let result = run_simulation(
        &store,
        &mut clock,
        &operator,
        config.economy.settlement_rules(),
        &mut callback,
    )
    .await
    .map_err(EngineError::from)?;

    // 8. Log results.
    log_simulation_end(&result);
    info!(
        end_reason = ?result.end_reason,
        total_ticks = result.total_ticks,
        battles_settled = callback.battles_settled(),
        "geowar-engine shutdown complete"
    );
    Ok(())
}

/// Load the configuration file, falling back to defaults when it is absent.
fn load_config(path: &Path) -> Result<GeowarConfig, EngineError> {
    if path.exists() {
        Ok(GeowarConfig::from_file(path)?)
    } else {
        let mut config = GeowarConfig::default();
        config.sync.apply_env_overrides();
        Ok(config)
    }
}

/// Install the tracing subscriber. `RUST_LOG` wins over the configured level.
fn init_logging(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    if logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Build the initial world from the `world` and `economy` sections.
fn seed_world(config: &GeowarConfig) -> Result<WorldState, geowar_core::CommandError> {
    let mut world = if config.world.seed_starting_world {
        create_starting_world().0
    } else {
        WorldState::new()
    };
    let now = config.world.epoch.unwrap_or_else(Utc::now);
    for username in &config.world.seed_players {
        join_player(&mut world, username, config.economy.starting_resources, now)?;
    }
    Ok(world)
}

/// Start the push-channel supervisor when sync is enabled.
///
/// The returned handle keeps the supervisor alive.
fn start_sync(sync: &SyncConfig, store: &WorldStore) -> Result<Option<SyncHandle>, EngineError> {
    if !sync.enabled {
        info!("Push channel disabled, running standalone");
        return Ok(None);
    }
    let url = sync.url.clone().ok_or(EngineError::MissingSyncUrl)?;
    let transport = WsTransport::new(url);
    info!(url = transport.url(), "Starting push channel");

    let (supervisor, handle) = SyncSupervisor::new(
        transport,
        store.clone(),
        Backoff::from_config(sync),
        sync.channel_capacity,
    );
    tokio::spawn(async move {
        let state = supervisor.run().await;
        warn!(?state, "Push channel supervisor exited; serving last known state");
    });
    spawn_consumers(&handle);
    Ok(Some(handle))
}

/// Log chat lines and corrections coming off the push channel.
fn spawn_consumers(handle: &SyncHandle) {
    let mut chat = handle.chat();
    tokio::spawn(async move {
        while let Ok(line) = chat.recv().await {
            info!(sender = line.sender_name, channel = ?line.channel, "Chat: {}", line.content);
        }
    });
    let mut corrections = handle.corrections();
    tokio::spawn(async move {
        while let Ok(correction) = corrections.recv().await {
            warn!(
                op_id = %correction.op_id,
                entity = %correction.entity,
                "Local guess overridden by authority"
            );
        }
    });
}

/// Request an operator stop on Ctrl-C.
fn spawn_stop_on_ctrl_c(operator: Arc<OperatorState>) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received, stopping after the current tick");
            operator.request_stop();
        }
    });
}
