//! Configuration loading and typed config structures for the GeoWar
//! simulation.
//!
//! The canonical configuration lives in `geowar-config.yaml` at the project
//! root. Every field has a serde default, so an empty file is a valid
//! configuration.

use std::path::Path;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

use geowar_types::Resources;

use crate::battles::SettlementRules;

/// Environment variable overriding [`SyncConfig::url`].
pub const SYNC_URL_ENV: &str = "GEOWAR_SYNC_URL";

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level configuration, mirroring `geowar-config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct GeowarConfig {
    /// World identity and starting map.
    #[serde(default)]
    pub world: WorldConfig,

    /// Tick cadence and limits.
    #[serde(default)]
    pub simulation: SimulationConfig,

    /// Starting balances and rewards.
    #[serde(default)]
    pub economy: EconomyConfig,

    /// Push channel connection.
    #[serde(default)]
    pub sync: SyncConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl GeowarConfig {
    /// Load configuration from a YAML file, then apply environment
    /// overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string, then apply environment
    /// overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yml::from_str(yaml)?;
        config.sync.apply_env_overrides();
        Ok(config)
    }
}

/// World-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WorldConfig {
    /// Human-readable world name.
    #[serde(default = "default_world_name")]
    pub name: String,

    /// Simulated instant of tick 0. Defaults to the process start time.
    #[serde(default)]
    pub epoch: Option<DateTime<Utc>>,

    /// Seed the built-in European starting map on startup.
    #[serde(default = "default_true")]
    pub seed_starting_world: bool,

    /// Usernames joined at startup with the starting balances.
    #[serde(default)]
    pub seed_players: Vec<String>,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            name: default_world_name(),
            epoch: None,
            seed_starting_world: true,
            seed_players: Vec::new(),
        }
    }
}

/// Tick cadence configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SimulationConfig {
    /// Wall-clock milliseconds between ticks at speed 1.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Simulated seconds that pass per tick.
    #[serde(default = "default_seconds_per_tick")]
    pub seconds_per_tick: u64,

    /// Initial speed multiplier. Must be positive.
    #[serde(default = "default_speed")]
    pub speed: Decimal,

    /// Stop after this many ticks. 0 runs until stopped.
    #[serde(default)]
    pub max_ticks: u64,

    /// Start with the tick loop paused.
    #[serde(default)]
    pub start_paused: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            seconds_per_tick: default_seconds_per_tick(),
            speed: default_speed(),
            max_ticks: 0,
            start_paused: false,
        }
    }
}

/// Economy configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EconomyConfig {
    /// Resource balances granted to a newly joined player.
    #[serde(default = "default_starting_resources")]
    pub starting_resources: Resources,

    /// Experience granted to the winner of a battle.
    #[serde(default = "default_victory_experience")]
    pub victory_experience: u64,
}

impl EconomyConfig {
    /// Battle settlement parameters derived from this section.
    pub const fn settlement_rules(&self) -> SettlementRules {
        SettlementRules {
            victory_experience: self.victory_experience,
        }
    }
}

impl Default for EconomyConfig {
    fn default() -> Self {
        Self {
            starting_resources: default_starting_resources(),
            victory_experience: default_victory_experience(),
        }
    }
}

/// Push channel configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SyncConfig {
    /// WebSocket URL of the authoritative push channel.
    #[serde(default)]
    pub url: Option<String>,

    /// Connect to the push channel at all.
    #[serde(default)]
    pub enabled: bool,

    /// Delay before the first reconnection attempt.
    #[serde(default = "default_reconnect_base_ms")]
    pub reconnect_base_ms: u64,

    /// Reconnection attempts before the connection is reported failed.
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,

    /// Capacity of each consumer fan-out channel.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl SyncConfig {
    /// Override the URL from `GEOWAR_SYNC_URL` when it is set.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(SYNC_URL_ENV).filter(|url| !url.is_empty()) {
            self.url = Some(url);
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            url: None,
            enabled: false,
            reconnect_base_ms: default_reconnect_base_ms(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format (`pretty` or `json`).
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions (serde default requires named functions)
// ---------------------------------------------------------------------------

fn default_world_name() -> String {
    "GeoWar".to_owned()
}

const fn default_true() -> bool {
    true
}

const fn default_tick_interval_ms() -> u64 {
    1000
}

const fn default_seconds_per_tick() -> u64 {
    1
}

const fn default_speed() -> Decimal {
    Decimal::ONE
}

fn default_starting_resources() -> Resources {
    Resources {
        gold: Decimal::from(1000),
        oil: Decimal::from(200),
        steel: Decimal::from(200),
        food: Decimal::from(500),
        electricity: Decimal::from(100),
        ..Resources::ZERO
    }
}

const fn default_victory_experience() -> u64 {
    100
}

const fn default_reconnect_base_ms() -> u64 {
    1000
}

const fn default_max_reconnect_attempts() -> u32 {
    5
}

const fn default_channel_capacity() -> usize {
    256
}

fn default_log_level() -> String {
    "info".to_owned()
}

fn default_log_format() -> String {
    "pretty".to_owned()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn parse_full_yaml() {
        let yaml = r#"
world:
  name: "Test World"
  epoch: "2030-01-01T00:00:00Z"
  seed_starting_world: false
  seed_players: ["ada", "bob"]

simulation:
  tick_interval_ms: 250
  seconds_per_tick: 60
  speed: 2.5
  max_ticks: 40
  start_paused: true

economy:
  starting_resources:
    gold: 50
    rareEarth: 3
  victory_experience: 250

sync:
  url: "ws://localhost:9000/push"
  enabled: true
  reconnect_base_ms: 500
  max_reconnect_attempts: 3

logging:
  level: "debug"
  format: "json"
"#;
        let config = GeowarConfig::parse(yaml).unwrap();
        assert_eq!(config.world.name, "Test World");
        assert!(config.world.epoch.is_some());
        assert!(!config.world.seed_starting_world);
        assert_eq!(config.world.seed_players, vec!["ada", "bob"]);
        assert_eq!(config.simulation.tick_interval_ms, 250);
        assert_eq!(config.simulation.seconds_per_tick, 60);
        assert_eq!(config.simulation.speed, dec!(2.5));
        assert_eq!(config.simulation.max_ticks, 40);
        assert!(config.simulation.start_paused);
        assert_eq!(config.economy.starting_resources.gold, dec!(50));
        assert_eq!(config.economy.starting_resources.rare_earth, dec!(3));
        assert_eq!(config.economy.starting_resources.oil, Decimal::ZERO);
        assert_eq!(config.economy.victory_experience, 250);
        assert_eq!(config.economy.settlement_rules().victory_experience, 250);
        assert!(config.sync.enabled);
        assert_eq!(config.sync.reconnect_base_ms, 500);
        assert_eq!(config.sync.max_reconnect_attempts, 3);
        assert_eq!(config.sync.channel_capacity, 256);
        assert_eq!(config.logging.format, "json");
    }

    #[test]
    fn parse_minimal_yaml() {
        let config = GeowarConfig::parse("simulation:\n  max_ticks: 7\n").unwrap();
        assert_eq!(config.simulation.max_ticks, 7);
        assert_eq!(config.simulation.tick_interval_ms, 1000);
        assert_eq!(config.simulation.speed, Decimal::ONE);
        assert_eq!(config.sync.max_reconnect_attempts, 5);
        assert!(config.world.seed_starting_world);
    }

    #[test]
    fn parse_empty_yaml() {
        assert!(GeowarConfig::parse("").is_ok());
    }

    #[test]
    fn invalid_yaml_is_an_error() {
        let result = GeowarConfig::parse("simulation: [unclosed");
        assert!(matches!(result, Err(ConfigError::Yaml { .. })));
    }

    #[test]
    fn sync_url_override() {
        let mut sync = SyncConfig::default();
        sync.apply_overrides(|key| (key == SYNC_URL_ENV).then(|| "ws://override".to_owned()));
        assert_eq!(sync.url.as_deref(), Some("ws://override"));

        sync.apply_overrides(|_| Some(String::new()));
        assert_eq!(sync.url.as_deref(), Some("ws://override"));
    }

    #[test]
    fn load_project_config_file() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("geowar-config.yaml");
        if path.exists() {
            let config = GeowarConfig::from_file(&path);
            assert!(config.is_ok(), "Failed to load project config: {config:?}");
        }
    }
}
