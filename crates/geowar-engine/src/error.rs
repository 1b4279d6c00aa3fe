//! Error types for the engine binary.
//!
//! [`EngineError`] wraps every failure mode of startup and the tick loop so
//! `main` can propagate with `?`.

/// Top-level error for the engine binary.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: geowar_core::ConfigError,
    },

    /// World clock initialization failed.
    #[error("clock error: {source}")]
    Clock {
        /// The underlying clock error.
        #[from]
        source: geowar_core::ClockError,
    },

    /// Seeding the world failed.
    #[error("seed error: {source}")]
    Seed {
        /// The underlying command error.
        #[from]
        source: geowar_core::CommandError,
    },

    /// Simulation runner failed.
    #[error("runner error: {source}")]
    Runner {
        /// The underlying runner error.
        #[from]
        source: geowar_core::RunnerError,
    },

    /// Sync is enabled but no push-channel URL is configured.
    #[error("sync enabled without a url; set sync.url or GEOWAR_SYNC_URL")]
    MissingSyncUrl,
}
