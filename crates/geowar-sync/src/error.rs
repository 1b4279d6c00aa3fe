//! Error types for the `geowar-sync` crate.

use geowar_world::WorldError;
use tokio_tungstenite::tungstenite;

/// Errors raised by the push channel and the reconciler.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The transport could not open a connection.
    #[error("failed to connect to {url}: {source}")]
    Connect {
        /// Endpoint that was dialled.
        url: String,
        /// The underlying WebSocket error.
        #[source]
        source: Box<tungstenite::Error>,
    },

    /// The transport refused the connection attempt.
    #[error("connection refused")]
    Refused,

    /// Reading or writing a frame failed.
    #[error("transport error: {source}")]
    Transport {
        /// The underlying WebSocket error.
        #[source]
        source: Box<tungstenite::Error>,
    },

    /// The connection was closed by the peer.
    #[error("connection closed")]
    Closed,

    /// A frame could not be encoded or decoded.
    #[error("malformed frame: {0}")]
    Codec(#[from] serde_json::Error),

    /// The store rejected a canonical or local change.
    #[error("world error: {0}")]
    World(#[from] WorldError),
}

impl SyncError {
    /// Whether the connection is still usable after this error.
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::Codec(_) | Self::World(_))
    }
}
