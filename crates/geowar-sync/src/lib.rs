//! Push-channel synchronisation for the GeoWar simulation.
//!
//! Local intents are applied to the [`WorldStore`](geowar_world::WorldStore)
//! immediately and tracked until the authority answers. Canonical updates
//! always win; corrections are broadcast so the UI can react.
//!
//! # Modules
//!
//! - [`error`] -- [`SyncError`] for transports and reconciliation.
//! - [`backoff`] -- Exponential reconnect policy.
//! - [`pending`] -- Per-entity table of unconfirmed optimistic values.
//! - [`reconciler`] -- Applies local intents and canonical frames.
//! - [`transport`] -- WebSocket and loopback push channels.
//! - [`supervisor`] -- Connection lifecycle and the dispatch loop.

pub mod backoff;
pub mod error;
pub mod pending;
pub mod reconciler;
pub mod supervisor;
pub mod transport;

pub use backoff::Backoff;
pub use error::SyncError;
pub use pending::{PendingEntry, PendingTable};
pub use reconciler::{Correction, LocalMutation, ReconcileOutcome, Reconciler, read_snapshot};
pub use supervisor::{ConnectionState, SubmitError, SyncHandle, SyncSupervisor};
pub use transport::{
    ConnectPlan, LoopbackConnection, LoopbackPeer, LoopbackTransport, PushConnection,
    PushTransport, WsConnection, WsTransport,
};
