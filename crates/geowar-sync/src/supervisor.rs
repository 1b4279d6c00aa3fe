//! Connection supervisor for the push channel.
//!
//! The supervisor owns the [`Reconciler`] and runs one dispatch loop: it
//! connects, asks for a snapshot, then multiplexes inbound canonical frames
//! with locally submitted intents. Dropped connections are retried with
//! [`Backoff`]; once the attempt cap is exhausted the supervisor reports
//! [`ConnectionState::Failed`] and stops. The tick scheduler never waits on
//! any of this: the store is only locked for the duration of one
//! reconciliation.

use chrono::Utc;
use serde::Serialize;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::{debug, error, info, warn};

use geowar_core::commands::{CommandError, CommandOutcome};
use geowar_types::{
    ChatMessage, Command, EntityRef, Notification, OperationId, OutboundFrame, PushEnvelope,
    PushMessage,
};
use geowar_world::WorldStore;

use crate::backoff::Backoff;
use crate::error::SyncError;
use crate::reconciler::{Correction, ReconcileOutcome, Reconciler};
use crate::transport::{PushConnection, PushTransport};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Connection lifecycle as seen by observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ConnectionState {
    /// Dialling.
    Connecting {
        /// Reconnection attempt, 0 for the first connection.
        attempt: u32,
    },
    /// Connected, waiting for the first frame after the resync request.
    Syncing,
    /// Receiving canonical updates.
    Live,
    /// Waiting before the next attempt.
    Reconnecting {
        /// Upcoming attempt number.
        attempt: u32,
        /// Delay before it, in milliseconds.
        delay_ms: u64,
    },
    /// Gave up after the attempt cap.
    Failed {
        /// Reconnection attempts made.
        attempts: u32,
    },
    /// Every handle was dropped.
    Stopped,
}

/// Why a local submission did not go upstream.
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    /// Local validation rejected the intent; nothing was sent.
    #[error("intent rejected: {0}")]
    Rejected(#[from] CommandError),

    /// The supervisor is no longer running.
    #[error("sync supervisor stopped")]
    Stopped,
}

enum Control {
    Submit {
        op_id: OperationId,
        command: Command,
        reply: oneshot::Sender<Result<CommandOutcome, CommandError>>,
    },
    Rollback {
        op_id: OperationId,
        reply: oneshot::Sender<Result<Vec<EntityRef>, SyncError>>,
    },
}

/// Cloneable handle for submitting intents and observing the channel.
#[derive(Debug, Clone)]
pub struct SyncHandle {
    control: mpsc::Sender<Control>,
    chat: broadcast::Sender<ChatMessage>,
    notifications: broadcast::Sender<Notification>,
    corrections: broadcast::Sender<Correction>,
    state: watch::Receiver<ConnectionState>,
}

impl std::fmt::Debug for Control {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Submit { op_id, .. } => write!(f, "Submit({op_id})"),
            Self::Rollback { op_id, .. } => write!(f, "Rollback({op_id})"),
        }
    }
}

/// A message held back for fan-out until its sequence has been checked.
#[derive(Debug)]
enum Forward {
    Chat(ChatMessage),
    Notification(Notification),
}

impl SyncHandle {
    /// Apply an intent locally and queue it for the authority.
    ///
    /// Returns the operation id the authority will echo and the local
    /// outcome.
    pub async fn submit(
        &self,
        command: Command,
    ) -> Result<(OperationId, CommandOutcome), SubmitError> {
        let op_id = OperationId::new();
        let (reply, answer) = oneshot::channel();
        self.control
            .send(Control::Submit {
                op_id,
                command,
                reply,
            })
            .await
            .map_err(|_closed| SubmitError::Stopped)?;
        let outcome = answer.await.map_err(|_closed| SubmitError::Stopped)??;
        Ok((op_id, outcome))
    }

    /// Undo an operation the authority rejected.
    pub async fn rollback(&self, op_id: OperationId) -> Result<Vec<EntityRef>, SyncError> {
        let (reply, answer) = oneshot::channel();
        self.control
            .send(Control::Rollback { op_id, reply })
            .await
            .map_err(|_closed| SyncError::Closed)?;
        answer.await.map_err(|_closed| SyncError::Closed)?
    }

    /// Subscribe to relayed chat lines.
    pub fn chat(&self) -> broadcast::Receiver<ChatMessage> {
        self.chat.subscribe()
    }

    /// Subscribe to notifications for the local player.
    pub fn notifications(&self) -> broadcast::Receiver<Notification> {
        self.notifications.subscribe()
    }

    /// Subscribe to optimistic values the authority overrode.
    pub fn corrections(&self) -> broadcast::Receiver<Correction> {
        self.corrections.subscribe()
    }

    /// Watch the connection state.
    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }
}

// ---------------------------------------------------------------------------
// Supervisor
// ---------------------------------------------------------------------------

enum SessionEnd {
    Disconnected(SyncError),
    Shutdown,
}

/// Drives one transport against the shared store.
pub struct SyncSupervisor<T: PushTransport> {
    transport: T,
    store: WorldStore,
    reconciler: Reconciler,
    backoff: Backoff,
    control: mpsc::Receiver<Control>,
    chat: broadcast::Sender<ChatMessage>,
    notifications: broadcast::Sender<Notification>,
    corrections: broadcast::Sender<Correction>,
    state: watch::Sender<ConnectionState>,
}

impl<T: PushTransport> SyncSupervisor<T> {
    /// Create a supervisor and its handle. `capacity` bounds the intent
    /// queue and each broadcast channel.
    pub fn new(
        transport: T,
        store: WorldStore,
        backoff: Backoff,
        capacity: usize,
    ) -> (Self, SyncHandle) {
        let capacity = capacity.max(1);
        let (control_tx, control) = mpsc::channel(capacity);
        let (chat, _) = broadcast::channel(capacity);
        let (notifications, _) = broadcast::channel(capacity);
        let (corrections, _) = broadcast::channel(capacity);
        let (state, state_rx) = watch::channel(ConnectionState::Connecting { attempt: 0 });

        let handle = SyncHandle {
            control: control_tx,
            chat: chat.clone(),
            notifications: notifications.clone(),
            corrections: corrections.clone(),
            state: state_rx,
        };
        let supervisor = Self {
            transport,
            store,
            reconciler: Reconciler::new(),
            backoff,
            control,
            chat,
            notifications,
            corrections,
            state,
        };
        (supervisor, handle)
    }

    /// Run until every handle is dropped or reconnection gives up. Returns
    /// the final state.
    pub async fn run(mut self) -> ConnectionState {
        let mut attempt: u32 = 0;
        loop {
            self.set_state(ConnectionState::Connecting { attempt });
            match self.transport.connect().await {
                Ok(mut conn) => {
                    info!(attempt, "Push channel connected");
                    attempt = 0;
                    match self.session(&mut conn).await {
                        SessionEnd::Shutdown => {
                            info!("Sync supervisor shutting down");
                            self.set_state(ConnectionState::Stopped);
                            return ConnectionState::Stopped;
                        }
                        SessionEnd::Disconnected(err) => {
                            warn!(error = %err, "Push channel lost");
                        }
                    }
                }
                Err(err) => warn!(attempt, error = %err, "Push channel connect failed"),
            }

            attempt = attempt.saturating_add(1);
            let Some(delay) = self.backoff.delay_for(attempt) else {
                let attempts = attempt.saturating_sub(1);
                error!(attempts, "Giving up on the push channel");
                let state = ConnectionState::Failed { attempts };
                self.set_state(state);
                return state;
            };
            let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
            info!(attempt, delay_ms, "Reconnecting after backoff");
            self.set_state(ConnectionState::Reconnecting { attempt, delay_ms });
            tokio::time::sleep(delay).await;
        }
    }

    async fn session(&mut self, conn: &mut T::Connection) -> SessionEnd {
        let request = self.reconciler.snapshot_request();
        if let Err(err) = conn.send(OutboundFrame::Resync(request)).await {
            return SessionEnd::Disconnected(err);
        }
        debug!(?request, "Resync requested");
        self.set_state(ConnectionState::Syncing);

        loop {
            tokio::select! {
                inbound = conn.recv() => match inbound {
                    Some(Ok(envelope)) => self.dispatch(envelope).await,
                    Some(Err(err)) if err.is_recoverable() => {
                        warn!(error = %err, "Dropping malformed frame");
                    }
                    Some(Err(err)) => return SessionEnd::Disconnected(err),
                    None => return SessionEnd::Disconnected(SyncError::Closed),
                },
                control = self.control.recv() => match control {
                    Some(control) => {
                        if let Err(err) = self.handle(conn, control).await {
                            return SessionEnd::Disconnected(err);
                        }
                    }
                    None => return SessionEnd::Shutdown,
                },
            }
        }
    }

    async fn dispatch(&mut self, envelope: PushEnvelope) {
        if *self.state.borrow() == ConnectionState::Syncing {
            self.set_state(ConnectionState::Live);
        }
        let forward = match &envelope.message {
            PushMessage::ChatMessage(chat) => Some(Forward::Chat(chat.clone())),
            PushMessage::Notification(note) => Some(Forward::Notification(note.clone())),
            _ => None,
        };

        let sequence = envelope.sequence;
        let kind = envelope.message.kind();
        let outcome = {
            let mut world = self.store.write().await;
            self.reconciler
                .apply_canonical(&mut world, envelope, Utc::now())
        };
        match outcome {
            Ok(ReconcileOutcome::Forwarded) => match forward {
                Some(Forward::Chat(chat)) => {
                    self.chat.send(chat).unwrap_or(0);
                }
                Some(Forward::Notification(note)) => {
                    self.notifications.send(note).unwrap_or(0);
                }
                None => {}
            },
            Ok(ReconcileOutcome::Corrected(correction)) => {
                self.corrections.send(*correction).unwrap_or(0);
            }
            Ok(ReconcileOutcome::Resynced { discarded }) => {
                debug!(sequence, discarded = discarded.len(), "Snapshot applied");
            }
            Ok(_) => {}
            Err(err) => warn!(sequence, kind, error = %err, "Canonical update not applied"),
        }
    }

    async fn handle(&mut self, conn: &mut T::Connection, control: Control) -> Result<(), SyncError> {
        match control {
            Control::Submit {
                op_id,
                command,
                reply,
            } => {
                let result = {
                    let mut world = self.store.write().await;
                    self.reconciler.submit(&mut world, op_id, &command, Utc::now())
                };
                let accepted = result.is_ok();
                if let Err(err) = &result {
                    debug!(op_id = %op_id, reason = %err, "Intent rejected locally");
                }
                if reply.send(result).is_err() {
                    debug!(op_id = %op_id, "Submitter went away before the reply");
                }
                if accepted {
                    conn.send(OutboundFrame::Intent { op_id, command }).await?;
                }
            }
            Control::Rollback { op_id, reply } => {
                let result = {
                    let mut world = self.store.write().await;
                    self.reconciler.rollback(&mut world, op_id, Utc::now())
                };
                if reply.send(result).is_err() {
                    debug!(op_id = %op_id, "Rollback requester went away");
                }
            }
        }
        Ok(())
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.send_replace(state);
    }
}
