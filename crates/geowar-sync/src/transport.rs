//! Push-channel transports.
//!
//! [`PushTransport`] dials a connection; [`PushConnection`] moves JSON
//! frames in both directions. [`WsTransport`] speaks WebSocket through
//! `tokio-tungstenite`. [`LoopbackTransport`] is an in-process peer with a
//! scripted accept/refuse plan, used by tests and offline runs.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};

use futures::{SinkExt, StreamExt as _};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, mpsc};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::debug;

use geowar_types::{OutboundFrame, PushEnvelope};

use crate::error::SyncError;

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// An open, bidirectional push channel.
pub trait PushConnection: Send {
    /// Next inbound frame. `None` once the peer has closed the channel.
    fn recv(&mut self) -> impl Future<Output = Option<Result<PushEnvelope, SyncError>>> + Send;

    /// Send one outbound frame.
    fn send(&mut self, frame: OutboundFrame) -> impl Future<Output = Result<(), SyncError>> + Send;
}

/// Something that can open a [`PushConnection`].
pub trait PushTransport: Send + Sync {
    /// Connection type produced by [`PushTransport::connect`].
    type Connection: PushConnection;

    /// Open a new connection.
    fn connect(&self) -> impl Future<Output = Result<Self::Connection, SyncError>> + Send;
}

// ---------------------------------------------------------------------------
// WebSocket
// ---------------------------------------------------------------------------

/// WebSocket transport carrying JSON text frames.
#[derive(Debug, Clone)]
pub struct WsTransport {
    url: String,
}

impl WsTransport {
    /// Create a transport for `url` (`ws://` or `wss://`).
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    /// Endpoint this transport dials.
    pub fn url(&self) -> &str {
        &self.url
    }
}

/// An open WebSocket push channel.
#[derive(Debug)]
pub struct WsConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl PushTransport for WsTransport {
    type Connection = WsConnection;

    async fn connect(&self) -> Result<WsConnection, SyncError> {
        let (stream, response) =
            connect_async(self.url.as_str())
                .await
                .map_err(|source| SyncError::Connect {
                    url: self.url.clone(),
                    source: Box::new(source),
                })?;
        debug!(url = %self.url, status = %response.status(), "WebSocket handshake complete");
        Ok(WsConnection { stream })
    }
}

impl PushConnection for WsConnection {
    async fn recv(&mut self) -> Option<Result<PushEnvelope, SyncError>> {
        loop {
            let message = match self.stream.next().await? {
                Ok(message) => message,
                Err(source) => {
                    return Some(Err(SyncError::Transport {
                        source: Box::new(source),
                    }));
                }
            };
            match message {
                Message::Text(text) => {
                    return Some(serde_json::from_str(text.as_str()).map_err(SyncError::from));
                }
                Message::Binary(bytes) => {
                    return Some(serde_json::from_slice(&bytes).map_err(SyncError::from));
                }
                Message::Close(frame) => {
                    debug!(?frame, "Peer closed the push channel");
                    return None;
                }
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
            }
        }
    }

    async fn send(&mut self, frame: OutboundFrame) -> Result<(), SyncError> {
        let text = serde_json::to_string(&frame)?;
        self.stream
            .send(Message::text(text))
            .await
            .map_err(|source| SyncError::Transport {
                source: Box::new(source),
            })
    }
}

// ---------------------------------------------------------------------------
// Loopback
// ---------------------------------------------------------------------------

/// What the loopback transport does on one connection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectPlan {
    /// Fail the attempt.
    Refuse,
    /// Open a connection and hand the far end to the peer receiver.
    Accept,
}

/// The authority's end of a loopback connection.
///
/// Dropping it closes the connection.
#[derive(Debug)]
pub struct LoopbackPeer {
    push: mpsc::UnboundedSender<PushEnvelope>,
    frames: mpsc::UnboundedReceiver<OutboundFrame>,
}

impl LoopbackPeer {
    /// Deliver a frame to the client. Returns `false` once the client is gone.
    pub fn push(&self, envelope: PushEnvelope) -> bool {
        self.push.send(envelope).is_ok()
    }

    /// Next frame the client sent, `None` once the client is gone.
    pub async fn next_frame(&mut self) -> Option<OutboundFrame> {
        self.frames.recv().await
    }
}

/// Client end of a loopback connection.
#[derive(Debug)]
pub struct LoopbackConnection {
    inbound: mpsc::UnboundedReceiver<PushEnvelope>,
    outbound: mpsc::UnboundedSender<OutboundFrame>,
}

impl PushConnection for LoopbackConnection {
    async fn recv(&mut self) -> Option<Result<PushEnvelope, SyncError>> {
        self.inbound.recv().await.map(Ok)
    }

    async fn send(&mut self, frame: OutboundFrame) -> Result<(), SyncError> {
        if self.outbound.send(frame).is_err() {
            return Err(SyncError::Closed);
        }
        Ok(())
    }
}

/// In-process transport following a scripted plan. Attempts beyond the
/// plan are refused.
#[derive(Debug)]
pub struct LoopbackTransport {
    plan: Mutex<VecDeque<ConnectPlan>>,
    accepted: mpsc::UnboundedSender<LoopbackPeer>,
    attempts: AtomicU32,
}

impl LoopbackTransport {
    /// Create a transport and the receiver that yields each accepted peer.
    pub fn new(
        plan: impl IntoIterator<Item = ConnectPlan>,
    ) -> (Self, mpsc::UnboundedReceiver<LoopbackPeer>) {
        let (accepted, peers) = mpsc::unbounded_channel();
        let transport = Self {
            plan: Mutex::new(plan.into_iter().collect()),
            accepted,
            attempts: AtomicU32::new(0),
        };
        (transport, peers)
    }

    /// Connection attempts made so far.
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::Relaxed)
    }
}

impl PushTransport for LoopbackTransport {
    type Connection = LoopbackConnection;

    async fn connect(&self) -> Result<LoopbackConnection, SyncError> {
        self.attempts.fetch_add(1, Ordering::Relaxed);
        let step = self.plan.lock().await.pop_front();
        if step != Some(ConnectPlan::Accept) {
            return Err(SyncError::Refused);
        }

        let (push, inbound) = mpsc::unbounded_channel();
        let (outbound, frames) = mpsc::unbounded_channel();
        if self.accepted.send(LoopbackPeer { push, frames }).is_err() {
            return Err(SyncError::Refused);
        }
        Ok(LoopbackConnection { inbound, outbound })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use geowar_types::SnapshotRequest;

    use super::*;

    #[tokio::test]
    async fn loopback_follows_its_plan() {
        let (transport, mut peers) = LoopbackTransport::new([ConnectPlan::Refuse, ConnectPlan::Accept]);

        assert!(matches!(transport.connect().await, Err(SyncError::Refused)));
        let mut conn = transport.connect().await.unwrap();
        let mut peer = peers.recv().await.unwrap();
        assert!(matches!(transport.connect().await, Err(SyncError::Refused)));
        assert_eq!(transport.attempts(), 3);

        conn.send(OutboundFrame::Resync(SnapshotRequest::Full)).await.unwrap();
        assert_eq!(
            peer.next_frame().await,
            Some(OutboundFrame::Resync(SnapshotRequest::Full))
        );

        drop(peer);
        assert!(conn.recv().await.is_none());
        assert!(matches!(
            conn.send(OutboundFrame::Resync(SnapshotRequest::Full)).await,
            Err(SyncError::Closed)
        ));
    }

    #[test]
    fn ws_transport_keeps_its_url() {
        let transport = WsTransport::new("ws://127.0.0.1:9");
        assert_eq!(transport.url(), "ws://127.0.0.1:9");
    }
}
