//! Individual Session (WebSocket connection) handle.

use std::net::IpAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use chet_core::types::ConnectionId;

/// A frame queued for the Session's writer task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    /// Serialized JSON text, shared between every recipient of a fan-out.
    Text(Arc<str>),
    /// Close the transport after everything queued before it was written.
    Close,
}

/// A handle to a single live Session.
///
/// Holds the sender side of the Session's bounded outbound queue plus the
/// transport metadata the hub needs (network origin, creation time).
#[derive(Debug)]
pub struct ConnectionHandle {
    /// Unique connection ID
    pub id: ConnectionId,
    /// Network origin the connection came from
    pub origin: IpAddr,
    /// When the connection was established
    pub created_at: DateTime<Utc>,
    /// Sender for outbound frames
    sender: mpsc::Sender<OutboundFrame>,
    /// Cancelled once the Session is closed by the hub
    closed: CancellationToken,
    /// Whether the writer side is still accepting frames
    alive: AtomicBool,
}

impl ConnectionHandle {
    /// Create a new connection handle
    pub fn new(
        origin: IpAddr,
        created_at: DateTime<Utc>,
        sender: mpsc::Sender<OutboundFrame>,
    ) -> Self {
        Self {
            id: ConnectionId::new(),
            origin,
            created_at,
            sender,
            closed: CancellationToken::new(),
            alive: AtomicBool::new(true),
        }
    }

    /// Queue a frame without waiting.
    ///
    /// Returns `false` when the frame was dropped (queue full or Session
    /// gone). Callers treat that as a swallowed transport failure.
    pub fn send(&self, frame: OutboundFrame) -> bool {
        if !self.is_alive() {
            return false;
        }
        match self.sender.try_send(frame) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(conn_id = %self.id, "Send buffer full, dropping frame");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.mark_dead();
                false
            }
        }
    }

    /// Ask the writer to close the transport and stop accepting frames.
    ///
    /// Frames queued before this call are still written.
    pub fn close(&self) {
        if self.is_alive() {
            let _ = self.sender.try_send(OutboundFrame::Close);
        }
        self.mark_dead();
        self.closed.cancel();
    }

    /// Token cancelled once the hub closes this Session.
    pub fn closed_token(&self) -> CancellationToken {
        self.closed.clone()
    }

    /// Check if connection is alive
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Mark connection as dead
    pub fn mark_dead(&self) {
        self.alive.store(false, Ordering::SeqCst);
    }
}
