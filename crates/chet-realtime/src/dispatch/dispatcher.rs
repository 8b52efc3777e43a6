//! Fan-out and point-to-point delivery of outbound frames.
//!
//! Delivery is best effort. Each frame is serialized once and enqueued into
//! every recipient's bounded queue with `try_send`; a full or closed queue
//! loses that frame for that recipient only.

use std::sync::Arc;

use chet_core::types::ConnectionId;

use crate::connection::{ConnectionHandle, ConnectionPool, OutboundFrame};
use crate::identity::{IdentityKey, IdentityRegistry};
use crate::message::OutboundMessage;
use crate::metrics::RealtimeMetrics;

/// Routes outbound frames to Sessions.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    pool: Arc<ConnectionPool>,
    registry: Arc<IdentityRegistry>,
    metrics: Arc<RealtimeMetrics>,
}

impl Dispatcher {
    /// Creates a dispatcher over the given pool and registry.
    pub fn new(
        pool: Arc<ConnectionPool>,
        registry: Arc<IdentityRegistry>,
        metrics: Arc<RealtimeMetrics>,
    ) -> Self {
        Self {
            pool,
            registry,
            metrics,
        }
    }

    /// Serializes a frame once for sharing between recipients.
    pub fn encode(message: &OutboundMessage) -> Option<OutboundFrame> {
        match serde_json::to_string(message) {
            Ok(text) => Some(OutboundFrame::Text(text.into())),
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize outbound frame");
                None
            }
        }
    }

    fn deliver(&self, handle: &ConnectionHandle, frame: OutboundFrame) -> bool {
        let delivered = handle.send(frame);
        self.metrics.frame_delivered(delivered);
        delivered
    }

    /// Sends to every joined Session except `exclude`. Returns the number of
    /// Sessions the frame was enqueued for.
    pub fn broadcast_all(&self, message: &OutboundMessage, exclude: Option<ConnectionId>) -> usize {
        let Some(frame) = Self::encode(message) else {
            return 0;
        };

        self.registry
            .members()
            .into_iter()
            .filter(|member| Some(member.conn_id) != exclude)
            .filter_map(|member| self.pool.get(&member.conn_id))
            .filter(|handle| self.deliver(handle, frame.clone()))
            .count()
    }

    /// Sends to the Session bound to `name`. Returns whether it was enqueued.
    pub fn send_to(&self, name: &str, message: &OutboundMessage) -> bool {
        match self.registry.by_name(name) {
            Some(member) => self.send_to_conn(&member.conn_id, message),
            None => false,
        }
    }

    /// Sends one shared frame to each identity that still holds its name.
    ///
    /// A name now held by a different stable id is skipped.
    pub fn send_to_identities<'a>(
        &self,
        keys: impl IntoIterator<Item = &'a IdentityKey>,
        message: &OutboundMessage,
    ) -> usize {
        let Some(frame) = Self::encode(message) else {
            return 0;
        };

        keys.into_iter()
            .filter_map(|key| self.registry.resolve(key))
            .filter_map(|member| self.pool.get(&member.conn_id))
            .filter(|handle| self.deliver(handle, frame.clone()))
            .count()
    }

    /// Sends to a Session by connection id, joined or not.
    pub fn send_to_conn(&self, conn_id: &ConnectionId, message: &OutboundMessage) -> bool {
        match self.pool.get(conn_id) {
            Some(handle) => self.send_to_session(&handle, message),
            None => false,
        }
    }

    /// Sends directly to a Session handle, joined or not.
    pub fn send_to_session(&self, handle: &ConnectionHandle, message: &OutboundMessage) -> bool {
        match Self::encode(message) {
            Some(frame) => self.deliver(handle, frame),
            None => false,
        }
    }
}
