//! Presence publisher: recomputes and emits the member list.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

use chet_core::types::ConnectionId;

use crate::dispatch::Dispatcher;
use crate::identity::{IdentityRegistry, Role};
use crate::message::OutboundMessage;
use crate::moderation::ModerationEngine;

/// One row of the member list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceEntry {
    pub display_name: String,
    pub role: Role,
    pub color: String,
    pub muted: bool,
    pub timed_out: bool,
}

/// Publishes the member list whenever it changes.
#[derive(Debug)]
pub struct PresencePublisher {
    registry: Arc<IdentityRegistry>,
    moderation: Arc<ModerationEngine>,
    dispatcher: Dispatcher,
    /// Last published list. Held across recompute and broadcast so lists
    /// are never published out of order.
    last: Mutex<Vec<PresenceEntry>>,
}

impl PresencePublisher {
    /// Creates a publisher with an empty last-published list.
    pub fn new(
        registry: Arc<IdentityRegistry>,
        moderation: Arc<ModerationEngine>,
        dispatcher: Dispatcher,
    ) -> Self {
        Self {
            registry,
            moderation,
            dispatcher,
            last: Mutex::new(Vec::new()),
        }
    }

    /// Current member list: Owner, then Admin, then everyone else, each
    /// group by display name.
    pub fn recompute(&self) -> Vec<PresenceEntry> {
        let mut entries: Vec<PresenceEntry> = self
            .registry
            .members()
            .into_iter()
            .map(|member| {
                let penalties = self.moderation.penalties(&member.display_name);
                PresenceEntry {
                    display_name: member.display_name,
                    role: member.role,
                    color: member.color,
                    muted: penalties.muted.is_some(),
                    timed_out: penalties.timed_out.is_some(),
                }
            })
            .collect();

        entries.sort_by(|a, b| {
            a.role
                .presence_rank()
                .cmp(&b.role.presence_rank())
                .then_with(|| a.display_name.cmp(&b.display_name))
        });
        entries
    }

    /// Broadcasts the member list if it differs from the last one sent.
    ///
    /// Returns whether a broadcast happened.
    pub fn publish(&self) -> bool {
        let mut last = self.last.lock();
        let current = self.recompute();
        if *last == current {
            return false;
        }

        self.dispatcher.broadcast_all(
            &OutboundMessage::Presence {
                members: current.clone(),
            },
            None,
        );
        tracing::debug!(members = current.len(), "Presence published");
        *last = current;
        true
    }

    /// Sends the current member list to one Session.
    pub fn send_current(&self, conn_id: &ConnectionId) -> bool {
        let last = self.last.lock();
        self.dispatcher.send_to_conn(
            conn_id,
            &OutboundMessage::Presence {
                members: last.clone(),
            },
        )
    }
}
