//! Inbound and outbound WebSocket message type definitions.
//!
//! Every frame is a JSON object tagged by `type`, with camelCase fields.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use chet_core::error::{AppError, ErrorKind};
use chet_core::types::MessageId;

use super::chat::{ChannelMessage, PrivateMessage, Reactions};
use crate::identity::Role;
use crate::moderation::BanScope;
use crate::presence::PresenceEntry;

/// Messages sent by the client to the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum InboundMessage {
    /// Claim a display name.
    Join {
        display_name: String,
        #[serde(default)]
        stable_id: Option<String>,
        #[serde(default)]
        secrets: Vec<String>,
    },
    /// Post to a public channel.
    PostMessage {
        channel: String,
        #[serde(default)]
        body: String,
        #[serde(default)]
        reply_to: Option<MessageId>,
        #[serde(default)]
        image: Option<String>,
    },
    /// Fetch a channel's history.
    RequestHistory { channel: String },
    /// Typing indicator.
    Typing { channel: String, is_typing: bool },
    /// Ask another identity for a private session.
    RequestPrivateChat { target_name: String },
    /// Answer a pending private session request.
    RespondPrivateChat {
        requester_name: String,
        accepted: bool,
    },
    /// Post into a private session.
    PostPrivateMessage {
        session_id: String,
        #[serde(default)]
        body: String,
        #[serde(default)]
        image: Option<String>,
    },
    /// Fetch a private session's history.
    RequestPrivateHistory { session_id: String },
    /// Add a reaction to a channel or private message.
    ReactAdd(ReactionRequest),
    /// Remove a reaction from a channel or private message.
    ReactRemove(ReactionRequest),
    ModKick(ModerationRequest),
    ModBan(ModerationRequest),
    ModUnban(ModerationRequest),
    ModMute(ModerationRequest),
    ModUnmute(ModerationRequest),
    ModTimeout(ModerationRequest),
    ModUntimeout(ModerationRequest),
    /// Present a role secret after joining.
    Elevate { secret: String },
}

impl InboundMessage {
    /// Short frame name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Join { .. } => "join",
            Self::PostMessage { .. } => "postMessage",
            Self::RequestHistory { .. } => "requestHistory",
            Self::Typing { .. } => "typing",
            Self::RequestPrivateChat { .. } => "requestPrivateChat",
            Self::RespondPrivateChat { .. } => "respondPrivateChat",
            Self::PostPrivateMessage { .. } => "postPrivateMessage",
            Self::RequestPrivateHistory { .. } => "requestPrivateHistory",
            Self::ReactAdd(_) => "reactAdd",
            Self::ReactRemove(_) => "reactRemove",
            Self::ModKick(_) => "modKick",
            Self::ModBan(_) => "modBan",
            Self::ModUnban(_) => "modUnban",
            Self::ModMute(_) => "modMute",
            Self::ModUnmute(_) => "modUnmute",
            Self::ModTimeout(_) => "modTimeout",
            Self::ModUntimeout(_) => "modUntimeout",
            Self::Elevate { .. } => "elevate",
        }
    }
}

/// Target of a reaction: a channel message or a private message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionRequest {
    pub message_id: MessageId,
    pub emoji: String,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Parameters shared by every moderation frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModerationRequest {
    /// Target display name (or an IP address for `modUnban`).
    pub target: String,
    /// Absent means "forever".
    #[serde(default)]
    pub duration_seconds: Option<u64>,
    #[serde(default)]
    pub scope: Option<BanScope>,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Messages sent by the server to the client.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum OutboundMessage {
    /// Join accepted.
    Joined {
        display_name: String,
        stable_id: String,
        role: Role,
        color: String,
        channels: Vec<String>,
    },
    /// Rejected by a ban; the Session is closed afterwards.
    Banned {
        reason: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        remaining_seconds: Option<u64>,
    },
    /// A new channel message.
    Message(ChannelMessage),
    /// A failed request, reported to its sender only.
    Error {
        kind: ErrorKind,
        reason: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        remaining_seconds: Option<u64>,
    },
    History {
        channel: String,
        messages: Vec<ChannelMessage>,
    },
    Typing {
        channel: String,
        display_name: String,
        is_typing: bool,
    },
    PrivateChatRequest { from: String },
    PrivateChatAccepted { session_id: String, with: String },
    PrivateChatRejected { by: String },
    PrivateMessage(PrivateMessage),
    PrivateHistory {
        session_id: String,
        messages: Vec<PrivateMessage>,
    },
    ReactionUpdate {
        message_id: MessageId,
        #[serde(skip_serializing_if = "Option::is_none")]
        channel: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        session_id: Option<String>,
        reactions: Reactions,
    },
    /// Outcome of a moderation frame, sent to the actor.
    AdminActionResult { ok: bool, message: String },
    /// The recipient's own mute/timeout state after a moderation change.
    ModerationStatus {
        muted: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        muted_until: Option<DateTime<Utc>>,
        timed_out: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        timed_out_until: Option<DateTime<Utc>>,
        by: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    /// Removed by a moderator; the Session is closed afterwards.
    Kicked {
        by: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    /// Current member list.
    Presence { members: Vec<PresenceEntry> },
    /// Another Session with the same stable id took over this name.
    SessionReplaced,
    RoleUpdated { role: Role },
}

impl OutboundMessage {
    /// Build the `error` frame reported to a client for a failed request.
    pub fn from_error(err: &AppError) -> Self {
        Self::Error {
            kind: err.kind,
            reason: err.message.clone(),
            remaining_seconds: err.remaining_seconds,
        }
    }
}
