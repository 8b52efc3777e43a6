//! Stored chat messages and their reaction sets.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::Serialize;

use chet_core::types::MessageId;

/// Emoji → display names that reacted with it.
pub type Reactions = BTreeMap<String, BTreeSet<String>>;

/// Add or remove `actor`'s reaction. Returns whether anything changed.
///
/// Emoji left with no reactors are removed entirely.
pub fn apply_reaction(reactions: &mut Reactions, emoji: &str, actor: &str, add: bool) -> bool {
    if add {
        return reactions
            .entry(emoji.to_string())
            .or_default()
            .insert(actor.to_string());
    }

    let Some(actors) = reactions.get_mut(emoji) else {
        return false;
    };
    let removed = actors.remove(actor);
    if actors.is_empty() {
        reactions.remove(emoji);
    }
    removed
}

/// A message stored in a channel log.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelMessage {
    pub id: MessageId,
    pub channel: String,
    pub author: String,
    /// Author's display color at posting time.
    pub color: String,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<MessageId>,
    pub created_at: DateTime<Utc>,
    pub reactions: Reactions,
}

/// A message stored in a private session log.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrivateMessage {
    pub id: MessageId,
    pub session_id: String,
    pub author: String,
    pub color: String,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub reactions: Reactions,
}

/// Author-supplied content shared by channel and private posts.
#[derive(Debug, Clone)]
pub struct Draft {
    pub author: String,
    pub color: String,
    pub body: String,
    pub image: Option<String>,
}
