//! Channel store: one bounded log per configured channel.
//!
//! Each log has its own mutex. `post` and `react` run the caller's publish
//! step while still holding that mutex, so every recipient observes a
//! channel's messages in append order. Publishing only enqueues into
//! per-Session queues and never waits on I/O.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use chet_core::error::AppError;
use chet_core::types::MessageId;

use super::log::BoundedLog;
use crate::message::chat::{ChannelMessage, Draft, Reactions, apply_reaction};

/// Registry of every channel log known at process start.
#[derive(Debug)]
pub struct ChannelStore {
    /// Channel name → log.
    logs: HashMap<String, Mutex<BoundedLog<ChannelMessage>>>,
    /// Channel names in configuration order.
    names: Vec<String>,
}

impl ChannelStore {
    /// Creates the store with a fixed channel set.
    pub fn new(names: &[String], capacity: usize) -> Self {
        let logs = names
            .iter()
            .map(|name| (name.clone(), Mutex::new(BoundedLog::new(capacity))))
            .collect();
        Self {
            logs,
            names: names.to_vec(),
        }
    }

    /// Channel names in configuration order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Whether `channel` exists.
    pub fn contains(&self, channel: &str) -> bool {
        self.logs.contains_key(channel)
    }

    fn log(&self, channel: &str) -> Result<&Mutex<BoundedLog<ChannelMessage>>, AppError> {
        self.logs
            .get(channel)
            .ok_or_else(|| AppError::not_found(format!("Unknown channel '{channel}'")))
    }

    /// Appends a message and publishes it under the log lock.
    pub fn post<F>(
        &self,
        channel: &str,
        draft: Draft,
        reply_to: Option<MessageId>,
        now: DateTime<Utc>,
        publish: F,
    ) -> Result<ChannelMessage, AppError>
    where
        F: FnOnce(&ChannelMessage),
    {
        let log = self.log(channel)?;
        let message = ChannelMessage {
            id: MessageId::new(),
            channel: channel.to_string(),
            author: draft.author,
            color: draft.color,
            body: draft.body,
            image: draft.image,
            reply_to,
            created_at: now,
            reactions: Reactions::new(),
        };

        let mut log = log.lock();
        log.push(message.clone());
        publish(&message);
        Ok(message)
    }

    /// Channel history, oldest-first.
    pub fn history(&self, channel: &str) -> Result<Vec<ChannelMessage>, AppError> {
        Ok(self.log(channel)?.lock().to_vec())
    }

    /// Adds or removes a reaction; publishes the new set if it changed.
    pub fn react<F>(
        &self,
        channel: &str,
        message_id: MessageId,
        emoji: &str,
        actor: &str,
        add: bool,
        publish: F,
    ) -> Result<Reactions, AppError>
    where
        F: FnOnce(&Reactions),
    {
        let mut log = self.log(channel)?.lock();
        let message = log
            .find_mut(|m| m.id == message_id)
            .ok_or_else(|| AppError::not_found("Message not found"))?;

        if apply_reaction(&mut message.reactions, emoji, actor, add) {
            publish(&message.reactions);
        }
        Ok(message.reactions.clone())
    }
}
