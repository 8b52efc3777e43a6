//! Private (1:1) session directory.
//!
//! Session ids are a pure function of the two participant names, but the
//! directory still decides existence under its own lock so two concurrent
//! acceptances for one pair resolve to a single session.
//!
//! Participants are recorded with the stable id that held each name when the
//! session opened. Whoever later claims a released name is not a participant.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use chet_core::error::AppError;
use chet_core::types::MessageId;

use crate::channel::BoundedLog;
use crate::identity::IdentityKey;
use crate::message::chat::{Draft, PrivateMessage, Reactions, apply_reaction};

/// Canonical session id for a pair of names, independent of argument order.
pub fn session_id(a: &str, b: &str) -> String {
    let (low, high) = if a <= b { (a, b) } else { (b, a) };
    format!("dm:{low}:{high}")
}

/// Result of a private chat request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestOutcome {
    /// The pair already has a session; both sides should be told its id.
    AlreadyOpen(String),
    /// The request is recorded and awaits the target's answer.
    Pending,
}

#[derive(Debug)]
struct PrivateSession {
    participants: [IdentityKey; 2],
    log: BoundedLog<PrivateMessage>,
}

impl PrivateSession {
    fn new(a: &IdentityKey, b: &IdentityKey, capacity: usize) -> Self {
        let mut participants = [a.clone(), b.clone()];
        participants.sort();
        Self {
            participants,
            log: BoundedLog::new(capacity),
        }
    }

    fn is_between(&self, a: &IdentityKey, b: &IdentityKey) -> bool {
        self.participants.contains(a) && self.participants.contains(b)
    }

    fn authorize(&self, who: &IdentityKey) -> Result<(), AppError> {
        if self.participants.contains(who) {
            Ok(())
        } else {
            Err(AppError::authorization("Not a participant of this private session"))
        }
    }
}

#[derive(Debug, Default)]
struct DirectoryState {
    sessions: HashMap<String, PrivateSession>,
    /// (requester name, target name) awaiting an answer, with the requester
    /// identity at request time.
    pending: HashMap<(String, String), IdentityKey>,
}

/// Directory of private sessions and pending requests.
#[derive(Debug)]
pub struct PrivateDirectory {
    state: Mutex<DirectoryState>,
    capacity: usize,
}

impl PrivateDirectory {
    /// Creates an empty directory whose sessions keep `capacity` messages.
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(DirectoryState::default()),
            capacity,
        }
    }

    /// Records a request from `from` to `to`, unless these two identities
    /// already share a session.
    pub fn request(&self, from: &IdentityKey, to: &IdentityKey) -> Result<RequestOutcome, AppError> {
        if from.display_name == to.display_name {
            return Err(AppError::validation("Cannot open a private chat with yourself"));
        }

        let id = session_id(&from.display_name, &to.display_name);
        let mut state = self.state.lock();
        if state
            .sessions
            .get(&id)
            .is_some_and(|session| session.is_between(from, to))
        {
            return Ok(RequestOutcome::AlreadyOpen(id));
        }
        state.pending.insert(
            (from.display_name.clone(), to.display_name.clone()),
            from.clone(),
        );
        Ok(RequestOutcome::Pending)
    }

    /// Answers the pending request from `requester` to `responder`.
    ///
    /// Returns the session id on acceptance. A session left over from
    /// earlier holders of either name is replaced.
    pub fn respond(
        &self,
        responder: &IdentityKey,
        requester: &str,
        accepted: bool,
    ) -> Result<Option<String>, AppError> {
        let mut state = self.state.lock();
        let key = (requester.to_string(), responder.display_name.clone());
        let Some(requester) = state.pending.remove(&key) else {
            return Err(AppError::not_found(format!(
                "No pending private chat request from '{requester}'"
            )));
        };
        if !accepted {
            return Ok(None);
        }

        // A crossed request in the other direction is settled too.
        state.pending.remove(&(key.1, key.0));

        let id = session_id(&requester.display_name, &responder.display_name);
        let current = state
            .sessions
            .get(&id)
            .is_some_and(|session| session.is_between(&requester, responder));
        if !current {
            state.sessions.insert(
                id.clone(),
                PrivateSession::new(&requester, responder, self.capacity),
            );
        }
        Ok(Some(id))
    }

    /// Appends a message from a participant and publishes it under the
    /// directory lock.
    pub fn post<F>(
        &self,
        session_id: &str,
        sender: &IdentityKey,
        draft: Draft,
        now: DateTime<Utc>,
        publish: F,
    ) -> Result<PrivateMessage, AppError>
    where
        F: FnOnce(&PrivateMessage, &[IdentityKey; 2]),
    {
        let mut state = self.state.lock();
        let session = state
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| AppError::not_found("Unknown private session"))?;
        session.authorize(sender)?;

        let message = PrivateMessage {
            id: MessageId::new(),
            session_id: session_id.to_string(),
            author: draft.author,
            color: draft.color,
            body: draft.body,
            image: draft.image,
            created_at: now,
            reactions: Reactions::new(),
        };
        session.log.push(message.clone());
        publish(&message, &session.participants);
        Ok(message)
    }

    /// Session history for a participant; an unknown id is empty.
    pub fn history(
        &self,
        session_id: &str,
        requester: &IdentityKey,
    ) -> Result<Vec<PrivateMessage>, AppError> {
        let state = self.state.lock();
        match state.sessions.get(session_id) {
            None => Ok(Vec::new()),
            Some(session) => {
                session.authorize(requester)?;
                Ok(session.log.to_vec())
            }
        }
    }

    /// Adds or removes a participant's reaction; publishes on change.
    pub fn react<F>(
        &self,
        session_id: &str,
        message_id: MessageId,
        emoji: &str,
        actor: &IdentityKey,
        add: bool,
        publish: F,
    ) -> Result<Reactions, AppError>
    where
        F: FnOnce(&Reactions, &[IdentityKey; 2]),
    {
        let mut state = self.state.lock();
        let session = state
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| AppError::not_found("Unknown private session"))?;
        session.authorize(actor)?;

        let PrivateSession { participants, log } = session;
        let message = log
            .find_mut(|m| m.id == message_id)
            .ok_or_else(|| AppError::not_found("Message not found"))?;
        if apply_reaction(&mut message.reactions, emoji, &actor.display_name, add) {
            publish(&message.reactions, participants);
        }
        Ok(message.reactions.clone())
    }

    /// Drops every pending request from or to `name`.
    pub fn forget_pending(&self, name: &str) {
        self.state
            .lock()
            .pending
            .retain(|(from, to), _| from != name && to != name);
    }

    /// Whether `from` has an unanswered request to `to`.
    pub fn is_pending(&self, from: &str, to: &str) -> bool {
        self.state
            .lock()
            .pending
            .contains_key(&(from.to_string(), to.to_string()))
    }

    /// Number of open sessions.
    pub fn session_count(&self) -> usize {
        self.state.lock().sessions.len()
    }
}
