//! Top-level chat hub that ties together all subsystems.

use std::net::IpAddr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use chet_core::config::HubConfig;
use chet_core::error::AppError;
use chet_core::types::{ConnectionId, MessageId};

use crate::channel::ChannelStore;
use crate::clock::Clock;
use crate::connection::{ConnectionHandle, ConnectionPool, OutboundFrame};
use crate::dispatch::Dispatcher;
use crate::identity::sanitize::sanitize_name;
use crate::identity::{IdentityRegistry, Member, SecretAuthenticator};
use crate::message::validator;
use crate::message::{Draft, InboundMessage, OutboundMessage, ReactionRequest};
use crate::metrics::{MetricsSnapshot, RealtimeMetrics};
use crate::moderation::{ModerationAction, ModerationEngine};
use crate::presence::PresencePublisher;
use crate::private::{PrivateDirectory, RequestOutcome};

/// Longest accepted client-supplied stable id.
const MAX_STABLE_ID_CHARS: usize = 64;

/// Central chat engine coordinating every hub component.
///
/// Cheap to clone; all state is shared.
#[derive(Clone)]
pub struct ChatHub {
    pub(crate) config: Arc<HubConfig>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) pool: Arc<ConnectionPool>,
    pub(crate) registry: Arc<IdentityRegistry>,
    pub(crate) channels: Arc<ChannelStore>,
    pub(crate) moderation: Arc<ModerationEngine>,
    pub(crate) private: Arc<PrivateDirectory>,
    pub(crate) dispatcher: Dispatcher,
    pub(crate) presence: Arc<PresencePublisher>,
    pub(crate) authenticator: SecretAuthenticator,
    pub(crate) metrics: Arc<RealtimeMetrics>,
    shutdown: CancellationToken,
}

impl std::fmt::Debug for ChatHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatHub")
            .field("connections", &self.pool.connection_count())
            .field("members", &self.registry.len())
            .finish()
    }
}

impl ChatHub {
    /// Creates a hub with every component wired together.
    pub fn new(config: HubConfig, clock: Arc<dyn Clock>) -> Self {
        let metrics = Arc::new(RealtimeMetrics::new());
        let pool = Arc::new(ConnectionPool::new());
        let registry = Arc::new(IdentityRegistry::new(config.max_name_chars));
        let channels = Arc::new(ChannelStore::new(
            &config.channels,
            config.channel_history_capacity,
        ));
        let moderation = Arc::new(ModerationEngine::new(clock.clone()));
        let private = Arc::new(PrivateDirectory::new(config.private_history_capacity));
        let dispatcher = Dispatcher::new(pool.clone(), registry.clone(), metrics.clone());
        let presence = Arc::new(PresencePublisher::new(
            registry.clone(),
            moderation.clone(),
            dispatcher.clone(),
        ));
        let authenticator = SecretAuthenticator::new(config.secrets.clone());

        info!(channels = ?config.channels, "Chat hub initialized");

        Self {
            config: Arc::new(config),
            clock,
            pool,
            registry,
            channels,
            moderation,
            private,
            dispatcher,
            presence,
            authenticator,
            metrics,
            shutdown: CancellationToken::new(),
        }
    }

    /// Registers a new Session from `origin`.
    ///
    /// A banned origin gets one `banned` frame and a closed handle that is
    /// never added to the pool.
    pub fn connect(&self, origin: IpAddr) -> (Arc<ConnectionHandle>, mpsc::Receiver<OutboundFrame>) {
        let (tx, rx) = mpsc::channel(self.config.outbound_buffer);
        let handle = Arc::new(ConnectionHandle::new(origin, self.clock.now(), tx));

        if let Some(ban) = self.moderation.origin_ban(&origin) {
            info!(conn_id = %handle.id, origin = %origin, "Rejected connection from banned origin");
            self.dispatcher.send_to_session(
                &handle,
                &OutboundMessage::Banned {
                    reason: ban.describe(),
                    remaining_seconds: ban.expiry.remaining_seconds(self.clock.now()),
                },
            );
            handle.close();
            return (handle, rx);
        }

        if self.shutdown.is_cancelled() {
            handle.close();
            return (handle, rx);
        }

        self.pool.add(handle.clone());
        self.metrics.connection_opened();
        info!(conn_id = %handle.id, origin = %origin, "Session connected");
        (handle, rx)
    }

    /// Unregisters a Session. A second call for the same id is a no-op.
    pub fn disconnect(&self, conn_id: &ConnectionId) {
        let Some(handle) = self.pool.remove(conn_id) else {
            return;
        };
        handle.mark_dead();
        self.metrics.connection_closed();

        match self.registry.unbind(conn_id) {
            Some(member) => {
                self.private.forget_pending(&member.display_name);
                self.presence.publish();
                info!(conn_id = %conn_id, name = %member.display_name, "Member left");
            }
            None => debug!(conn_id = %conn_id, "Session disconnected before joining"),
        }
    }

    /// Processes one raw inbound text frame.
    pub fn handle_text(&self, conn_id: &ConnectionId, raw: &str) {
        let parsed = validator::validate_inbound(raw, self.config.max_frame_bytes).and_then(|_| {
            serde_json::from_str::<InboundMessage>(raw)
                .map_err(|e| AppError::validation(format!("Invalid message: {e}")))
        });

        match parsed {
            Ok(message) => self.handle_inbound(conn_id, message),
            Err(err) => {
                self.metrics.frame_received();
                debug!(conn_id = %conn_id, error = %err, "Rejected inbound frame");
                self.dispatcher
                    .send_to_conn(conn_id, &OutboundMessage::from_error(&err));
            }
        }
    }

    /// Processes one parsed inbound frame.
    pub fn handle_inbound(&self, conn_id: &ConnectionId, message: InboundMessage) {
        let Some(handle) = self.pool.get(conn_id) else {
            warn!(conn_id = %conn_id, "Message from unknown connection");
            return;
        };
        self.metrics.frame_received();
        debug!(conn_id = %conn_id, kind = message.kind(), "Inbound frame");

        let result = match message {
            InboundMessage::Join {
                display_name,
                stable_id,
                secrets,
            } => self.join(&handle, &display_name, stable_id, &secrets),
            other => match self.registry.by_conn(conn_id) {
                Some(member) => self.handle_member(&member, other),
                None => Err(AppError::authentication("Join before sending other frames")),
            },
        };

        if let Err(err) = result {
            self.dispatcher
                .send_to_session(&handle, &OutboundMessage::from_error(&err));
        }
    }

    fn handle_member(&self, member: &Member, message: InboundMessage) -> Result<(), AppError> {
        match message {
            InboundMessage::Join { .. } => Err(AppError::conflict("Session has already joined")),
            InboundMessage::PostMessage {
                channel,
                body,
                reply_to,
                image,
            } => self.post(member, &channel, &body, reply_to, image),
            InboundMessage::RequestHistory { channel } => self.history(member, &channel),
            InboundMessage::Typing { channel, is_typing } => {
                self.typing(member, &channel, is_typing)
            }
            InboundMessage::RequestPrivateChat { target_name } => {
                self.request_private(member, &target_name)
            }
            InboundMessage::RespondPrivateChat {
                requester_name,
                accepted,
            } => self.respond_private(member, &requester_name, accepted),
            InboundMessage::PostPrivateMessage {
                session_id,
                body,
                image,
            } => self.post_private(member, &session_id, &body, image),
            InboundMessage::RequestPrivateHistory { session_id } => {
                self.private_history(member, &session_id)
            }
            InboundMessage::ReactAdd(request) => self.react(member, request, true),
            InboundMessage::ReactRemove(request) => self.react(member, request, false),
            InboundMessage::ModKick(request) => {
                self.moderate(member, ModerationAction::Kick, request)
            }
            InboundMessage::ModBan(request) => self.moderate(member, ModerationAction::Ban, request),
            InboundMessage::ModUnban(request) => {
                self.moderate(member, ModerationAction::Unban, request)
            }
            InboundMessage::ModMute(request) => {
                self.moderate(member, ModerationAction::Mute, request)
            }
            InboundMessage::ModUnmute(request) => {
                self.moderate(member, ModerationAction::Unmute, request)
            }
            InboundMessage::ModTimeout(request) => {
                self.moderate(member, ModerationAction::Timeout, request)
            }
            InboundMessage::ModUntimeout(request) => {
                self.moderate(member, ModerationAction::Untimeout, request)
            }
            InboundMessage::Elevate { secret } => self.elevate(member, &secret),
        }
    }

    fn join(
        &self,
        handle: &Arc<ConnectionHandle>,
        requested: &str,
        stable_id: Option<String>,
        secrets: &[String],
    ) -> Result<(), AppError> {
        if self.registry.by_conn(&handle.id).is_some() {
            return Err(AppError::conflict("Session has already joined"));
        }

        let name = sanitize_name(requested, self.config.max_name_chars);
        let ban = self
            .moderation
            .origin_ban(&handle.origin)
            .or_else(|| self.moderation.name_ban(&name));
        if let Some(ban) = ban {
            info!(conn_id = %handle.id, name = %name, "Rejected join from banned identity");
            self.terminate(
                &handle.id,
                &OutboundMessage::Banned {
                    reason: ban.describe(),
                    remaining_seconds: ban.expiry.remaining_seconds(self.clock.now()),
                },
            );
            return Ok(());
        }

        let stable_id = stable_id
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty() && s.chars().count() <= MAX_STABLE_ID_CHARS)
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let role = self.authenticator.authenticate(secrets);

        let outcome = self.registry.bind(handle.id, &name, &stable_id, role)?;
        let member = outcome.member;

        if member.display_name != name {
            if let Some(ban) = self.moderation.name_ban(&member.display_name) {
                self.terminate(
                    &handle.id,
                    &OutboundMessage::Banned {
                        reason: ban.describe(),
                        remaining_seconds: ban.expiry.remaining_seconds(self.clock.now()),
                    },
                );
                return Ok(());
            }
        }

        if let Some(previous) = outcome.evicted {
            info!(conn_id = %previous, name = %member.display_name, "Session replaced by reconnect");
            self.dispatcher
                .send_to_conn(&previous, &OutboundMessage::SessionReplaced);
            if let Some(old) = self.pool.remove(&previous) {
                old.close();
                self.metrics.connection_closed();
            }
            self.private.forget_pending(&member.display_name);
        }

        self.dispatcher.send_to_session(
            handle,
            &OutboundMessage::Joined {
                display_name: member.display_name.clone(),
                stable_id: member.stable_id.clone(),
                role: member.role,
                color: member.color.clone(),
                channels: self.channels.names().to_vec(),
            },
        );
        if !self.presence.publish() {
            self.presence.send_current(&handle.id);
        }

        info!(
            conn_id = %handle.id,
            name = %member.display_name,
            role = %member.role,
            "Member joined"
        );
        Ok(())
    }

    fn post(
        &self,
        member: &Member,
        channel: &str,
        body: &str,
        reply_to: Option<MessageId>,
        image: Option<String>,
    ) -> Result<(), AppError> {
        self.moderation.may_post(&member.display_name).into_result()?;
        let body = validator::validate_content(body, image.as_deref(), &self.config)?;

        let draft = Draft {
            author: member.display_name.clone(),
            color: member.color.clone(),
            body,
            image,
        };
        self.channels
            .post(channel, draft, reply_to, self.clock.now(), |message| {
                self.dispatcher
                    .broadcast_all(&OutboundMessage::Message(message.clone()), None);
            })?;
        self.metrics.message_posted();
        Ok(())
    }

    fn history(&self, member: &Member, channel: &str) -> Result<(), AppError> {
        let messages = self.channels.history(channel)?;
        self.dispatcher.send_to_conn(
            &member.conn_id,
            &OutboundMessage::History {
                channel: channel.to_string(),
                messages,
            },
        );
        Ok(())
    }

    fn typing(&self, member: &Member, channel: &str, is_typing: bool) -> Result<(), AppError> {
        self.moderation
            .may_interact(&member.display_name)
            .into_result()?;
        if !self.channels.contains(channel) {
            return Err(AppError::not_found(format!("Unknown channel '{channel}'")));
        }

        self.dispatcher.broadcast_all(
            &OutboundMessage::Typing {
                channel: channel.to_string(),
                display_name: member.display_name.clone(),
                is_typing,
            },
            Some(member.conn_id),
        );
        Ok(())
    }

    fn request_private(&self, member: &Member, target: &str) -> Result<(), AppError> {
        let from = member.display_name.as_str();
        let target_key = if from == target {
            member.key()
        } else {
            self.registry
                .by_name(target)
                .map(|m| m.key())
                .ok_or_else(|| AppError::not_found(format!("'{target}' is not online")))?
        };

        match self.private.request(&member.key(), &target_key)? {
            RequestOutcome::AlreadyOpen(session_id) => {
                self.notify_accepted(&session_id, from, target);
            }
            RequestOutcome::Pending => {
                self.dispatcher.send_to(
                    target,
                    &OutboundMessage::PrivateChatRequest {
                        from: from.to_string(),
                    },
                );
                debug!(from = %from, to = %target, "Private chat requested");
            }
        }
        Ok(())
    }

    fn respond_private(
        &self,
        member: &Member,
        requester: &str,
        accepted: bool,
    ) -> Result<(), AppError> {
        let responder = member.display_name.as_str();
        match self.private.respond(&member.key(), requester, accepted)? {
            Some(session_id) => self.notify_accepted(&session_id, requester, responder),
            None => {
                self.dispatcher.send_to(
                    requester,
                    &OutboundMessage::PrivateChatRejected {
                        by: responder.to_string(),
                    },
                );
            }
        }
        Ok(())
    }

    fn notify_accepted(&self, session_id: &str, a: &str, b: &str) {
        for (recipient, with) in [(a, b), (b, a)] {
            self.dispatcher.send_to(
                recipient,
                &OutboundMessage::PrivateChatAccepted {
                    session_id: session_id.to_string(),
                    with: with.to_string(),
                },
            );
        }
    }

    fn post_private(
        &self,
        member: &Member,
        session_id: &str,
        body: &str,
        image: Option<String>,
    ) -> Result<(), AppError> {
        self.moderation.may_post(&member.display_name).into_result()?;
        let body = validator::validate_content(body, image.as_deref(), &self.config)?;

        let draft = Draft {
            author: member.display_name.clone(),
            color: member.color.clone(),
            body,
            image,
        };
        self.private.post(
            session_id,
            &member.key(),
            draft,
            self.clock.now(),
            |message, participants| {
                self.dispatcher.send_to_identities(
                    participants,
                    &OutboundMessage::PrivateMessage(message.clone()),
                );
            },
        )?;
        self.metrics.message_posted();
        Ok(())
    }

    fn private_history(&self, member: &Member, session_id: &str) -> Result<(), AppError> {
        let messages = self.private.history(session_id, &member.key())?;
        self.dispatcher.send_to_conn(
            &member.conn_id,
            &OutboundMessage::PrivateHistory {
                session_id: session_id.to_string(),
                messages,
            },
        );
        Ok(())
    }

    fn react(&self, member: &Member, request: ReactionRequest, add: bool) -> Result<(), AppError> {
        self.moderation
            .may_interact(&member.display_name)
            .into_result()?;
        validator::validate_emoji(&request.emoji)?;
        let actor = member.display_name.as_str();
        let actor_key = member.key();

        match (request.channel, request.session_id) {
            (Some(channel), None) => {
                self.channels.react(
                    &channel,
                    request.message_id,
                    &request.emoji,
                    actor,
                    add,
                    |reactions| {
                        self.dispatcher.broadcast_all(
                            &OutboundMessage::ReactionUpdate {
                                message_id: request.message_id,
                                channel: Some(channel.clone()),
                                session_id: None,
                                reactions: reactions.clone(),
                            },
                            None,
                        );
                    },
                )?;
            }
            (None, Some(session_id)) => {
                self.private.react(
                    &session_id,
                    request.message_id,
                    &request.emoji,
                    &actor_key,
                    add,
                    |reactions, participants| {
                        self.dispatcher.send_to_identities(
                            participants,
                            &OutboundMessage::ReactionUpdate {
                                message_id: request.message_id,
                                channel: None,
                                session_id: Some(session_id.clone()),
                                reactions: reactions.clone(),
                            },
                        );
                    },
                )?;
            }
            _ => {
                return Err(AppError::validation(
                    "A reaction needs exactly one of channel or sessionId",
                ));
            }
        }
        Ok(())
    }

    fn elevate(&self, member: &Member, secret: &str) -> Result<(), AppError> {
        let role = self.authenticator.elevate(member.role, secret)?;
        if role != member.role {
            self.registry.set_role(&member.display_name, role);
            info!(name = %member.display_name, role = %role, "Role elevated");
        }
        self.dispatcher
            .send_to_conn(&member.conn_id, &OutboundMessage::RoleUpdated { role });
        self.presence.publish();
        Ok(())
    }

    /// Sends a final frame, closes the Session, and unregisters it.
    pub(crate) fn terminate(&self, conn_id: &ConnectionId, last: &OutboundMessage) {
        self.dispatcher.send_to_conn(conn_id, last);
        if let Some(handle) = self.pool.get(conn_id) {
            handle.close();
        }
        self.disconnect(conn_id);
    }

    /// Closes every Session and refuses new ones.
    pub fn shutdown(&self) {
        info!("Shutting down chat hub");
        self.shutdown.cancel();
        for handle in self.pool.all_connections() {
            handle.close();
        }
        info!("Chat hub shut down");
    }

    /// Token cancelled when the hub shuts down.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Hub configuration.
    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    /// Current time according to the hub clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Number of open Sessions, joined or not.
    pub fn connection_count(&self) -> usize {
        self.pool.connection_count()
    }

    /// Number of joined identities.
    pub fn member_count(&self) -> usize {
        self.registry.len()
    }

    /// Metrics snapshot.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Identity registry (read access for diagnostics and tests).
    pub fn registry(&self) -> &IdentityRegistry {
        &self.registry
    }

    /// Private session directory.
    pub fn private_sessions(&self) -> &PrivateDirectory {
        &self.private
    }
}
