//! Admin moderation actions against identities and Sessions.

use tracing::info;

use chet_core::error::AppError;

use crate::identity::{Member, Role, can_moderate};
use crate::message::{ModerationRequest, OutboundMessage};
use crate::moderation::{BanScope, ModerationAction};
use crate::server::ChatHub;

impl ChatHub {
    /// Applies a moderation action and reports the outcome to the actor.
    pub(crate) fn moderate(
        &self,
        actor: &Member,
        action: ModerationAction,
        request: ModerationRequest,
    ) -> Result<(), AppError> {
        let result = self.apply_moderation(actor, action, &request);
        let reply = match &result {
            Ok(message) => {
                self.metrics.moderation_action();
                info!(
                    actor = %actor.display_name,
                    target = %request.target,
                    action = %action,
                    duration_seconds = ?request.duration_seconds,
                    "Moderation action applied"
                );
                OutboundMessage::AdminActionResult {
                    ok: true,
                    message: message.clone(),
                }
            }
            Err(err) => {
                info!(
                    actor = %actor.display_name,
                    target = %request.target,
                    action = %action,
                    error = %err,
                    "Moderation action refused"
                );
                OutboundMessage::AdminActionResult {
                    ok: false,
                    message: err.message.clone(),
                }
            }
        };
        self.dispatcher.send_to_conn(&actor.conn_id, &reply);
        Ok(())
    }

    fn apply_moderation(
        &self,
        actor: &Member,
        action: ModerationAction,
        request: &ModerationRequest,
    ) -> Result<String, AppError> {
        if !actor.role.is_admin() {
            return Err(AppError::authorization("Only admins can moderate"));
        }

        let target = request.target.trim();
        if target.is_empty() {
            return Err(AppError::validation("Moderation target is empty"));
        }

        // Unbanning an address is not tied to any identity's role.
        let is_address =
            action == ModerationAction::Unban && target.parse::<std::net::IpAddr>().is_ok();
        let target_role = if is_address {
            Role::None
        } else {
            self.registry.role_of(target)
        };
        if !can_moderate(actor.role, target_role) {
            return Err(AppError::authorization(format!(
                "You cannot {action} '{target}'"
            )));
        }

        let by = actor.display_name.as_str();
        let reason = request.reason.clone();
        let duration = request.duration_seconds;

        match action {
            ModerationAction::Kick => {
                let member = self
                    .registry
                    .by_name(target)
                    .ok_or_else(|| AppError::not_found(format!("'{target}' is not online")))?;
                self.terminate(
                    &member.conn_id,
                    &OutboundMessage::Kicked {
                        by: by.to_string(),
                        reason,
                    },
                );
                Ok(format!("Kicked {target}"))
            }
            ModerationAction::Ban => {
                let online = self.registry.by_name(target);
                let origin = online
                    .as_ref()
                    .and_then(|m| self.pool.get(&m.conn_id))
                    .map(|handle| handle.origin);

                let scope = request.scope.unwrap_or_default();
                let record = match scope {
                    BanScope::Name => self.moderation.ban(Some(target), None, duration, reason, by),
                    BanScope::Origin => {
                        let origin = origin.ok_or_else(|| {
                            AppError::not_found(format!(
                                "'{target}' is not online; an origin ban needs a live Session"
                            ))
                        })?;
                        self.moderation.ban(None, Some(origin), duration, reason, by)
                    }
                    BanScope::Both => self.moderation.ban(Some(target), origin, duration, reason, by),
                };

                if let Some(member) = online {
                    self.terminate(
                        &member.conn_id,
                        &OutboundMessage::Banned {
                            reason: record.describe(),
                            remaining_seconds: record.expiry.remaining_seconds(self.clock.now()),
                        },
                    );
                }
                Ok(match duration {
                    Some(secs) => format!("Banned {target} for {secs}s"),
                    None => format!("Banned {target}"),
                })
            }
            ModerationAction::Unban => {
                if !self.moderation.unban(target) {
                    return Err(AppError::not_found(format!("'{target}' is not banned")));
                }
                Ok(format!("Unbanned {target}"))
            }
            ModerationAction::Mute => {
                self.moderation.mute(target, duration, reason, by);
                self.notify_penalties(target, by, request.reason.clone());
                Ok(match duration {
                    Some(secs) => format!("Muted {target} for {secs}s"),
                    None => format!("Muted {target}"),
                })
            }
            ModerationAction::Unmute => {
                if !self.moderation.unmute(target) {
                    return Err(AppError::not_found(format!("'{target}' is not muted")));
                }
                self.notify_penalties(target, by, reason);
                Ok(format!("Unmuted {target}"))
            }
            ModerationAction::Timeout => {
                self.moderation.timeout(target, duration, reason, by);
                self.notify_penalties(target, by, request.reason.clone());
                Ok(match duration {
                    Some(secs) => format!("Timed out {target} for {secs}s"),
                    None => format!("Timed out {target}"),
                })
            }
            ModerationAction::Untimeout => {
                if !self.moderation.untimeout(target) {
                    return Err(AppError::not_found(format!("'{target}' is not timed out")));
                }
                self.notify_penalties(target, by, reason);
                Ok(format!("Lifted timeout on {target}"))
            }
        }
    }

    /// Tells `target` its new mute/timeout state and republishes presence.
    fn notify_penalties(&self, target: &str, by: &str, reason: Option<String>) {
        let penalties = self.moderation.penalties(target);
        self.dispatcher.send_to(
            target,
            &OutboundMessage::ModerationStatus {
                muted: penalties.muted.is_some(),
                muted_until: penalties.muted.and_then(|e| e.until()),
                timed_out: penalties.timed_out.is_some(),
                timed_out_until: penalties.timed_out.and_then(|e| e.until()),
                by: by.to_string(),
                reason,
            },
        );
        self.presence.publish();
    }
}
