//! Moderation records and decisions.

use std::net::IpAddr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use chet_core::error::AppError;

/// When a moderation record stops applying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    /// Applies until explicitly lifted.
    Never,
    /// Applies until this instant (exclusive).
    At(DateTime<Utc>),
}

impl Expiry {
    /// `now + seconds`, or `Never` when no duration is given.
    pub fn after(now: DateTime<Utc>, seconds: Option<u64>) -> Self {
        match seconds {
            Some(secs) => {
                let secs = i64::try_from(secs).unwrap_or(i64::MAX);
                match Duration::try_seconds(secs).and_then(|d| now.checked_add_signed(d)) {
                    Some(at) => Self::At(at),
                    None => Self::Never,
                }
            }
            None => Self::Never,
        }
    }

    /// Whether the record no longer applies at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self {
            Self::Never => false,
            Self::At(at) => now >= *at,
        }
    }

    /// Whole seconds left, rounded up; `None` for `Never`.
    pub fn remaining_seconds(&self, now: DateTime<Utc>) -> Option<u64> {
        match self {
            Self::Never => None,
            Self::At(at) => {
                let millis = (*at - now).num_milliseconds().max(0);
                Some((millis as u64).div_ceil(1000))
            }
        }
    }

    /// The expiry instant, if any.
    pub fn until(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Never => None,
            Self::At(at) => Some(*at),
        }
    }
}

/// Records that lapse on their own.
pub trait Expiring {
    fn expiry(&self) -> Expiry;
}

/// A mute or timeout on one identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PenaltyRecord {
    pub expiry: Expiry,
    pub reason: Option<String>,
    pub issued_by: String,
    pub issued_at: DateTime<Utc>,
}

impl Expiring for PenaltyRecord {
    fn expiry(&self) -> Expiry {
        self.expiry
    }
}

/// Admin operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModerationAction {
    Kick,
    Ban,
    Unban,
    Mute,
    Unmute,
    Timeout,
    Untimeout,
}

impl std::fmt::Display for ModerationAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Kick => "kick",
            Self::Ban => "ban",
            Self::Unban => "unban",
            Self::Mute => "mute",
            Self::Unmute => "unmute",
            Self::Timeout => "timeout",
            Self::Untimeout => "untimeout",
        };
        f.write_str(name)
    }
}

/// What a ban is keyed by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BanScope {
    Name,
    Origin,
    #[default]
    Both,
}

/// A ban on a display name, a network origin, or both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BanRecord {
    pub name: Option<String>,
    pub origin: Option<IpAddr>,
    pub expiry: Expiry,
    pub reason: Option<String>,
    pub issued_by: String,
    pub issued_at: DateTime<Utc>,
}

impl Expiring for BanRecord {
    fn expiry(&self) -> Expiry {
        self.expiry
    }
}

impl BanRecord {
    /// Reason shown to the banned client.
    pub fn describe(&self) -> String {
        match &self.reason {
            Some(reason) => format!("You are banned: {reason}"),
            None => "You are banned".to_string(),
        }
    }
}

/// Why an action was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenialReason {
    Muted,
    TimedOut,
}

/// Outcome of a `may_post` / `may_interact` check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    Denied {
        reason: DenialReason,
        /// `None` when the record never expires.
        remaining_seconds: Option<u64>,
    },
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }

    /// `Ok(())` when allowed, otherwise a `PolicyDenied` error.
    pub fn into_result(self) -> Result<(), AppError> {
        match self {
            Self::Allowed => Ok(()),
            Self::Denied {
                reason,
                remaining_seconds,
            } => {
                let message = match reason {
                    DenialReason::Muted => "You are muted",
                    DenialReason::TimedOut => "You are timed out",
                };
                Err(AppError::policy_denied(message).with_remaining(remaining_seconds))
            }
        }
    }
}

/// Current mute/timeout state of one identity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PenaltyState {
    pub muted: Option<Expiry>,
    pub timed_out: Option<Expiry>,
}
