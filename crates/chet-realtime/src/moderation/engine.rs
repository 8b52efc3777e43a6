//! Moderation engine: ban, mute, and timeout state with lazy expiry.
//!
//! Records are never swept by a timer. Every read checks the record against
//! the clock and drops it once it has lapsed.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;
use std::net::IpAddr;
use std::sync::Arc;

use parking_lot::Mutex;

use super::records::{
    BanRecord, Decision, DenialReason, Expiring, Expiry, PenaltyRecord, PenaltyState,
};
use crate::clock::Clock;

#[derive(Debug, Default)]
struct ModerationState {
    mutes: HashMap<String, PenaltyRecord>,
    timeouts: HashMap<String, PenaltyRecord>,
    bans_by_name: HashMap<String, BanRecord>,
    bans_by_origin: HashMap<IpAddr, BanRecord>,
}

/// Returns the record under `key` unless it has lapsed, in which case it is
/// removed.
fn live<K, Q, R>(map: &mut HashMap<K, R>, key: &Q, clock: &dyn Clock) -> Option<R>
where
    K: Borrow<Q> + Hash + Eq,
    Q: Hash + Eq + ?Sized,
    R: Expiring + Clone,
{
    if map.get(key)?.expiry().is_expired(clock.now()) {
        map.remove(key);
        return None;
    }
    map.get(key).cloned()
}

/// Ban/mute/timeout policy state and decisions.
#[derive(Debug)]
pub struct ModerationEngine {
    state: Mutex<ModerationState>,
    clock: Arc<dyn Clock>,
}

impl ModerationEngine {
    /// Creates an engine with no records.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(ModerationState::default()),
            clock,
        }
    }

    fn penalty(&self, duration_seconds: Option<u64>, reason: Option<String>, by: &str) -> PenaltyRecord {
        let now = self.clock.now();
        PenaltyRecord {
            expiry: Expiry::after(now, duration_seconds),
            reason,
            issued_by: by.to_string(),
            issued_at: now,
        }
    }

    /// Mutes `name`, replacing any existing mute.
    pub fn mute(
        &self,
        name: &str,
        duration_seconds: Option<u64>,
        reason: Option<String>,
        by: &str,
    ) -> PenaltyRecord {
        let record = self.penalty(duration_seconds, reason, by);
        self.state.lock().mutes.insert(name.to_string(), record.clone());
        record
    }

    /// Lifts a mute. Returns whether a live mute existed.
    pub fn unmute(&self, name: &str) -> bool {
        let mut state = self.state.lock();
        let existed = live(&mut state.mutes, name, self.clock.as_ref()).is_some();
        state.mutes.remove(name);
        existed
    }

    /// Times out `name`, replacing any existing timeout.
    pub fn timeout(
        &self,
        name: &str,
        duration_seconds: Option<u64>,
        reason: Option<String>,
        by: &str,
    ) -> PenaltyRecord {
        let record = self.penalty(duration_seconds, reason, by);
        self.state
            .lock()
            .timeouts
            .insert(name.to_string(), record.clone());
        record
    }

    /// Lifts a timeout. Returns whether a live timeout existed.
    pub fn untimeout(&self, name: &str) -> bool {
        let mut state = self.state.lock();
        let existed = live(&mut state.timeouts, name, self.clock.as_ref()).is_some();
        state.timeouts.remove(name);
        existed
    }

    /// Bans a name, an origin, or both with one shared record.
    pub fn ban(
        &self,
        name: Option<&str>,
        origin: Option<IpAddr>,
        duration_seconds: Option<u64>,
        reason: Option<String>,
        by: &str,
    ) -> BanRecord {
        let now = self.clock.now();
        let record = BanRecord {
            name: name.map(str::to_string),
            origin,
            expiry: Expiry::after(now, duration_seconds),
            reason,
            issued_by: by.to_string(),
            issued_at: now,
        };

        let mut state = self.state.lock();
        if let Some(name) = &record.name {
            state.bans_by_name.insert(name.clone(), record.clone());
        }
        if let Some(origin) = record.origin {
            state.bans_by_origin.insert(origin, record.clone());
        }
        record
    }

    /// Lifts a ban by IP address or by name.
    ///
    /// Unbanning a name also lifts the origin ban issued together with it.
    /// Returns whether anything was removed.
    pub fn unban(&self, target: &str) -> bool {
        let mut state = self.state.lock();

        if let Ok(origin) = target.parse::<IpAddr>() {
            return state.bans_by_origin.remove(&origin).is_some();
        }

        let Some(record) = state.bans_by_name.remove(target) else {
            return false;
        };
        if let Some(origin) = record.origin {
            let linked = state
                .bans_by_origin
                .get(&origin)
                .is_some_and(|b| b.name.as_deref() == Some(target));
            if linked {
                state.bans_by_origin.remove(&origin);
            }
        }
        true
    }

    /// The live ban on `name`, if any.
    pub fn name_ban(&self, name: &str) -> Option<BanRecord> {
        let mut state = self.state.lock();
        live(&mut state.bans_by_name, name, self.clock.as_ref())
    }

    /// The live ban on `origin`, if any.
    pub fn origin_ban(&self, origin: &IpAddr) -> Option<BanRecord> {
        let mut state = self.state.lock();
        live(&mut state.bans_by_origin, origin, self.clock.as_ref())
    }

    /// Gate for sending messages: timeout first, then mute.
    pub fn may_post(&self, name: &str) -> Decision {
        let mut state = self.state.lock();
        let now = self.clock.now();
        if let Some(timeout) = live(&mut state.timeouts, name, self.clock.as_ref()) {
            return Decision::Denied {
                reason: DenialReason::TimedOut,
                remaining_seconds: timeout.expiry.remaining_seconds(now),
            };
        }
        if let Some(mute) = live(&mut state.mutes, name, self.clock.as_ref()) {
            return Decision::Denied {
                reason: DenialReason::Muted,
                remaining_seconds: mute.expiry.remaining_seconds(now),
            };
        }
        Decision::Allowed
    }

    /// Gate for typing and reactions: timeout only.
    pub fn may_interact(&self, name: &str) -> Decision {
        let mut state = self.state.lock();
        match live(&mut state.timeouts, name, self.clock.as_ref()) {
            Some(timeout) => Decision::Denied {
                reason: DenialReason::TimedOut,
                remaining_seconds: timeout.expiry.remaining_seconds(self.clock.now()),
            },
            None => Decision::Allowed,
        }
    }

    /// Current mute/timeout state of `name`.
    pub fn penalties(&self, name: &str) -> PenaltyState {
        let mut state = self.state.lock();
        PenaltyState {
            muted: live(&mut state.mutes, name, self.clock.as_ref()).map(|r| r.expiry),
            timed_out: live(&mut state.timeouts, name, self.clock.as_ref()).map(|r| r.expiry),
        }
    }
}
