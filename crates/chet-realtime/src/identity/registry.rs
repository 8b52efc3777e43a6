//! Identity registry: the Session ↔ display name binding.
//!
//! All state sits behind one mutex so the "at most one live Session per
//! display name" invariant is checked and updated atomically.

use std::collections::HashMap;

use parking_lot::Mutex;

use chet_core::error::AppError;
use chet_core::types::ConnectionId;

use super::role::Role;
use super::sanitize::{color_for, with_suffix};

/// A joined identity as seen by the rest of the hub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub conn_id: ConnectionId,
    pub display_name: String,
    pub stable_id: String,
    pub role: Role,
    pub color: String,
}

impl Member {
    /// The name and stable id pair this member currently holds.
    pub fn key(&self) -> IdentityKey {
        IdentityKey::new(&self.display_name, &self.stable_id)
    }
}

/// A display name together with the stable id that held it.
///
/// Names are released when their Session leaves and may be claimed by
/// someone else; the stable id tells the two holders apart.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdentityKey {
    pub display_name: String,
    pub stable_id: String,
}

impl IdentityKey {
    pub fn new(display_name: impl Into<String>, stable_id: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            stable_id: stable_id.into(),
        }
    }
}

/// Result of binding a Session to a display name.
#[derive(Debug, Clone)]
pub struct BindOutcome {
    /// The bound identity, with its final (possibly suffixed) name.
    pub member: Member,
    /// A previous Session with the same stable id that lost the name.
    pub evicted: Option<ConnectionId>,
}

#[derive(Debug, Default)]
struct RegistryState {
    by_name: HashMap<String, Member>,
    by_conn: HashMap<ConnectionId, String>,
    /// Last role held by each name, kept after the identity leaves.
    last_roles: HashMap<String, Role>,
}

/// Registry of joined identities.
#[derive(Debug)]
pub struct IdentityRegistry {
    state: Mutex<RegistryState>,
    max_name_chars: usize,
}

impl IdentityRegistry {
    /// Creates an empty registry.
    pub fn new(max_name_chars: usize) -> Self {
        Self {
            state: Mutex::new(RegistryState::default()),
            max_name_chars,
        }
    }

    /// Binds `conn_id` to `name` (already sanitized).
    ///
    /// A live binding with the same stable id is replaced; any other
    /// collision yields the lowest free numeric suffix.
    pub fn bind(
        &self,
        conn_id: ConnectionId,
        name: &str,
        stable_id: &str,
        role: Role,
    ) -> Result<BindOutcome, AppError> {
        let mut state = self.state.lock();

        if state.by_conn.contains_key(&conn_id) {
            return Err(AppError::conflict("Session has already joined"));
        }

        let mut evicted = None;
        let final_name = match state.by_name.get(name) {
            None => name.to_string(),
            Some(existing) if existing.stable_id == stable_id => {
                evicted = Some(existing.conn_id);
                name.to_string()
            }
            Some(_) => (2u32..)
                .map(|n| with_suffix(name, n, self.max_name_chars))
                .find(|candidate| !state.by_name.contains_key(candidate))
                .ok_or_else(|| AppError::conflict("No free display name"))?,
        };

        if let Some(old) = evicted {
            state.by_conn.remove(&old);
        }

        let member = Member {
            conn_id,
            display_name: final_name.clone(),
            stable_id: stable_id.to_string(),
            role,
            color: color_for(&final_name).to_string(),
        };
        state.by_conn.insert(conn_id, final_name.clone());
        state.last_roles.insert(final_name.clone(), role);
        state.by_name.insert(final_name, member.clone());

        Ok(BindOutcome { member, evicted })
    }

    /// Removes the binding of `conn_id`, if any.
    pub fn unbind(&self, conn_id: &ConnectionId) -> Option<Member> {
        let mut state = self.state.lock();
        let name = state.by_conn.remove(conn_id)?;
        let owned = state
            .by_name
            .get(&name)
            .is_some_and(|member| member.conn_id == *conn_id);
        if owned {
            state.by_name.remove(&name)
        } else {
            None
        }
    }

    /// The identity bound to `conn_id`.
    pub fn by_conn(&self, conn_id: &ConnectionId) -> Option<Member> {
        let state = self.state.lock();
        let name = state.by_conn.get(conn_id)?;
        state.by_name.get(name).cloned()
    }

    /// The live identity named `name`.
    pub fn by_name(&self, name: &str) -> Option<Member> {
        self.state.lock().by_name.get(name).cloned()
    }

    /// The live identity matching `key`, if its name is still held by the
    /// same stable id.
    pub fn resolve(&self, key: &IdentityKey) -> Option<Member> {
        self.state
            .lock()
            .by_name
            .get(&key.display_name)
            .filter(|m| m.stable_id == key.stable_id)
            .cloned()
    }

    /// Role of `name`: the live role, else the last role it held.
    pub fn role_of(&self, name: &str) -> Role {
        let state = self.state.lock();
        state
            .by_name
            .get(name)
            .map(|m| m.role)
            .or_else(|| state.last_roles.get(name).copied())
            .unwrap_or_default()
    }

    /// Changes the role of a live identity.
    pub fn set_role(&self, name: &str, role: Role) -> Option<Member> {
        let mut state = self.state.lock();
        let member = state.by_name.get_mut(name)?;
        member.role = role;
        let member = member.clone();
        state.last_roles.insert(name.to_string(), role);
        Some(member)
    }

    /// Every live identity, unordered.
    pub fn members(&self) -> Vec<Member> {
        self.state.lock().by_name.values().cloned().collect()
    }

    /// Number of live identities.
    pub fn len(&self) -> usize {
        self.state.lock().by_name.len()
    }

    /// Whether no identity is joined.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
