//! Identity roles and the moderation permission rule.

use serde::{Deserialize, Serialize};

/// Role held by an identity.
///
/// Variants are declared lowest to highest so the derived ordering is the
/// privilege ordering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Role {
    /// Regular member.
    #[default]
    None,
    /// Cosmetic elevated member without moderation rights.
    Vip,
    /// Moderator.
    Admin,
    /// Hub owner; implies every Admin right.
    Owner,
}

impl Role {
    /// Whether this role grants moderation rights.
    pub fn is_admin(self) -> bool {
        matches!(self, Self::Admin | Self::Owner)
    }

    /// Presence sort rank: Owner first, then Admin, then everyone else.
    pub fn presence_rank(self) -> u8 {
        match self {
            Self::Owner => 0,
            Self::Admin => 1,
            Self::Vip | Self::None => 2,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Vip => write!(f, "vip"),
            Self::Admin => write!(f, "admin"),
            Self::Owner => write!(f, "owner"),
        }
    }
}

/// Whether `actor` may apply a moderation action to `target`.
///
/// Owners are untouchable; Owners act on anyone else; Admins act on
/// non-Admins only.
pub fn can_moderate(actor: Role, target: Role) -> bool {
    target != Role::Owner
        && (actor == Role::Owner || (actor == Role::Admin && target != Role::Admin))
}
