//! Moderation: bans, mutes, timeouts, and the decisions built on them.

pub mod engine;
pub mod records;

pub use engine::ModerationEngine;
pub use records::{
    BanRecord, BanScope, Decision, DenialReason, Expiry, ModerationAction, PenaltyRecord,
    PenaltyState,
};
