//! Member list (presence) publishing.

pub mod publisher;

pub use publisher::{PresenceEntry, PresencePublisher};
