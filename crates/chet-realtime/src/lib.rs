//! # chet-realtime
//!
//! Real-time chat engine for the Chet hub. Provides:
//!
//! - Session (connection) pool with bounded, non-blocking outbound queues
//! - Identity registry enforcing one live Session per display name
//! - Bounded, ordered channel logs
//! - Moderation engine (mute, timeout, ban by name or origin) with lazy expiry
//! - Private (1:1) session directory with deterministic session ids
//! - Best-effort fan-out and point-to-point dispatch
//! - Presence publishing with a total, stable member ordering

pub mod channel;
pub mod clock;
pub mod connection;
pub mod dispatch;
pub mod identity;
pub mod message;
pub mod metrics;
pub mod moderation;
pub mod presence;
pub mod private;
pub mod server;
pub mod session_control;

pub use channel::ChannelStore;
pub use clock::{Clock, ManualClock, SystemClock};
pub use connection::{ConnectionHandle, ConnectionPool, OutboundFrame};
pub use dispatch::Dispatcher;
pub use identity::{IdentityRegistry, Role};
pub use moderation::ModerationEngine;
pub use presence::PresencePublisher;
pub use private::PrivateDirectory;
pub use server::ChatHub;
