//! WebSocket message types, stored chat messages, and validation.

pub mod chat;
pub mod types;
pub mod validator;

pub use chat::{ChannelMessage, Draft, PrivateMessage, Reactions};
pub use types::{InboundMessage, ModerationRequest, OutboundMessage, ReactionRequest};
