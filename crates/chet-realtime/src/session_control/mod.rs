//! Admin moderation: kick, ban, mute, and timeout via WebSocket.

pub mod terminator;
