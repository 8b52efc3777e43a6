//! Session (WebSocket connection) handles and the live-connection pool.

pub mod handle;
pub mod pool;

pub use handle::{ConnectionHandle, OutboundFrame};
pub use pool::ConnectionPool;
