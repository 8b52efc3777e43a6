//! Public channels and their bounded message logs.

pub mod log;
pub mod store;

pub use log::BoundedLog;
pub use store::ChannelStore;
