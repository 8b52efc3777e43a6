//! Private (1:1) sessions.

pub mod directory;

pub use directory::{PrivateDirectory, RequestOutcome, session_id};
