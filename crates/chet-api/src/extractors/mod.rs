//! Custom Axum extractors.

pub mod origin;

pub use origin::ClientOrigin;
