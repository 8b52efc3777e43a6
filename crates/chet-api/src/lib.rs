//! # chet-api
//!
//! HTTP layer for the Chet hub built on Axum.
//!
//! Provides the WebSocket upgrade, the health endpoint, client-origin
//! extraction, CORS, and error mapping.

pub mod app;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;

pub use app::{build_app, build_hub, run_server, serve};
pub use state::AppState;
