//! Application state shared across all handlers.

use std::sync::Arc;
use std::time::Instant;

use chet_core::config::AppConfig;
use chet_realtime::ChatHub;

/// Shared application state. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    /// Loaded configuration.
    pub config: Arc<AppConfig>,
    /// The chat hub.
    pub hub: ChatHub,
    /// Process start, for uptime reporting.
    pub started_at: Instant,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState").field("hub", &self.hub).finish()
    }
}

impl AppState {
    /// Creates the state for a freshly built hub.
    pub fn new(config: AppConfig, hub: ChatHub) -> Self {
        Self {
            config: Arc::new(config),
            hub,
            started_at: Instant::now(),
        }
    }
}
