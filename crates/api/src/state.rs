//! Application state for the API server.

use bitte_coordinator::{Coordinator, CoordinatorConfig};
use std::sync::Arc;

/// Shared application state for the API server.
pub struct AppState {
    /// Stateless per request, shared by every handler
    pub coordinator: Arc<Coordinator>,

    /// Number of configured registries (reported by health checks)
    pub registries: usize,

    pub max_body_bytes: usize,

    /// Server start time (for health checks)
    pub start_time: std::time::Instant,
}

impl AppState {
    /// Create new application state with the given coordinator configuration.
    pub fn new(config: CoordinatorConfig) -> bitte_common::Result<Self> {
        let coordinator = Coordinator::new(&config)?;

        Ok(Self {
            coordinator: Arc::new(coordinator),
            registries: config.directory.registries.len(),
            max_body_bytes: config.server.max_body_bytes,
            start_time: std::time::Instant::now(),
        })
    }

    /// Get the uptime in seconds.
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
