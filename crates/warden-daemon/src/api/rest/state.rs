//! Application state for API handlers

use crate::scheduler::Scheduler;
use std::sync::Arc;
use warden_engine::Guard;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// The guard every ingested event is handed to
    pub guard: Arc<Guard>,

    /// Scheduler handle
    pub scheduler: Arc<Scheduler>,

    /// Daemon version
    pub version: String,

    /// Daemon start time
    pub started_at: chrono::DateTime<chrono::Utc>,
}

impl AppState {
    /// Create new application state
    pub fn new(guard: Arc<Guard>, scheduler: Arc<Scheduler>) -> Self {
        Self {
            guard,
            scheduler,
            version: env!("CARGO_PKG_VERSION").to_string(),
            started_at: chrono::Utc::now(),
        }
    }

    /// Get uptime as a human-readable string
    pub fn uptime(&self) -> String {
        let secs = (chrono::Utc::now() - self.started_at).num_seconds();

        if secs < 60 {
            format!("{}s", secs)
        } else if secs < 3600 {
            format!("{}m {}s", secs / 60, secs % 60)
        } else if secs < 86400 {
            format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
        } else {
            format!("{}d {}h", secs / 86400, (secs % 86400) / 3600)
        }
    }
}
