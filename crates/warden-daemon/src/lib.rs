//! Warden daemon library
//!
//! This module provides the runtime around the guard engine:
//! - Configuration loading
//! - The REST-backed platform and log-channel notifier
//! - Event ingestion and status over HTTP
//! - The continuity batch scheduler

pub mod api;
pub mod config;
pub mod error;
pub mod notify;
pub mod platform;
pub mod scheduler;
pub mod server;

pub use config::DaemonConfig;
pub use error::{ApiError, DaemonError};
pub use notify::ChannelLogSink;
pub use platform::RestPlatform;
pub use scheduler::Scheduler;
pub use server::Server;
