//! Server setup and lifecycle management

use crate::api::create_router;
use crate::api::rest::state::AppState;
use crate::config::DaemonConfig;
use crate::error::{DaemonError, DaemonResult};
use crate::notify::ChannelLogSink;
use crate::platform::RestPlatform;
use crate::scheduler::Scheduler;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use warden_engine::{Guard, NoopSink, NotificationSink, Platform};
use warden_types::UserId;

/// Warden daemon server
pub struct Server {
    config: DaemonConfig,
    guard: Arc<Guard>,
    scheduler: Arc<Scheduler>,
    batch_rx: mpsc::Receiver<()>,
}

impl Server {
    /// Create a server talking to the configured platform API
    pub async fn new(config: DaemonConfig) -> DaemonResult<Self> {
        let platform = Arc::new(RestPlatform::connect(&config.platform).await?);
        check_identity(config.platform.self_id, platform.self_id())?;

        let sink: Arc<dyn NotificationSink> = match config.notify.log_channel {
            Some(channel_id) => Arc::new(ChannelLogSink::new(platform.clone(), channel_id)),
            None => Arc::new(NoopSink),
        };

        let guard = Arc::new(Guard::new(config.guard.clone(), platform, sink));
        Ok(Self::with_guard(config, guard))
    }

    /// Create a server around an existing guard
    pub fn with_guard(config: DaemonConfig, guard: Arc<Guard>) -> Self {
        let (scheduler, batch_rx) = Scheduler::new(config.scheduler.clone(), guard.clone());

        Self {
            config,
            guard,
            scheduler,
            batch_rx,
        }
    }

    /// Run the server
    pub async fn run(self) -> DaemonResult<()> {
        let addr = self.config.server.listen_addr;

        // Snapshots must exist before the first role deletion arrives
        self.guard.warm_up().await;

        let state = AppState::new(self.guard.clone(), self.scheduler.clone());
        let app = create_router(state);

        let listener = TcpListener::bind(addr).await?;

        tracing::info!("Warden daemon listening on {}", addr);
        tracing::info!(guild = %self.config.guard.guild_id, "Guarding guild");

        let scheduler = self.scheduler.clone();
        let batch_rx = self.batch_rx;
        tokio::spawn(async move {
            scheduler.start(batch_rx).await;
        });

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| DaemonError::Server(e.to_string()))?;

        tracing::info!("Warden daemon shutting down");

        self.scheduler.stop().await;

        Ok(())
    }
}

/// The token must belong to the bot the operator configured, if any
fn check_identity(configured: Option<UserId>, resolved: UserId) -> DaemonResult<()> {
    match configured {
        Some(expected) if expected != resolved => Err(DaemonError::Config(format!(
            "platform.self_id is {} but the token belongs to {}",
            expected.get(),
            resolved.get()
        ))),
        _ => Ok(()),
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }
}
