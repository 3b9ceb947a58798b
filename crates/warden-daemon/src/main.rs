//! Warden Daemon - server guard service
//!
//! The daemon provides:
//! - HTTP ingestion of guild mutation events from a gateway relay
//! - Attribution, strike tracking, punishment and reversal per event
//! - Periodic continuity batches re-granting recreated roles

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use warden_daemon::error::{DaemonError, DaemonResult};
use warden_daemon::{DaemonConfig, Server};

/// Warden Daemon CLI
#[derive(Parser)]
#[command(name = "wardend")]
#[command(about = "Warden Daemon - server guard service", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "WARDEN_CONFIG")]
    config: Option<String>,

    /// Listen address, overrides the configured one
    #[arg(short, long, env = "WARDEN_LISTEN_ADDR")]
    listen: Option<String>,

    /// Log level
    #[arg(long, env = "WARDEN_LOG_LEVEL")]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long, env = "WARDEN_LOG_JSON")]
    json: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> DaemonResult<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = DaemonConfig::load(cli.config.as_deref())
        .map_err(|e| DaemonError::Config(e.to_string()))?;

    // Override with CLI args
    if let Some(listen) = &cli.listen {
        config.server.listen_addr = listen
            .parse()
            .map_err(|e| DaemonError::Config(format!("Invalid listen address: {}", e)))?;
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    config.logging.json |= cli.json;

    // Initialize tracing
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.logging.level.clone().into());

    if config.logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    config.validate().map_err(DaemonError::Config)?;

    println!(
        r#"
  Warden - server guard daemon
  Version: {}
  Guild: {}
  Listening: {}
"#,
        env!("CARGO_PKG_VERSION"),
        config.guard.guild_id.get(),
        config.server.listen_addr
    );

    let server = Server::new(config).await?;
    server.run().await
}
