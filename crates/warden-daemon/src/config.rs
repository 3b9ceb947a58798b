//! Configuration for warden-daemon

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use warden_engine::GuardConfig;
use warden_types::{ChannelId, UserId};

/// Main daemon configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Platform API access
    #[serde(default)]
    pub platform: PlatformConfig,

    /// Guard policy
    #[serde(default)]
    pub guard: GuardConfig,

    /// Scheduler configuration
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Punishment notices
    #[serde(default)]
    pub notify: NotifyConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address for event ingestion and status
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
        }
    }
}

/// Platform API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformConfig {
    /// REST API base URL
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Bot token
    #[serde(default)]
    pub token: String,

    /// Expected user ID of the bot. The real one is always read from the
    /// API at startup; a mismatch stops the daemon.
    #[serde(default)]
    pub self_id: Option<UserId>,

    /// Image CDN used to resolve icon and banner hashes
    #[serde(default = "default_cdn_base")]
    pub cdn_base: String,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            token: String::new(),
            self_id: None,
            cdn_base: default_cdn_base(),
        }
    }
}

/// Scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Continuity batch interval in seconds
    #[serde(default = "default_batch_interval")]
    pub batch_interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            batch_interval_secs: default_batch_interval(),
        }
    }
}

/// Notification configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Channel receiving punishment notices; notices are only logged when unset
    #[serde(default)]
    pub log_channel: Option<ChannelId>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// Default value helpers
fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8088))
}

fn default_api_base() -> String {
    "https://discord.com/api/v10".to_string()
}

fn default_cdn_base() -> String {
    "https://cdn.discordapp.com".to_string()
}

fn default_batch_interval() -> u64 {
    60
}

fn default_log_level() -> String {
    "info".to_string()
}

impl DaemonConfig {
    /// Load configuration: defaults, then the optional file, then
    /// `WARDEN_`-prefixed environment variables (`__` between sections)
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::Config::try_from(&DaemonConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("WARDEN")
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("guard.immune_roles")
                .with_list_parse_key("guard.allow_listed_actors")
                .with_list_parse_key("guard.trusted_actors")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }

    /// Reject configurations the daemon cannot run with
    pub fn validate(&self) -> Result<(), String> {
        if self.guard.guild_id.get() == 0 {
            return Err("guard.guild_id must be set".to_string());
        }
        if self.platform.token.is_empty() {
            return Err("platform.token must be set".to_string());
        }
        if self.guard.batch_size == 0 {
            return Err("guard.batch_size must be at least 1".to_string());
        }
        if self.scheduler.batch_interval_secs == 0 {
            return Err("scheduler.batch_interval_secs must be at least 1".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_types::GuildId;

    #[test]
    fn test_default_config() {
        let config = DaemonConfig::default();
        assert_eq!(config.server.listen_addr.port(), 8088);
        assert_eq!(config.platform.api_base, "https://discord.com/api/v10");
        assert_eq!(config.scheduler.batch_interval_secs, 60);
        assert_eq!(config.guard.batch_size, 5);
        assert!(config.notify.log_channel.is_none());
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let config = tokio_test::assert_ok!(DaemonConfig::load(None));
        assert_eq!(config.guard.strike_threshold, 3);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_validate() {
        let mut config = DaemonConfig::default();
        assert!(config.validate().is_err());

        config.guard.guild_id = GuildId::new(42);
        assert!(config.validate().unwrap_err().contains("token"));

        config.platform.token = "secret".to_string();
        assert!(config.validate().is_ok());
    }
}
