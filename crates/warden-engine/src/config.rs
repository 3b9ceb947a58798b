//! Guard policy configuration

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use warden_types::{GuildId, RoleId, UserId};

/// Policy knobs for the guard engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardConfig {
    /// Guild under protection; events from any other guild are ignored
    #[serde(default = "default_guild")]
    pub guild_id: GuildId,

    /// Protected status; holders are jailed instead of banned
    #[serde(default)]
    pub booster_role: Option<RoleId>,

    /// Restricted role assigned when jailing
    #[serde(default)]
    pub jail_role: Option<RoleId>,

    /// Roles that make a trusted actor immune to sanction
    #[serde(default)]
    pub immune_roles: HashSet<RoleId>,

    /// Automation identities whose actions are never attributed
    #[serde(default)]
    pub allow_listed_actors: HashSet<UserId>,

    /// Actors given bounded tolerance before punishment
    #[serde(default)]
    pub trusted_actors: HashSet<UserId>,

    /// Strike window in seconds
    #[serde(default = "default_strike_window")]
    pub strike_window_secs: u64,

    /// Offenses within one window that trigger punishment
    #[serde(default = "default_strike_threshold")]
    pub strike_threshold: u32,

    /// Maximum distance between observation and audit entry, in milliseconds
    #[serde(default = "default_staleness_tolerance")]
    pub staleness_tolerance_ms: u64,

    /// Continuity entries drained per batch tick
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            guild_id: default_guild(),
            booster_role: None,
            jail_role: None,
            immune_roles: HashSet::new(),
            allow_listed_actors: HashSet::new(),
            trusted_actors: HashSet::new(),
            strike_window_secs: default_strike_window(),
            strike_threshold: default_strike_threshold(),
            staleness_tolerance_ms: default_staleness_tolerance(),
            batch_size: default_batch_size(),
        }
    }
}

impl GuardConfig {
    /// Configuration for a guild with default policy
    pub fn for_guild(guild_id: GuildId) -> Self {
        Self {
            guild_id,
            ..Default::default()
        }
    }

    pub fn strike_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.strike_window_secs as i64)
    }

    pub fn staleness_tolerance(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(self.staleness_tolerance_ms as i64)
    }
}

// Default value helpers
fn default_guild() -> GuildId {
    GuildId::new(0)
}

fn default_strike_window() -> u64 {
    30
}

fn default_strike_threshold() -> u32 {
    3
}

fn default_staleness_tolerance() -> u64 {
    5_000
}

fn default_batch_size() -> usize {
    5
}
