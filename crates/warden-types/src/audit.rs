//! Audit trail entries

use crate::ids::{Snowflake, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Audit-log action types the guard queries for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    GuildUpdate,
    ChannelCreate,
    ChannelUpdate,
    ChannelDelete,
    MemberKick,
    MemberBanAdd,
    BotAdd,
    RoleCreate,
    RoleUpdate,
    RoleDelete,
    WebhookCreate,
}

impl AuditAction {
    /// Numeric action type used by the platform's audit-log endpoint
    pub const fn code(self) -> u16 {
        match self {
            AuditAction::GuildUpdate => 1,
            AuditAction::ChannelCreate => 10,
            AuditAction::ChannelUpdate => 11,
            AuditAction::ChannelDelete => 12,
            AuditAction::MemberKick => 20,
            AuditAction::MemberBanAdd => 22,
            AuditAction::BotAdd => 28,
            AuditAction::RoleCreate => 30,
            AuditAction::RoleUpdate => 31,
            AuditAction::RoleDelete => 32,
            AuditAction::WebhookCreate => 50,
        }
    }

    pub fn from_code(code: u16) -> Option<Self> {
        let action = match code {
            1 => AuditAction::GuildUpdate,
            10 => AuditAction::ChannelCreate,
            11 => AuditAction::ChannelUpdate,
            12 => AuditAction::ChannelDelete,
            20 => AuditAction::MemberKick,
            22 => AuditAction::MemberBanAdd,
            28 => AuditAction::BotAdd,
            30 => AuditAction::RoleCreate,
            31 => AuditAction::RoleUpdate,
            32 => AuditAction::RoleDelete,
            50 => AuditAction::WebhookCreate,
            _ => return None,
        };
        Some(action)
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// The single most recent audit entry for an action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub action: AuditAction,
    /// Who performed the action; absent when the platform could not resolve it
    #[serde(default)]
    pub executor_id: Option<UserId>,
    /// What the action touched (webhook, channel, role, user...)
    #[serde(default)]
    pub target_id: Option<Snowflake>,
    pub created_at: DateTime<Utc>,
}
