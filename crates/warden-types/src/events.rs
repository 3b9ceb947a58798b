//! Mutation events observed on the guild
//!
//! Every administrative change the feed reports becomes one
//! [`MutationEvent`]. Each kind maps to exactly one audit action and one
//! human-readable reason; the mapping lives in [`EventKind`] so handlers never
//! duplicate it.

use crate::audit::AuditAction;
use crate::ids::{ChannelId, GuildId, UserId};
use crate::models::{Channel, GuildSettings, Role};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kinds of guarded mutations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    MemberRemove,
    BotAdd,
    GuildUpdate,
    BanAdd,
    ChannelCreate,
    ChannelUpdate,
    ChannelDelete,
    WebhookUpdate,
    RoleCreate,
    RoleUpdate,
    RoleDelete,
}

impl EventKind {
    pub const ALL: [EventKind; 11] = [
        EventKind::MemberRemove,
        EventKind::BotAdd,
        EventKind::GuildUpdate,
        EventKind::BanAdd,
        EventKind::ChannelCreate,
        EventKind::ChannelUpdate,
        EventKind::ChannelDelete,
        EventKind::WebhookUpdate,
        EventKind::RoleCreate,
        EventKind::RoleUpdate,
        EventKind::RoleDelete,
    ];

    /// Audit action consulted to attribute this kind of event
    pub const fn audit_action(self) -> AuditAction {
        match self {
            EventKind::MemberRemove => AuditAction::MemberKick,
            EventKind::BotAdd => AuditAction::BotAdd,
            EventKind::GuildUpdate => AuditAction::GuildUpdate,
            EventKind::BanAdd => AuditAction::MemberBanAdd,
            EventKind::ChannelCreate => AuditAction::ChannelCreate,
            EventKind::ChannelUpdate => AuditAction::ChannelUpdate,
            EventKind::ChannelDelete => AuditAction::ChannelDelete,
            EventKind::WebhookUpdate => AuditAction::WebhookCreate,
            EventKind::RoleCreate => AuditAction::RoleCreate,
            EventKind::RoleUpdate => AuditAction::RoleUpdate,
            EventKind::RoleDelete => AuditAction::RoleDelete,
        }
    }

    /// Reason recorded against the actor when this kind is unauthorized
    pub const fn reason(self) -> &'static str {
        match self {
            EventKind::MemberRemove => "Kicking a member",
            EventKind::BotAdd => "Adding a bot",
            EventKind::GuildUpdate => "Editing the guild",
            EventKind::BanAdd => "Banning a member",
            EventKind::ChannelCreate => "Creating a channel",
            EventKind::ChannelUpdate => "Updating a channel",
            EventKind::ChannelDelete => "Deleting a channel",
            EventKind::WebhookUpdate => "Creating a webhook",
            EventKind::RoleCreate => "Creating a role",
            EventKind::RoleUpdate => "Updating a role",
            EventKind::RoleDelete => "Deleting a role",
        }
    }

    /// Whether the guard undoes this kind of mutation. Kicks and bot
    /// additions only count against the actor.
    pub const fn is_reversible(self) -> bool {
        !matches!(self, EventKind::MemberRemove | EventKind::BotAdd)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventKind::MemberRemove => "member_remove",
            EventKind::BotAdd => "bot_add",
            EventKind::GuildUpdate => "guild_update",
            EventKind::BanAdd => "ban_add",
            EventKind::ChannelCreate => "channel_create",
            EventKind::ChannelUpdate => "channel_update",
            EventKind::ChannelDelete => "channel_delete",
            EventKind::WebhookUpdate => "webhook_update",
            EventKind::RoleCreate => "role_create",
            EventKind::RoleUpdate => "role_update",
            EventKind::RoleDelete => "role_delete",
        };
        f.write_str(name)
    }
}

/// Before/after payload of a mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Mutation {
    MemberRemove {
        user_id: UserId,
    },
    BotAdd {
        bot_id: UserId,
    },
    GuildUpdate {
        before: Box<GuildSettings>,
        after: Box<GuildSettings>,
    },
    BanAdd {
        user_id: UserId,
    },
    ChannelCreate {
        channel: Channel,
    },
    ChannelUpdate {
        before: Box<Channel>,
        after: Box<Channel>,
    },
    ChannelDelete {
        channel: Channel,
    },
    WebhookUpdate {
        channel_id: ChannelId,
    },
    RoleCreate {
        role: Role,
    },
    RoleUpdate {
        before: Role,
        after: Role,
    },
    RoleDelete {
        role: Role,
    },
}

impl Mutation {
    pub fn kind(&self) -> EventKind {
        match self {
            Mutation::MemberRemove { .. } => EventKind::MemberRemove,
            Mutation::BotAdd { .. } => EventKind::BotAdd,
            Mutation::GuildUpdate { .. } => EventKind::GuildUpdate,
            Mutation::BanAdd { .. } => EventKind::BanAdd,
            Mutation::ChannelCreate { .. } => EventKind::ChannelCreate,
            Mutation::ChannelUpdate { .. } => EventKind::ChannelUpdate,
            Mutation::ChannelDelete { .. } => EventKind::ChannelDelete,
            Mutation::WebhookUpdate { .. } => EventKind::WebhookUpdate,
            Mutation::RoleCreate { .. } => EventKind::RoleCreate,
            Mutation::RoleUpdate { .. } => EventKind::RoleUpdate,
            Mutation::RoleDelete { .. } => EventKind::RoleDelete,
        }
    }

    /// Channel events for private (DM) channels are outside the guard's remit.
    pub fn is_private_channel(&self) -> bool {
        match self {
            Mutation::ChannelCreate { channel } | Mutation::ChannelDelete { channel } => {
                channel.kind.is_private()
            }
            Mutation::ChannelUpdate { after, .. } => after.kind.is_private(),
            _ => false,
        }
    }
}

/// One observed mutation, consumed once by the guard
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationEvent {
    pub guild_id: GuildId,

    /// Actor reported by the feed itself, if any. Attribution always goes
    /// through the audit trail; this is kept for diagnostics.
    #[serde(default)]
    pub actor_candidate: Option<UserId>,

    /// When the feed observed the mutation
    #[serde(default = "Utc::now")]
    pub observed_at: DateTime<Utc>,

    #[serde(flatten)]
    pub mutation: Mutation,
}

impl MutationEvent {
    pub fn new(guild_id: GuildId, mutation: Mutation) -> Self {
        Self {
            guild_id,
            actor_candidate: None,
            observed_at: Utc::now(),
            mutation,
        }
    }

    pub fn observed_at(mut self, at: DateTime<Utc>) -> Self {
        self.observed_at = at;
        self
    }

    pub fn with_actor_candidate(mut self, actor: UserId) -> Self {
        self.actor_candidate = Some(actor);
        self
    }

    pub fn kind(&self) -> EventKind {
        self.mutation.kind()
    }
}
