//! Platform API wire shapes and their translation into engine models

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use warden_types::{
    AuditAction, AuditEntry, Channel, ChannelId, ChannelKind, GuildId, GuildSettings, Member,
    OverwriteKind, PermissionOverwrite, Permissions, Role, RoleId, Snowflake, UserId,
};

#[derive(Debug, Deserialize)]
pub struct WireGuild {
    pub id: GuildId,
    pub owner_id: UserId,
    pub name: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub banner: Option<String>,
    #[serde(default)]
    pub afk_channel_id: Option<ChannelId>,
    #[serde(default)]
    pub afk_timeout: u32,
    #[serde(default)]
    pub system_channel_id: Option<ChannelId>,
    #[serde(default)]
    pub rules_channel_id: Option<ChannelId>,
    #[serde(default)]
    pub public_updates_channel_id: Option<ChannelId>,
    #[serde(default)]
    pub vanity_url_code: Option<String>,
}

impl From<WireGuild> for GuildSettings {
    fn from(guild: WireGuild) -> Self {
        GuildSettings {
            id: guild.id,
            owner_id: guild.owner_id,
            name: guild.name,
            icon: guild.icon,
            banner: guild.banner,
            afk_channel_id: guild.afk_channel_id,
            afk_timeout: guild.afk_timeout,
            system_channel_id: guild.system_channel_id,
            rules_channel_id: guild.rules_channel_id,
            public_updates_channel_id: guild.public_updates_channel_id,
            vanity_code: guild.vanity_url_code,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WireOverwrite {
    pub id: Snowflake,
    /// 0 = role, 1 = member
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(default)]
    pub allow: Permissions,
    #[serde(default)]
    pub deny: Permissions,
}

impl From<WireOverwrite> for PermissionOverwrite {
    fn from(wire: WireOverwrite) -> Self {
        PermissionOverwrite {
            id: wire.id,
            kind: if wire.kind == 0 {
                OverwriteKind::Role
            } else {
                OverwriteKind::Member
            },
            allow: wire.allow,
            deny: wire.deny,
        }
    }
}

impl From<&PermissionOverwrite> for WireOverwrite {
    fn from(overwrite: &PermissionOverwrite) -> Self {
        WireOverwrite {
            id: overwrite.id,
            kind: match overwrite.kind {
                OverwriteKind::Role => 0,
                OverwriteKind::Member => 1,
            },
            allow: overwrite.allow,
            deny: overwrite.deny,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct WireChannel {
    pub id: ChannelId,
    #[serde(default)]
    pub guild_id: Option<GuildId>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(default)]
    pub position: i32,
    #[serde(default)]
    pub parent_id: Option<ChannelId>,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub nsfw: bool,
    #[serde(default)]
    pub bitrate: Option<u32>,
    #[serde(default)]
    pub user_limit: Option<u32>,
    #[serde(default)]
    pub rate_limit_per_user: Option<u32>,
    #[serde(default)]
    pub permission_overwrites: Vec<WireOverwrite>,
}

impl WireChannel {
    pub fn into_channel(self, fallback_guild: GuildId) -> Channel {
        Channel {
            id: self.id,
            guild_id: self.guild_id.unwrap_or(fallback_guild),
            name: self.name.unwrap_or_default(),
            kind: ChannelKind::from_code(self.kind),
            position: self.position,
            parent_id: self.parent_id,
            topic: self.topic,
            nsfw: self.nsfw,
            bitrate: self.bitrate,
            user_limit: self.user_limit,
            rate_limit_per_user: self.rate_limit_per_user,
            permission_overwrites: self
                .permission_overwrites
                .into_iter()
                .map(PermissionOverwrite::from)
                .collect(),
        }
    }
}

/// Body for channel create and edit. Voice-only fields are left out for
/// other channel types.
pub fn channel_body(channel: &Channel) -> Value {
    let overwrites: Vec<WireOverwrite> = channel
        .permission_overwrites
        .iter()
        .map(WireOverwrite::from)
        .collect();

    let mut body = json!({
        "name": channel.name,
        "type": channel.kind.code(),
        "position": channel.position,
        "parent_id": channel.parent_id,
        "nsfw": channel.nsfw,
        "permission_overwrites": overwrites,
    });
    if let Some(map) = body.as_object_mut() {
        if channel.kind == ChannelKind::Voice || channel.kind == ChannelKind::Stage {
            map.insert("bitrate".into(), json!(channel.bitrate));
            map.insert("user_limit".into(), json!(channel.user_limit));
        } else {
            map.insert("topic".into(), json!(channel.topic));
            map.insert(
                "rate_limit_per_user".into(),
                json!(channel.rate_limit_per_user),
            );
        }
    }
    body
}

#[derive(Debug, Deserialize)]
pub struct WireRole {
    pub id: RoleId,
    pub name: String,
    #[serde(default)]
    pub color: u32,
    #[serde(default)]
    pub hoist: bool,
    #[serde(default)]
    pub position: i32,
    #[serde(default)]
    pub permissions: Permissions,
    #[serde(default)]
    pub mentionable: bool,
    #[serde(default)]
    pub managed: bool,
}

impl From<WireRole> for Role {
    fn from(role: WireRole) -> Self {
        Role {
            id: role.id,
            name: role.name,
            color: role.color,
            hoist: role.hoist,
            position: role.position,
            permissions: role.permissions,
            mentionable: role.mentionable,
            managed: role.managed,
        }
    }
}

pub fn role_body(role: &Role) -> Value {
    json!({
        "name": role.name,
        "color": role.color,
        "hoist": role.hoist,
        "permissions": role.permissions,
        "mentionable": role.mentionable,
    })
}

#[derive(Debug, Deserialize)]
pub struct WireUser {
    pub id: UserId,
    #[serde(default)]
    pub bot: bool,
}

#[derive(Debug, Deserialize)]
pub struct WireMember {
    pub user: WireUser,
    #[serde(default)]
    pub roles: Vec<RoleId>,
}

impl From<WireMember> for Member {
    fn from(member: WireMember) -> Self {
        Member {
            user_id: member.user.id,
            roles: member.roles,
            bot: member.user.bot,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct WireAuditLog {
    #[serde(default)]
    pub audit_log_entries: Vec<WireAuditEntry>,
}

#[derive(Debug, Deserialize)]
pub struct WireAuditEntry {
    pub id: Snowflake,
    #[serde(default)]
    pub user_id: Option<UserId>,
    #[serde(default)]
    pub target_id: Option<Snowflake>,
    pub action_type: u16,
}

impl WireAuditEntry {
    /// Entries carry no timestamp of their own; it is encoded in the ID.
    pub fn into_entry(self) -> Option<AuditEntry> {
        Some(AuditEntry {
            action: AuditAction::from_code(self.action_type)?,
            executor_id: self.user_id,
            target_id: self.target_id,
            created_at: self.id.timestamp(),
        })
    }
}

/// Error body returned with 429 responses
#[derive(Debug, Deserialize)]
pub struct WireRateLimit {
    /// Seconds to wait
    pub retry_after: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audit_entry_takes_time_from_id() {
        let wire: WireAuditLog = serde_json::from_value(json!({
            "audit_log_entries": [{
                "id": "175928847299117063",
                "user_id": "80351110224678912",
                "target_id": "41771983423143937",
                "action_type": 32
            }]
        }))
        .unwrap();

        let entry = wire
            .audit_log_entries
            .into_iter()
            .next()
            .and_then(WireAuditEntry::into_entry)
            .unwrap();

        assert_eq!(entry.action, AuditAction::RoleDelete);
        assert_eq!(entry.executor_id, Some(UserId::new(80351110224678912)));
        assert_eq!(entry.created_at.timestamp_millis(), 1462015105796);
    }

    #[test]
    fn test_channel_translation() {
        let wire: WireChannel = serde_json::from_value(json!({
            "id": "41771983423143937",
            "type": 2,
            "name": "lounge",
            "position": 4,
            "bitrate": 64000,
            "user_limit": 10,
            "permission_overwrites": [
                {"id": "7", "type": 0, "allow": "1024", "deny": "0"},
                {"id": "8", "type": 1, "allow": "0", "deny": "2048"}
            ]
        }))
        .unwrap();

        let channel = wire.into_channel(GuildId::new(1));
        assert_eq!(channel.kind, ChannelKind::Voice);
        assert_eq!(channel.guild_id, GuildId::new(1));
        assert!(channel.permission_overwrites[0].targets_role(RoleId::new(7)));
        assert_eq!(channel.permission_overwrites[1].kind, OverwriteKind::Member);

        let body = channel_body(&channel);
        assert_eq!(body["bitrate"], json!(64000));
        assert!(body.get("topic").is_none());
        assert_eq!(body["permission_overwrites"][0]["allow"], json!("1024"));
    }

    #[test]
    fn test_member_translation() {
        let wire: WireMember = serde_json::from_value(json!({
            "user": {"id": "9", "bot": true},
            "roles": ["10", "11"]
        }))
        .unwrap();

        let member = Member::from(wire);
        assert!(member.bot);
        assert!(member.has_role(RoleId::new(11)));
    }
}
