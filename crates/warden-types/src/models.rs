//! Platform resource models
//!
//! These mirror the parts of guild state the guard observes and restores.
//! They are transport-neutral; platform adapters translate their own wire
//! shapes into these.

use crate::ids::{string_u64, ChannelId, GuildId, RoleId, Snowflake, UserId};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Permission bit set
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Permissions(pub u64);

impl Permissions {
    pub const NONE: Permissions = Permissions(0);

    pub fn bits(self) -> u64 {
        self.0
    }
}

impl Serialize for Permissions {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        string_u64::serialize(&self.0, serializer)
    }
}

impl<'de> Deserialize<'de> for Permissions {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        string_u64::deserialize(deserializer).map(Permissions)
    }
}

/// Guild-level settings the guard watches
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildSettings {
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
    pub vanity_code: Option<String>,
}

impl GuildSettings {
    /// Fields that differ between `self` (the prior state) and `after`,
    /// each carrying the prior value so it can be written back on its own.
    ///
    /// The vanity code is not included; it has no structured edit and is
    /// handled through [`GuildSettings::vanity_changed`].
    pub fn changed_fields(&self, after: &GuildSettings) -> Vec<GuildField> {
        let mut fields = Vec::new();

        if self.public_updates_channel_id != after.public_updates_channel_id {
            fields.push(GuildField::PublicUpdatesChannel(self.public_updates_channel_id));
        }
        if self.afk_channel_id != after.afk_channel_id {
            fields.push(GuildField::AfkChannel(self.afk_channel_id));
        }
        if self.afk_timeout != after.afk_timeout {
            fields.push(GuildField::AfkTimeout(self.afk_timeout));
        }
        if self.rules_channel_id != after.rules_channel_id {
            fields.push(GuildField::RulesChannel(self.rules_channel_id));
        }
        if self.system_channel_id != after.system_channel_id {
            fields.push(GuildField::SystemChannel(self.system_channel_id));
        }
        if self.icon != after.icon {
            fields.push(GuildField::Icon(self.icon.clone()));
        }
        if self.banner != after.banner {
            fields.push(GuildField::Banner(self.banner.clone()));
        }
        if self.name != after.name {
            fields.push(GuildField::Name(self.name.clone()));
        }

        fields
    }

    pub fn vanity_changed(&self, after: &GuildSettings) -> bool {
        self.vanity_code != after.vanity_code
    }
}

/// A single restorable guild setting with its value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "snake_case")]
pub enum GuildField {
    Name(String),
    /// Icon hash; adapters resolve it back to image data
    Icon(Option<String>),
    /// Banner hash; adapters resolve it back to image data
    Banner(Option<String>),
    AfkChannel(Option<ChannelId>),
    AfkTimeout(u32),
    SystemChannel(Option<ChannelId>),
    RulesChannel(Option<ChannelId>),
    PublicUpdatesChannel(Option<ChannelId>),
}

impl GuildField {
    pub fn name(&self) -> &'static str {
        match self {
            GuildField::Name(_) => "name",
            GuildField::Icon(_) => "icon",
            GuildField::Banner(_) => "banner",
            GuildField::AfkChannel(_) => "afk_channel",
            GuildField::AfkTimeout(_) => "afk_timeout",
            GuildField::SystemChannel(_) => "system_channel",
            GuildField::RulesChannel(_) => "rules_channel",
            GuildField::PublicUpdatesChannel(_) => "public_updates_channel",
        }
    }
}

impl fmt::Display for GuildField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Channel types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    Text,
    Voice,
    Category,
    Announcement,
    Stage,
    Forum,
    Other(u8),
}

impl ChannelKind {
    pub fn code(self) -> u8 {
        match self {
            ChannelKind::Text => 0,
            ChannelKind::Voice => 2,
            ChannelKind::Category => 4,
            ChannelKind::Announcement => 5,
            ChannelKind::Stage => 13,
            ChannelKind::Forum => 15,
            ChannelKind::Other(code) => code,
        }
    }

    pub fn from_code(code: u8) -> Self {
        match code {
            0 => ChannelKind::Text,
            2 => ChannelKind::Voice,
            4 => ChannelKind::Category,
            5 => ChannelKind::Announcement,
            13 => ChannelKind::Stage,
            15 => ChannelKind::Forum,
            other => ChannelKind::Other(other),
        }
    }

    /// Direct-message channels live outside any guild and are never guarded.
    pub fn is_private(self) -> bool {
        matches!(self.code(), 1 | 3)
    }
}

/// Whom a permission overwrite applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverwriteKind {
    Role,
    Member,
}

/// Per-channel permission overwrite
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionOverwrite {
    /// Role or member the overwrite targets
    pub id: Snowflake,
    pub kind: OverwriteKind,
    #[serde(default)]
    pub allow: Permissions,
    #[serde(default)]
    pub deny: Permissions,
}

impl PermissionOverwrite {
    pub fn for_role(role_id: RoleId, allow: Permissions, deny: Permissions) -> Self {
        Self {
            id: Snowflake::new(role_id.get()),
            kind: OverwriteKind::Role,
            allow,
            deny,
        }
    }

    pub fn targets_role(&self, role_id: RoleId) -> bool {
        self.kind == OverwriteKind::Role && self.id.get() == role_id.get()
    }
}

/// Guild channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: ChannelId,
    pub guild_id: GuildId,
    pub name: String,
    pub kind: ChannelKind,
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
    pub permission_overwrites: Vec<PermissionOverwrite>,
}

/// Guild role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
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
    /// Owned by an integration; cannot be recreated by hand
    #[serde(default)]
    pub managed: bool,
}

/// Guild member
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub user_id: UserId,
    #[serde(default)]
    pub roles: Vec<RoleId>,
    #[serde(default)]
    pub bot: bool,
}

impl Member {
    pub fn has_role(&self, role_id: RoleId) -> bool {
        self.roles.contains(&role_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> GuildSettings {
        GuildSettings {
            id: GuildId::new(1),
            owner_id: UserId::new(2),
            name: "home".to_string(),
            icon: Some("abc".to_string()),
            banner: None,
            afk_channel_id: None,
            afk_timeout: 300,
            system_channel_id: Some(ChannelId::new(10)),
            rules_channel_id: None,
            public_updates_channel_id: None,
            vanity_code: Some("home".to_string()),
        }
    }

    #[test]
    fn test_changed_fields_carry_prior_values() {
        let before = settings();
        let mut after = before.clone();
        after.name = "pwned".to_string();
        after.afk_timeout = 60;
        after.system_channel_id = None;

        let fields = before.changed_fields(&after);
        assert_eq!(fields.len(), 3);
        assert!(fields.contains(&GuildField::Name("home".to_string())));
        assert!(fields.contains(&GuildField::AfkTimeout(300)));
        assert!(fields.contains(&GuildField::SystemChannel(Some(ChannelId::new(10)))));
        assert!(!before.vanity_changed(&after));
    }

    #[test]
    fn test_vanity_tracked_separately() {
        let before = settings();
        let mut after = before.clone();
        after.vanity_code = None;

        assert!(before.changed_fields(&after).is_empty());
        assert!(before.vanity_changed(&after));
    }

    #[test]
    fn test_channel_kind_codes() {
        assert_eq!(ChannelKind::from_code(2), ChannelKind::Voice);
        assert_eq!(ChannelKind::from_code(99), ChannelKind::Other(99));
        assert!(ChannelKind::from_code(1).is_private());
        assert!(!ChannelKind::Text.is_private());
    }

    #[test]
    fn test_overwrite_targets_role() {
        let overwrite =
            PermissionOverwrite::for_role(RoleId::new(7), Permissions(1024), Permissions::NONE);
        assert!(overwrite.targets_role(RoleId::new(7)));
        assert!(!overwrite.targets_role(RoleId::new(8)));
    }
}
