//! In-memory platform implementation
//!
//! Holds a single guild in memory, records every mutating call and lets
//! callers inject failures. Used for development and throughout the tests.

use super::Platform;
use crate::error::{PlatformError, PlatformResult};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use warden_types::{
    AuditAction, AuditEntry, Channel, ChannelId, GuildField, GuildId, GuildSettings, Member,
    PermissionOverwrite, Role, RoleId, UserId, WebhookId,
};

/// A mutating call made against the platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformCall {
    DeleteChannel(ChannelId),
    CreateChannel { name: String },
    EditChannel(ChannelId),
    SetChannelPosition { channel_id: ChannelId, position: i32 },
    PutOverwrite {
        channel_id: ChannelId,
        overwrite: PermissionOverwrite,
    },
    CreateRole { name: String },
    EditRole(RoleId),
    SetRolePosition { role_id: RoleId, position: i32 },
    DeleteRole(RoleId),
    AddMemberRoles { user_id: UserId, roles: Vec<RoleId> },
    SetMemberRoles { user_id: UserId, roles: Vec<RoleId> },
    Ban { user_id: UserId, reason: String },
    Unban(UserId),
    DeleteWebhook(WebhookId),
    EditGuild(GuildField),
    SetVanityCode(Option<String>),
}

type FailureRule = Box<dyn Fn(&PlatformCall) -> Option<PlatformError> + Send + Sync>;

#[derive(Debug)]
struct GuildState {
    settings: GuildSettings,
    channels: BTreeMap<ChannelId, Channel>,
    roles: BTreeMap<RoleId, Role>,
    members: BTreeMap<UserId, Member>,
    bans: HashSet<UserId>,
    webhooks: HashSet<WebhookId>,
    audit: Vec<AuditEntry>,
}

/// In-memory guild for development and testing
pub struct MemoryPlatform {
    self_id: UserId,
    state: Arc<RwLock<GuildState>>,
    calls: Arc<RwLock<Vec<PlatformCall>>>,
    failures: Arc<RwLock<Vec<FailureRule>>>,
    next_id: AtomicU64,
}

impl std::fmt::Debug for MemoryPlatform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryPlatform")
            .field("self_id", &self.self_id)
            .finish()
    }
}

impl MemoryPlatform {
    /// Create a platform hosting one guild
    pub fn new(settings: GuildSettings, self_id: UserId) -> Self {
        Self {
            self_id,
            state: Arc::new(RwLock::new(GuildState {
                settings,
                channels: BTreeMap::new(),
                roles: BTreeMap::new(),
                members: BTreeMap::new(),
                bans: HashSet::new(),
                webhooks: HashSet::new(),
                audit: Vec::new(),
            })),
            calls: Arc::new(RwLock::new(Vec::new())),
            failures: Arc::new(RwLock::new(Vec::new())),
            next_id: AtomicU64::new(9_000_000),
        }
    }

    // ── seeding ──────────────────────────────────────────────────────────

    pub async fn add_role(&self, role: Role) {
        self.state.write().await.roles.insert(role.id, role);
    }

    pub async fn add_channel(&self, channel: Channel) {
        self.state.write().await.channels.insert(channel.id, channel);
    }

    pub async fn add_member(&self, member: Member) {
        self.state.write().await.members.insert(member.user_id, member);
    }

    pub async fn remove_member(&self, user_id: UserId) {
        self.state.write().await.members.remove(&user_id);
    }

    pub async fn add_webhook(&self, webhook_id: WebhookId) {
        self.state.write().await.webhooks.insert(webhook_id);
    }

    pub async fn add_ban(&self, user_id: UserId) {
        self.state.write().await.bans.insert(user_id);
    }

    /// Append an audit entry; the latest pushed is the most recent
    pub async fn push_audit(&self, entry: AuditEntry) {
        self.state.write().await.audit.push(entry);
    }

    /// Apply a settings change directly, without going through a restore call
    pub async fn replace_settings(&self, settings: GuildSettings) {
        self.state.write().await.settings = settings;
    }

    /// Fail every call matching the predicate with the returned error
    pub async fn fail_when<F>(&self, rule: F)
    where
        F: Fn(&PlatformCall) -> Option<PlatformError> + Send + Sync + 'static,
    {
        self.failures.write().await.push(Box::new(rule));
    }

    // ── inspection ───────────────────────────────────────────────────────

    pub async fn calls(&self) -> Vec<PlatformCall> {
        self.calls.read().await.clone()
    }

    pub async fn count_calls<F>(&self, predicate: F) -> usize
    where
        F: Fn(&PlatformCall) -> bool,
    {
        self.calls.read().await.iter().filter(|c| predicate(c)).count()
    }

    pub async fn settings(&self) -> GuildSettings {
        self.state.read().await.settings.clone()
    }

    pub async fn role(&self, role_id: RoleId) -> Option<Role> {
        self.state.read().await.roles.get(&role_id).cloned()
    }

    pub async fn role_named(&self, name: &str) -> Option<Role> {
        self.state
            .read()
            .await
            .roles
            .values()
            .find(|r| r.name == name)
            .cloned()
    }

    pub async fn channel(&self, channel_id: ChannelId) -> Option<Channel> {
        self.state.read().await.channels.get(&channel_id).cloned()
    }

    pub async fn channel_named(&self, name: &str) -> Option<Channel> {
        self.state
            .read()
            .await
            .channels
            .values()
            .find(|c| c.name == name)
            .cloned()
    }

    pub async fn member_roles(&self, user_id: UserId) -> Option<Vec<RoleId>> {
        self.state
            .read()
            .await
            .members
            .get(&user_id)
            .map(|m| m.roles.clone())
    }

    pub async fn is_banned(&self, user_id: UserId) -> bool {
        self.state.read().await.bans.contains(&user_id)
    }

    pub async fn has_webhook(&self, webhook_id: WebhookId) -> bool {
        self.state.read().await.webhooks.contains(&webhook_id)
    }

    // ── internals ────────────────────────────────────────────────────────

    /// Log the call, then apply any injected failure
    async fn record(&self, call: PlatformCall) -> PlatformResult<()> {
        let failure = {
            let failures = self.failures.read().await;
            failures.iter().find_map(|rule| rule(&call))
        };
        self.calls.write().await.push(call);
        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn allocate_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn check_guild(state: &GuildState, guild_id: GuildId) -> PlatformResult<()> {
        if state.settings.id == guild_id {
            Ok(())
        } else {
            Err(PlatformError::NotFound(format!("{}", guild_id)))
        }
    }
}

#[async_trait]
impl Platform for MemoryPlatform {
    fn self_id(&self) -> UserId {
        self.self_id
    }

    async fn guild(&self, guild_id: GuildId) -> PlatformResult<Option<GuildSettings>> {
        let state = self.state.read().await;
        Ok((state.settings.id == guild_id).then(|| state.settings.clone()))
    }

    async fn fetch_recent_entry(
        &self,
        guild_id: GuildId,
        action: AuditAction,
    ) -> PlatformResult<Option<AuditEntry>> {
        let state = self.state.read().await;
        Self::check_guild(&state, guild_id)?;
        Ok(state.audit.iter().rev().find(|e| e.action == action).cloned())
    }

    async fn member(&self, guild_id: GuildId, user_id: UserId) -> PlatformResult<Option<Member>> {
        let state = self.state.read().await;
        if state.settings.id != guild_id {
            return Ok(None);
        }
        Ok(state.members.get(&user_id).cloned())
    }

    async fn members(&self, guild_id: GuildId) -> PlatformResult<Vec<Member>> {
        let state = self.state.read().await;
        Self::check_guild(&state, guild_id)?;
        Ok(state.members.values().cloned().collect())
    }

    async fn roles(&self, guild_id: GuildId) -> PlatformResult<Vec<Role>> {
        let state = self.state.read().await;
        Self::check_guild(&state, guild_id)?;
        let mut roles: Vec<_> = state.roles.values().cloned().collect();
        roles.sort_by_key(|r| r.position);
        Ok(roles)
    }

    async fn channels(&self, guild_id: GuildId) -> PlatformResult<Vec<Channel>> {
        let state = self.state.read().await;
        Self::check_guild(&state, guild_id)?;
        let mut channels: Vec<_> = state.channels.values().cloned().collect();
        channels.sort_by_key(|c| c.position);
        Ok(channels)
    }

    async fn delete_channel(&self, channel_id: ChannelId) -> PlatformResult<()> {
        self.record(PlatformCall::DeleteChannel(channel_id)).await?;
        let mut state = self.state.write().await;
        state
            .channels
            .remove(&channel_id)
            .map(|_| ())
            .ok_or_else(|| PlatformError::NotFound(channel_id.to_string()))
    }

    async fn create_channel(&self, guild_id: GuildId, template: &Channel) -> PlatformResult<Channel> {
        self.record(PlatformCall::CreateChannel {
            name: template.name.clone(),
        })
        .await?;
        let mut state = self.state.write().await;
        Self::check_guild(&state, guild_id)?;
        let channel = Channel {
            id: ChannelId::new(self.allocate_id()),
            guild_id,
            ..template.clone()
        };
        state.channels.insert(channel.id, channel.clone());
        Ok(channel)
    }

    async fn edit_channel(&self, channel: &Channel) -> PlatformResult<()> {
        self.record(PlatformCall::EditChannel(channel.id)).await?;
        let mut state = self.state.write().await;
        let current = state
            .channels
            .get_mut(&channel.id)
            .ok_or_else(|| PlatformError::NotFound(channel.id.to_string()))?;
        *current = Channel {
            id: current.id,
            guild_id: current.guild_id,
            ..channel.clone()
        };
        Ok(())
    }

    async fn set_channel_position(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        position: i32,
    ) -> PlatformResult<()> {
        self.record(PlatformCall::SetChannelPosition {
            channel_id,
            position,
        })
        .await?;
        let mut state = self.state.write().await;
        Self::check_guild(&state, guild_id)?;
        let channel = state
            .channels
            .get_mut(&channel_id)
            .ok_or_else(|| PlatformError::NotFound(channel_id.to_string()))?;
        channel.position = position;
        Ok(())
    }

    async fn put_overwrite(
        &self,
        channel_id: ChannelId,
        overwrite: &PermissionOverwrite,
    ) -> PlatformResult<()> {
        self.record(PlatformCall::PutOverwrite {
            channel_id,
            overwrite: overwrite.clone(),
        })
        .await?;
        let mut state = self.state.write().await;
        let channel = state
            .channels
            .get_mut(&channel_id)
            .ok_or_else(|| PlatformError::NotFound(channel_id.to_string()))?;
        channel
            .permission_overwrites
            .retain(|o| !(o.id == overwrite.id && o.kind == overwrite.kind));
        channel.permission_overwrites.push(overwrite.clone());
        Ok(())
    }

    async fn create_role(&self, guild_id: GuildId, template: &Role) -> PlatformResult<Role> {
        self.record(PlatformCall::CreateRole {
            name: template.name.clone(),
        })
        .await?;
        let mut state = self.state.write().await;
        Self::check_guild(&state, guild_id)?;
        let role = Role {
            id: RoleId::new(self.allocate_id()),
            // New roles land just above @everyone until moved
            position: 1,
            managed: false,
            ..template.clone()
        };
        state.roles.insert(role.id, role.clone());
        Ok(role)
    }

    async fn edit_role(&self, guild_id: GuildId, role: &Role) -> PlatformResult<()> {
        self.record(PlatformCall::EditRole(role.id)).await?;
        let mut state = self.state.write().await;
        Self::check_guild(&state, guild_id)?;
        let current = state
            .roles
            .get_mut(&role.id)
            .ok_or_else(|| PlatformError::NotFound(role.id.to_string()))?;
        current.name = role.name.clone();
        current.color = role.color;
        current.hoist = role.hoist;
        current.permissions = role.permissions;
        current.mentionable = role.mentionable;
        Ok(())
    }

    async fn set_role_position(
        &self,
        guild_id: GuildId,
        role_id: RoleId,
        position: i32,
    ) -> PlatformResult<()> {
        self.record(PlatformCall::SetRolePosition { role_id, position })
            .await?;
        let mut state = self.state.write().await;
        Self::check_guild(&state, guild_id)?;
        let role = state
            .roles
            .get_mut(&role_id)
            .ok_or_else(|| PlatformError::NotFound(role_id.to_string()))?;
        role.position = position;
        Ok(())
    }

    async fn delete_role(&self, guild_id: GuildId, role_id: RoleId) -> PlatformResult<()> {
        self.record(PlatformCall::DeleteRole(role_id)).await?;
        let mut state = self.state.write().await;
        Self::check_guild(&state, guild_id)?;
        if state.roles.remove(&role_id).is_none() {
            return Err(PlatformError::NotFound(role_id.to_string()));
        }
        for member in state.members.values_mut() {
            member.roles.retain(|r| *r != role_id);
        }
        for channel in state.channels.values_mut() {
            channel
                .permission_overwrites
                .retain(|o| !o.targets_role(role_id));
        }
        Ok(())
    }

    async fn add_member_roles(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        roles: &[RoleId],
    ) -> PlatformResult<()> {
        self.record(PlatformCall::AddMemberRoles {
            user_id,
            roles: roles.to_vec(),
        })
        .await?;
        let mut state = self.state.write().await;
        Self::check_guild(&state, guild_id)?;
        if let Some(missing) = roles.iter().find(|r| !state.roles.contains_key(*r)) {
            return Err(PlatformError::NotFound(missing.to_string()));
        }
        let member = state
            .members
            .get_mut(&user_id)
            .ok_or_else(|| PlatformError::NotFound(user_id.to_string()))?;
        for role in roles {
            if !member.roles.contains(role) {
                member.roles.push(*role);
            }
        }
        Ok(())
    }

    async fn set_member_roles(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        roles: &[RoleId],
    ) -> PlatformResult<()> {
        self.record(PlatformCall::SetMemberRoles {
            user_id,
            roles: roles.to_vec(),
        })
        .await?;
        let mut state = self.state.write().await;
        Self::check_guild(&state, guild_id)?;
        let member = state
            .members
            .get_mut(&user_id)
            .ok_or_else(|| PlatformError::NotFound(user_id.to_string()))?;
        member.roles = roles.to_vec();
        Ok(())
    }

    async fn ban(&self, guild_id: GuildId, user_id: UserId, reason: &str) -> PlatformResult<()> {
        self.record(PlatformCall::Ban {
            user_id,
            reason: reason.to_string(),
        })
        .await?;
        let mut state = self.state.write().await;
        Self::check_guild(&state, guild_id)?;
        state.members.remove(&user_id);
        state.bans.insert(user_id);
        Ok(())
    }

    async fn unban(&self, guild_id: GuildId, user_id: UserId) -> PlatformResult<()> {
        self.record(PlatformCall::Unban(user_id)).await?;
        let mut state = self.state.write().await;
        Self::check_guild(&state, guild_id)?;
        if state.bans.remove(&user_id) {
            Ok(())
        } else {
            Err(PlatformError::NotFound(format!("ban for {}", user_id)))
        }
    }

    async fn delete_webhook(&self, webhook_id: WebhookId) -> PlatformResult<()> {
        self.record(PlatformCall::DeleteWebhook(webhook_id)).await?;
        let mut state = self.state.write().await;
        if state.webhooks.remove(&webhook_id) {
            Ok(())
        } else {
            Err(PlatformError::NotFound(webhook_id.to_string()))
        }
    }

    async fn edit_guild(&self, guild_id: GuildId, field: &GuildField) -> PlatformResult<()> {
        self.record(PlatformCall::EditGuild(field.clone())).await?;
        let mut state = self.state.write().await;
        Self::check_guild(&state, guild_id)?;
        let settings = &mut state.settings;
        match field.clone() {
            GuildField::Name(name) => settings.name = name,
            GuildField::Icon(icon) => settings.icon = icon,
            GuildField::Banner(banner) => settings.banner = banner,
            GuildField::AfkChannel(channel) => settings.afk_channel_id = channel,
            GuildField::AfkTimeout(timeout) => settings.afk_timeout = timeout,
            GuildField::SystemChannel(channel) => settings.system_channel_id = channel,
            GuildField::RulesChannel(channel) => settings.rules_channel_id = channel,
            GuildField::PublicUpdatesChannel(channel) => {
                settings.public_updates_channel_id = channel
            }
        }
        Ok(())
    }

    async fn set_vanity_code(&self, guild_id: GuildId, code: Option<&str>) -> PlatformResult<()> {
        self.record(PlatformCall::SetVanityCode(code.map(str::to_string)))
            .await?;
        let mut state = self.state.write().await;
        Self::check_guild(&state, guild_id)?;
        state.settings.vanity_code = code.map(str::to_string);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_types::Permissions;

    fn platform() -> MemoryPlatform {
        MemoryPlatform::new(
            GuildSettings {
                id: GuildId::new(1),
                owner_id: UserId::new(2),
                name: "home".to_string(),
                icon: None,
                banner: None,
                afk_channel_id: None,
                afk_timeout: 300,
                system_channel_id: None,
                rules_channel_id: None,
                public_updates_channel_id: None,
                vanity_code: None,
            },
            UserId::new(3),
        )
    }

    fn role(id: u64, name: &str) -> Role {
        Role {
            id: RoleId::new(id),
            name: name.to_string(),
            color: 0,
            hoist: false,
            position: 2,
            permissions: Permissions::NONE,
            mentionable: false,
            managed: false,
        }
    }

    #[tokio::test]
    async fn test_delete_role_strips_members() {
        let platform = platform();
        platform.add_role(role(10, "mods")).await;
        platform
            .add_member(Member {
                user_id: UserId::new(5),
                roles: vec![RoleId::new(10)],
                bot: false,
            })
            .await;

        platform
            .delete_role(GuildId::new(1), RoleId::new(10))
            .await
            .unwrap();

        assert_eq!(platform.member_roles(UserId::new(5)).await, Some(vec![]));
        assert!(platform.role(RoleId::new(10)).await.is_none());
    }

    #[tokio::test]
    async fn test_injected_failure_is_recorded() {
        let platform = platform();
        platform
            .fail_when(|call| match call {
                PlatformCall::Unban(_) => Some(PlatformError::Forbidden("nope".into())),
                _ => None,
            })
            .await;
        platform.add_ban(UserId::new(9)).await;

        let err = platform
            .unban(GuildId::new(1), UserId::new(9))
            .await
            .unwrap_err();

        assert!(matches!(err, PlatformError::Forbidden(_)));
        assert!(platform.is_banned(UserId::new(9)).await);
        assert_eq!(platform.calls().await, vec![PlatformCall::Unban(UserId::new(9))]);
    }

    #[tokio::test]
    async fn test_latest_audit_entry_wins() {
        let platform = platform();
        let now = chrono::Utc::now();
        for executor in [20, 21] {
            platform
                .push_audit(AuditEntry {
                    action: AuditAction::RoleCreate,
                    executor_id: Some(UserId::new(executor)),
                    target_id: None,
                    created_at: now,
                })
                .await;
        }

        let entry = platform
            .fetch_recent_entry(GuildId::new(1), AuditAction::RoleCreate)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.executor_id, Some(UserId::new(21)));
        assert!(platform
            .fetch_recent_entry(GuildId::new(1), AuditAction::RoleDelete)
            .await
            .unwrap()
            .is_none());
    }
}
