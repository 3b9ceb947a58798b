//! Platform seam
//!
//! Everything the guard reads from or does to the guild goes through
//! [`Platform`]. The daemon plugs in an HTTP adapter; tests and local runs use
//! [`MemoryPlatform`].

mod memory;

pub use memory::{MemoryPlatform, PlatformCall};

use crate::error::PlatformResult;
use async_trait::async_trait;
use warden_types::{
    AuditAction, AuditEntry, Channel, ChannelId, GuildField, GuildId, GuildSettings, Member,
    PermissionOverwrite, Role, RoleId, UserId, WebhookId,
};

/// Read and mutate guild state
#[async_trait]
pub trait Platform: Send + Sync {
    /// Identity the guard itself acts under
    fn self_id(&self) -> UserId;

    // ── reads ────────────────────────────────────────────────────────────

    /// Current guild settings, `None` when the guild is unreachable
    async fn guild(&self, guild_id: GuildId) -> PlatformResult<Option<GuildSettings>>;

    /// Most recent audit entry for `action`, if any
    async fn fetch_recent_entry(
        &self,
        guild_id: GuildId,
        action: AuditAction,
    ) -> PlatformResult<Option<AuditEntry>>;

    /// Resolve a member; `None` once they left
    async fn member(&self, guild_id: GuildId, user_id: UserId) -> PlatformResult<Option<Member>>;

    async fn members(&self, guild_id: GuildId) -> PlatformResult<Vec<Member>>;

    async fn roles(&self, guild_id: GuildId) -> PlatformResult<Vec<Role>>;

    async fn channels(&self, guild_id: GuildId) -> PlatformResult<Vec<Channel>>;

    // ── channels ─────────────────────────────────────────────────────────

    async fn delete_channel(&self, channel_id: ChannelId) -> PlatformResult<()>;

    /// Create a channel shaped like `template`; the template's ID is ignored
    async fn create_channel(&self, guild_id: GuildId, template: &Channel) -> PlatformResult<Channel>;

    /// Write every editable field of `channel` onto the channel with its ID
    async fn edit_channel(&self, channel: &Channel) -> PlatformResult<()>;

    async fn set_channel_position(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        position: i32,
    ) -> PlatformResult<()>;

    /// Create or replace an overwrite on a channel
    async fn put_overwrite(
        &self,
        channel_id: ChannelId,
        overwrite: &PermissionOverwrite,
    ) -> PlatformResult<()>;

    // ── roles ────────────────────────────────────────────────────────────

    /// Create a role shaped like `template`; the template's ID is ignored
    async fn create_role(&self, guild_id: GuildId, template: &Role) -> PlatformResult<Role>;

    /// Write every editable field of `role` onto the role with its ID
    async fn edit_role(&self, guild_id: GuildId, role: &Role) -> PlatformResult<()>;

    async fn set_role_position(
        &self,
        guild_id: GuildId,
        role_id: RoleId,
        position: i32,
    ) -> PlatformResult<()>;

    async fn delete_role(&self, guild_id: GuildId, role_id: RoleId) -> PlatformResult<()>;

    // ── members ──────────────────────────────────────────────────────────

    /// Grant roles in one operation, keeping the member's other roles
    async fn add_member_roles(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        roles: &[RoleId],
    ) -> PlatformResult<()>;

    /// Replace the member's whole role set
    async fn set_member_roles(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        roles: &[RoleId],
    ) -> PlatformResult<()>;

    async fn ban(&self, guild_id: GuildId, user_id: UserId, reason: &str) -> PlatformResult<()>;

    async fn unban(&self, guild_id: GuildId, user_id: UserId) -> PlatformResult<()>;

    // ── misc ─────────────────────────────────────────────────────────────

    async fn delete_webhook(&self, webhook_id: WebhookId) -> PlatformResult<()>;

    /// Write a single guild setting
    async fn edit_guild(&self, guild_id: GuildId, field: &GuildField) -> PlatformResult<()>;

    /// Restore the vanity code. There is no structured edit for it, so
    /// adapters issue the administrative call directly.
    async fn set_vanity_code(&self, guild_id: GuildId, code: Option<&str>) -> PlatformResult<()>;
}
