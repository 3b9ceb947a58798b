//! Role snapshots
//!
//! Read caches of who held each role and which channel overwrites referenced
//! it. Reconciling a role deletion needs this state after the platform has
//! already forgotten it, so the caches are rebuilt on a schedule and swapped
//! in whole.

use crate::error::PlatformResult;
use crate::platform::Platform;
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use warden_types::{ChannelId, GuildId, OverwriteKind, Permissions, RoleId, UserId};

/// `role → members` at the time of the last rebuild
#[derive(Debug, Clone, Default)]
pub struct RoleMembershipSnapshot {
    pub generation: u64,
    pub taken_at: Option<DateTime<Utc>>,
    roles: HashMap<RoleId, BTreeSet<UserId>>,
}

impl RoleMembershipSnapshot {
    pub fn members_of(&self, role_id: RoleId) -> Vec<UserId> {
        self.roles
            .get(&role_id)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Number of roles tracked
    pub fn len(&self) -> usize {
        self.roles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }
}

/// An overwrite a role held on one channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelOverwrite {
    pub channel_id: ChannelId,
    pub allow: Permissions,
    pub deny: Permissions,
}

/// `role → [(channel, overwrite)]` in channel order
#[derive(Debug, Clone, Default)]
pub struct RoleChannelPermissionSnapshot {
    pub generation: u64,
    pub taken_at: Option<DateTime<Utc>>,
    roles: HashMap<RoleId, Vec<ChannelOverwrite>>,
}

impl RoleChannelPermissionSnapshot {
    pub fn overwrites_of(&self, role_id: RoleId) -> Vec<ChannelOverwrite> {
        self.roles.get(&role_id).cloned().unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.roles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }
}

/// What both snapshots knew about one role, captured before it is acted on
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleHolders {
    pub members: Vec<UserId>,
    pub overwrites: Vec<ChannelOverwrite>,
}

/// Both snapshots for the guarded guild
#[derive(Debug)]
pub struct SnapshotCache {
    guild_id: GuildId,
    membership: RwLock<Arc<RoleMembershipSnapshot>>,
    permissions: RwLock<Arc<RoleChannelPermissionSnapshot>>,
}

impl SnapshotCache {
    pub fn new(guild_id: GuildId) -> Self {
        Self {
            guild_id,
            membership: RwLock::new(Arc::new(RoleMembershipSnapshot::default())),
            permissions: RwLock::new(Arc::new(RoleChannelPermissionSnapshot::default())),
        }
    }

    pub async fn membership(&self) -> Arc<RoleMembershipSnapshot> {
        self.membership.read().await.clone()
    }

    pub async fn permissions(&self) -> Arc<RoleChannelPermissionSnapshot> {
        self.permissions.read().await.clone()
    }

    pub async fn members_of(&self, role_id: RoleId) -> Vec<UserId> {
        self.membership().await.members_of(role_id)
    }

    pub async fn overwrites_of(&self, role_id: RoleId) -> Vec<ChannelOverwrite> {
        self.permissions().await.overwrites_of(role_id)
    }

    /// Members and overwrites of `role_id` as of the last rebuild
    pub async fn holders_of(&self, role_id: RoleId) -> RoleHolders {
        RoleHolders {
            members: self.members_of(role_id).await,
            overwrites: self.overwrites_of(role_id).await,
        }
    }

    /// Rebuild the membership snapshot. On failure the previous snapshot
    /// stays in place.
    pub async fn refresh_membership(&self, platform: &dyn Platform) -> PlatformResult<usize> {
        let roles = platform.roles(self.guild_id).await?;
        let members = platform.members(self.guild_id).await?;

        let mut by_role: HashMap<RoleId, BTreeSet<UserId>> = roles
            .iter()
            .map(|role| (role.id, BTreeSet::new()))
            .collect();
        for member in &members {
            for role_id in &member.roles {
                by_role.entry(*role_id).or_default().insert(member.user_id);
            }
        }

        let mut slot = self.membership.write().await;
        let snapshot = RoleMembershipSnapshot {
            generation: slot.generation + 1,
            taken_at: Some(Utc::now()),
            roles: by_role,
        };
        let tracked = snapshot.len();
        *slot = Arc::new(snapshot);

        debug!(guild = %self.guild_id, roles = tracked, members = members.len(), "Membership snapshot rebuilt");
        Ok(tracked)
    }

    /// Rebuild the permission snapshot. Only explicit role overwrites are
    /// kept.
    pub async fn refresh_permissions(&self, platform: &dyn Platform) -> PlatformResult<usize> {
        let mut channels = platform.channels(self.guild_id).await?;
        channels.sort_by_key(|c| c.position);

        let mut by_role: HashMap<RoleId, Vec<ChannelOverwrite>> = HashMap::new();
        for channel in channels.iter().filter(|c| !c.kind.is_private()) {
            for overwrite in &channel.permission_overwrites {
                if overwrite.kind != OverwriteKind::Role {
                    continue;
                }
                by_role
                    .entry(RoleId::new(overwrite.id.get()))
                    .or_default()
                    .push(ChannelOverwrite {
                        channel_id: channel.id,
                        allow: overwrite.allow,
                        deny: overwrite.deny,
                    });
            }
        }

        let mut slot = self.permissions.write().await;
        let snapshot = RoleChannelPermissionSnapshot {
            generation: slot.generation + 1,
            taken_at: Some(Utc::now()),
            roles: by_role,
        };
        let tracked = snapshot.len();
        *slot = Arc::new(snapshot);

        debug!(guild = %self.guild_id, roles = tracked, channels = channels.len(), "Permission snapshot rebuilt");
        Ok(tracked)
    }

    /// Rebuild both snapshots, logging rather than returning failures
    pub async fn refresh_all(&self, platform: &dyn Platform) {
        if let Err(e) = self.refresh_membership(platform).await {
            warn!(guild = %self.guild_id, error = %e, "Failed to rebuild membership snapshot");
        }
        if let Err(e) = self.refresh_permissions(platform).await {
            warn!(guild = %self.guild_id, error = %e, "Failed to rebuild permission snapshot");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::MemoryPlatform;
    use warden_types::{Channel, ChannelKind, GuildSettings, Member, PermissionOverwrite, Role};

    fn settings() -> GuildSettings {
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
        }
    }

    fn channel(id: u64, position: i32, overwrites: Vec<PermissionOverwrite>) -> Channel {
        Channel {
            id: ChannelId::new(id),
            guild_id: GuildId::new(1),
            name: format!("chan-{}", id),
            kind: ChannelKind::Text,
            position,
            parent_id: None,
            topic: None,
            nsfw: false,
            bitrate: None,
            user_limit: None,
            rate_limit_per_user: None,
            permission_overwrites: overwrites,
        }
    }

    async fn seeded() -> MemoryPlatform {
        let platform = MemoryPlatform::new(settings(), UserId::new(3));
        platform
            .add_role(Role {
                id: RoleId::new(10),
                name: "mods".to_string(),
                color: 0,
                hoist: false,
                position: 3,
                permissions: Permissions::NONE,
                mentionable: false,
                managed: false,
            })
            .await;
        for user in [20, 21] {
            platform
                .add_member(Member {
                    user_id: UserId::new(user),
                    roles: vec![RoleId::new(10)],
                    bot: false,
                })
                .await;
        }
        let overwrite = PermissionOverwrite::for_role(RoleId::new(10), Permissions(1024), Permissions::NONE);
        platform.add_channel(channel(31, 2, vec![overwrite.clone()])).await;
        platform.add_channel(channel(30, 1, vec![overwrite])).await;
        platform.add_channel(channel(32, 0, vec![])).await;
        platform
    }

    #[tokio::test]
    async fn test_refresh_builds_both_views() {
        let platform = seeded().await;
        let cache = SnapshotCache::new(GuildId::new(1));

        cache.refresh_all(&platform).await;

        assert_eq!(
            cache.members_of(RoleId::new(10)).await,
            vec![UserId::new(20), UserId::new(21)]
        );
        let overwrites = cache.overwrites_of(RoleId::new(10)).await;
        let channels: Vec<_> = overwrites.iter().map(|o| o.channel_id).collect();
        assert_eq!(channels, vec![ChannelId::new(30), ChannelId::new(31)]);
        assert_eq!(overwrites[0].allow, Permissions(1024));
        assert_eq!(cache.membership().await.generation, 1);
        assert_eq!(cache.permissions().await.generation, 1);
    }

    #[tokio::test]
    async fn test_holders_of_captures_both_views() {
        let platform = seeded().await;
        let cache = SnapshotCache::new(GuildId::new(1));
        cache.refresh_all(&platform).await;

        let holders = cache.holders_of(RoleId::new(10)).await;
        assert_eq!(holders.members.len(), 2);
        assert_eq!(holders.overwrites.len(), 2);
        assert_eq!(cache.holders_of(RoleId::new(11)).await, RoleHolders::default());
    }

    #[tokio::test]
    async fn test_unknown_guild_leaves_snapshot_untouched() {
        let platform = seeded().await;
        let cache = SnapshotCache::new(GuildId::new(99));

        assert!(cache.refresh_membership(&platform).await.is_err());
        assert!(cache.refresh_permissions(&platform).await.is_err());
        assert!(cache.membership().await.is_empty());
        assert_eq!(cache.membership().await.generation, 0);
        assert_eq!(cache.permissions().await.generation, 0);
    }
}
