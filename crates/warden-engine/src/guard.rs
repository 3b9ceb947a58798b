//! Guard orchestration
//!
//! [`Guard`] wires attribution, strikes, punishment and reconciliation into
//! a single per-event pipeline, and drives the role-continuity batch.

use crate::attribution::{AttributionResolver, AttributionResult};
use crate::config::GuardConfig;
use crate::continuity::ContinuityQueue;
use crate::error::PlatformError;
use crate::notify::{NotificationSink, PunishmentRecord};
use crate::platform::Platform;
use crate::punish::Punisher;
use crate::reconcile::{ReconcileReport, Reconciler};
use crate::snapshot::SnapshotCache;
use crate::strikes::{StrikeDecision, StrikeTracker};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};
use warden_types::{EventKind, GuildId, Mutation, MutationEvent, RoleId};

/// Shared mutable state, owned by the guard and handed to every task
#[derive(Debug)]
pub struct GuardState {
    pub strikes: StrikeTracker,
    pub continuity: ContinuityQueue,
    pub snapshots: SnapshotCache,
}

impl GuardState {
    pub fn new(config: &GuardConfig) -> Self {
        Self {
            strikes: StrikeTracker::from_config(config),
            continuity: ContinuityQueue::new(),
            snapshots: SnapshotCache::new(config.guild_id),
        }
    }
}

/// Why an event was not processed at all
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Ignored {
    ForeignGuild,
    PrivateChannel,
}

/// What handling one event did
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HandleReport {
    pub kind: EventKind,
    pub ignored: Option<Ignored>,
    pub attribution: Option<AttributionResult>,
    #[serde(skip)]
    pub decision: Option<StrikeDecision>,
    pub punishment: Option<PunishmentRecord>,
    pub reconcile: Option<ReconcileReport>,
}

impl HandleReport {
    fn new(kind: EventKind) -> Self {
        Self {
            kind,
            ignored: None,
            attribution: None,
            decision: None,
            punishment: None,
            reconcile: None,
        }
    }

    pub fn attributable(&self) -> bool {
        self.attribution
            .as_ref()
            .map(|a| a.attributable())
            .unwrap_or(false)
    }

    pub fn punished(&self) -> bool {
        self.punishment.is_some()
    }
}

/// What one continuity tick did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    /// Entries looked at this tick
    pub processed: usize,
    pub granted: usize,
    pub dropped: usize,
    /// Entries left queued after a failed grant
    pub deferred: usize,
    pub remaining: usize,
    pub elapsed_ms: u64,
}

/// Point-in-time view of guard state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GuardStatus {
    pub guild_id: GuildId,
    pub strike_records: usize,
    pub queued_entries: usize,
    pub membership_roles: usize,
    pub membership_generation: u64,
    pub permission_roles: usize,
    pub permission_generation: u64,
}

/// The guild guard
pub struct Guard {
    config: GuardConfig,
    platform: Arc<dyn Platform>,
    sink: Arc<dyn NotificationSink>,
    state: Arc<GuardState>,
}

impl Guard {
    pub fn new(
        config: GuardConfig,
        platform: Arc<dyn Platform>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        let state = Arc::new(GuardState::new(&config));
        Self {
            config,
            platform,
            sink,
            state,
        }
    }

    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    pub fn state(&self) -> &Arc<GuardState> {
        &self.state
    }

    /// Build both snapshots before the first event arrives
    pub async fn warm_up(&self) {
        self.state.snapshots.refresh_all(self.platform.as_ref()).await;
        let membership = self.state.snapshots.membership().await;
        let permissions = self.state.snapshots.permissions().await;
        info!(
            guild = %self.config.guild_id,
            roles = membership.len(),
            overwritten_roles = permissions.len(),
            "Snapshots warmed up"
        );
    }

    /// Attribute, sanction and reverse one mutation
    #[instrument(skip(self, event), fields(kind = %event.kind(), guild = %event.guild_id))]
    pub async fn handle(&self, event: &MutationEvent) -> HandleReport {
        let kind = event.kind();
        let mut report = HandleReport::new(kind);

        if event.guild_id != self.config.guild_id {
            debug!("Event from unguarded guild ignored");
            report.ignored = Some(Ignored::ForeignGuild);
            return report;
        }
        if event.mutation.is_private_channel() {
            debug!("Private channel event ignored");
            report.ignored = Some(Ignored::PrivateChannel);
            return report;
        }

        // Read before any platform call: a tick landing mid-handle rebuilds
        // the snapshots without the deleted role.
        let holders = match &event.mutation {
            Mutation::RoleDelete { role } => Some(self.state.snapshots.holders_of(role.id).await),
            _ => None,
        };

        let platform = self.platform.as_ref();
        let attribution = AttributionResolver::new(platform, &self.config)
            .resolve(event)
            .await;
        let (actor, entry) = match (attribution.attributable(), attribution.actor_id) {
            (true, Some(actor)) => (actor, attribution.entry.clone()),
            _ => {
                debug!(verdict = %attribution.verdict, "Event not attributable");
                report.attribution = Some(attribution);
                return report;
            }
        };
        let reason = attribution.reason;
        report.attribution = Some(attribution);

        let punisher = Punisher::new(platform, self.sink.as_ref(), &self.config);
        match platform.member(self.config.guild_id, actor).await {
            Ok(Some(member)) => {
                let eligible = punisher.is_eligible(&member);
                let decision =
                    self.state
                        .strikes
                        .check_limit(actor, reason, eligible, event.observed_at);
                report.decision = Some(decision);
                if decision.should_punish() {
                    report.punishment = punisher.punish(&member, reason).await;
                }
            }
            Ok(None) => {
                info!(%actor, "Actor is no longer a member; skipping sanction");
            }
            Err(e) => {
                warn!(%actor, error = %e, "Failed to resolve actor");
            }
        }

        if kind.is_reversible() {
            let reconciler =
                Reconciler::new(platform, &self.state.continuity, self.config.guild_id);
            report.reconcile = Some(
                reconciler
                    .reverse(event, entry.as_ref(), holders.as_ref())
                    .await,
            );
        }

        report
    }

    /// Drain up to `batch_size` continuity entries, then rebuild snapshots
    pub async fn run_batch(&self) -> BatchReport {
        let started = Instant::now();
        let platform = self.platform.as_ref();
        let batch = self
            .state
            .continuity
            .peek_batch(self.config.batch_size)
            .await;

        let mut report = BatchReport {
            processed: batch.len(),
            ..Default::default()
        };
        let mut guild_roles: HashMap<GuildId, Result<HashSet<RoleId>, PlatformError>> =
            HashMap::new();

        for entry in batch {
            let member_id = entry.member_id;

            if !guild_roles.contains_key(&entry.guild_id) {
                let roles = platform
                    .roles(entry.guild_id)
                    .await
                    .map(|roles| roles.into_iter().map(|r| r.id).collect());
                guild_roles.insert(entry.guild_id, roles);
            }
            let existing = match guild_roles.get(&entry.guild_id) {
                Some(Ok(existing)) => existing,
                Some(Err(e)) if e.is_not_found() => {
                    info!(member = %member_id, guild = %entry.guild_id, "Guild gone; dropping continuity entry");
                    self.state.continuity.drop_entry(member_id).await;
                    report.dropped += 1;
                    continue;
                }
                Some(Err(e)) => {
                    warn!(member = %member_id, error = %e, "Failed to list roles; deferring entry");
                    report.deferred += 1;
                    self.state.continuity.defer(member_id).await;
                    continue;
                }
                None => continue,
            };

            match platform.member(entry.guild_id, member_id).await {
                Ok(Some(_)) => {}
                Ok(None) => {
                    info!(member = %member_id, "Member left; dropping continuity entry");
                    self.state.continuity.drop_entry(member_id).await;
                    report.dropped += 1;
                    continue;
                }
                Err(e) => {
                    warn!(member = %member_id, error = %e, "Failed to resolve member; deferring entry");
                    report.deferred += 1;
                    self.state.continuity.defer(member_id).await;
                    continue;
                }
            }

            let grants: Vec<RoleId> = entry
                .pending_role_ids
                .iter()
                .copied()
                .filter(|role| existing.contains(role))
                .collect();

            if !grants.is_empty() {
                if let Err(e) = platform
                    .add_member_roles(entry.guild_id, member_id, &grants)
                    .await
                {
                    warn!(member = %member_id, error = %e, "Role grant failed; entry kept");
                    report.deferred += 1;
                    self.state.continuity.defer(member_id).await;
                    continue;
                }
                report.granted += 1;
            }

            let settled: BTreeSet<RoleId> = entry.pending_role_ids;
            self.state.continuity.complete(member_id, &settled).await;
            debug!(member = %member_id, granted = grants.len(), "Continuity entry settled");
        }

        self.state.snapshots.refresh_all(platform).await;

        report.remaining = self.state.continuity.len().await;
        report.elapsed_ms = started.elapsed().as_millis() as u64;
        info!(
            processed = report.processed,
            granted = report.granted,
            dropped = report.dropped,
            deferred = report.deferred,
            remaining = report.remaining,
            elapsed_ms = report.elapsed_ms,
            "Continuity batch finished"
        );
        report
    }

    pub async fn status(&self) -> GuardStatus {
        let membership = self.state.snapshots.membership().await;
        let permissions = self.state.snapshots.permissions().await;
        GuardStatus {
            guild_id: self.config.guild_id,
            strike_records: self.state.strikes.len(),
            queued_entries: self.state.continuity.len().await,
            membership_roles: membership.len(),
            membership_generation: membership.generation,
            permission_roles: permissions.len(),
            permission_generation: permissions.generation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::NoopSink;
    use crate::platform::MemoryPlatform;
    use warden_types::{Channel, ChannelId, ChannelKind, GuildSettings, Mutation, UserId};

    fn settings(guild: u64) -> GuildSettings {
        GuildSettings {
            id: GuildId::new(guild),
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

    fn dm_channel() -> Channel {
        Channel {
            id: ChannelId::new(77),
            guild_id: GuildId::new(1),
            name: "dm".to_string(),
            kind: ChannelKind::from_code(1),
            position: 0,
            parent_id: None,
            topic: None,
            nsfw: false,
            bitrate: None,
            user_limit: None,
            rate_limit_per_user: None,
            permission_overwrites: vec![],
        }
    }

    fn guard() -> (Guard, Arc<MemoryPlatform>) {
        let platform = Arc::new(MemoryPlatform::new(settings(1), UserId::new(3)));
        let guard = Guard::new(
            GuardConfig::for_guild(GuildId::new(1)),
            platform.clone(),
            Arc::new(NoopSink),
        );
        (guard, platform)
    }

    #[tokio::test]
    async fn test_foreign_guild_ignored() {
        let (guard, platform) = guard();
        let event = MutationEvent::new(
            GuildId::new(99),
            Mutation::BanAdd {
                user_id: UserId::new(5),
            },
        );

        let report = guard.handle(&event).await;

        assert_eq!(report.ignored, Some(Ignored::ForeignGuild));
        assert!(report.attribution.is_none());
        assert!(platform.calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_private_channel_ignored() {
        let (guard, _platform) = guard();
        let event = MutationEvent::new(
            GuildId::new(1),
            Mutation::ChannelCreate {
                channel: dm_channel(),
            },
        );

        let report = guard.handle(&event).await;
        assert_eq!(report.ignored, Some(Ignored::PrivateChannel));
    }

    #[tokio::test]
    async fn test_empty_batch_is_idempotent() {
        let (guard, platform) = guard();

        let first = guard.run_batch().await;
        let second = guard.run_batch().await;

        assert_eq!(first.processed, 0);
        assert_eq!(second.remaining, 0);
        assert!(platform.calls().await.is_empty());
        assert_eq!(guard.status().await.membership_generation, 2);
    }
}
