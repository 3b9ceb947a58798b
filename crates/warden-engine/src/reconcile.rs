//! Reconciliation
//!
//! Reverses an unauthorized mutation. Every step is attempted on its own:
//! one refused restore never stops the others, and each outcome is recorded.

use crate::continuity::ContinuityQueue;
use crate::error::PlatformResult;
use crate::platform::Platform;
use crate::snapshot::RoleHolders;
use serde::Serialize;
use tracing::{debug, info, warn};
use warden_types::{
    AuditEntry, Channel, GuildId, GuildSettings, Mutation, MutationEvent, PermissionOverwrite,
    Role, WebhookId,
};

/// Result of one reversal step
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum OutcomeStatus {
    Applied,
    Failed(String),
    Skipped(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReversalOutcome {
    pub step: String,
    #[serde(flatten)]
    pub status: OutcomeStatus,
}

impl ReversalOutcome {
    pub fn is_applied(&self) -> bool {
        self.status == OutcomeStatus::Applied
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, OutcomeStatus::Failed(_))
    }
}

/// Everything a reversal did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub outcomes: Vec<ReversalOutcome>,
    /// Continuity grants queued for former role holders
    pub queued_grants: usize,
}

impl ReconcileReport {
    pub fn applied(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_applied()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_failed()).count()
    }

    fn attempt(&mut self, step: impl Into<String>, result: PlatformResult<()>) -> bool {
        let step = step.into();
        let status = match result {
            Ok(()) => {
                debug!(step = %step, "Reversal step applied");
                OutcomeStatus::Applied
            }
            Err(e) => {
                warn!(step = %step, error = %e, "Reversal step failed");
                OutcomeStatus::Failed(e.to_string())
            }
        };
        let applied = status == OutcomeStatus::Applied;
        self.outcomes.push(ReversalOutcome { step, status });
        applied
    }

    fn skip(&mut self, step: impl Into<String>, why: impl Into<String>) {
        self.outcomes.push(ReversalOutcome {
            step: step.into(),
            status: OutcomeStatus::Skipped(why.into()),
        });
    }
}

/// Restores guild state after an unauthorized mutation
pub struct Reconciler<'a> {
    platform: &'a dyn Platform,
    continuity: &'a ContinuityQueue,
    guild_id: GuildId,
}

impl<'a> Reconciler<'a> {
    pub fn new(
        platform: &'a dyn Platform,
        continuity: &'a ContinuityQueue,
        guild_id: GuildId,
    ) -> Self {
        Self {
            platform,
            continuity,
            guild_id,
        }
    }

    /// Reverse `event`. `entry` is the audit entry it was attributed through;
    /// `holders` is what the snapshots knew about a deleted role when its
    /// event arrived.
    pub async fn reverse(
        &self,
        event: &MutationEvent,
        entry: Option<&AuditEntry>,
        holders: Option<&RoleHolders>,
    ) -> ReconcileReport {
        let mut report = ReconcileReport::default();

        match &event.mutation {
            Mutation::MemberRemove { .. } | Mutation::BotAdd { .. } => {}
            Mutation::ChannelCreate { channel } => {
                let result = self.platform.delete_channel(channel.id).await;
                report.attempt("delete_channel", result);
            }
            Mutation::ChannelUpdate { before, after } => {
                self.restore_channel(before, after, &mut report).await;
            }
            Mutation::ChannelDelete { channel } => {
                self.recreate_channel(channel, &mut report).await;
            }
            Mutation::RoleCreate { role } => {
                let result = self.platform.delete_role(self.guild_id, role.id).await;
                report.attempt("delete_role", result);
            }
            Mutation::RoleUpdate { before, after } => {
                self.restore_role(before, after, &mut report).await;
            }
            Mutation::RoleDelete { role } => {
                let empty = RoleHolders::default();
                self.recreate_role(role, holders.unwrap_or(&empty), &mut report)
                    .await;
            }
            Mutation::BanAdd { user_id } => {
                let result = self.platform.unban(self.guild_id, *user_id).await;
                report.attempt("unban", result);
            }
            Mutation::WebhookUpdate { channel_id } => {
                match entry.and_then(|e| e.target_id) {
                    Some(target) => {
                        let webhook_id = WebhookId::new(target.get());
                        let result = self.platform.delete_webhook(webhook_id).await;
                        report.attempt("delete_webhook", result);
                    }
                    None => {
                        warn!(channel = %channel_id, "Webhook target unknown");
                        report.skip("delete_webhook", "audit entry has no target");
                    }
                }
            }
            Mutation::GuildUpdate { before, after } => {
                self.restore_guild(before, after, &mut report).await;
            }
        }

        info!(
            kind = %event.kind(),
            applied = report.applied(),
            failed = report.failed(),
            queued = report.queued_grants,
            "Reconciliation finished"
        );
        report
    }

    async fn restore_channel(&self, before: &Channel, after: &Channel, report: &mut ReconcileReport) {
        let result = self.platform.edit_channel(before).await;
        report.attempt("restore_channel", result);

        if before.position != after.position {
            let result = self
                .platform
                .set_channel_position(self.guild_id, before.id, before.position)
                .await;
            report.attempt("restore_channel_position", result);
        }
    }

    async fn recreate_channel(&self, channel: &Channel, report: &mut ReconcileReport) {
        let created = match self.platform.create_channel(self.guild_id, channel).await {
            Ok(created) => {
                report.attempt("recreate_channel", Ok(()));
                created
            }
            Err(e) => {
                report.attempt("recreate_channel", Err(e));
                return;
            }
        };

        let result = self
            .platform
            .set_channel_position(self.guild_id, created.id, channel.position)
            .await;
        report.attempt("restore_channel_position", result);
    }

    async fn restore_role(&self, before: &Role, after: &Role, report: &mut ReconcileReport) {
        let result = self.platform.edit_role(self.guild_id, before).await;
        report.attempt("restore_role", result);

        if before.position != after.position {
            let result = self
                .platform
                .set_role_position(self.guild_id, before.id, before.position)
                .await;
            report.attempt("restore_role_position", result);
        }
    }

    /// Recreate a deleted role, then queue its former members and put its
    /// channel overwrites back.
    async fn recreate_role(&self, role: &Role, holders: &RoleHolders, report: &mut ReconcileReport) {
        if role.managed {
            report.skip("recreate_role", "role is managed by an integration");
            return;
        }

        let created = match self.platform.create_role(self.guild_id, role).await {
            Ok(created) => {
                report.attempt("recreate_role", Ok(()));
                created
            }
            Err(e) => {
                report.attempt("recreate_role", Err(e));
                return;
            }
        };
        info!(old = %role.id, new = %created.id, name = %role.name, "Role recreated");

        let result = self
            .platform
            .set_role_position(self.guild_id, created.id, role.position)
            .await;
        report.attempt("restore_role_position", result);

        for member in &holders.members {
            self.continuity
                .enqueue(self.guild_id, *member, created.id)
                .await;
            report.queued_grants += 1;
        }

        for overwrite in &holders.overwrites {
            let restored = PermissionOverwrite::for_role(created.id, overwrite.allow, overwrite.deny);
            let result = self.platform.put_overwrite(overwrite.channel_id, &restored).await;
            report.attempt(format!("restore_overwrite:{}", overwrite.channel_id), result);
        }
    }

    async fn restore_guild(
        &self,
        before: &GuildSettings,
        after: &GuildSettings,
        report: &mut ReconcileReport,
    ) {
        for field in before.changed_fields(after) {
            let result = self.platform.edit_guild(self.guild_id, &field).await;
            report.attempt(format!("restore_{}", field.name()), result);
        }

        if before.vanity_changed(after) {
            let result = self
                .platform
                .set_vanity_code(self.guild_id, before.vanity_code.as_deref())
                .await;
            report.attempt("restore_vanity_code", result);
        }
    }
}
