//! Attribution
//!
//! Decides who performed an observed mutation by reading the most recent
//! audit entry of the matching action type.

use crate::config::GuardConfig;
use crate::platform::Platform;
use serde::Serialize;
use std::fmt;
use tracing::{debug, warn};
use warden_types::{AuditEntry, MutationEvent, UserId};

/// Outcome of classifying an audit entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// A responsible, non-exempt actor was found
    Attributed,
    NoEntry,
    NoExecutor,
    /// The guard's own action
    SelfAction,
    Owner,
    AllowListed,
    /// The entry is too far from the observation to belong to it
    Stale,
    /// The guild owner could not be determined
    Unresolved,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Verdict::Attributed => "attributed",
            Verdict::NoEntry => "no_entry",
            Verdict::NoExecutor => "no_executor",
            Verdict::SelfAction => "self_action",
            Verdict::Owner => "owner",
            Verdict::AllowListed => "allow_listed",
            Verdict::Stale => "stale",
            Verdict::Unresolved => "unresolved",
        };
        f.write_str(label)
    }
}

/// Who, if anyone, is responsible for an event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttributionResult {
    pub verdict: Verdict,
    pub actor_id: Option<UserId>,
    pub reason: &'static str,
    #[serde(skip)]
    pub entry: Option<AuditEntry>,
}

impl AttributionResult {
    fn new(verdict: Verdict, entry: Option<AuditEntry>, reason: &'static str) -> Self {
        Self {
            verdict,
            actor_id: entry.as_ref().and_then(|e| e.executor_id),
            reason,
            entry,
        }
    }

    pub fn attributable(&self) -> bool {
        self.verdict == Verdict::Attributed
    }
}

/// Resolves events to actors. Has no side effects.
pub struct AttributionResolver<'a> {
    platform: &'a dyn Platform,
    config: &'a GuardConfig,
}

impl<'a> AttributionResolver<'a> {
    pub fn new(platform: &'a dyn Platform, config: &'a GuardConfig) -> Self {
        Self { platform, config }
    }

    pub async fn resolve(&self, event: &MutationEvent) -> AttributionResult {
        let kind = event.kind();
        let reason = kind.reason();

        let entry = match self
            .platform
            .fetch_recent_entry(event.guild_id, kind.audit_action())
            .await
        {
            Ok(Some(entry)) => entry,
            Ok(None) => return AttributionResult::new(Verdict::NoEntry, None, reason),
            Err(e) => {
                warn!(%kind, error = %e, "Audit lookup failed");
                return AttributionResult::new(Verdict::NoEntry, None, reason);
            }
        };

        let verdict = self.classify(event, &entry).await;
        debug!(%kind, %verdict, executor = ?entry.executor_id, "Attribution resolved");
        AttributionResult::new(verdict, Some(entry), reason)
    }

    async fn classify(&self, event: &MutationEvent, entry: &AuditEntry) -> Verdict {
        let Some(executor) = entry.executor_id else {
            return Verdict::NoExecutor;
        };

        let distance = event.observed_at - entry.created_at;
        let tolerance = self.config.staleness_tolerance();
        if distance > tolerance || -distance > tolerance {
            return Verdict::Stale;
        }

        if executor == self.platform.self_id() {
            return Verdict::SelfAction;
        }

        if self.config.allow_listed_actors.contains(&executor) {
            return Verdict::AllowListed;
        }

        match self.platform.guild(event.guild_id).await {
            Ok(Some(guild)) if guild.owner_id == executor => Verdict::Owner,
            Ok(Some(_)) => Verdict::Attributed,
            Ok(None) => Verdict::Unresolved,
            Err(e) => {
                warn!(guild = %event.guild_id, error = %e, "Owner lookup failed");
                Verdict::Unresolved
            }
        }
    }
}
