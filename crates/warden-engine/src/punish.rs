//! Punishment executor

use crate::config::GuardConfig;
use crate::notify::{NotificationSink, PunishmentAction, PunishmentRecord};
use crate::platform::Platform;
use tracing::{error, warn};
use warden_types::Member;

/// Applies sanctions to offending members
pub struct Punisher<'a> {
    platform: &'a dyn Platform,
    sink: &'a dyn NotificationSink,
    config: &'a GuardConfig,
}

impl<'a> Punisher<'a> {
    pub fn new(
        platform: &'a dyn Platform,
        sink: &'a dyn NotificationSink,
        config: &'a GuardConfig,
    ) -> Self {
        Self {
            platform,
            sink,
            config,
        }
    }

    /// Members holding an immune role are never sanctioned
    pub fn is_eligible(&self, member: &Member) -> bool {
        !member
            .roles
            .iter()
            .any(|role| self.config.immune_roles.contains(role))
    }

    /// Jail booster holders, ban everyone else.
    ///
    /// Returns the record of the applied sanction, or `None` when the
    /// platform refused it.
    pub async fn punish(&self, member: &Member, reason: &str) -> Option<PunishmentRecord> {
        let guild_id = self.config.guild_id;
        let actor = member.user_id;

        let jail = match (self.config.booster_role, self.config.jail_role) {
            (Some(booster), Some(jail)) if member.has_role(booster) => Some([jail, booster]),
            _ => None,
        };

        let result = match jail {
            Some(roles) => self
                .platform
                .set_member_roles(guild_id, actor, &roles)
                .await
                .map(|_| PunishmentAction::Jailed),
            None => self
                .platform
                .ban(guild_id, actor, reason)
                .await
                .map(|_| PunishmentAction::Banned),
        };

        let action = match result {
            Ok(action) => action,
            Err(e) => {
                error!(%actor, reason, error = %e, "Failed to apply punishment");
                return None;
            }
        };

        let record = PunishmentRecord::new(actor, reason, action);
        warn!(
            %actor,
            reason,
            %action,
            punishment = %record.id,
            "Punished unauthorized actor"
        );

        if let Err(e) = self.sink.notify(&record).await {
            warn!(%actor, error = %e, "Punishment notification not delivered");
        }

        Some(record)
    }
}
