//! Punishment notifications
//!
//! Every sanction produces a [`PunishmentRecord`] that is handed to a
//! [`NotificationSink`]. Delivery is best effort.

use crate::error::NotifyError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::RwLock;
use uuid::Uuid;
use warden_types::UserId;

/// Sanction that was applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PunishmentAction {
    /// Roles replaced with the jail role (plus booster)
    Jailed,
    Banned,
}

impl fmt::Display for PunishmentAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PunishmentAction::Jailed => write!(f, "jailed"),
            PunishmentAction::Banned => write!(f, "banned"),
        }
    }
}

/// One applied sanction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PunishmentRecord {
    pub id: Uuid,
    pub actor_id: UserId,
    pub reason: String,
    pub action: PunishmentAction,
    pub at: DateTime<Utc>,
}

impl PunishmentRecord {
    pub fn new(actor_id: UserId, reason: impl Into<String>, action: PunishmentAction) -> Self {
        Self {
            id: Uuid::new_v4(),
            actor_id,
            reason: reason.into(),
            action,
            at: Utc::now(),
        }
    }
}

/// Destination for punishment notices
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, record: &PunishmentRecord) -> Result<(), NotifyError>;
}

/// Sink that drops every notice
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

#[async_trait]
impl NotificationSink for NoopSink {
    async fn notify(&self, _record: &PunishmentRecord) -> Result<(), NotifyError> {
        Ok(())
    }
}

/// Sink that keeps every notice in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    records: RwLock<Vec<PunishmentRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn records(&self) -> Vec<PunishmentRecord> {
        self.records.read().await.clone()
    }
}

#[async_trait]
impl NotificationSink for MemorySink {
    async fn notify(&self, record: &PunishmentRecord) -> Result<(), NotifyError> {
        self.records.write().await.push(record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_sink_keeps_order() {
        let sink = MemorySink::new();
        for (actor, action) in [(1, PunishmentAction::Jailed), (2, PunishmentAction::Banned)] {
            let record = PunishmentRecord::new(UserId::new(actor), "Deleting a role", action);
            sink.notify(&record).await.unwrap();
        }

        let records = sink.records().await;
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].action, PunishmentAction::Jailed);
        assert_eq!(records[1].actor_id, UserId::new(2));
        assert_eq!(PunishmentAction::Banned.to_string(), "banned");
    }
}
