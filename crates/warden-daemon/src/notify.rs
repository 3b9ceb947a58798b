//! Punishment notices posted to a guild channel

use crate::platform::RestPlatform;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use warden_engine::{NotificationSink, NotifyError, PunishmentAction, PunishmentRecord};
use warden_types::ChannelId;

const COLOR_JAILED: u32 = 0xf1c40f;
const COLOR_BANNED: u32 = 0xe74c3c;

/// Posts an embed per punishment to the log channel
pub struct ChannelLogSink {
    platform: Arc<RestPlatform>,
    channel_id: ChannelId,
}

impl ChannelLogSink {
    pub fn new(platform: Arc<RestPlatform>, channel_id: ChannelId) -> Self {
        Self {
            platform,
            channel_id,
        }
    }
}

#[async_trait]
impl NotificationSink for ChannelLogSink {
    async fn notify(&self, record: &PunishmentRecord) -> Result<(), NotifyError> {
        self.platform
            .post_message(self.channel_id, &embed(record))
            .await
            .map_err(|e| NotifyError(e.to_string()))
    }
}

/// Message body describing one punishment
pub fn embed(record: &PunishmentRecord) -> Value {
    let color = match record.action {
        PunishmentAction::Jailed => COLOR_JAILED,
        PunishmentAction::Banned => COLOR_BANNED,
    };

    json!({
        "embeds": [{
            "title": "Unauthorized action stopped",
            "color": color,
            "timestamp": record.at.to_rfc3339(),
            "fields": [
                { "name": "Actor", "value": format!("<@{}>", record.actor_id.get()), "inline": true },
                { "name": "Action", "value": record.action.to_string(), "inline": true },
                { "name": "Reason", "value": record.reason },
            ],
            "footer": { "text": record.id.to_string() },
        }],
        "allowed_mentions": { "parse": [] },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_types::UserId;

    #[test]
    fn test_embed_describes_record() {
        let record = PunishmentRecord::new(UserId::new(77), "Deleting a role", PunishmentAction::Jailed);

        let body = embed(&record);
        let embed = &body["embeds"][0];

        assert_eq!(embed["color"], json!(COLOR_JAILED));
        assert_eq!(embed["fields"][0]["value"], json!("<@77>"));
        assert_eq!(embed["fields"][1]["value"], json!("jailed"));
        assert_eq!(embed["fields"][2]["value"], json!("Deleting a role"));
        assert_eq!(embed["footer"]["text"], json!(record.id.to_string()));
    }
}
