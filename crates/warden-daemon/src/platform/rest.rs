//! HTTP platform adapter

use super::wire::{
    channel_body, role_body, WireAuditLog, WireChannel, WireGuild, WireMember, WireOverwrite,
    WireRateLimit, WireRole, WireUser,
};
use crate::config::PlatformConfig;
use async_trait::async_trait;
use base64::Engine as _;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::collections::BTreeSet;
use warden_engine::{Platform, PlatformError, PlatformResult};
use warden_types::{
    AuditAction, AuditEntry, Channel, ChannelId, GuildField, GuildId, GuildSettings, Member,
    PermissionOverwrite, Role, RoleId, UserId, WebhookId,
};

const MEMBER_PAGE: usize = 1000;
const REASON_HEADER: &str = "X-Audit-Log-Reason";

/// Platform implementation over the REST API
pub struct RestPlatform {
    client: Client,
    /// Unauthenticated client for the image CDN
    cdn: Client,
    api_base: String,
    cdn_base: String,
    self_id: UserId,
}

impl RestPlatform {
    /// Build a client acting as `self_id`
    pub fn new(config: &PlatformConfig, self_id: UserId) -> PlatformResult<Self> {
        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("Bot {}", config.token))
            .map_err(|e| PlatformError::Transport(format!("Invalid token: {}", e)))?;
        headers.insert(AUTHORIZATION, auth);

        let user_agent = concat!("wardend/", env!("CARGO_PKG_VERSION"));
        let client = Client::builder()
            .default_headers(headers)
            .user_agent(user_agent)
            .build()
            .map_err(transport)?;
        let cdn = Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(transport)?;

        Ok(Self {
            client,
            cdn,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            cdn_base: config.cdn_base.trim_end_matches('/').to_string(),
            self_id,
        })
    }

    /// Build a client and read its own identity from `/users/@me`
    pub async fn connect(config: &PlatformConfig) -> PlatformResult<Self> {
        let unresolved = Self::new(config, UserId::new(0))?;
        let me: WireUser = unresolved.get("/users/@me").await?;
        tracing::info!(self_id = %me.id, "Resolved own identity");
        Ok(Self {
            self_id: me.id,
            ..unresolved
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client.request(method, format!("{}{}", self.api_base, path))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> PlatformResult<T> {
        let response = self.execute(self.request(Method::GET, path), path).await?;
        response
            .json()
            .await
            .map_err(|e| PlatformError::Decode(e.to_string()))
    }

    async fn get_optional<T: DeserializeOwned>(&self, path: &str) -> PlatformResult<Option<T>> {
        match self.get(path).await {
            Ok(value) => Ok(Some(value)),
            Err(PlatformError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: &Value,
    ) -> PlatformResult<T> {
        let response = self
            .execute(self.request(method, path).json(body), path)
            .await?;
        response
            .json()
            .await
            .map_err(|e| PlatformError::Decode(e.to_string()))
    }

    /// Send a request whose response body is ignored
    async fn send(&self, method: Method, path: &str, body: Option<&Value>) -> PlatformResult<()> {
        let mut request = self.request(method, path);
        if let Some(body) = body {
            request = request.json(body);
        }
        self.execute(request, path).await.map(|_| ())
    }

    async fn execute(&self, request: RequestBuilder, path: &str) -> PlatformResult<Response> {
        let response = request.send().await.map_err(transport)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(classify(status, path, &body))
    }

    /// Resolve an image hash back to a data URI the API accepts on upload
    async fn image_data(&self, folder: &str, guild_id: GuildId, hash: &str) -> PlatformResult<String> {
        let url = image_url(&self.cdn_base, folder, guild_id, hash);
        let response = self.cdn.get(&url).send().await.map_err(transport)?;
        let status = response.status();
        if !status.is_success() {
            return Err(classify(status, &url, ""));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("image/png")
            .to_string();
        let bytes = response.bytes().await.map_err(transport)?;
        Ok(data_uri(&content_type, &bytes))
    }

    /// Post a message to a channel
    pub async fn post_message(&self, channel_id: ChannelId, body: &Value) -> PlatformResult<()> {
        let path = format!("/channels/{}/messages", channel_id.get());
        self.send(Method::POST, &path, Some(body)).await
    }

    async fn guild_field_body(&self, guild_id: GuildId, field: &GuildField) -> PlatformResult<Value> {
        let body = match field {
            GuildField::Name(name) => json!({ "name": name }),
            GuildField::Icon(Some(hash)) => {
                json!({ "icon": self.image_data("icons", guild_id, hash).await? })
            }
            GuildField::Icon(None) => json!({ "icon": null }),
            GuildField::Banner(Some(hash)) => {
                json!({ "banner": self.image_data("banners", guild_id, hash).await? })
            }
            GuildField::Banner(None) => json!({ "banner": null }),
            GuildField::AfkChannel(channel) => json!({ "afk_channel_id": channel }),
            GuildField::AfkTimeout(timeout) => json!({ "afk_timeout": timeout }),
            GuildField::SystemChannel(channel) => json!({ "system_channel_id": channel }),
            GuildField::RulesChannel(channel) => json!({ "rules_channel_id": channel }),
            GuildField::PublicUpdatesChannel(channel) => {
                json!({ "public_updates_channel_id": channel })
            }
        };
        Ok(body)
    }
}

fn transport(e: reqwest::Error) -> PlatformError {
    PlatformError::Transport(e.to_string())
}

/// Map a non-success response onto a typed error
fn classify(status: StatusCode, path: &str, body: &str) -> PlatformError {
    match status {
        StatusCode::NOT_FOUND => PlatformError::NotFound(path.to_string()),
        StatusCode::FORBIDDEN => PlatformError::Forbidden(format!("{}: {}", path, body)),
        StatusCode::TOO_MANY_REQUESTS => {
            let retry_after_ms = serde_json::from_str::<WireRateLimit>(body)
                .map(|r| (r.retry_after * 1000.0).ceil() as u64)
                .unwrap_or(1000);
            PlatformError::RateLimited { retry_after_ms }
        }
        _ => PlatformError::Http {
            status: status.as_u16(),
            message: body.to_string(),
        },
    }
}

fn image_url(cdn_base: &str, folder: &str, guild_id: GuildId, hash: &str) -> String {
    let ext = if hash.starts_with("a_") { "gif" } else { "png" };
    format!("{}/{}/{}/{}.{}", cdn_base, folder, guild_id.get(), hash, ext)
}

fn data_uri(content_type: &str, bytes: &[u8]) -> String {
    format!(
        "data:{};base64,{}",
        content_type,
        base64::engine::general_purpose::STANDARD.encode(bytes)
    )
}

#[async_trait]
impl Platform for RestPlatform {
    fn self_id(&self) -> UserId {
        self.self_id
    }

    async fn guild(&self, guild_id: GuildId) -> PlatformResult<Option<GuildSettings>> {
        let guild: Option<WireGuild> = self
            .get_optional(&format!("/guilds/{}", guild_id.get()))
            .await?;
        Ok(guild.map(GuildSettings::from))
    }

    async fn fetch_recent_entry(
        &self,
        guild_id: GuildId,
        action: AuditAction,
    ) -> PlatformResult<Option<AuditEntry>> {
        let path = format!(
            "/guilds/{}/audit-logs?action_type={}&limit=1",
            guild_id.get(),
            action.code()
        );
        let log: WireAuditLog = self.get(&path).await?;
        Ok(log
            .audit_log_entries
            .into_iter()
            .next()
            .and_then(|entry| entry.into_entry()))
    }

    async fn member(&self, guild_id: GuildId, user_id: UserId) -> PlatformResult<Option<Member>> {
        let path = format!("/guilds/{}/members/{}", guild_id.get(), user_id.get());
        let member: Option<WireMember> = self.get_optional(&path).await?;
        Ok(member.map(Member::from))
    }

    async fn members(&self, guild_id: GuildId) -> PlatformResult<Vec<Member>> {
        let mut members = Vec::new();
        let mut after = 0u64;
        loop {
            let path = format!(
                "/guilds/{}/members?limit={}&after={}",
                guild_id.get(),
                MEMBER_PAGE,
                after
            );
            let page: Vec<WireMember> = self.get(&path).await?;
            let full = page.len() == MEMBER_PAGE;
            if let Some(last) = page.last() {
                after = last.user.id.get();
            }
            members.extend(page.into_iter().map(Member::from));
            if !full {
                break;
            }
        }
        Ok(members)
    }

    async fn roles(&self, guild_id: GuildId) -> PlatformResult<Vec<Role>> {
        let roles: Vec<WireRole> = self.get(&format!("/guilds/{}/roles", guild_id.get())).await?;
        let mut roles: Vec<Role> = roles.into_iter().map(Role::from).collect();
        roles.sort_by_key(|r| r.position);
        Ok(roles)
    }

    async fn channels(&self, guild_id: GuildId) -> PlatformResult<Vec<Channel>> {
        let channels: Vec<WireChannel> = self
            .get(&format!("/guilds/{}/channels", guild_id.get()))
            .await?;
        Ok(channels
            .into_iter()
            .map(|c| c.into_channel(guild_id))
            .collect())
    }

    async fn delete_channel(&self, channel_id: ChannelId) -> PlatformResult<()> {
        self.send(Method::DELETE, &format!("/channels/{}", channel_id.get()), None)
            .await
    }

    async fn create_channel(&self, guild_id: GuildId, template: &Channel) -> PlatformResult<Channel> {
        let path = format!("/guilds/{}/channels", guild_id.get());
        let created: WireChannel = self
            .send_json(Method::POST, &path, &channel_body(template))
            .await?;
        Ok(created.into_channel(guild_id))
    }

    async fn edit_channel(&self, channel: &Channel) -> PlatformResult<()> {
        let path = format!("/channels/{}", channel.id.get());
        self.send(Method::PATCH, &path, Some(&channel_body(channel)))
            .await
    }

    async fn set_channel_position(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        position: i32,
    ) -> PlatformResult<()> {
        let path = format!("/guilds/{}/channels", guild_id.get());
        let body = json!([{ "id": channel_id, "position": position }]);
        self.send(Method::PATCH, &path, Some(&body)).await
    }

    async fn put_overwrite(
        &self,
        channel_id: ChannelId,
        overwrite: &PermissionOverwrite,
    ) -> PlatformResult<()> {
        let wire = WireOverwrite::from(overwrite);
        let path = format!("/channels/{}/permissions/{}", channel_id.get(), wire.id.get());
        let body = json!({ "allow": wire.allow, "deny": wire.deny, "type": wire.kind });
        self.send(Method::PUT, &path, Some(&body)).await
    }

    async fn create_role(&self, guild_id: GuildId, template: &Role) -> PlatformResult<Role> {
        let path = format!("/guilds/{}/roles", guild_id.get());
        let created: WireRole = self
            .send_json(Method::POST, &path, &role_body(template))
            .await?;
        Ok(Role::from(created))
    }

    async fn edit_role(&self, guild_id: GuildId, role: &Role) -> PlatformResult<()> {
        let path = format!("/guilds/{}/roles/{}", guild_id.get(), role.id.get());
        self.send(Method::PATCH, &path, Some(&role_body(role))).await
    }

    async fn set_role_position(
        &self,
        guild_id: GuildId,
        role_id: RoleId,
        position: i32,
    ) -> PlatformResult<()> {
        let path = format!("/guilds/{}/roles", guild_id.get());
        let body = json!([{ "id": role_id, "position": position }]);
        self.send(Method::PATCH, &path, Some(&body)).await
    }

    async fn delete_role(&self, guild_id: GuildId, role_id: RoleId) -> PlatformResult<()> {
        let path = format!("/guilds/{}/roles/{}", guild_id.get(), role_id.get());
        self.send(Method::DELETE, &path, None).await
    }

    async fn add_member_roles(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        roles: &[RoleId],
    ) -> PlatformResult<()> {
        let member = self
            .member(guild_id, user_id)
            .await?
            .ok_or_else(|| PlatformError::NotFound(format!("member {}", user_id.get())))?;
        let merged: BTreeSet<RoleId> = member.roles.iter().chain(roles).copied().collect();
        let merged: Vec<RoleId> = merged.into_iter().collect();
        self.set_member_roles(guild_id, user_id, &merged).await
    }

    async fn set_member_roles(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        roles: &[RoleId],
    ) -> PlatformResult<()> {
        let path = format!("/guilds/{}/members/{}", guild_id.get(), user_id.get());
        let body = json!({ "roles": roles });
        self.send(Method::PATCH, &path, Some(&body)).await
    }

    async fn ban(&self, guild_id: GuildId, user_id: UserId, reason: &str) -> PlatformResult<()> {
        let path = format!("/guilds/{}/bans/{}", guild_id.get(), user_id.get());
        let mut request = self.request(Method::PUT, &path).json(&json!({}));
        if let Ok(value) = HeaderValue::from_str(reason) {
            request = request.header(REASON_HEADER, value);
        }
        self.execute(request, &path).await.map(|_| ())
    }

    async fn unban(&self, guild_id: GuildId, user_id: UserId) -> PlatformResult<()> {
        let path = format!("/guilds/{}/bans/{}", guild_id.get(), user_id.get());
        self.send(Method::DELETE, &path, None).await
    }

    async fn delete_webhook(&self, webhook_id: WebhookId) -> PlatformResult<()> {
        self.send(Method::DELETE, &format!("/webhooks/{}", webhook_id.get()), None)
            .await
    }

    async fn edit_guild(&self, guild_id: GuildId, field: &GuildField) -> PlatformResult<()> {
        let body = self.guild_field_body(guild_id, field).await?;
        self.send(Method::PATCH, &format!("/guilds/{}", guild_id.get()), Some(&body))
            .await
    }

    async fn set_vanity_code(&self, guild_id: GuildId, code: Option<&str>) -> PlatformResult<()> {
        let path = format!("/guilds/{}/vanity-url", guild_id.get());
        self.send(Method::PATCH, &path, Some(&json!({ "code": code })))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_status_codes() {
        assert!(classify(StatusCode::NOT_FOUND, "/guilds/1", "").is_not_found());
        assert!(matches!(
            classify(StatusCode::FORBIDDEN, "/guilds/1/bans/2", "Missing Permissions"),
            PlatformError::Forbidden(msg) if msg.contains("Missing Permissions")
        ));
        assert_eq!(
            classify(
                StatusCode::TOO_MANY_REQUESTS,
                "/guilds/1/roles",
                r#"{"message": "You are being rate limited.", "retry_after": 1.25, "global": false}"#
            ),
            PlatformError::RateLimited {
                retry_after_ms: 1250
            }
        );
        assert_eq!(
            classify(StatusCode::BAD_GATEWAY, "/guilds/1", "upstream"),
            PlatformError::Http {
                status: 502,
                message: "upstream".to_string()
            }
        );
    }

    #[test]
    fn test_image_url_and_data_uri() {
        assert_eq!(
            image_url("https://cdn.example", "icons", GuildId::new(5), "abc"),
            "https://cdn.example/icons/5/abc.png"
        );
        assert_eq!(
            image_url("https://cdn.example", "banners", GuildId::new(5), "a_abc"),
            "https://cdn.example/banners/5/a_abc.gif"
        );
        assert_eq!(data_uri("image/png", b"hi"), "data:image/png;base64,aGk=");
    }

    #[test]
    fn test_client_rejects_unprintable_token() {
        let config = PlatformConfig {
            token: "bad\ntoken".to_string(),
            ..Default::default()
        };
        assert!(RestPlatform::new(&config, UserId::new(1)).is_err());
    }

    #[tokio::test]
    async fn test_connect_fails_without_identity() {
        let config = PlatformConfig {
            api_base: "http://127.0.0.1:1".to_string(),
            token: "secret".to_string(),
            ..Default::default()
        };
        let err = RestPlatform::connect(&config).await.err();
        assert!(matches!(err, Some(PlatformError::Transport(_))));
    }
}
