//! Router tests against the in-memory platform

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tower::ServiceExt;
use warden_daemon::api::{create_router, rest::AppState};
use warden_daemon::config::SchedulerConfig;
use warden_daemon::Scheduler;
use warden_engine::{Guard, GuardConfig, MemoryPlatform, NoopSink};
use warden_types::{
    AuditEntry, Channel, ChannelId, ChannelKind, GuildId, GuildSettings, Member, Mutation,
    MutationEvent, Snowflake, UserId,
};

const GUILD: GuildId = GuildId::new(1000);
const INTRUDER: UserId = UserId::new(10);

struct TestApp {
    router: Router,
    platform: Arc<MemoryPlatform>,
    _batch_rx: mpsc::Receiver<()>,
}

async fn test_app() -> TestApp {
    let settings = GuildSettings {
        id: GUILD,
        owner_id: UserId::new(1),
        name: "home".to_string(),
        icon: None,
        banner: None,
        afk_channel_id: None,
        afk_timeout: 300,
        system_channel_id: None,
        rules_channel_id: None,
        public_updates_channel_id: None,
        vanity_code: None,
    };
    let platform = Arc::new(MemoryPlatform::new(settings, UserId::new(2)));
    platform
        .add_member(Member {
            user_id: INTRUDER,
            roles: vec![],
            bot: false,
        })
        .await;

    let guard = Arc::new(Guard::new(
        GuardConfig::for_guild(GUILD),
        platform.clone(),
        Arc::new(NoopSink),
    ));
    let (scheduler, batch_rx) = Scheduler::new(SchedulerConfig::default(), guard.clone());

    TestApp {
        router: create_router(AppState::new(guard, scheduler)),
        platform,
        _batch_rx: batch_rx,
    }
}

fn spam_channel(guild_id: GuildId) -> Channel {
    Channel {
        id: ChannelId::new(800),
        guild_id,
        name: "free-nitro".to_string(),
        kind: ChannelKind::Text,
        position: 3,
        parent_id: None,
        topic: None,
        nsfw: false,
        bitrate: None,
        user_limit: None,
        rate_limit_per_user: None,
        permission_overwrites: vec![],
    }
}

fn post_json(uri: &str, body: String) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap()
}

async fn json_body(resp: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_returns_200() {
    let app = test_app().await;
    let resp = app
        .router
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await["status"], "healthy");
}

#[tokio::test]
async fn status_reports_guard_state() {
    let app = test_app().await;
    let resp = app
        .router
        .oneshot(
            Request::builder()
                .uri("/v1/status")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    assert_eq!(body["guard"]["strike_records"], 0);
    assert_eq!(body["guard"]["queued_entries"], 0);
    assert!(body["last_batch"].is_null());
}

#[tokio::test]
async fn ingested_event_is_accepted_and_handled() {
    let app = test_app().await;
    let channel = spam_channel(GUILD);
    app.platform.add_channel(channel.clone()).await;

    let event = MutationEvent::new(GUILD, Mutation::ChannelCreate { channel });
    app.platform
        .push_audit(AuditEntry {
            action: event.kind().audit_action(),
            executor_id: Some(INTRUDER),
            target_id: Some(Snowflake::new(800)),
            created_at: event.observed_at,
        })
        .await;

    let resp = app
        .router
        .oneshot(post_json(
            "/v1/events",
            serde_json::to_string(&event).unwrap(),
        ))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::ACCEPTED);
    assert_eq!(json_body(resp).await["accepted"], true);

    for _ in 0..50 {
        if app.platform.is_banned(INTRUDER).await {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert!(app.platform.is_banned(INTRUDER).await);
    assert!(app.platform.channel(ChannelId::new(800)).await.is_none());
}

#[tokio::test]
async fn foreign_guild_event_changes_nothing() {
    let app = test_app().await;
    let event = MutationEvent::new(
        GuildId::new(4242),
        Mutation::ChannelCreate {
            channel: spam_channel(GuildId::new(4242)),
        },
    );

    let resp = app
        .router
        .oneshot(post_json(
            "/v1/events",
            serde_json::to_string(&event).unwrap(),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::ACCEPTED);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(app.platform.calls().await.is_empty());
}

#[tokio::test]
async fn malformed_event_is_rejected() {
    let app = test_app().await;
    let resp = app
        .router
        .oneshot(post_json("/v1/events", r#"{"kind": "nonsense"}"#.to_string()))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(resp).await["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn batch_can_be_triggered() {
    let app = test_app().await;
    let resp = app
        .router
        .oneshot(post_json("/v1/batch", String::new()))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::ACCEPTED);
    assert_eq!(json_body(resp).await["triggered"], true);
}
