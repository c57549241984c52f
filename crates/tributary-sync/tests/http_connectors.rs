//! HTTP connector behavior against a mock upstream: pagination termination,
//! cursor advancement, per-item skip, retry exhaustion, auth rejection.

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

use tributary_sync::config::{DiscordConfig, DixaConfig, IntercomConfig};
use tributary_sync::connectors::discord::DiscordConnector;
use tributary_sync::connectors::dixa::DixaConnector;
use tributary_sync::connectors::http::{ApiClient, RetryPolicy};
use tributary_sync::connectors::intercom::IntercomConnector;
use tributary_sync::connectors::{generate, Connector};
use tributary_sync::entities::{Entity, EntityKind};
use tributary_common::{Result, SyncError};

fn instant_policy() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::ZERO,
        max_delay: Duration::ZERO,
    }
}

/// Drain a connector to completion, collecting everything it emits.
async fn drain(connector: Box<dyn Connector>) -> (Vec<Entity>, Result<()>) {
    let mut stream = generate(connector, 16);
    let mut entities = Vec::new();
    while let Some(entity) = stream.next().await {
        entities.push(entity);
    }
    (entities, stream.finish().await)
}

async fn mount_discord_base(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/users/@me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "me"})))
        .expect(1)
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/users/@me/guilds"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "100", "name": "Guild"}
        ])))
        .expect(1)
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/guilds/100/channels"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "200", "name": "general", "type": 0, "position": 1, "topic": "chat"}
        ])))
        .expect(1)
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/channels/200/threads/archived/public"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"threads": []})))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/guilds/100/members"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(server)
        .await;
}

fn message(id: &str, content: &str) -> serde_json::Value {
    json!({
        "id": id,
        "content": content,
        "author": {"id": "u1"},
        "timestamp": "2026-03-01T12:00:00+00:00",
        "attachments": []
    })
}

#[tokio::test]
async fn test_discord_before_pagination_terminates_on_short_page() {
    let server = MockServer::start().await;
    mount_discord_base(&server).await;

    // Full page of 2 → cursor advances from its last message; short page of
    // 1 → loop stops. The mock set is exact: a third page request would 404
    // and fail the run.
    Mock::given(method("GET"))
        .and(path("/channels/200/messages"))
        .and(query_param("before", "2"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([message("1", "oldest")])),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/channels/200/messages"))
        .and(query_param_is_missing("before"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            message("3", "newest"),
            message("2", "middle")
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let config = DiscordConfig {
        token: "test-token".to_string(),
        base_url: server.uri(),
        page_size: 2,
        member_page_size: 2,
    };
    let connector = DiscordConnector::create(&config, instant_policy())
        .await
        .unwrap();
    let (entities, result) = drain(Box::new(connector)).await;
    result.unwrap();

    let messages: Vec<&Entity> = entities
        .iter()
        .filter(|e| matches!(e.kind, EntityKind::Chunk))
        .collect();
    assert_eq!(messages.len(), 3);

    // Guild and channel arrive as hierarchy records with breadcrumbs on the
    // messages below them.
    let records: Vec<&Entity> = entities
        .iter()
        .filter(|e| matches!(e.kind, EntityKind::Record))
        .collect();
    assert_eq!(records.len(), 2);
    let crumbs: Vec<&str> = messages[0]
        .breadcrumbs
        .iter()
        .map(|b| b.kind.as_str())
        .collect();
    assert_eq!(crumbs, vec!["guild", "channel"]);

    server.verify().await;
}

#[tokio::test]
async fn test_discord_skips_malformed_message() {
    let server = MockServer::start().await;
    mount_discord_base(&server).await;

    // Short page: one good message, one missing its author.
    Mock::given(method("GET"))
        .and(path("/channels/200/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            message("3", "fine"),
            {"id": "2", "content": "no author", "timestamp": "2026-03-01T12:00:00+00:00"}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let config = DiscordConfig {
        token: "test-token".to_string(),
        base_url: server.uri(),
        page_size: 5,
        member_page_size: 5,
    };
    let connector = DiscordConnector::create(&config, instant_policy())
        .await
        .unwrap();
    let (entities, result) = drain(Box::new(connector)).await;
    result.unwrap();

    let messages: Vec<&str> = entities
        .iter()
        .filter(|e| matches!(e.kind, EntityKind::Chunk))
        .map(|e| e.entity_id.as_str())
        .collect();
    assert_eq!(messages, vec!["3"]);
}

#[tokio::test]
async fn test_discord_rejected_token_is_authentication_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/@me"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid token"))
        .mount(&server)
        .await;

    let config = DiscordConfig {
        token: "bad-token".to_string(),
        base_url: server.uri(),
        page_size: 2,
        member_page_size: 2,
    };
    let err = DiscordConnector::create(&config, instant_policy())
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::Authentication(_)));
}

#[tokio::test]
async fn test_api_client_retries_transient_5xx() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(500).set_body_string("hiccup"))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    let client = ApiClient::bearer("t", instant_policy()).unwrap();
    let body = client
        .get_json(&format!("{}/flaky", server.uri()), &[])
        .await
        .unwrap();
    assert_eq!(body["ok"], json!(true));
}

#[tokio::test]
async fn test_api_client_exhausts_retries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/down"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .expect(3)
        .mount(&server)
        .await;

    let client = ApiClient::bearer("t", instant_policy()).unwrap();
    let err = client
        .get_json(&format!("{}/down", server.uri()), &[])
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SyncError::Upstream { status: Some(503), .. }
    ));
    server.verify().await;
}

#[tokio::test]
async fn test_dixa_page_pagination_and_per_conversation_skip() {
    let server = MockServer::start().await;

    let conversation = |id: u64, subject: &str| {
        json!({
            "id": id,
            "subject": subject,
            "status": "open",
            "summary": format!("summary of {subject}"),
            "created_at": "2026-02-01T08:00:00Z"
        })
    };

    // Page 1 is full (2 of 2), page 2 is short (1) and stops the loop.
    Mock::given(method("GET"))
        .and(path("/conversations"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [conversation(1, "first"), conversation(2, "second")]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/conversations"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [conversation(3, "third")]
        })))
        .expect(1)
        .mount(&server)
        .await;

    for id in [1u64, 3] {
        Mock::given(method("GET"))
            .and(path(format!("/conversations/{id}/messages")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{
                    "id": format!("m-{id}"),
                    "content": "hello",
                    "author_type": "customer",
                    "created_at": "2026-02-01T09:00:00Z"
                }]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/conversations/{id}/notes")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
            .mount(&server)
            .await;
    }
    // Conversation 2's messages endpoint is persistently broken; the
    // conversation is skipped and the stream continues.
    Mock::given(method("GET"))
        .and(path("/conversations/2/messages"))
        .respond_with(ResponseTemplate::new(500).set_body_string("broken"))
        .mount(&server)
        .await;

    let config = DixaConfig {
        api_key: "key".to_string(),
        base_url: server.uri(),
        page_size: 2,
    };
    let connector = DixaConnector::create(&config, instant_policy()).unwrap();
    let (entities, result) = drain(Box::new(connector)).await;
    result.unwrap();

    let ids: Vec<&str> = entities.iter().map(|e| e.entity_id.as_str()).collect();
    assert!(ids.contains(&"1"));
    assert!(ids.contains(&"2"));
    assert!(ids.contains(&"3"));
    assert!(ids.contains(&"m-1"));
    assert!(ids.contains(&"m-3"));
    assert!(!ids.contains(&"m-2"));
}

#[tokio::test]
async fn test_intercom_follows_next_cursor() {
    let server = MockServer::start().await;

    let next_url = format!("{}/contacts?starting_after=abc", server.uri());
    Mock::given(method("GET"))
        .and(path("/contacts"))
        .and(query_param("starting_after", "abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"id": "c2", "name": "Second", "email": "two@example.com"}],
            "pages": {}
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/contacts"))
        .and(query_param_is_missing("starting_after"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"id": "c1", "name": "First", "email": "one@example.com"}],
            "pages": {"next": next_url}
        })))
        .expect(1)
        .mount(&server)
        .await;
    for collection in ["companies", "conversations", "tickets"] {
        Mock::given(method("GET"))
            .and(path(format!("/{collection}")))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"data": [], "pages": {}})),
            )
            .expect(1)
            .mount(&server)
            .await;
    }

    let config = IntercomConfig {
        token: "token".to_string(),
        base_url: server.uri(),
    };
    let connector = IntercomConnector::create(&config, instant_policy()).unwrap();
    let (entities, result) = drain(Box::new(connector)).await;
    result.unwrap();

    let ids: Vec<&str> = entities.iter().map(|e| e.entity_id.as_str()).collect();
    assert_eq!(ids, vec!["c1", "c2"]);
    server.verify().await;
}
