//! Integration tests for the Telegram connector against a mock Bot API server:
//! update decoding and the mapping of provider error responses onto the core
//! error taxonomy.

use lib::channels::{ApiError, ChannelApi, ChannelEvent, SubmitAction, TelegramApi};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN: &str = "12345:TESTTOKEN";

async fn api(server: &MockServer) -> TelegramApi {
    TelegramApi::new(TOKEN, Some(server.uri()))
}

#[tokio::test]
async fn get_updates_decodes_messages_and_actions() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/bot{}/getUpdates", TOKEN)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "result": [
                {
                    "update_id": 100,
                    "channel_post": {
                        "message_id": 7,
                        "chat": { "id": -1001234, "title": "News" },
                        "text": "breaking story"
                    }
                },
                {
                    "update_id": 101,
                    "message": {
                        "message_id": 8,
                        "chat": { "id": 42 },
                        "from": { "id": 42 },
                        "caption": "photo caption",
                        "photo": [{ "file_id": "abc" }]
                    }
                },
                {
                    "update_id": 102,
                    "callback_query": {
                        "id": "cb9",
                        "from": { "id": 42 },
                        "message": {
                            "message_id": 9,
                            "chat": { "id": 42 }
                        },
                        "data": "confirm_post"
                    }
                },
                {
                    "update_id": 103,
                    "callback_query": {
                        "id": "cb10",
                        "from": { "id": 42 },
                        "message": {
                            "message_id": 10,
                            "chat": { "id": 42 }
                        },
                        "data": "unknown_token"
                    }
                }
            ]
        })))
        .mount(&server)
        .await;

    let api = api(&server).await;
    let (events, next_offset) = api.get_updates(None).await.expect("get updates");

    assert_eq!(next_offset, Some(104));
    // The unknown callback token is dropped at the boundary.
    assert_eq!(events.len(), 3);

    let ChannelEvent::Message(post) = &events[0] else {
        panic!("expected channel post message");
    };
    assert_eq!(post.source, "-1001234");
    assert_eq!(post.text, "breaking story");
    assert!(!post.has_media);

    let ChannelEvent::Message(photo) = &events[1] else {
        panic!("expected photo message");
    };
    assert_eq!(photo.text, "photo caption");
    assert!(photo.has_media);
    assert_eq!(photo.sender_id, Some(42));

    let ChannelEvent::Action(action) = &events[2] else {
        panic!("expected callback action");
    };
    assert_eq!(action.action, SubmitAction::Confirm);
    assert_eq!(action.submitter_id, 42);
    assert_eq!(action.callback_id, "cb9");
    assert_eq!(action.message_id, 9);
}

#[tokio::test]
async fn send_message_succeeds_on_ok_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/bot{}/sendMessage", TOKEN)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "result": { "message_id": 55, "chat": { "id": -1009 } }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let api = api(&server).await;
    api.send_message("-1009", "hello").await.expect("send ok");
}

#[tokio::test]
async fn rate_limit_response_maps_to_flood_wait() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/bot{}/copyMessage", TOKEN)))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "ok": false,
            "error_code": 429,
            "description": "Too Many Requests: retry after 7",
            "parameters": { "retry_after": 7 }
        })))
        .mount(&server)
        .await;

    let api = api(&server).await;
    let err = api
        .copy_message("-1009", "-1001", 7)
        .await
        .expect_err("throttled copy fails");
    assert!(matches!(err, ApiError::FloodWait(7)));
}

#[tokio::test]
async fn forbidden_response_maps_to_forbidden() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/bot{}/forwardMessage", TOKEN)))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "ok": false,
            "error_code": 403,
            "description": "Forbidden: bot is not a member of the channel chat"
        })))
        .mount(&server)
        .await;

    let api = api(&server).await;
    let err = api
        .forward_message("-1009", "-1001", 7)
        .await
        .expect_err("forbidden forward fails");
    assert!(matches!(err, ApiError::Forbidden));
}

#[tokio::test]
async fn other_api_errors_carry_the_description() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/bot{}/getChat", TOKEN)))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "ok": false,
            "error_code": 400,
            "description": "Bad Request: chat not found"
        })))
        .mount(&server)
        .await;

    let api = api(&server).await;
    let err = api.get_chat("@missing").await.expect_err("lookup fails");
    match err {
        ApiError::Api(msg) => assert!(msg.contains("chat not found")),
        other => panic!("expected Api error, got {:?}", other),
    }
}
