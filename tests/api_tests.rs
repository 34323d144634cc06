use std::{net::SocketAddr, sync::Arc};

use email_service::{
    api::{AppState, router},
    clients::health::HealthChecker,
    config::Config,
    subscribers::EventSubscriber,
};
use serde_json::{Value, json};
use tokio::{
    net::TcpListener,
    time::{Duration, sleep},
};

use crate::common::{API_TOKEN, ScriptedSender, config_vars, dispatcher_with, renderer};

async fn spawn_app(sender: Arc<ScriptedSender>) -> SocketAddr {
    let config = Config::from_vars(config_vars(&[])).unwrap();
    let dispatcher = Arc::new(dispatcher_with(sender, 10).await);

    let state = Arc::new(AppState {
        health_checker: HealthChecker::new(config, renderer().await, None),
        subscriber: Arc::new(EventSubscriber::new(dispatcher)),
        api_token: API_TOKEN.to_string(),
    });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, router(state)).await.unwrap();
    });

    addr
}

/// Test: Health reports templates and disabled dependencies
#[tokio::test]
async fn test_health_endpoint() {
    let addr = spawn_app(ScriptedSender::succeeding()).await;

    let response = reqwest::get(format!("http://{}/health", addr)).await.unwrap();
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["checks"]["templates"]["status"], "healthy");
    assert_eq!(body["checks"]["database"]["detail"], "not configured");
    assert_eq!(body["checks"]["message_broker"]["detail"], "not configured");
}

/// Test: Events are accepted immediately and delivered in the background
#[tokio::test]
async fn test_event_endpoint_dispatches_in_background() {
    let sender = ScriptedSender::succeeding();
    let addr = spawn_app(sender.clone()).await;

    let response = reqwest::Client::new()
        .post(format!("http://{}/events", addr))
        .bearer_auth(API_TOKEN)
        .json(&json!({
            "event": "user.password_reset",
            "data": { "email": "a@b.com", "token": "XYZ" }
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 202);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["data"]["event_name"], "user.password_reset");

    for _ in 0..50 {
        if sender.calls() > 0 {
            break;
        }
        sleep(Duration::from_millis(20)).await;
    }

    let sent = sender.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].recipient, "a@b.com");
    assert!(sent[0].body.contains("token=XYZ"));
}

/// Test: Manual resend goes to the override recipient
#[tokio::test]
async fn test_resend_endpoint_with_override() {
    let sender = ScriptedSender::succeeding();
    let addr = spawn_app(sender.clone()).await;

    let response = reqwest::Client::new()
        .post(format!("http://{}/notifications/resend", addr))
        .bearer_auth(API_TOKEN)
        .json(&json!({
            "message": {
                "recipient": "old@example.com",
                "subject": "Order Confirmation",
                "body": "<p>Order 1001</p>",
                "content_type": "html"
            },
            "to": "new@example.com"
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["recipient"], "new@example.com");
    assert_eq!(body["data"]["attempts"], 1);
    assert_eq!(sender.sent()[0].recipient, "new@example.com");
}

/// Test: Resend without any recipient is a client error
#[tokio::test]
async fn test_resend_endpoint_without_recipient() {
    let sender = ScriptedSender::succeeding();
    let addr = spawn_app(sender.clone()).await;

    let response = reqwest::Client::new()
        .post(format!("http://{}/notifications/resend", addr))
        .bearer_auth(API_TOKEN)
        .json(&json!({
            "message": {
                "recipient": "",
                "subject": "Order Confirmation",
                "body": "Order 1001",
                "content_type": "plain"
            }
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 422);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "missing_recipient");
    assert!(body.get("attempts").is_none());
    assert_eq!(sender.calls(), 0);
}

/// Test: Exhausted resends surface as a bad gateway
#[tokio::test]
async fn test_resend_endpoint_exhausted() {
    let sender = ScriptedSender::always_failing();
    let addr = spawn_app(sender.clone()).await;

    let response = reqwest::Client::new()
        .post(format!("http://{}/notifications/resend", addr))
        .bearer_auth(API_TOKEN)
        .json(&json!({
            "message": {
                "recipient": "jo@example.com",
                "subject": "Order Confirmation",
                "body": "Order 1001",
                "content_type": "plain"
            }
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 502);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "retries_exhausted");
    assert_eq!(body["attempts"], 3);
    assert_eq!(sender.calls(), 3);
}

/// Test: Provider webhooks are acknowledged
#[tokio::test]
async fn test_resend_webhook_acknowledged() {
    let addr = spawn_app(ScriptedSender::succeeding()).await;

    let response = reqwest::Client::new()
        .post(format!("http://{}/webhooks/resend", addr))
        .json(&json!({ "type": "email.delivered", "data": { "email_id": "email_123" } }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Webhook received successfully");
}

/// Test: Event intake rejects callers without the internal token
#[tokio::test]
async fn test_event_endpoint_requires_token() {
    let sender = ScriptedSender::succeeding();
    let addr = spawn_app(sender.clone()).await;
    let client = reqwest::Client::new();
    let event = json!({
        "event": "user.password_reset",
        "data": { "email": "a@b.com", "token": "XYZ" }
    });

    let missing = client
        .post(format!("http://{}/events", addr))
        .json(&event)
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), 401);

    let wrong = client
        .post(format!("http://{}/events", addr))
        .bearer_auth("not-the-token")
        .json(&event)
        .send()
        .await
        .unwrap();
    assert_eq!(wrong.status(), 401);

    sleep(Duration::from_millis(100)).await;
    assert_eq!(sender.calls(), 0);
}

/// Test: Manual resend cannot be used without the internal token
#[tokio::test]
async fn test_resend_endpoint_requires_token() {
    let sender = ScriptedSender::succeeding();
    let addr = spawn_app(sender.clone()).await;

    let response = reqwest::Client::new()
        .post(format!("http://{}/notifications/resend", addr))
        .header("authorization", format!("Basic {}", API_TOKEN))
        .json(&json!({
            "message": {
                "recipient": "someone@example.com",
                "subject": "Verify your account",
                "body": "<a href='https://evil.test'>click</a>",
                "content_type": "html"
            }
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 401);
    assert_eq!(sender.calls(), 0);
}
