//! Webhook gateway integration tests.

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use signbridge_core::config::{Config, Credentials, SignConfig};
use signbridge_daemon::overrides::{Orchestrator, OverrideRegistry};
use signbridge_daemon::server::{AppState, Dispatcher, build_router};

fn test_config() -> Config {
    let mut signs = HashMap::new();
    signs.insert(
        "A1".to_string(),
        SignConfig {
            // Closed port: gateway tests only validate and enqueue, so
            // the worker's connect failure is irrelevant here.
            address: "127.0.0.1:1".into(),
            default_program: "Normal".into(),
            credentials: Credentials {
                serial_number: "SN-100".into(),
                username: "admin".into(),
                password: "secret".into(),
                login_type: 1,
            },
        },
    );
    let mut message_types = HashMap::new();
    message_types.insert("lockdown".to_string(), "Lockdown".to_string());
    Config {
        signs,
        message_types,
        ..Config::default()
    }
}

fn app() -> axum::Router {
    let config = Arc::new(test_config());
    let registry = Arc::new(OverrideRegistry::new());
    let orchestrator = Arc::new(Orchestrator::new(Arc::clone(&config), Arc::clone(&registry)));
    let dispatcher = Arc::new(Dispatcher::new(orchestrator, 4));
    build_router(AppState {
        config,
        dispatcher,
        registry,
    })
}

async fn post_override(body: &str) -> (StatusCode, String) {
    let resp = app()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/override")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, String::from_utf8_lossy(&bytes).into_owned())
}

async fn get(uri: &str) -> (StatusCode, String) {
    let resp = app()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, String::from_utf8_lossy(&bytes).into_owned())
}

#[tokio::test]
async fn valid_request_is_accepted_with_empty_body() {
    let (status, body) =
        post_override(r#"{"sign":"A1","type":"lockdown","duration":5}"#).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert!(body.is_empty(), "body: {body}");
}

#[tokio::test]
async fn malformed_json_is_rejected() {
    let (status, _) = post_override("{not json").await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn missing_fields_are_rejected() {
    let (status, _) = post_override(r#"{"sign":"A1"}"#).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn zero_duration_is_rejected() {
    let (status, body) =
        post_override(r#"{"sign":"A1","type":"lockdown","duration":0}"#).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body.contains("duration"), "body: {body}");
}

#[tokio::test]
async fn negative_duration_is_rejected() {
    let (status, _) =
        post_override(r#"{"sign":"A1","type":"lockdown","duration":-3}"#).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn unknown_sign_is_rejected() {
    let (status, body) =
        post_override(r#"{"sign":"Z9","type":"lockdown","duration":5}"#).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body.contains("Z9"), "body: {body}");
}

#[tokio::test]
async fn empty_sign_is_rejected() {
    let (status, _) = post_override(r#"{"sign":"","type":"lockdown","duration":5}"#).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn healthz_responds() {
    let (status, body) = get("/healthz").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "ok");
}

#[tokio::test]
async fn status_starts_empty() {
    let (status, body) = get("/status").await;
    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["active"], serde_json::json!([]));
    assert_eq!(json["recent"], serde_json::json!([]));
}
