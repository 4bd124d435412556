#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::collections::HashMap;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chatgw_gateway::app_state::AppState;
use chatgw_gateway::config::schema::from_map;
use chatgw_gateway::router::build_router;
use serde_json::Value;
use tower::ServiceExt;

fn env_vars(require_auth: bool, session_dir: &std::path::Path) -> HashMap<String, String> {
    let mut m = HashMap::new();
    m.insert("JWT_SECRET".into(), "x".repeat(32));
    m.insert("API_KEY".into(), "y".repeat(16));
    m.insert("REQUIRE_AUTH".into(), require_auth.to_string());
    m.insert("SESSION_DIR".into(), session_dir.to_string_lossy().into_owned());
    m
}

async fn test_state(require_auth: bool) -> (AppState, tempfile::TempDir) {
    let dir = tempfile::tempdir().expect("tempdir");
    let cfg = from_map(&env_vars(require_auth, dir.path())).expect("valid config");
    let state = AppState::new(cfg).await.expect("app state");
    (state, dir)
}

async fn body_json(resp: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json body")
}

#[tokio::test]
async fn health_endpoint_is_open_without_auth() {
    let (state, _dir) = test_state(true).await;
    let app = build_router(state);

    let resp = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/health")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");

    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn start_session_without_auth_header_is_rejected() {
    let (state, _dir) = test_state(true).await;
    let app = build_router(state);

    let resp = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/sessions/acme/start")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn start_session_with_auth_disabled_transitions_to_connecting() {
    let (state, _dir) = test_state(false).await;
    let app = build_router(state);

    let resp = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/sessions/acme/start")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");

    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "connecting");
}

#[tokio::test]
async fn send_before_connect_is_not_connected() {
    let (state, _dir) = test_state(false).await;
    let app = build_router(state.clone());

    let _ = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/sessions/acme/start")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");

    let resp = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/messages/acme/send")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"to":"+15550000","message":"hi"}"#))
                .expect("request"),
        )
        .await
        .expect("response");

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = body_json(resp).await;
    assert_eq!(body["error"], "NOT_CONNECTED");
}

#[tokio::test]
async fn webhook_register_then_list_redacts_secret() {
    let (state, _dir) = test_state(false).await;
    let app = build_router(state);

    let resp = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/webhooks/register/acme")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"url":"https://sink.example/hook","secret":"s3cr3t"}"#))
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/webhooks/list/acme")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    let body = body_json(resp).await;
    assert_eq!(body["data"][0]["secret"], "***");
}
