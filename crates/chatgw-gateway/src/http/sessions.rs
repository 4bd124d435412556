//! Session endpoints (§6.1).

use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::Response;
use chatgw_core::error::GatewayError;
use serde::Deserialize;
use serde_json::json;

use crate::app_state::AppState;
use crate::http::auth_ext::require_auth;
use crate::http::response::{now_ms, ok, AppError};

pub async fn start(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(tenant_id): Path<String>,
) -> Result<Response, AppError> {
    let ctx = require_auth(&state, &headers)?;
    crate::auth::authorize_tenant(&ctx, &tenant_id)?;

    let is_new = state.registry().get(&tenant_id).is_none();
    let session = state.registry().start(&tenant_id, now_ms()).await?;

    if is_new {
        if let (Some(url), secret) = (
            state.cfg().default_webhook_url.clone(),
            state.cfg().default_webhook_secret.clone(),
        ) {
            if state.webhook().store().get(&tenant_id).is_none() {
                state.webhook().store().register(
                    &tenant_id,
                    url,
                    secret,
                    vec![
                        chatgw_core::model::WebhookEventKind::Message,
                        chatgw_core::model::WebhookEventKind::Status,
                    ],
                );
            }
        }
    }

    Ok(ok(session))
}

pub async fn status(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(tenant_id): Path<String>,
) -> Result<Response, AppError> {
    let ctx = require_auth(&state, &headers)?;
    crate::auth::authorize_tenant(&ctx, &tenant_id)?;

    let session = state
        .registry()
        .status(&tenant_id)
        .await
        .ok_or_else(|| GatewayError::NotFound(format!("no session for {tenant_id}")))??;
    Ok(ok(session))
}

pub async fn qr(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(tenant_id): Path<String>,
) -> Result<Response, AppError> {
    let ctx = require_auth(&state, &headers)?;
    crate::auth::authorize_tenant(&ctx, &tenant_id)?;

    let artifact = state.pairing().current(&tenant_id, now_ms());
    let status = state
        .registry()
        .status(&tenant_id)
        .await
        .and_then(|r| r.ok())
        .map(|s| s.status);

    Ok(ok(json!({
        "qrCode": artifact.as_deref().map(base64_encode),
        "status": status,
        "hasQR": artifact.is_some(),
    })))
}

pub async fn delete(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(tenant_id): Path<String>,
) -> Result<Response, AppError> {
    let ctx = require_auth(&state, &headers)?;
    crate::auth::authorize_tenant(&ctx, &tenant_id)?;

    state.registry().stop(&tenant_id).await;
    state.credentials().purge(&tenant_id).await?;
    Ok(ok(json!({ "stopped": tenant_id })))
}

pub async fn restart(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(tenant_id): Path<String>,
) -> Result<Response, AppError> {
    let ctx = require_auth(&state, &headers)?;
    crate::auth::authorize_tenant(&ctx, &tenant_id)?;

    state.registry().stop(&tenant_id).await;
    tokio::time::sleep(Duration::from_secs(2)).await;
    let session = state.registry().start(&tenant_id, now_ms()).await?;
    Ok(ok(session))
}

pub async fn active(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let _ctx = require_auth(&state, &headers)?;
    Ok(ok(state.registry().active_tenant_ids()))
}

#[derive(Debug, Deserialize)]
pub struct PollQuery {
    #[serde(default = "default_poll_timeout_ms")]
    timeout: u64,
}

fn default_poll_timeout_ms() -> u64 {
    30_000
}

const MAX_POLL_TIMEOUT_MS: u64 = 60_000;

pub async fn poll(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(tenant_id): Path<String>,
    Query(query): Query<PollQuery>,
) -> Result<Response, AppError> {
    let ctx = require_auth(&state, &headers)?;
    crate::auth::authorize_tenant(&ctx, &tenant_id)?;

    let timeout_ms = query.timeout.min(MAX_POLL_TIMEOUT_MS);
    let handle = state
        .registry()
        .get(&tenant_id)
        .ok_or_else(|| GatewayError::NotFound(format!("no session for {tenant_id}")))?;
    let mut events = handle.subscribe();

    match tokio::time::timeout(Duration::from_millis(timeout_ms), events.recv()).await {
        Ok(Ok(event)) => Ok(ok(json!({ "event": event.to_json() }))),
        Ok(Err(_)) | Err(_) => Ok(ok(json!({ "event": Option::<Value>::None }))),
    }
}

use serde_json::Value;

fn base64_encode(bytes: &[u8]) -> String {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.encode(bytes)
}
