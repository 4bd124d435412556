//! Webhook endpoints (§6.1).

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::Response;
use chatgw_core::error::GatewayError;
use chatgw_core::model::WebhookEventKind;
use serde::Deserialize;
use serde_json::json;

use crate::app_state::AppState;
use crate::http::auth_ext::require_auth;
use crate::http::response::{now_ms, ok, AppError};

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub url: String,
    #[serde(default)]
    pub secret: Option<String>,
    #[serde(default = "default_events")]
    pub events: Vec<WebhookEventKind>,
}

fn default_events() -> Vec<WebhookEventKind> {
    vec![WebhookEventKind::Message, WebhookEventKind::Status]
}

pub async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(tenant_id): Path<String>,
    axum::Json(req): axum::Json<RegisterRequest>,
) -> Result<Response, AppError> {
    let ctx = require_auth(&state, &headers)?;
    crate::auth::authorize_tenant(&ctx, &tenant_id)?;

    if !req.url.starts_with("https://") && !req.url.starts_with("http://") {
        return Err(GatewayError::Validation("webhook url must be http(s)".into()).into());
    }

    let sink = state
        .webhook()
        .store()
        .register(&tenant_id, req.url, req.secret, req.events);
    Ok(ok(sink_redacted(sink)))
}

pub async fn list(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(tenant_id): Path<String>,
) -> Result<Response, AppError> {
    let ctx = require_auth(&state, &headers)?;
    crate::auth::authorize_tenant(&ctx, &tenant_id)?;

    let sinks: Vec<_> = state
        .webhook()
        .store()
        .get_redacted(&tenant_id)
        .into_iter()
        .collect();
    Ok(ok(sinks))
}

pub async fn delete(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((tenant_id, webhook_id)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let ctx = require_auth(&state, &headers)?;
    crate::auth::authorize_tenant(&ctx, &tenant_id)?;

    state.webhook().store().delete(&tenant_id, &webhook_id)?;
    Ok(ok(json!({ "deleted": webhook_id })))
}

pub async fn test(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((tenant_id, webhook_id)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let ctx = require_auth(&state, &headers)?;
    crate::auth::authorize_tenant(&ctx, &tenant_id)?;

    let result = state.webhook().test(&tenant_id, &webhook_id, now_ms()).await?;
    Ok(ok(json!({
        "success": result.success,
        "responseTime": result.response_time_ms,
        "status": result.status,
        "error": result.error,
    })))
}

pub async fn stats(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(tenant_id): Path<String>,
) -> Result<Response, AppError> {
    let ctx = require_auth(&state, &headers)?;
    crate::auth::authorize_tenant(&ctx, &tenant_id)?;

    let stats = state.webhook().stats().get(&tenant_id);
    Ok(ok(json!({
        "total": stats.total,
        "success": stats.success,
        "fail": stats.fail,
        "avgResponseMs": stats.avg_response_ms,
        "uptimePct": stats.uptime_pct(),
    })))
}

fn sink_redacted(mut sink: chatgw_core::model::WebhookSink) -> chatgw_core::model::WebhookSink {
    if sink.secret.is_some() {
        sink.secret = Some("***".to_string());
    }
    sink
}
