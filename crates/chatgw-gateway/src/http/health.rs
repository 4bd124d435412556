//! `GET /health` (§6.1): 200 when healthy, 503 otherwise.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::app_state::AppState;
use crate::http::response::now_ms;

pub async fn health(State(state): State<AppState>) -> Response {
    let uptime_ms = now_ms() - state.started_at_ms();
    let healthy = !state.is_draining();

    let body = json!({
        "success": healthy,
        "data": {
            "status": if healthy { "healthy" } else { "draining" },
            "services": {
                "sessionRegistry": "up",
                "webhookDispatcher": "up",
            },
            "system": {
                "activeSessions": state.registry().active_tenant_ids().len(),
            },
            "uptime": uptime_ms,
            "version": env!("CARGO_PKG_VERSION"),
            "environment": format!("{:?}", state.cfg().app_env),
        },
        "timestamp": now_ms(),
    });

    let status = if healthy { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status, axum::Json(body)).into_response()
}
