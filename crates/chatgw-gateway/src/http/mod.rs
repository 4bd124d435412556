//! The tenant-facing `/api/v1/*` HTTP surface (§6.1).

pub mod auth_ext;
pub mod health;
pub mod messages;
pub mod response;
pub mod sessions;
pub mod webhooks;

use axum::routing::{delete, get, post};
use axum::Router;

use crate::app_state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/sessions/active", get(sessions::active))
        .route("/sessions/:tenantId/start", post(sessions::start))
        .route("/sessions/:tenantId/status", get(sessions::status))
        .route("/sessions/:tenantId/qr", get(sessions::qr))
        .route("/sessions/:tenantId", delete(sessions::delete))
        .route("/sessions/:tenantId/restart", post(sessions::restart))
        .route("/sessions/:tenantId/poll", get(sessions::poll))
        .route("/messages/:tenantId/send", post(messages::send))
        .route("/messages/:tenantId/send-media", post(messages::send_media))
        .route("/messages/:tenantId/send-bulk", post(messages::send_bulk))
        .route("/webhooks/register/:tenantId", post(webhooks::register))
        .route("/webhooks/list/:tenantId", get(webhooks::list))
        .route("/webhooks/:tenantId/:webhookId", delete(webhooks::delete))
        .route("/webhooks/test/:tenantId/:webhookId", post(webhooks::test))
        .route("/webhooks/stats/:tenantId", get(webhooks::stats))
}
