//! Axum router wiring: the tenant-facing `/api/v1/*` surface plus the
//! operational endpoints, panic-isolated and traced (§7).

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::app_state::AppState;
use crate::config::AllowedOrigins;
use crate::{http, ops};

pub fn build_router(state: AppState) -> Router {
    let cors = match &state.cfg().allowed_origins {
        AllowedOrigins::Any => CorsLayer::permissive(),
        AllowedOrigins::List(origins) => {
            let parsed = origins
                .iter()
                .filter_map(|o| o.parse().ok())
                .collect::<Vec<_>>();
            CorsLayer::new().allow_origin(parsed)
        }
    };

    Router::new()
        .route("/healthz", get(ops::healthz))
        .route("/readyz", get(ops::readyz))
        .route("/metrics", get(ops::metrics))
        .nest("/api/v1", http::routes())
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn handle_panic(err: Box<dyn std::any::Any + Send>) -> axum::response::Response {
    let message = if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    };
    tracing::error!(panic = %message, "request handler panicked");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        axum::Json(serde_json::json!({
            "success": false,
            "error": "INTERNAL_ERROR",
            "message": "internal server error",
        })),
    )
        .into_response()
}
