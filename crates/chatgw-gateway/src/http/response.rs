//! The `{success, data?, error?, message?, timestamp}` envelope (§6.1) and
//! the `GatewayError -> HTTP` boundary conversion (§7), the same shape as
//! the teacher's `AppError::into_response`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chatgw_core::error::GatewayError;
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Serialize)]
pub struct Envelope {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub timestamp: i64,
}

pub fn ok<T: Serialize>(data: T) -> Response {
    let body = Envelope {
        success: true,
        data: serde_json::to_value(data).ok(),
        error: None,
        message: None,
        timestamp: now_ms(),
    };
    (StatusCode::OK, Json(body)).into_response()
}

pub fn ok_with_status<T: Serialize>(status: StatusCode, data: T) -> Response {
    let body = Envelope {
        success: true,
        data: serde_json::to_value(data).ok(),
        error: None,
        message: None,
        timestamp: now_ms(),
    };
    (status, Json(body)).into_response()
}

/// Wraps [`GatewayError`] so it can implement a foreign trait locally, and
/// so `?` in handlers converts automatically via `From`.
pub struct AppError(pub GatewayError);

impl From<GatewayError> for AppError {
    fn from(e: GatewayError) -> Self {
        AppError(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let code = self.0.client_code();
        let status =
            StatusCode::from_u16(code.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = Envelope {
            success: false,
            data: None,
            error: Some(code.as_str()),
            message: Some(self.0.to_string()),
            timestamp: now_ms(),
        };
        (status, Json(body)).into_response()
    }
}

pub fn now_ms() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
