//! Message endpoints (§6.1).

use std::sync::OnceLock;
use std::time::Duration;

use axum::extract::{Multipart, Path, State};
use axum::http::HeaderMap;
use axum::response::Response;
use chatgw_core::error::GatewayError;
use regex::Regex;
use serde::Deserialize;
use serde_json::json;

use crate::http::auth_ext::require_auth;
use crate::http::response::ok;
use crate::http::response::AppError;
use crate::app_state::AppState;
use crate::session::SendContent;

const MAX_MESSAGE_LEN: usize = 4_096;

fn to_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        #[allow(clippy::expect_used)]
        Regex::new(r"^\+?[1-9]\d{10,14}$").expect("static pattern is valid")
    })
}

fn validate_send(to: &str, message: &str) -> Result<(), GatewayError> {
    if !to_pattern().is_match(to) {
        return Err(GatewayError::Validation(format!("'to' is not a valid phone number: {to}")));
    }
    if message.len() > MAX_MESSAGE_LEN {
        return Err(GatewayError::Validation(format!(
            "'message' exceeds {MAX_MESSAGE_LEN} characters"
        )));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct SendRequest {
    pub to: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    #[serde(rename = "mediaUrl")]
    pub media_url: Option<String>,
    pub caption: Option<String>,
    #[serde(rename = "fileName")]
    pub file_name: Option<String>,
}

fn content_from_request(req: SendRequest) -> SendContent {
    let mime_for_kind = |kind: &str| -> String {
        match kind {
            "image" => "image/jpeg".into(),
            "video" => "video/mp4".into(),
            "audio" => "audio/ogg".into(),
            _ => "application/octet-stream".into(),
        }
    };

    match (req.media_url, req.kind.as_deref()) {
        (Some(url), Some("document")) => SendContent::DocumentUrl {
            url,
            filename: req.file_name.unwrap_or_else(|| "document".into()),
            caption: req.caption,
        },
        (Some(url), kind) => SendContent::MediaUrl {
            url,
            mime: mime_for_kind(kind.unwrap_or("image")),
            caption: req.caption,
        },
        (None, _) => SendContent::Text { text: req.message },
    }
}

pub async fn send(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(tenant_id): Path<String>,
    axum::Json(req): axum::Json<SendRequest>,
) -> Result<Response, AppError> {
    let ctx = require_auth(&state, &headers)?;
    crate::auth::authorize_tenant(&ctx, &tenant_id)?;
    validate_send(&req.to, &req.message)?;

    let handle = state
        .registry()
        .get(&tenant_id)
        .ok_or_else(|| GatewayError::NotConnected)?;
    let to = req.to.clone();
    let message_id = handle.send(&to, content_from_request(req)).await?;
    Ok(ok(json!({ "messageId": message_id })))
}

#[derive(Debug, Deserialize)]
pub struct BulkItem {
    pub to: String,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct BulkRequest {
    pub items: Vec<BulkItem>,
    #[serde(default = "default_bulk_delay_ms")]
    pub delay_ms: u64,
}

fn default_bulk_delay_ms() -> u64 {
    2_000
}

const MAX_BULK_ITEMS: usize = 50;

pub async fn send_bulk(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(tenant_id): Path<String>,
    axum::Json(req): axum::Json<BulkRequest>,
) -> Result<Response, AppError> {
    let ctx = require_auth(&state, &headers)?;
    crate::auth::authorize_tenant(&ctx, &tenant_id)?;

    if req.items.len() > MAX_BULK_ITEMS {
        return Err(GatewayError::Validation(format!(
            "send-bulk accepts at most {MAX_BULK_ITEMS} items"
        ))
        .into());
    }

    let handle = state
        .registry()
        .get(&tenant_id)
        .ok_or_else(|| GatewayError::NotConnected)?;

    let mut results = Vec::with_capacity(req.items.len());
    for (i, item) in req.items.into_iter().enumerate() {
        if i > 0 {
            tokio::time::sleep(Duration::from_millis(req.delay_ms)).await;
        }
        let outcome = handle
            .send(&item.to, SendContent::Text { text: item.message })
            .await;
        match outcome {
            Ok(message_id) => results.push(json!({ "to": item.to, "success": true, "messageId": message_id })),
            Err(e) => results.push(json!({ "to": item.to, "success": false, "error": e.to_string() })),
        }
    }
    Ok(ok(json!({ "results": results })))
}

pub async fn send_media(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(tenant_id): Path<String>,
    mut multipart: Multipart,
) -> Result<Response, AppError> {
    let ctx = require_auth(&state, &headers)?;
    crate::auth::authorize_tenant(&ctx, &tenant_id)?;

    let mut to: Option<String> = None;
    let mut caption: Option<String> = None;
    let mut bytes: Option<bytes::Bytes> = None;
    let mut mime = "application/octet-stream".to_string();
    let mut filename = "upload.bin".to_string();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| GatewayError::Validation(format!("invalid multipart body: {e}")))?
    {
        match field.name().unwrap_or_default() {
            "to" => {
                to = Some(field.text().await.unwrap_or_default());
            }
            "caption" => {
                caption = Some(field.text().await.unwrap_or_default());
            }
            "file" => {
                mime = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                filename = field.file_name().unwrap_or("upload.bin").to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| GatewayError::Validation(format!("invalid file field: {e}")))?;
                if data.len() as u64 > state.cfg().max_file_size {
                    return Err(GatewayError::Validation("file exceeds MAX_FILE_SIZE".into()).into());
                }
                bytes = Some(data);
            }
            _ => {}
        }
    }

    let to = to.ok_or_else(|| GatewayError::Validation("missing 'to' field".into()))?;
    let bytes = bytes.ok_or_else(|| GatewayError::Validation("missing 'file' field".into()))?;

    let handle = state
        .registry()
        .get(&tenant_id)
        .ok_or_else(|| GatewayError::NotConnected)?;
    let message_id = handle
        .send(
            &to,
            SendContent::MediaBytes {
                bytes,
                mime,
                caption,
            },
        )
        .await?;
    let _ = filename;
    Ok(ok(json!({ "messageId": message_id })))
}
