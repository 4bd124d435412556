//! Outbound webhook payload envelope (§6.2).
//!
//! This is the JSON structure delivered to tenant sinks. `timestamp` is
//! always emitted in milliseconds (resolves the distilled spec's open
//! question about mixed second/millisecond timestamps).

use serde::Serialize;
use serde_json::Value;

use crate::model::{InboundMessage, MessageKind};

/// Top-level webhook event kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookEvent {
    Message,
    StatusChange,
    Test,
}

impl WebhookEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            WebhookEvent::Message => "message",
            WebhookEvent::StatusChange => "status_change",
            WebhookEvent::Test => "test",
        }
    }
}

/// The envelope forwarded to a tenant's sink.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookPayload {
    pub event: &'static str,
    pub timestamp: i64,
    #[serde(rename = "tenantId")]
    pub tenant_id: String,
    pub data: Value,
}

impl WebhookPayload {
    pub fn for_message(msg: &InboundMessage, now_ms: i64) -> Self {
        let mut data = serde_json::json!({
            "from": msg.from,
            "to": msg.to,
            "message": msg.text,
            "messageId": msg.message_id,
            "type": message_kind_str(msg.kind),
        });
        if let Some(obj) = data.as_object_mut() {
            if let Some(url) = &msg.media_url {
                obj.insert("mediaUrl".into(), Value::String(url.clone()));
            }
            if let Some(caption) = &msg.caption {
                obj.insert("caption".into(), Value::String(caption.clone()));
            }
        }
        Self {
            event: WebhookEvent::Message.as_str(),
            timestamp: now_ms,
            tenant_id: msg.tenant_id.clone(),
            data,
        }
    }

    pub fn for_status_change(
        tenant_id: &str,
        status: &str,
        phone_number: Option<&str>,
        event_name: &str,
        now_ms: i64,
    ) -> Self {
        let mut data = serde_json::json!({ "status": status, "event": event_name });
        if let (Some(obj), Some(phone)) = (data.as_object_mut(), phone_number) {
            obj.insert("phoneNumber".into(), Value::String(phone.to_string()));
        }
        Self {
            event: WebhookEvent::StatusChange.as_str(),
            timestamp: now_ms,
            tenant_id: tenant_id.to_string(),
            data,
        }
    }

    pub fn test(tenant_id: &str, now_ms: i64) -> Self {
        Self {
            event: WebhookEvent::Test.as_str(),
            timestamp: now_ms,
            tenant_id: tenant_id.to_string(),
            data: serde_json::json!({ "ping": true }),
        }
    }

    /// Serialize to the exact bytes that get signed and sent.
    pub fn to_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(self).unwrap_or_default()
    }
}

fn message_kind_str(kind: MessageKind) -> &'static str {
    match kind {
        MessageKind::Text => "text",
        MessageKind::Image => "image",
        MessageKind::Video => "video",
        MessageKind::Audio => "audio",
        MessageKind::Document => "document",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::InboundMessage;

    fn sample_message() -> InboundMessage {
        InboundMessage {
            tenant_id: "acme".into(),
            from: "5511999999999".into(),
            to: "5511888888888".into(),
            text: "hi".into(),
            message_id: "m-9".into(),
            timestamp_ms: 1_700_000_000_000,
            kind: MessageKind::Text,
            media_url: None,
            caption: None,
            from_me: false,
        }
    }

    #[test]
    fn message_payload_has_message_id_and_type() {
        let payload = WebhookPayload::for_message(&sample_message(), 1_700_000_000_500);
        assert_eq!(payload.event, "message");
        assert_eq!(payload.data["messageId"], "m-9");
        assert_eq!(payload.data["type"], "text");
        assert!(payload.data.get("mediaUrl").is_none());
    }

    #[test]
    fn status_change_payload_includes_phone_when_present() {
        let payload =
            WebhookPayload::for_status_change("acme", "connected", Some("+5511999999999"), "connected", 1);
        assert_eq!(payload.data["phoneNumber"], "+5511999999999");
    }
}
