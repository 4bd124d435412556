//! Session Manager (§4.4): the per-tenant state machine over the upstream
//! connection.

pub mod manager;

use chatgw_core::model::InboundMessage;

pub use manager::{SendContent, SessionManager, SessionManagerHandle};

/// Events the registry and webhook dispatcher subscribe to (§4.4).
#[derive(Debug, Clone)]
pub enum DomainEvent {
    Qr {
        tenant_id: String,
        artifact: Vec<u8>,
    },
    Connected {
        tenant_id: String,
        phone_number: String,
        business_name: Option<String>,
    },
    Disconnected {
        tenant_id: String,
        reason: String,
    },
    Message(InboundMessage),
}

impl DomainEvent {
    pub fn tenant_id(&self) -> &str {
        match self {
            DomainEvent::Qr { tenant_id, .. } => tenant_id,
            DomainEvent::Connected { tenant_id, .. } => tenant_id,
            DomainEvent::Disconnected { tenant_id, .. } => tenant_id,
            DomainEvent::Message(msg) => &msg.tenant_id,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            DomainEvent::Qr { tenant_id, artifact } => serde_json::json!({
                "type": "qr",
                "tenantId": tenant_id,
                "qr": base64_encode(artifact),
            }),
            DomainEvent::Connected { tenant_id, phone_number, business_name } => serde_json::json!({
                "type": "connected",
                "tenantId": tenant_id,
                "phoneNumber": phone_number,
                "businessName": business_name,
            }),
            DomainEvent::Disconnected { tenant_id, reason } => serde_json::json!({
                "type": "disconnected",
                "tenantId": tenant_id,
                "reason": reason,
            }),
            DomainEvent::Message(msg) => serde_json::json!({
                "type": "message",
                "tenantId": msg.tenant_id,
                "message": msg,
            }),
        }
    }
}

fn base64_encode(bytes: &[u8]) -> String {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.encode(bytes)
}
