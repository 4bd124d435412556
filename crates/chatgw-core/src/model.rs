//! Domain model shared across the gateway: tenants, sessions, webhook sinks,
//! and the inbound messages that flow between them.

use serde::{Deserialize, Serialize};

/// Tenant lifecycle status, owned by the external tenant registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TenantStatus {
    Active,
    Suspended,
    Inactive,
}

/// Per-tenant limits, owned by the external tenant registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantConfig {
    #[serde(default = "default_max_sessions")]
    pub max_sessions: u32,
    #[serde(default)]
    pub rate_limit: Option<RateLimit>,
}

fn default_max_sessions() -> u32 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimit {
    pub window_ms: u64,
    pub max: u32,
}

/// A registered tenant. Read-only to the core; created by an external registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    pub id: String,
    pub status: TenantStatus,
    pub config: TenantConfig,
}

impl Tenant {
    /// Tenant ids must be filesystem-safe and non-trivial (§4.1).
    pub fn validate_id(id: &str) -> bool {
        id.len() >= 3 && !id.contains(['/', '\\']) && !id.contains("..")
    }
}

/// Session connection status (§3, §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Disconnected,
    Connecting,
    Qr,
    Connected,
}

/// One session per tenant (invariant I1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub tenant_id: String,
    pub status: SessionStatus,
    /// Base64 (or otherwise opaque) rendering of the current pairing artifact.
    pub qr_code: Option<String>,
    pub phone_number: Option<String>,
    pub business_name: Option<String>,
    pub last_activity_ms: i64,
    pub reconnect_attempts: u32,
}

impl Session {
    pub fn new(tenant_id: &str, created_at_ms: i64) -> Self {
        Self {
            session_id: format!("{tenant_id}_{created_at_ms}"),
            tenant_id: tenant_id.to_string(),
            status: SessionStatus::Disconnected,
            qr_code: None,
            phone_number: None,
            business_name: None,
            last_activity_ms: created_at_ms,
            reconnect_attempts: 0,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.status == SessionStatus::Connected
    }
}

/// Opaque credential bundle, managed by the upstream adapter and owned by
/// the Session Manager for exactly one tenant (§3 invariant on CredentialBundle).
#[derive(Debug, Clone)]
pub struct CredentialBundle(pub Vec<u8>);

/// Pairing tracker status (§4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairingStatus {
    Generating,
    Available,
    Expired,
    Connected,
}

/// Per-tenant pairing tracker, alive only during the pairing window.
#[derive(Debug, Clone)]
pub struct PairingTracker {
    pub tenant_id: String,
    pub last_generated_ms: i64,
    pub regeneration_count: u32,
    pub status: PairingStatus,
    pub artifact: Option<Vec<u8>>,
}

/// Events a sink can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WebhookEventKind {
    Message,
    Status,
}

/// A tenant-owned HTTP sink (§3, §4.5). One active sink per tenant.
#[derive(Debug, Clone)]
pub struct WebhookSink {
    pub id: String,
    pub tenant_id: String,
    pub url: String,
    pub secret: Option<String>,
    pub events: Vec<WebhookEventKind>,
    pub active: bool,
    pub success_count: u64,
    pub error_count: u64,
    pub last_used_ms: Option<i64>,
}

impl WebhookSink {
    pub fn subscribes(&self, kind: WebhookEventKind) -> bool {
        self.events.contains(&kind)
    }
}

/// Inbound message kind, mirrors the upstream chat network's content types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Image,
    Video,
    Audio,
    Document,
}

/// A normalized inbound message (§3). `message_id` dedups within a tenant
/// for the 10 minute window described in §4.5.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    pub tenant_id: String,
    pub from: String,
    pub to: String,
    pub text: String,
    pub message_id: String,
    pub timestamp_ms: i64,
    pub kind: MessageKind,
    pub media_url: Option<String>,
    pub caption: Option<String>,
    pub from_me: bool,
}

/// Per-tenant webhook delivery statistics (§4.5). Evicted after 24h idle.
#[derive(Debug, Clone, Default)]
pub struct WebhookStats {
    pub total: u64,
    pub success: u64,
    pub fail: u64,
    pub avg_response_ms: f64,
    pub last_updated_ms: i64,
}

impl WebhookStats {
    /// Folds a new sample into the moving average (simple exponential blend,
    /// same shape the teacher's histogram buckets use for a running sum).
    pub fn record(&mut self, ok: bool, response_ms: f64, now_ms: i64) {
        self.total += 1;
        if ok {
            self.success += 1;
        } else {
            self.fail += 1;
        }
        const ALPHA: f64 = 0.2;
        self.avg_response_ms = if self.total == 1 {
            response_ms
        } else {
            ALPHA * response_ms + (1.0 - ALPHA) * self.avg_response_ms
        };
        self.last_updated_ms = now_ms;
    }

    pub fn uptime_pct(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            (self.success as f64 / self.total as f64) * 100.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tenant_id_validation_rejects_path_separators() {
        assert!(Tenant::validate_id("acme-1"));
        assert!(!Tenant::validate_id("a/b"));
        assert!(!Tenant::validate_id("a\\b"));
        assert!(!Tenant::validate_id(".."));
        assert!(!Tenant::validate_id("ab"));
    }

    #[test]
    fn session_id_is_tenant_plus_epoch() {
        let s = Session::new("acme", 1_700_000_000_000);
        assert_eq!(s.session_id, "acme_1700000000000");
        assert_eq!(s.status, SessionStatus::Disconnected);
    }

    #[test]
    fn webhook_stats_moving_average_and_uptime() {
        let mut stats = WebhookStats::default();
        stats.record(true, 100.0, 1);
        stats.record(true, 200.0, 2);
        stats.record(false, 0.0, 3);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.success, 2);
        assert_eq!(stats.fail, 1);
        assert!((stats.uptime_pct() - 66.666_666_666_666_66).abs() < 1e-9);
    }
}
