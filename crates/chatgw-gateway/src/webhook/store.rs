//! Sink registry: one active [`WebhookSink`] per tenant (§4.5, §9).

use chatgw_core::error::{GatewayError, Result};
use chatgw_core::model::{WebhookEventKind, WebhookSink};
use dashmap::DashMap;
use uuid::Uuid;

#[derive(Default)]
pub struct WebhookStore {
    sinks: DashMap<String, WebhookSink>,
}

impl WebhookStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-registration updates in place: `id` and counters survive (§4.5).
    pub fn register(
        &self,
        tenant_id: &str,
        url: String,
        secret: Option<String>,
        events: Vec<WebhookEventKind>,
    ) -> WebhookSink {
        if let Some(mut existing) = self.sinks.get_mut(tenant_id) {
            existing.url = url;
            existing.secret = secret;
            existing.events = events;
            existing.active = true;
            return existing.clone();
        }
        let sink = WebhookSink {
            id: Uuid::new_v4().to_string(),
            tenant_id: tenant_id.to_string(),
            url,
            secret,
            events,
            active: true,
            success_count: 0,
            error_count: 0,
            last_used_ms: None,
        };
        self.sinks.insert(tenant_id.to_string(), sink.clone());
        sink
    }

    pub fn get(&self, tenant_id: &str) -> Option<WebhookSink> {
        self.sinks.get(tenant_id).map(|s| s.clone())
    }

    /// Returns the sink with its secret redacted, for list endpoints.
    pub fn get_redacted(&self, tenant_id: &str) -> Option<WebhookSink> {
        self.get(tenant_id).map(|mut s| {
            if s.secret.is_some() {
                s.secret = Some("***".to_string());
            }
            s
        })
    }

    pub fn delete(&self, tenant_id: &str, webhook_id: &str) -> Result<()> {
        match self.sinks.get(tenant_id) {
            Some(sink) if sink.id == webhook_id => {
                drop(sink);
                self.sinks.remove(tenant_id);
                Ok(())
            }
            Some(_) => Err(GatewayError::NotFound(format!(
                "no webhook {webhook_id} for tenant {tenant_id}"
            ))),
            None => Err(GatewayError::NotFound(format!(
                "no webhook registered for tenant {tenant_id}"
            ))),
        }
    }

    pub fn record_success(&self, tenant_id: &str, now_ms: i64) {
        if let Some(mut sink) = self.sinks.get_mut(tenant_id) {
            sink.success_count += 1;
            sink.last_used_ms = Some(now_ms);
        }
    }

    /// Bumps the error counter and deactivates the sink past the cumulative
    /// error threshold (§4.5).
    pub fn record_failure(&self, tenant_id: &str, now_ms: i64) {
        if let Some(mut sink) = self.sinks.get_mut(tenant_id) {
            sink.error_count += 1;
            sink.last_used_ms = Some(now_ms);
            if sink.error_count > 10 {
                sink.active = false;
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn register_twice_preserves_id_and_counters() {
        let store = WebhookStore::new();
        let first = store.register("acme", "https://a.example".into(), None, vec![WebhookEventKind::Message]);
        store.record_success("acme", 1);
        let second = store.register("acme", "https://b.example".into(), None, vec![WebhookEventKind::Message]);
        assert_eq!(first.id, second.id);
        assert_eq!(second.url, "https://b.example");
        assert_eq!(second.success_count, 1);
    }

    #[test]
    fn redacted_hides_secret() {
        let store = WebhookStore::new();
        store.register("acme", "https://a.example".into(), Some("shh".into()), vec![]);
        let redacted = store.get_redacted("acme").expect("present");
        assert_eq!(redacted.secret.as_deref(), Some("***"));
    }

    #[test]
    fn deactivates_after_ten_errors() {
        let store = WebhookStore::new();
        store.register("acme", "https://a.example".into(), None, vec![]);
        for _ in 0..11 {
            store.record_failure("acme", 1);
        }
        assert!(!store.get("acme").expect("present").active);
    }

    #[test]
    fn delete_requires_matching_id() {
        let store = WebhookStore::new();
        let sink = store.register("acme", "https://a.example".into(), None, vec![]);
        assert!(store.delete("acme", "wrong-id").is_err());
        assert!(store.delete("acme", &sink.id).is_ok());
        assert!(store.get("acme").is_none());
    }
}
