//! Ordered, deduplicated, signed, retrying fan-out of inbound events to
//! tenant sinks (§4.5).

use std::time::Duration;

use chatgw_core::error::{GatewayError, Result};
use chatgw_core::model::{InboundMessage, WebhookEventKind, WebhookSink};
use chatgw_core::signing;
use chatgw_core::webhook::WebhookPayload;
use tracing::{info, warn};

use crate::session::DomainEvent;
use crate::webhook::dedup::DedupSet;
use crate::webhook::stats::StatsStore;
use crate::webhook::store::WebhookStore;

const POST_TIMEOUT: Duration = Duration::from_secs(8);
const MAX_RETRIES: u32 = 2;

/// Outcome of a one-shot `test` delivery, reported to the caller verbatim.
#[derive(Debug, Clone)]
pub struct WebhookTestResult {
    pub success: bool,
    pub response_time_ms: f64,
    pub status: Option<u16>,
    pub error: Option<String>,
}

pub struct WebhookDispatcher {
    store: WebhookStore,
    dedup: DedupSet,
    stats: StatsStore,
    client: reqwest::Client,
}

impl WebhookDispatcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            store: WebhookStore::new(),
            dedup: DedupSet::new(),
            stats: StatsStore::new(),
            client,
        }
    }

    pub fn store(&self) -> &WebhookStore {
        &self.store
    }

    pub fn stats(&self) -> &StatsStore {
        &self.stats
    }

    pub fn sweep(&self, now_ms: i64) {
        self.dedup.sweep(now_ms);
        self.stats.sweep(now_ms);
    }

    /// Routes a domain event raised by a Session Manager to the tenant's
    /// sink, if any, and if the sink subscribes to the event kind.
    pub async fn handle_event(&self, event: &DomainEvent, now_ms: i64) {
        match event {
            DomainEvent::Message(msg) => self.dispatch_message(msg, now_ms).await,
            DomainEvent::Connected { tenant_id, phone_number, .. } => {
                self.dispatch_status(tenant_id, "connected", Some(phone_number), "connected", now_ms)
                    .await;
            }
            DomainEvent::Disconnected { tenant_id, reason } => {
                let _ = reason;
                self.dispatch_status(tenant_id, "disconnected", None, "disconnected", now_ms)
                    .await;
            }
            DomainEvent::Qr { tenant_id, .. } => {
                self.dispatch_status(tenant_id, "qr", None, "qr", now_ms).await;
            }
        }
    }

    async fn dispatch_message(&self, msg: &InboundMessage, now_ms: i64) {
        let Some(sink) = self.active_sink_for(&msg.tenant_id, WebhookEventKind::Message) else {
            return;
        };
        if !self.dedup.try_claim(&msg.tenant_id, &msg.message_id, now_ms) {
            debug_dropped(&msg.tenant_id, &msg.message_id);
            return;
        }
        let payload = WebhookPayload::for_message(msg, now_ms);
        if !self.deliver(&sink, &payload).await {
            self.dedup.release(&msg.tenant_id, &msg.message_id);
        }
    }

    async fn dispatch_status(
        &self,
        tenant_id: &str,
        status: &str,
        phone_number: Option<&str>,
        event_name: &str,
        now_ms: i64,
    ) {
        let Some(sink) = self.active_sink_for(tenant_id, WebhookEventKind::Status) else {
            return;
        };
        let payload = WebhookPayload::for_status_change(tenant_id, status, phone_number, event_name, now_ms);
        self.deliver(&sink, &payload).await;
    }

    /// Sends a synthetic `test` event as a single attempt, reporting the raw
    /// outcome back to the caller instead of going through the retrying
    /// [`Self::deliver`] path (the caller wants to see the real status/error,
    /// not a retried-and-summarized one).
    pub async fn test(&self, tenant_id: &str, webhook_id: &str, now_ms: i64) -> Result<WebhookTestResult> {
        let sink = self
            .store
            .get(tenant_id)
            .filter(|s| s.id == webhook_id)
            .ok_or_else(|| GatewayError::NotFound(format!("no webhook {webhook_id} for {tenant_id}")))?;
        let payload = WebhookPayload::test(tenant_id, now_ms);
        let body = payload.to_bytes();

        let mut req = self
            .client
            .post(&sink.url)
            .timeout(POST_TIMEOUT)
            .header("Content-Type", "application/json")
            .header("User-Agent", "wsprism-chat-gateway/1.0.0")
            .header("X-Webhook-Event", payload.event)
            .header("X-Tenant-ID", sink.tenant_id.clone())
            .body(body.clone());
        if let Some(secret) = &sink.secret {
            req = req.header("X-Webhook-Signature", signing::sign(secret, &body));
        }

        let started = std::time::Instant::now();
        let result = match req.send().await {
            Ok(resp) => {
                let status = resp.status().as_u16();
                let success = resp.status().is_success();
                let elapsed_ms = started.elapsed().as_secs_f64() * 1_000.0;
                if success {
                    self.store.record_success(tenant_id, now_ms);
                } else {
                    self.store.record_failure(tenant_id, now_ms);
                }
                self.stats.record(tenant_id, success, elapsed_ms, now_ms);
                WebhookTestResult {
                    success,
                    response_time_ms: elapsed_ms,
                    status: Some(status),
                    error: None,
                }
            }
            Err(e) => {
                let elapsed_ms = started.elapsed().as_secs_f64() * 1_000.0;
                self.store.record_failure(tenant_id, now_ms);
                self.stats.record(tenant_id, false, elapsed_ms, now_ms);
                WebhookTestResult {
                    success: false,
                    response_time_ms: elapsed_ms,
                    status: None,
                    error: Some(e.to_string()),
                }
            }
        };
        Ok(result)
    }

    fn active_sink_for(&self, tenant_id: &str, kind: WebhookEventKind) -> Option<WebhookSink> {
        let sink = self.store.get(tenant_id)?;
        if sink.active && sink.subscribes(kind) {
            Some(sink)
        } else {
            None
        }
    }

    /// POSTs the payload with retry/backoff; returns whether it ultimately
    /// succeeded (§4.5).
    async fn deliver(&self, sink: &WebhookSink, payload: &WebhookPayload) -> bool {
        let body = payload.to_bytes();
        let mut attempt = 0u32;

        loop {
            let started = std::time::Instant::now();
            let outcome = self.post_once(sink, payload.event, &body).await;
            let elapsed_ms = started.elapsed().as_secs_f64() * 1_000.0;
            let now = now_ms();

            match outcome {
                DeliveryOutcome::Success => {
                    self.store.record_success(&sink.tenant_id, now);
                    self.stats.record(&sink.tenant_id, true, elapsed_ms, now);
                    info!(tenant_id = %sink.tenant_id, event = payload.event, "webhook delivered");
                    return true;
                }
                DeliveryOutcome::Terminal => {
                    self.store.record_failure(&sink.tenant_id, now);
                    self.stats.record(&sink.tenant_id, false, elapsed_ms, now);
                    warn!(tenant_id = %sink.tenant_id, event = payload.event, "webhook delivery rejected (terminal)");
                    return false;
                }
                DeliveryOutcome::Retryable => {
                    if attempt >= MAX_RETRIES {
                        self.store.record_failure(&sink.tenant_id, now);
                        self.stats.record(&sink.tenant_id, false, elapsed_ms, now);
                        warn!(tenant_id = %sink.tenant_id, event = payload.event, "webhook delivery failed after retries");
                        return false;
                    }
                    let backoff = retry_backoff_ms(attempt);
                    attempt += 1;
                    tokio::time::sleep(Duration::from_millis(backoff)).await;
                }
            }
        }
    }

    async fn post_once(&self, sink: &WebhookSink, event: &str, body: &[u8]) -> DeliveryOutcome {
        let mut req = self
            .client
            .post(&sink.url)
            .timeout(POST_TIMEOUT)
            .header("Content-Type", "application/json")
            .header("User-Agent", "wsprism-chat-gateway/1.0.0")
            .header("X-Webhook-Event", event)
            .header("X-Tenant-ID", sink.tenant_id.clone())
            .body(body.to_vec());

        if let Some(secret) = &sink.secret {
            req = req.header("X-Webhook-Signature", signing::sign(secret, body));
        }

        match req.send().await {
            Ok(resp) if resp.status().is_success() => DeliveryOutcome::Success,
            Ok(resp) if resp.status().is_client_error() => DeliveryOutcome::Terminal,
            Ok(_) => DeliveryOutcome::Retryable,
            Err(e) if e.is_timeout() || e.is_connect() => DeliveryOutcome::Retryable,
            Err(_) => DeliveryOutcome::Retryable,
        }
    }
}

enum DeliveryOutcome {
    Success,
    Terminal,
    Retryable,
}

/// `min(1000 * 2^attempt, 5000)` ms (§4.5).
pub fn retry_backoff_ms(attempt: u32) -> u64 {
    let exp = attempt.min(20);
    1_000u64.saturating_mul(1u64 << exp).min(5_000)
}

fn debug_dropped(tenant_id: &str, message_id: &str) {
    tracing::debug!(tenant_id, message_id, "webhook delivery dropped as duplicate");
}

fn now_ms() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_backoff_caps_at_five_seconds() {
        assert_eq!(retry_backoff_ms(0), 1_000);
        assert_eq!(retry_backoff_ms(1), 2_000);
        assert_eq!(retry_backoff_ms(2), 4_000);
        assert_eq!(retry_backoff_ms(3), 5_000);
    }

    #[tokio::test]
    async fn dispatch_message_without_sink_is_a_no_op() {
        let dispatcher = WebhookDispatcher::new(reqwest::Client::new());
        let msg = InboundMessage {
            tenant_id: "acme".into(),
            from: "1".into(),
            to: "2".into(),
            text: "hi".into(),
            message_id: "m1".into(),
            timestamp_ms: 0,
            kind: chatgw_core::model::MessageKind::Text,
            media_url: None,
            caption: None,
            from_me: false,
        };
        dispatcher.dispatch_message(&msg, 0).await;
        assert_eq!(dispatcher.stats().get("acme").total, 0);
    }
}
