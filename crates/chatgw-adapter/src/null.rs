//! A deterministic, in-memory `UpstreamAdapter` for development and tests.
//!
//! Mirrors the teacher's `InMemoryTicketStore`: a trivial `DashMap`-backed
//! implementation of a trait whose real counterpart is an external system.
//! Tests drive session-manager behavior by calling [`NullAdapter::push_event`]
//! after `connect`, instead of talking to a real chat network.

use async_trait::async_trait;
use chatgw_core::error::GatewayError;
use chatgw_core::Result;
use dashmap::DashMap;
use tokio::sync::mpsc;

use crate::adapter::{Handle, OutboundContent, UpstreamAdapter, UpstreamEvent, UpstreamEventStream};

/// A message captured by [`NullAdapter::send`], inspectable from tests.
#[derive(Debug, Clone)]
pub struct SentMessage {
    pub jid: String,
    pub kind: &'static str,
}

#[derive(Default)]
pub struct NullAdapter {
    senders: DashMap<String, mpsc::Sender<UpstreamEvent>>,
    sent: DashMap<String, Vec<SentMessage>>,
    next_id: std::sync::atomic::AtomicU64,
}

impl NullAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push an event as if the upstream network produced it for `tenant_id`.
    /// No-op if the tenant isn't currently connected (channel dropped/missing).
    pub fn push_event(&self, tenant_id: &str, event: UpstreamEvent) {
        if let Some(tx) = self.senders.get(tenant_id) {
            let _ = tx.try_send(event);
        }
    }

    pub fn sent_messages(&self, tenant_id: &str) -> Vec<SentMessage> {
        self.sent.get(tenant_id).map(|v| v.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl UpstreamAdapter for NullAdapter {
    async fn connect(
        &self,
        tenant_id: &str,
        _credentials: Option<Vec<u8>>,
    ) -> Result<(Handle, UpstreamEventStream)> {
        let (tx, rx) = mpsc::channel(256);
        self.senders.insert(tenant_id.to_string(), tx);
        let handle = Handle {
            tenant_id: tenant_id.to_string(),
            conn_id: format!("null-{tenant_id}"),
        };
        Ok((handle, rx))
    }

    async fn send(&self, handle: &Handle, jid: &str, content: OutboundContent) -> Result<String> {
        if !self.senders.contains_key(&handle.tenant_id) {
            return Err(GatewayError::NotConnected);
        }
        let kind = match content {
            OutboundContent::Text { .. } => "text",
            OutboundContent::Media { .. } => "media",
            OutboundContent::Document { .. } => "document",
        };
        let id = self
            .next_id
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        self.sent
            .entry(handle.tenant_id.clone())
            .or_default()
            .push(SentMessage {
                jid: jid.to_string(),
                kind,
            });
        Ok(format!("null-msg-{id}"))
    }

    async fn logout(&self, handle: &Handle) {
        self.senders.remove(&handle.tenant_id);
    }

    async fn request_pairing_refresh(&self, handle: &Handle) -> Result<()> {
        let Some(tx) = self.senders.get(&handle.tenant_id) else {
            return Err(GatewayError::NotConnected);
        };
        let id = self
            .next_id
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        let artifact = bytes::Bytes::from(format!("qr-refresh-{id}").into_bytes());
        let _ = tx.try_send(UpstreamEvent::Pairing(artifact));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;

    #[tokio::test]
    async fn connect_then_push_event_is_observed() {
        let adapter = NullAdapter::new();
        let (_handle, mut rx) = adapter.connect("acme", None).await.expect("connect ok");

        adapter.push_event("acme", UpstreamEvent::Pairing(bytes::Bytes::from_static(b"qr")));

        let ev = rx.recv().await.expect("event");
        match ev {
            UpstreamEvent::Pairing(b) => assert_eq!(&b[..], b"qr"),
            _ => panic!("unexpected event"),
        }
    }

    #[tokio::test]
    async fn send_requires_prior_connect() {
        let adapter = NullAdapter::new();
        let handle = Handle {
            tenant_id: "ghost".into(),
            conn_id: "none".into(),
        };
        let res = adapter
            .send(&handle, "+15550000", OutboundContent::Text { text: "hi".into() })
            .await;
        assert!(matches!(res, Err(GatewayError::NotConnected)));
    }

    #[tokio::test]
    async fn request_pairing_refresh_pushes_a_new_pairing_event() {
        let adapter = NullAdapter::new();
        let (handle, mut rx) = adapter.connect("acme", None).await.expect("connect ok");

        adapter
            .request_pairing_refresh(&handle)
            .await
            .expect("refresh ok");

        let ev = rx.recv().await.expect("event");
        assert!(matches!(ev, UpstreamEvent::Pairing(_)));
    }

    #[tokio::test]
    async fn request_pairing_refresh_without_connection_is_not_connected() {
        let adapter = NullAdapter::new();
        let handle = Handle {
            tenant_id: "ghost".into(),
            conn_id: "none".into(),
        };
        let res = adapter.request_pairing_refresh(&handle).await;
        assert!(matches!(res, Err(GatewayError::NotConnected)));
    }
}
