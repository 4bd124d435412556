//! The serial per-tenant task that owns one `Session` and consumes its
//! adapter's event stream in order (§4.4, §5). All mutation of the
//! session happens on this task; callers interact only through
//! [`SessionManagerHandle`].

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chatgw_core::error::{GatewayError, Result};
use chatgw_core::model::{
    CredentialBundle, MessageKind, Session, SessionStatus,
};
use chatgw_adapter::{ConnState, Handle, OutboundContent, UpstreamAdapter, UpstreamEvent, UpstreamEventStream};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, Instrument};

use crate::credentials::CredentialStore;
use crate::pairing::{PairingService, REGEN_PROBE_INTERVAL_MS};
use crate::session::DomainEvent;

const DOMAIN_EVENT_CHANNEL_CAPACITY: usize = 256;

/// Content to deliver, pre-fetch. URL variants are resolved over HTTP by
/// the manager before being handed to the adapter (§4.4).
#[derive(Debug, Clone)]
pub enum SendContent {
    Text {
        text: String,
    },
    MediaUrl {
        url: String,
        mime: String,
        caption: Option<String>,
    },
    MediaBytes {
        bytes: Bytes,
        mime: String,
        caption: Option<String>,
    },
    DocumentUrl {
        url: String,
        filename: String,
        caption: Option<String>,
    },
    DocumentBytes {
        bytes: Bytes,
        filename: String,
        caption: Option<String>,
    },
}

enum Command {
    Start {
        reply: oneshot::Sender<Result<()>>,
    },
    Stop {
        reply: oneshot::Sender<()>,
    },
    Send {
        jid: String,
        content: SendContent,
        reply: oneshot::Sender<Result<String>>,
    },
    Status {
        reply: oneshot::Sender<Session>,
    },
}

#[derive(Clone)]
pub struct SessionManagerHandle {
    tenant_id: String,
    cmd_tx: mpsc::Sender<Command>,
    events_tx: broadcast::Sender<DomainEvent>,
    cancel: CancellationToken,
}

impl SessionManagerHandle {
    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.events_tx.subscribe()
    }

    pub async fn start(&self) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send_command(Command::Start { reply }).await?;
        rx.await
            .map_err(|_| GatewayError::Internal("session manager task gone".into()))?
    }

    pub async fn stop(&self) {
        let (reply, rx) = oneshot::channel();
        if self.send_command(Command::Stop { reply }).await.is_ok() {
            let _ = rx.await;
        }
    }

    pub async fn send(&self, jid: &str, content: SendContent) -> Result<String> {
        let (reply, rx) = oneshot::channel();
        self.send_command(Command::Send {
            jid: jid.to_string(),
            content,
            reply,
        })
        .await?;
        rx.await
            .map_err(|_| GatewayError::Internal("session manager task gone".into()))?
    }

    pub async fn status(&self) -> Result<Session> {
        let (reply, rx) = oneshot::channel();
        self.send_command(Command::Status { reply }).await?;
        rx.await
            .map_err(|_| GatewayError::Internal("session manager task gone".into()))
    }

    /// Cancels the manager task's in-flight work promptly (§5).
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    async fn send_command(&self, cmd: Command) -> Result<()> {
        self.cmd_tx
            .send(cmd)
            .await
            .map_err(|_| GatewayError::Internal("session manager task gone".into()))
    }
}

pub struct SessionManager {
    tenant_id: String,
    adapter: Arc<dyn UpstreamAdapter>,
    credentials: CredentialStore,
    pairing: Arc<PairingService>,
    http: reqwest::Client,
    max_reconnect_attempts: u32,

    cmd_rx: mpsc::Receiver<Command>,
    events_tx: broadcast::Sender<DomainEvent>,
    cancel: CancellationToken,

    session: Session,
    handle: Option<Handle>,
    stream: Option<UpstreamEventStream>,
}

impl SessionManager {
    /// Spawns the manager's task and returns a cloneable handle to it.
    #[allow(clippy::too_many_arguments)]
    pub fn spawn(
        tenant_id: String,
        adapter: Arc<dyn UpstreamAdapter>,
        credentials: CredentialStore,
        pairing: Arc<PairingService>,
        http: reqwest::Client,
        max_reconnect_attempts: u32,
        created_at_ms: i64,
    ) -> SessionManagerHandle {
        let (cmd_tx, cmd_rx) = mpsc::channel(32);
        let (events_tx, _) = broadcast::channel(DOMAIN_EVENT_CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();

        let manager = SessionManager {
            tenant_id: tenant_id.clone(),
            adapter,
            credentials,
            pairing,
            http,
            max_reconnect_attempts,
            cmd_rx,
            events_tx: events_tx.clone(),
            cancel: cancel.clone(),
            session: Session::new(&tenant_id, created_at_ms),
            handle: None,
            stream: None,
        };

        let span = tracing::info_span!("session_manager", tenant_id = %tenant_id);
        tokio::spawn(async move { manager.run().await }.instrument(span));

        SessionManagerHandle {
            tenant_id,
            cmd_tx,
            events_tx,
            cancel,
        }
    }

    async fn run(mut self) {
        let mut reconnect_at: Option<Instant> = None;
        let mut regen_probe_at: Option<Instant> = None;
        loop {
            let sleep = async {
                match reconnect_at {
                    Some(at) => tokio::time::sleep_until(at).await,
                    None => std::future::pending::<()>().await,
                }
            };
            let regen_sleep = async {
                match regen_probe_at {
                    Some(at) => tokio::time::sleep_until(at).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                _ = self.cancel.cancelled() => {
                    self.do_stop().await;
                    break;
                }
                maybe_cmd = self.cmd_rx.recv() => {
                    match maybe_cmd {
                        Some(cmd) => self.handle_command(cmd, &mut reconnect_at, &mut regen_probe_at).await,
                        None => break,
                    }
                }
                maybe_event = next_event(&mut self.stream) => {
                    match maybe_event {
                        Some(event) => self.handle_upstream_event(event, &mut reconnect_at, &mut regen_probe_at).await,
                        None => {
                            // Adapter dropped the stream without a close event.
                            self.stream = None;
                        }
                    }
                }
                _ = sleep, if reconnect_at.is_some() => {
                    reconnect_at = None;
                    self.do_connect(None).await;
                }
                _ = regen_sleep, if regen_probe_at.is_some() => {
                    regen_probe_at = Some(Instant::now() + Duration::from_millis(REGEN_PROBE_INTERVAL_MS as u64));
                    self.probe_pairing_regeneration().await;
                }
            }
        }
        debug!(tenant_id = %self.tenant_id, "session manager task exiting");
    }

    async fn handle_command(
        &mut self,
        cmd: Command,
        reconnect_at: &mut Option<Instant>,
        regen_probe_at: &mut Option<Instant>,
    ) {
        match cmd {
            Command::Start { reply } => {
                let result = self.do_start().await;
                *reconnect_at = None;
                let _ = reply.send(result);
            }
            Command::Stop { reply } => {
                *reconnect_at = None;
                *regen_probe_at = None;
                self.do_stop().await;
                let _ = reply.send(());
            }
            Command::Send { jid, content, reply } => {
                let result = self.do_send(&jid, content).await;
                let _ = reply.send(result);
            }
            Command::Status { reply } => {
                let _ = reply.send(self.session.clone());
            }
        }
    }

    /// Asks the adapter to rotate the pairing artifact when the current one
    /// is stale and the tenant hasn't hit the regeneration cap yet (§4.3).
    async fn probe_pairing_regeneration(&self) {
        if self.session.status != SessionStatus::Qr {
            return;
        }
        let Some(handle) = self.handle.clone() else {
            return;
        };
        if self.pairing.needs_regeneration(&self.tenant_id, now_ms()) {
            if let Err(e) = self.adapter.request_pairing_refresh(&handle).await {
                warn!(tenant_id = %self.tenant_id, error = %e, "pairing refresh request failed");
            }
        }
    }

    async fn do_start(&mut self) -> Result<()> {
        if self.session.is_connected() {
            return Ok(());
        }
        let creds = self.credentials.load(&self.tenant_id).await?;
        self.do_connect(creds).await
    }

    async fn do_connect(&mut self, creds: Option<CredentialBundle>) -> Result<()> {
        let creds_bytes = creds.map(|c| c.0);
        match self.adapter.connect(&self.tenant_id, creds_bytes).await {
            Ok((handle, stream)) => {
                self.handle = Some(handle);
                self.stream = Some(stream);
                self.session.status = SessionStatus::Connecting;
                info!(tenant_id = %self.tenant_id, "session connecting");
                Ok(())
            }
            Err(e) => {
                warn!(tenant_id = %self.tenant_id, error = %e, "adapter connect failed");
                Err(e)
            }
        }
    }

    async fn do_stop(&mut self) {
        if let Some(handle) = &self.handle {
            self.adapter.logout(handle).await;
        }
        self.handle = None;
        self.stream = None;
        self.session.status = SessionStatus::Disconnected;
        self.session.qr_code = None;
        self.pairing.stop(&self.tenant_id);
        self.emit(DomainEvent::Disconnected {
            tenant_id: self.tenant_id.clone(),
            reason: "stopped".into(),
        });
    }

    async fn do_send(&mut self, jid: &str, content: SendContent) -> Result<String> {
        if !self.session.is_connected() {
            return Err(GatewayError::NotConnected);
        }
        let Some(handle) = self.handle.clone() else {
            return Err(GatewayError::NotConnected);
        };
        let outbound = self.resolve_content(content).await?;
        self.session.last_activity_ms = now_ms();
        self.adapter.send(&handle, jid, outbound).await
    }

    async fn resolve_content(&self, content: SendContent) -> Result<OutboundContent> {
        match content {
            SendContent::Text { text } => Ok(OutboundContent::Text { text }),
            SendContent::MediaBytes { bytes, mime, caption } => {
                Ok(OutboundContent::Media { bytes, mime, caption })
            }
            SendContent::DocumentBytes { bytes, filename, caption } => {
                Ok(OutboundContent::Document { bytes, filename, caption })
            }
            SendContent::MediaUrl { url, mime, caption } => {
                let bytes = self.fetch_media(&url).await?;
                Ok(OutboundContent::Media { bytes, mime, caption })
            }
            SendContent::DocumentUrl { url, filename, caption } => {
                let bytes = self.fetch_media(&url).await?;
                Ok(OutboundContent::Document { bytes, filename, caption })
            }
        }
    }

    async fn fetch_media(&self, url: &str) -> Result<Bytes> {
        let resp = self
            .http
            .get(url)
            .timeout(Duration::from_secs(30))
            .send()
            .await
            .map_err(|e| GatewayError::Internal(format!("media fetch failed: {e}")))?;
        if !resp.status().is_success() {
            return Err(GatewayError::Internal(format!(
                "media fetch returned status {}",
                resp.status()
            )));
        }
        resp.bytes()
            .await
            .map_err(|e| GatewayError::Internal(format!("media fetch body failed: {e}")))
    }

    async fn handle_upstream_event(
        &mut self,
        event: UpstreamEvent,
        reconnect_at: &mut Option<Instant>,
        regen_probe_at: &mut Option<Instant>,
    ) {
        match event {
            UpstreamEvent::Pairing(artifact) => {
                let now = now_ms();
                let artifact_vec = artifact.to_vec();
                // The first pairing artifact for a tenant opens the window;
                // every one after that is a rotation counted against the
                // regeneration cap (§4.3).
                let outcome = if self.pairing.has_tracker(&self.tenant_id) {
                    self.pairing.regenerate(&self.tenant_id, artifact_vec.clone(), now)
                } else {
                    self.pairing.start(&self.tenant_id, artifact_vec.clone(), now);
                    Ok(())
                };

                match outcome {
                    Ok(()) => {
                        self.session.status = SessionStatus::Qr;
                        self.session.qr_code = Some(base64_encode(&artifact));
                        *regen_probe_at = Some(Instant::now() + Duration::from_millis(REGEN_PROBE_INTERVAL_MS as u64));
                        self.emit(DomainEvent::Qr {
                            tenant_id: self.tenant_id.clone(),
                            artifact: artifact_vec,
                        });
                    }
                    Err(_) => {
                        warn!(tenant_id = %self.tenant_id, "pairing regeneration limit reached, stopping session");
                        self.session.status = SessionStatus::Disconnected;
                        self.session.qr_code = None;
                        self.pairing.stop(&self.tenant_id);
                        *regen_probe_at = None;
                        *reconnect_at = None;
                        self.emit(DomainEvent::Disconnected {
                            tenant_id: self.tenant_id.clone(),
                            reason: "pairing regeneration limit reached".into(),
                        });
                    }
                }
            }
            UpstreamEvent::State(ConnState::Connecting) => {
                self.session.status = SessionStatus::Connecting;
            }
            UpstreamEvent::State(ConnState::Open { phone_number, business_name }) => {
                self.session.status = SessionStatus::Connected;
                self.session.phone_number = Some(phone_number.clone());
                self.session.business_name = business_name.clone();
                self.session.qr_code = None;
                self.session.reconnect_attempts = 0;
                self.pairing.mark_connected(&self.tenant_id);
                *reconnect_at = None;
                *regen_probe_at = None;
                info!(tenant_id = %self.tenant_id, %phone_number, "session connected");
                self.emit(DomainEvent::Connected {
                    tenant_id: self.tenant_id.clone(),
                    phone_number,
                    business_name,
                });
            }
            UpstreamEvent::State(ConnState::Close { reason, logged_out }) => {
                self.stream = None;
                if logged_out {
                    if let Err(e) = self.credentials.purge(&self.tenant_id).await {
                        warn!(tenant_id = %self.tenant_id, error = %e, "credential purge failed");
                    }
                    self.session.status = SessionStatus::Disconnected;
                    self.session.qr_code = None;
                    self.pairing.stop(&self.tenant_id);
                    *reconnect_at = None;
                    *regen_probe_at = None;
                    self.emit(DomainEvent::Disconnected {
                        tenant_id: self.tenant_id.clone(),
                        reason: reason.clone(),
                    });
                    info!(tenant_id = %self.tenant_id, %reason, "session logged out");
                } else if self.session.reconnect_attempts < self.max_reconnect_attempts {
                    self.session.reconnect_attempts += 1;
                    let delay_ms = reconnect_backoff_ms(self.session.reconnect_attempts);
                    *reconnect_at = Some(Instant::now() + Duration::from_millis(delay_ms));
                    *regen_probe_at = None;
                    self.session.status = SessionStatus::Connecting;
                    warn!(
                        tenant_id = %self.tenant_id, %reason, attempt = self.session.reconnect_attempts,
                        delay_ms, "session closed, scheduling reconnect"
                    );
                } else {
                    self.session.status = SessionStatus::Disconnected;
                    self.pairing.stop(&self.tenant_id);
                    *reconnect_at = None;
                    *regen_probe_at = None;
                    warn!(tenant_id = %self.tenant_id, "reconnect budget exhausted");
                    self.emit(DomainEvent::Disconnected {
                        tenant_id: self.tenant_id.clone(),
                        reason: "reconnect budget exhausted".into(),
                    });
                }
            }
            UpstreamEvent::CredsUpdated(bytes) => {
                let bundle = CredentialBundle(bytes.to_vec());
                if let Err(e) = self.credentials.save(&self.tenant_id, &bundle).await {
                    warn!(tenant_id = %self.tenant_id, error = %e, "credential save failed");
                }
            }
            UpstreamEvent::MessageInbound(batch) => {
                let now = now_ms();
                for raw in batch {
                    if raw.from_me {
                        continue;
                    }
                    if raw.text.is_empty() && raw.media_url.is_none() {
                        continue;
                    }
                    self.session.last_activity_ms = now;
                    let kind = infer_kind(&raw.media_url);
                    self.emit(DomainEvent::Message(chatgw_core::model::InboundMessage {
                        tenant_id: self.tenant_id.clone(),
                        from: raw.from,
                        to: raw.to,
                        text: raw.text,
                        message_id: raw.message_id,
                        timestamp_ms: raw.timestamp_ms,
                        kind,
                        media_url: raw.media_url,
                        caption: raw.caption,
                        from_me: raw.from_me,
                    }));
                }
            }
        }
    }

    fn emit(&self, event: DomainEvent) {
        let _ = self.events_tx.send(event);
    }
}

fn infer_kind(media_url: &Option<String>) -> MessageKind {
    match media_url {
        None => MessageKind::Text,
        Some(_) => MessageKind::Document,
    }
}

async fn next_event(stream: &mut Option<UpstreamEventStream>) -> Option<UpstreamEvent> {
    match stream {
        Some(s) => s.recv().await,
        None => std::future::pending().await,
    }
}

/// `min(5000 * 2^(n-1), 30000)` ms (§4.4).
pub fn reconnect_backoff_ms(attempt: u32) -> u64 {
    let exp = attempt.saturating_sub(1).min(20);
    let delay = 5_000u64.saturating_mul(1u64 << exp);
    delay.min(30_000)
}

fn base64_encode(bytes: &[u8]) -> String {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.encode(bytes)
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
    fn backoff_doubles_until_cap() {
        assert_eq!(reconnect_backoff_ms(1), 5_000);
        assert_eq!(reconnect_backoff_ms(2), 10_000);
        assert_eq!(reconnect_backoff_ms(3), 20_000);
        assert_eq!(reconnect_backoff_ms(4), 30_000);
        assert_eq!(reconnect_backoff_ms(10), 30_000);
    }

    #[test]
    fn infer_kind_from_media_presence() {
        assert_eq!(infer_kind(&None), MessageKind::Text);
        assert_eq!(infer_kind(&Some("http://x/y.png".into())), MessageKind::Document);
    }
}
