//! Session Registry (§4.6): process-wide `tenant_id -> SessionManagerHandle`
//! map, with no global lock across tenants.

use std::sync::Arc;

use chatgw_adapter::UpstreamAdapter;
use chatgw_core::error::Result;
use chatgw_core::model::{Session, SessionStatus};
use dashmap::DashMap;

use crate::credentials::CredentialStore;
use crate::pairing::PairingService;
use crate::session::{SessionManager, SessionManagerHandle};
use crate::webhook::WebhookDispatcher;

const IDLE_DISCONNECTED_THRESHOLD_MS: i64 = 60 * 60 * 1_000;

pub struct SessionRegistry {
    sessions: DashMap<String, SessionManagerHandle>,
    adapter: Arc<dyn UpstreamAdapter>,
    credentials: CredentialStore,
    pairing: Arc<PairingService>,
    dispatcher: Arc<WebhookDispatcher>,
    http: reqwest::Client,
    max_reconnect_attempts: u32,
}

impl SessionRegistry {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        adapter: Arc<dyn UpstreamAdapter>,
        credentials: CredentialStore,
        pairing: Arc<PairingService>,
        dispatcher: Arc<WebhookDispatcher>,
        http: reqwest::Client,
        max_reconnect_attempts: u32,
    ) -> Self {
        Self {
            sessions: DashMap::new(),
            adapter,
            credentials,
            pairing,
            dispatcher,
            http,
            max_reconnect_attempts,
        }
    }

    /// Ensures a manager task exists for `tenant_id`, then starts it.
    /// Idempotent: starting an already-connected session is a no-op
    /// (§4.6) because `SessionManager::do_start` checks that itself.
    pub async fn start(&self, tenant_id: &str, now_ms: i64) -> Result<Session> {
        let handle = self.handle_or_spawn(tenant_id, now_ms);
        handle.start().await?;
        handle.status().await
    }

    pub fn handle_or_spawn(&self, tenant_id: &str, now_ms: i64) -> SessionManagerHandle {
        if let Some(existing) = self.sessions.get(tenant_id) {
            return existing.clone();
        }
        let handle = SessionManager::spawn(
            tenant_id.to_string(),
            self.adapter.clone(),
            self.credentials.clone(),
            self.pairing.clone(),
            self.http.clone(),
            self.max_reconnect_attempts,
            now_ms,
        );
        self.spawn_dispatch_forwarder(&handle);
        self.sessions.insert(tenant_id.to_string(), handle.clone());
        handle
    }

    fn spawn_dispatch_forwarder(&self, handle: &SessionManagerHandle) {
        let mut events = handle.subscribe();
        let dispatcher = self.dispatcher.clone();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => dispatcher.handle_event(&event, now_ms()).await,
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        });
    }

    pub fn get(&self, tenant_id: &str) -> Option<SessionManagerHandle> {
        self.sessions.get(tenant_id).map(|h| h.clone())
    }

    pub async fn status(&self, tenant_id: &str) -> Option<Result<Session>> {
        let handle = self.get(tenant_id)?;
        Some(handle.status().await)
    }

    pub async fn stop(&self, tenant_id: &str) {
        if let Some((_, handle)) = self.sessions.remove(tenant_id) {
            handle.stop().await;
            handle.shutdown();
        }
    }

    pub fn active_tenant_ids(&self) -> Vec<String> {
        self.sessions.iter().map(|e| e.key().clone()).collect()
    }

    /// Logs out every tenant, bounded by a grace period (§4.6, §5).
    pub async fn shutdown_all(&self, grace: std::time::Duration) {
        let handles: Vec<SessionManagerHandle> =
            self.sessions.iter().map(|e| e.value().clone()).collect();
        let shutdown_all = async {
            for handle in &handles {
                handle.stop().await;
            }
        };
        if tokio::time::timeout(grace, shutdown_all).await.is_err() {
            tracing::warn!("shutdown grace period elapsed with sessions still stopping");
        }
        for handle in &handles {
            handle.shutdown();
        }
        self.sessions.clear();
    }

    /// Drops `disconnected` entries idle past the threshold (§4.6).
    pub async fn sweep_idle(&self, now_ms: i64) {
        let mut stale = Vec::new();
        for entry in self.sessions.iter() {
            if let Ok(session) = entry.value().status().await {
                if session.status == SessionStatus::Disconnected
                    && now_ms - session.last_activity_ms > IDLE_DISCONNECTED_THRESHOLD_MS
                {
                    stale.push(entry.key().clone());
                }
            }
        }
        for tenant_id in stale {
            if let Some((_, handle)) = self.sessions.remove(&tenant_id) {
                handle.shutdown();
            }
        }
    }
}

fn now_ms() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
