//! Shared application state for the chat gateway. `Arc`-backed and
//! cheaply cloneable, handed to every axum handler via `State<AppState>`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chatgw_adapter::{NullAdapter, UpstreamAdapter};
use chatgw_core::error::Result;

use crate::config::GatewayConfig;
use crate::credentials::CredentialStore;
use crate::obs::metrics::GatewayMetrics;
use crate::pairing::PairingService;
use crate::registry::SessionRegistry;
use crate::tenant_registry::{InMemoryTenantRegistry, TenantRegistry};
use crate::webhook::WebhookDispatcher;
use crate::http::response::now_ms;

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    cfg: GatewayConfig,
    registry: SessionRegistry,
    pairing: Arc<PairingService>,
    webhook: Arc<WebhookDispatcher>,
    tenants: Arc<dyn TenantRegistry>,
    credentials: CredentialStore,
    metrics: GatewayMetrics,
    started_at_ms: i64,
    draining: AtomicBool,
}

impl AppState {
    /// Builds the full dependency graph. Fallible steps (creating the
    /// session directory) are fatal at startup, matching the teacher's
    /// posture in `main.rs`.
    pub async fn new(cfg: GatewayConfig) -> Result<Self> {
        let credentials = CredentialStore::new(&cfg.session_dir).await?;
        let pairing = Arc::new(PairingService::new());

        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limit(2))
            .build()
            .map_err(|e| {
                chatgw_core::error::GatewayError::Internal(format!("failed to build http client: {e}"))
            })?;

        // A real upstream integration is out of scope (§1, §4.2); the
        // deterministic in-memory adapter is what ships in this gateway.
        let adapter: Arc<dyn UpstreamAdapter> = Arc::new(NullAdapter::new());
        let webhook = Arc::new(WebhookDispatcher::new(http.clone()));

        let registry = SessionRegistry::new(
            adapter,
            credentials.clone(),
            pairing.clone(),
            webhook.clone(),
            http,
            cfg.max_reconnect_attempts,
        );

        let tenants: Arc<dyn TenantRegistry> = Arc::new(InMemoryTenantRegistry::new());

        Ok(Self {
            inner: Arc::new(AppStateInner {
                cfg,
                registry,
                pairing,
                webhook,
                tenants,
                credentials,
                metrics: GatewayMetrics::default(),
                started_at_ms: now_ms(),
                draining: AtomicBool::new(false),
            }),
        })
    }

    pub fn cfg(&self) -> &GatewayConfig {
        &self.inner.cfg
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.inner.registry
    }

    pub fn pairing(&self) -> &PairingService {
        &self.inner.pairing
    }

    pub fn webhook(&self) -> &WebhookDispatcher {
        &self.inner.webhook
    }

    pub fn tenants(&self) -> &dyn TenantRegistry {
        self.inner.tenants.as_ref()
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.inner.credentials
    }

    pub fn metrics(&self) -> &GatewayMetrics {
        &self.inner.metrics
    }

    pub fn started_at_ms(&self) -> i64 {
        self.inner.started_at_ms
    }

    pub fn set_draining(&self) {
        self.inner.draining.store(true, Ordering::Relaxed);
    }

    pub fn is_draining(&self) -> bool {
        self.inner.draining.load(Ordering::Relaxed)
    }

    /// Runs the periodic cleanup sweeps for pairing, webhook dedup/stats,
    /// and the session registry (§4.3, §4.5, §4.6).
    pub async fn run_sweeps(&self) {
        let now = now_ms();
        self.inner.pairing.sweep_idle(now);
        self.inner.webhook.sweep(now);
        self.inner.registry.sweep_idle(now).await;
    }

    pub async fn shutdown(&self) {
        self.set_draining();
        self.inner
            .registry
            .shutdown_all(std::time::Duration::from_secs(10))
            .await;
    }
}
