//! Per-tenant webhook delivery statistics, evicted after 24h idle (§4.5).

use chatgw_core::model::WebhookStats;
use dashmap::DashMap;

pub const IDLE_EVICTION_MS: i64 = 24 * 60 * 60 * 1_000;
pub const SWEEP_INTERVAL_MS: i64 = 60 * 60 * 1_000;

#[derive(Default)]
pub struct StatsStore {
    stats: DashMap<String, WebhookStats>,
}

impl StatsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, tenant_id: &str, ok: bool, response_ms: f64, now_ms: i64) {
        self.stats
            .entry(tenant_id.to_string())
            .or_default()
            .record(ok, response_ms, now_ms);
    }

    pub fn get(&self, tenant_id: &str) -> WebhookStats {
        self.stats.get(tenant_id).map(|s| s.clone()).unwrap_or_default()
    }

    pub fn sweep(&self, now_ms: i64) {
        self.stats
            .retain(|_, s| now_ms - s.last_updated_ms < IDLE_EVICTION_MS);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sweep_drops_idle_tenants() {
        let store = StatsStore::new();
        store.record("acme", true, 10.0, 0);
        store.sweep(IDLE_EVICTION_MS + 1);
        assert_eq!(store.get("acme").total, 0);
    }
}
