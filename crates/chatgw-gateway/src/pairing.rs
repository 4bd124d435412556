//! Pairing-Code Service (§4.3): keeps a current pairing artifact (QR code)
//! available across the pairing window, so a slow poller is served a
//! stale-but-present artifact while a new one is being generated.

use chatgw_core::error::{GatewayError, Result};
use chatgw_core::model::{PairingStatus, PairingTracker};
use dashmap::DashMap;

pub const ARTIFACT_LIFETIME_MS: i64 = 45_000;
pub const REGEN_PROBE_INTERVAL_MS: i64 = 30_000;
pub const MAX_REGENERATIONS: u32 = 10;
pub const IDLE_SWEEP_THRESHOLD_MS: i64 = ARTIFACT_LIFETIME_MS * 3;

#[derive(Default)]
pub struct PairingService {
    trackers: DashMap<String, PairingTracker>,
}

impl PairingService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begins a pairing window with a freshly generated artifact.
    pub fn start(&self, tenant_id: &str, artifact: Vec<u8>, now_ms: i64) {
        self.trackers.insert(
            tenant_id.to_string(),
            PairingTracker {
                tenant_id: tenant_id.to_string(),
                last_generated_ms: now_ms,
                regeneration_count: 0,
                status: PairingStatus::Available,
                artifact: Some(artifact),
            },
        );
    }

    /// Serves the current artifact. Marks the tracker `expired` once its
    /// lifetime has elapsed, but keeps serving the stale artifact until a
    /// regeneration replaces it — callers should still probe
    /// [`Self::needs_regeneration`].
    pub fn current(&self, tenant_id: &str, now_ms: i64) -> Option<Vec<u8>> {
        let mut tracker = self.trackers.get_mut(tenant_id)?;
        if tracker.status == PairingStatus::Available
            && now_ms - tracker.last_generated_ms >= ARTIFACT_LIFETIME_MS
        {
            tracker.status = PairingStatus::Expired;
        }
        tracker.artifact.clone()
    }

    /// Whether a tracker already exists for this tenant — used to tell a
    /// first pairing artifact (`start`, fresh cap) from a later one
    /// (`regenerate`, counted against the cap).
    pub fn has_tracker(&self, tenant_id: &str) -> bool {
        self.trackers.contains_key(tenant_id)
    }

    /// Whether the tracker is due for a fresh artifact: expired and under
    /// the regeneration cap.
    pub fn needs_regeneration(&self, tenant_id: &str, now_ms: i64) -> bool {
        let Some(tracker) = self.trackers.get(tenant_id) else {
            return false;
        };
        tracker.status != PairingStatus::Connected
            && now_ms - tracker.last_generated_ms >= REGEN_PROBE_INTERVAL_MS
            && tracker.regeneration_count < MAX_REGENERATIONS
    }

    /// Replaces the current artifact with a freshly generated one.
    pub fn regenerate(&self, tenant_id: &str, artifact: Vec<u8>, now_ms: i64) -> Result<()> {
        let mut tracker = self
            .trackers
            .get_mut(tenant_id)
            .ok_or_else(|| GatewayError::NotFound(format!("no pairing tracker for {tenant_id}")))?;
        if tracker.regeneration_count >= MAX_REGENERATIONS {
            return Err(GatewayError::Conflict(
                "pairing regeneration limit reached".into(),
            ));
        }
        tracker.artifact = Some(artifact);
        tracker.last_generated_ms = now_ms;
        tracker.regeneration_count += 1;
        tracker.status = PairingStatus::Available;
        Ok(())
    }

    /// The upstream connection completed pairing; the tracker's job is done.
    pub fn mark_connected(&self, tenant_id: &str) {
        self.trackers.remove(tenant_id);
    }

    pub fn stop(&self, tenant_id: &str) {
        self.trackers.remove(tenant_id);
    }

    /// Drops trackers idle beyond the sweep threshold (§4.3).
    pub fn sweep_idle(&self, now_ms: i64) {
        self.trackers
            .retain(|_, t| now_ms - t.last_generated_ms < IDLE_SWEEP_THRESHOLD_MS);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn current_serves_stale_artifact_after_expiry() {
        let svc = PairingService::new();
        svc.start("acme", b"qr-1".to_vec(), 0);
        let artifact = svc.current("acme", ARTIFACT_LIFETIME_MS + 1).expect("present");
        assert_eq!(artifact, b"qr-1");
    }

    #[test]
    fn needs_regeneration_respects_probe_interval_and_cap() {
        let svc = PairingService::new();
        svc.start("acme", b"qr-1".to_vec(), 0);
        assert!(!svc.needs_regeneration("acme", REGEN_PROBE_INTERVAL_MS - 1));
        assert!(svc.needs_regeneration("acme", REGEN_PROBE_INTERVAL_MS));

        for i in 1..=MAX_REGENERATIONS {
            svc.regenerate("acme", format!("qr-{i}").into_bytes(), (i as i64) * REGEN_PROBE_INTERVAL_MS)
                .expect("regen ok");
        }
        assert!(!svc.needs_regeneration(
            "acme",
            (MAX_REGENERATIONS as i64 + 1) * REGEN_PROBE_INTERVAL_MS
        ));
    }

    #[test]
    fn regenerate_beyond_cap_is_rejected() {
        let svc = PairingService::new();
        svc.start("acme", b"qr-1".to_vec(), 0);
        for i in 1..=MAX_REGENERATIONS {
            svc.regenerate("acme", format!("qr-{i}").into_bytes(), i as i64 * 1000)
                .expect("regen ok");
        }
        let res = svc.regenerate("acme", b"qr-overflow".to_vec(), 999_999);
        assert!(matches!(res, Err(GatewayError::Conflict(_))));
    }

    #[test]
    fn mark_connected_drops_tracker() {
        let svc = PairingService::new();
        svc.start("acme", b"qr-1".to_vec(), 0);
        svc.mark_connected("acme");
        assert!(svc.current("acme", 0).is_none());
    }

    #[test]
    fn has_tracker_reflects_presence() {
        let svc = PairingService::new();
        assert!(!svc.has_tracker("acme"));
        svc.start("acme", b"qr-1".to_vec(), 0);
        assert!(svc.has_tracker("acme"));
        svc.mark_connected("acme");
        assert!(!svc.has_tracker("acme"));
    }

    #[test]
    fn sweep_idle_drops_old_trackers() {
        let svc = PairingService::new();
        svc.start("acme", b"qr-1".to_vec(), 0);
        svc.sweep_idle(IDLE_SWEEP_THRESHOLD_MS - 1);
        assert!(svc.current("acme", IDLE_SWEEP_THRESHOLD_MS - 1).is_some());
        svc.sweep_idle(IDLE_SWEEP_THRESHOLD_MS + 1);
        assert!(svc.current("acme", IDLE_SWEEP_THRESHOLD_MS + 1).is_none());
    }
}
