//! Delivery dedup (§4.5, I5). The key is inserted *before* the send attempt
//! so a crash or slow send can never cause two concurrent deliveries of the
//! same message; on final failure the key is removed so a later retry of
//! the same `message_id` from upstream can still get through.

use dashmap::DashMap;

pub const DEDUP_WINDOW_MS: i64 = 10 * 60 * 1_000;
pub const SWEEP_INTERVAL_MS: i64 = 2 * 60 * 1_000;

#[derive(Default)]
pub struct DedupSet {
    seen: DashMap<(String, String), i64>,
}

impl DedupSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically inserts the key if absent (or stale). Returns `true` if
    /// this call claimed the slot, `false` if it was already in flight or
    /// recently delivered.
    pub fn try_claim(&self, tenant_id: &str, message_id: &str, now_ms: i64) -> bool {
        let key = (tenant_id.to_string(), message_id.to_string());
        match self.seen.entry(key) {
            dashmap::mapref::entry::Entry::Occupied(mut e) => {
                if now_ms - *e.get() >= DEDUP_WINDOW_MS {
                    e.insert(now_ms);
                    true
                } else {
                    false
                }
            }
            dashmap::mapref::entry::Entry::Vacant(e) => {
                e.insert(now_ms);
                true
            }
        }
    }

    /// Releases a claim after a final (non-retryable) failure, so the next
    /// delivery of the same message isn't dropped forever (§4.5).
    pub fn release(&self, tenant_id: &str, message_id: &str) {
        self.seen.remove(&(tenant_id.to_string(), message_id.to_string()));
    }

    pub fn sweep(&self, now_ms: i64) {
        self.seen.retain(|_, inserted_at| now_ms - *inserted_at < DEDUP_WINDOW_MS);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_claim_within_window_is_rejected() {
        let set = DedupSet::new();
        assert!(set.try_claim("acme", "m1", 0));
        assert!(!set.try_claim("acme", "m1", 1_000));
    }

    #[test]
    fn claim_outside_window_succeeds() {
        let set = DedupSet::new();
        assert!(set.try_claim("acme", "m1", 0));
        assert!(set.try_claim("acme", "m1", DEDUP_WINDOW_MS + 1));
    }

    #[test]
    fn release_allows_immediate_retry() {
        let set = DedupSet::new();
        assert!(set.try_claim("acme", "m1", 0));
        set.release("acme", "m1");
        assert!(set.try_claim("acme", "m1", 1));
    }

    #[test]
    fn sweep_drops_expired_entries() {
        let set = DedupSet::new();
        set.try_claim("acme", "m1", 0);
        set.sweep(DEDUP_WINDOW_MS + 1);
        assert_eq!(set.seen.len(), 0);
    }
}
