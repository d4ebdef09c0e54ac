//! Short-lived memory of already processed message identities.
//!
//! The feed delivers at least once, and a spot between two stations of the
//! target country matches both the "sent" and the "received" topic. The cache
//! makes sure each payload is classified and counted once within its TTL.

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::debug;

use super::lock;
use super::retention::PruneTrigger;

/// SHA-256 of the raw payload bytes
pub type MessageId = [u8; 32];

pub fn message_id(payload: &[u8]) -> MessageId {
    Sha256::digest(payload).into()
}

pub struct DedupCache<K = MessageId> {
    ttl: Duration,
    trigger: PruneTrigger,
    seen: Mutex<HashMap<K, Instant>>,
}

impl<K: Hash + Eq> DedupCache<K> {
    pub fn new(ttl: Duration, trigger: PruneTrigger) -> Self {
        Self {
            ttl,
            trigger,
            seen: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns `true` if `id` was already observed within the TTL.
    /// Otherwise records it and returns `false`.
    pub fn observe(&self, id: K) -> bool {
        self.observe_at(id, Instant::now())
    }

    pub fn observe_at(&self, id: K, now: Instant) -> bool {
        let mut seen = lock(&self.seen);

        let already = match seen.get(&id) {
            Some(first_seen) => now.saturating_duration_since(*first_seen) <= self.ttl,
            None => false,
        };
        if !already {
            seen.insert(id, now);
        }

        if self.trigger.fires() {
            Self::sweep_locked(&mut seen, self.ttl, now);
        }

        already
    }

    /// Drop an identity, e.g. when its payload turned out to be unusable
    pub fn forget(&self, id: &K) -> bool {
        lock(&self.seen).remove(id).is_some()
    }

    /// Remove every entry older than the TTL; returns how many were removed
    pub fn sweep(&self, now: Instant) -> usize {
        Self::sweep_locked(&mut lock(&self.seen), self.ttl, now)
    }

    pub fn len(&self) -> usize {
        lock(&self.seen).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn sweep_locked(seen: &mut HashMap<K, Instant>, ttl: Duration, now: Instant) -> usize {
        let before = seen.len();
        seen.retain(|_, first_seen| now.saturating_duration_since(*first_seen) <= ttl);
        let pruned = before - seen.len();
        debug!(length = seen.len(), pruned, "Dedup cache pruned");
        pruned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(60);

    #[test]
    fn test_observe_before_ttl() {
        let cache = DedupCache::new(TTL, PruneTrigger::never());
        let start = Instant::now();

        assert!(!cache.observe_at("a", start));
        assert!(cache.observe_at("a", start + Duration::from_secs(1)));
        assert!(cache.observe_at("a", start + TTL));
        assert!(!cache.observe_at("b", start));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_sweep_makes_identity_new_again() {
        let cache = DedupCache::new(TTL, PruneTrigger::never());
        let start = Instant::now();

        assert!(!cache.observe_at("a", start));
        assert_eq!(cache.sweep(start + TTL + Duration::from_secs(1)), 1);
        assert!(cache.is_empty());
        assert!(!cache.observe_at("a", start + TTL + Duration::from_secs(2)));
    }

    #[test]
    fn test_hot_path_sweep() {
        let cache = DedupCache::new(TTL, PruneTrigger::always());
        let start = Instant::now();

        cache.observe_at("old", start);
        cache.observe_at("new", start + TTL + Duration::from_secs(5));
        // "old" was swept by the second call
        assert_eq!(cache.len(), 1);
        assert!(!cache.observe_at("old", start + TTL + Duration::from_secs(6)));
    }

    #[test]
    fn test_expired_entry_not_reported_as_seen() {
        let cache = DedupCache::new(TTL, PruneTrigger::never());
        let start = Instant::now();

        assert!(!cache.observe_at("a", start));
        assert!(!cache.observe_at("a", start + TTL + Duration::from_secs(1)));
        assert!(cache.observe_at("a", start + TTL + Duration::from_secs(2)));
    }

    #[test]
    fn test_forget() {
        let cache = DedupCache::new(TTL, PruneTrigger::never());
        cache.observe("a");
        assert!(cache.forget(&"a"));
        assert!(!cache.forget(&"a"));
        assert!(!cache.observe("a"));
    }

    #[test]
    fn test_message_id_is_content_based() {
        let cache: DedupCache = DedupCache::new(TTL, PruneTrigger::never());
        assert!(!cache.observe(message_id(br#"{"sq":1}"#)));
        assert!(cache.observe(message_id(br#"{"sq":1}"#)));
        assert!(!cache.observe(message_id(br#"{"sq":2}"#)));
    }
}
