//! In-memory spot log.
//!
//! Spots are appended in arrival order and sorted by their own timestamp only
//! when read, so appends never wait on ordering work. Entries older than the
//! retention window are swept by the same randomized trigger the dedup cache
//! uses.

use chrono::Utc;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::debug;

use super::lock;
use super::retention::PruneTrigger;
use crate::models::Spot;

pub struct SpotStore {
    retention: Duration,
    trigger: PruneTrigger,
    spots: Mutex<Vec<Arc<Spot>>>,
}

impl SpotStore {
    pub fn new(retention: Duration, trigger: PruneTrigger) -> Self {
        Self {
            retention,
            trigger,
            spots: Mutex::new(Vec::new()),
        }
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    pub fn append(&self, spot: Arc<Spot>) {
        self.append_at(spot, Utc::now().timestamp());
    }

    /// Append with an explicit "now" in epoch seconds, used for the sweep cutoff
    pub fn append_at(&self, spot: Arc<Spot>, now: i64) {
        let mut spots = lock(&self.spots);
        spots.push(spot);

        if self.trigger.fires() {
            let cutoff = now.saturating_sub(self.retention_secs());
            Self::prune_locked(&mut spots, cutoff);
        }
    }

    /// Copy of the retained spots, oldest first
    pub fn snapshot(&self) -> Vec<Arc<Spot>> {
        let mut snapshot = lock(&self.spots).clone();
        snapshot.sort_by_key(|spot| spot.timestamp);
        snapshot
    }

    /// Remove spots with a timestamp before `cutoff` (epoch seconds)
    pub fn prune_older_than(&self, cutoff: i64) -> usize {
        Self::prune_locked(&mut lock(&self.spots), cutoff)
    }

    pub fn len(&self) -> usize {
        lock(&self.spots).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn retention_secs(&self) -> i64 {
        i64::try_from(self.retention.as_secs()).unwrap_or(i64::MAX)
    }

    fn prune_locked(spots: &mut Vec<Arc<Spot>>, cutoff: i64) -> usize {
        let before = spots.len();
        spots.retain(|spot| spot.timestamp >= cutoff);
        let pruned = before - spots.len();
        debug!(length = spots.len(), pruned, cutoff, "Spot log pruned");
        pruned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::spot::fixtures;

    const HOUR: i64 = 3600;
    const T: i64 = 1_700_000_000;

    fn spot_at(timestamp: i64) -> Arc<Spot> {
        Arc::new(Spot {
            timestamp,
            ..fixtures::spot()
        })
    }

    fn timestamps(store: &SpotStore) -> Vec<i64> {
        store.snapshot().iter().map(|s| s.timestamp).collect()
    }

    #[test]
    fn test_prune_older_than() {
        let store = SpotStore::new(Duration::from_secs(24 * 3600), PruneTrigger::never());
        for ts in [T - 30 * HOUR, T - 25 * HOUR, T - HOUR, T] {
            store.append_at(spot_at(ts), T);
        }

        assert_eq!(store.prune_older_than(T - 24 * HOUR), 2);
        assert_eq!(timestamps(&store), vec![T - HOUR, T]);
    }

    #[test]
    fn test_snapshot_sorted_by_timestamp() {
        let store = SpotStore::new(Duration::from_secs(3600), PruneTrigger::never());
        for ts in [T + 2, T, T + 1] {
            store.append_at(spot_at(ts), T);
        }
        assert_eq!(timestamps(&store), vec![T, T + 1, T + 2]);
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let store = SpotStore::new(Duration::from_secs(3600), PruneTrigger::never());
        store.append_at(spot_at(T), T);

        let snapshot = store.snapshot();
        store.append_at(spot_at(T + 1), T);
        store.prune_older_than(T + 1);

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].timestamp, T);
        assert_eq!(timestamps(&store), vec![T + 1]);
    }

    #[test]
    fn test_append_sweeps_with_retention() {
        let store = SpotStore::new(Duration::from_secs(24 * 3600), PruneTrigger::always());
        store.append_at(spot_at(T - 30 * HOUR), T - 30 * HOUR);
        store.append_at(spot_at(T), T);
        assert_eq!(timestamps(&store), vec![T]);
    }

    #[test]
    fn test_concurrent_appends_and_snapshots() {
        let store = Arc::new(SpotStore::new(Duration::from_secs(3600), PruneTrigger::never()));
        let writers: Vec<_> = (0..4)
            .map(|w| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for i in 0..250 {
                        store.append_at(spot_at(T + (i * 4 + w) % 97), T);
                        if i % 50 == 0 {
                            let snap = store.snapshot();
                            assert!(snap.windows(2).all(|p| p[0].timestamp <= p[1].timestamp));
                        }
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }
        assert_eq!(store.len(), 1000);
    }
}
