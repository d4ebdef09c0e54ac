//! Turns raw feed messages into counted, retained and broadcast spots.
//!
//! The transport hands every message to [`Ingestor::handle_message`]; the
//! rest of the pipeline is independent of where messages come from.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::Config;
use crate::metrics::SpotMetrics;
use crate::models::{Spot, SpotPayload};
use crate::services::{
    Broadcaster, Classification, DedupCache, PruneTrigger, SpotStore, classify, message_id,
};

pub mod mqtt;

pub use mqtt::MqttSubscriber;

/// What happened to one message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Already processed within the dedup window
    Duplicate,
    /// Could not be decoded; dropped
    Malformed,
    /// Neither side is in the target country; dropped
    Unmatched,
    /// Counted, stored and published
    Recorded(Classification),
}

#[derive(Clone)]
pub struct Ingestor {
    target_country: i32,
    dedup: Arc<DedupCache>,
    store: Arc<SpotStore>,
    broadcaster: Broadcaster,
    metrics: SpotMetrics,
}

impl Ingestor {
    pub fn new(
        target_country: i32,
        dedup: Arc<DedupCache>,
        store: Arc<SpotStore>,
        broadcaster: Broadcaster,
    ) -> Self {
        Self {
            target_country,
            dedup,
            store,
            broadcaster,
            metrics: SpotMetrics::new(target_country),
        }
    }

    /// Build the whole core from configuration
    pub fn from_config(config: &Config) -> Self {
        let trigger = PruneTrigger::new(config.prune_probability);
        Self::new(
            config.country,
            Arc::new(DedupCache::new(config.dedup_ttl, trigger)),
            Arc::new(SpotStore::new(config.spotlog_retention, trigger)),
            Broadcaster::new(config.stream_queue_capacity),
        )
    }

    pub fn store(&self) -> &Arc<SpotStore> {
        &self.store
    }

    pub fn broadcaster(&self) -> &Broadcaster {
        &self.broadcaster
    }

    pub fn dedup(&self) -> &Arc<DedupCache> {
        &self.dedup
    }

    pub fn handle_message(&self, topic: &str, payload: &[u8]) -> IngestOutcome {
        let id = message_id(payload);
        if self.dedup.observe(id) {
            debug!(topic, id = %hex::encode(&id[..8]), "Duplicate message dropped");
            return IngestOutcome::Duplicate;
        }

        let decoded = match SpotPayload::from_slice(payload) {
            Ok(decoded) => decoded,
            Err(e) => {
                // a broken payload must not count as "already classified"
                self.dedup.forget(&id);
                warn!(topic, error = %e, "Malformed spot payload dropped");
                return IngestOutcome::Malformed;
            }
        };
        let unknown = decoded.unknown_keys();
        if !unknown.is_empty() {
            debug!(topic, keys = ?unknown, "Spot payload carries unknown keys");
        }

        let spot = Spot::from(decoded);
        let classification = classify(&spot, self.target_country);
        if !classification.is_counted() {
            debug!(
                topic,
                sender_country = spot.sender_country,
                receiver_country = spot.receiver_country,
                "Spot does not involve the target country"
            );
            return IngestOutcome::Unmatched;
        }

        self.metrics.record(classification, &spot);

        let spot = Arc::new(spot);
        self.store.append(Arc::clone(&spot));
        let report = self.broadcaster.publish(&spot);
        if report.dropped > 0 {
            debug!(
                delivered = report.delivered,
                dropped = report.dropped,
                "Spot dropped for slow subscribers"
            );
        }

        IngestOutcome::Recorded(classification)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use std::time::Duration;

    fn ingestor(target_country: i32) -> Ingestor {
        Ingestor::new(
            target_country,
            Arc::new(DedupCache::new(Duration::from_secs(60), PruneTrigger::never())),
            Arc::new(SpotStore::new(Duration::from_secs(86_400), PruneTrigger::never())),
            Broadcaster::new(10),
        )
    }

    fn payload(sequence: u64, sender: i32, receiver: i32) -> Vec<u8> {
        serde_json::json!({
            "sq": sequence,
            "f": 144_174_000,
            "md": "FT8",
            "rp": -10,
            "t": chrono::Utc::now().timestamp(),
            "sc": "OH2ABC",
            "sl": "KP20",
            "rc": "SM5XYZ",
            "rl": "JO89",
            "sa": sender,
            "ra": receiver,
            "b": "2m",
        })
        .to_string()
        .into_bytes()
    }

    #[test]
    fn test_sent_and_received_counted_once_each() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        let ingestor = ingestor(1);

        metrics::with_local_recorder(&recorder, || {
            assert_eq!(
                ingestor.handle_message("t", &payload(1, 1, 2)),
                IngestOutcome::Recorded(Classification::Sent)
            );
            assert_eq!(
                ingestor.handle_message("t", &payload(2, 2, 1)),
                IngestOutcome::Recorded(Classification::Received)
            );
        });

        let rendered = handle.render();
        assert!(
            rendered.contains(r#"pskreporter_spots_sent_total{country="1",band="2m",mode="FT8"} 1"#),
            "{rendered}"
        );
        assert!(
            rendered
                .contains(r#"pskreporter_spots_received_total{country="1",band="2m",mode="FT8"} 1"#),
            "{rendered}"
        );
        assert!(!rendered.contains("pskreporter_spots_local_total"));
        assert_eq!(ingestor.store().len(), 2);
    }

    #[test]
    fn test_duplicate_is_dropped() {
        let ingestor = ingestor(224);
        let message = payload(1, 224, 284);

        assert_eq!(
            ingestor.handle_message("sent", &message),
            IngestOutcome::Recorded(Classification::Sent)
        );
        assert_eq!(
            ingestor.handle_message("received", &message),
            IngestOutcome::Duplicate
        );
        assert_eq!(ingestor.store().len(), 1);
    }

    #[test]
    fn test_malformed_does_not_poison_dedup() {
        let ingestor = ingestor(224);

        assert_eq!(ingestor.handle_message("t", b"garbage"), IngestOutcome::Malformed);
        assert_eq!(ingestor.handle_message("t", b"garbage"), IngestOutcome::Malformed);
        assert!(ingestor.dedup().is_empty());
        assert!(ingestor.store().is_empty());
    }

    #[test]
    fn test_unmatched_not_stored() {
        let ingestor = ingestor(224);
        assert_eq!(
            ingestor.handle_message("t", &payload(1, 300, 400)),
            IngestOutcome::Unmatched
        );
        assert!(ingestor.store().is_empty());
    }

    #[test]
    fn test_local_spot_stored_and_published() {
        let ingestor = ingestor(224);
        let mut viewer = ingestor.broadcaster().subscribe();

        assert_eq!(
            ingestor.handle_message("t", &payload(1, 300, 300)),
            IngestOutcome::Recorded(Classification::Local)
        );
        assert_eq!(ingestor.store().len(), 1);
        assert_eq!(viewer.drain().unwrap().len(), 1);
    }

    #[test]
    fn test_unknown_keys_accepted() {
        let ingestor = ingestor(224);
        let message = br#"{"sa":224,"ra":284,"b":"6m","future":true}"#;
        assert_eq!(
            ingestor.handle_message("t", message),
            IngestOutcome::Recorded(Classification::Sent)
        );
    }
}
