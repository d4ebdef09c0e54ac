//! Spot counters exposed in Prometheus text format.
//!
//! Counting goes through the `metrics` facade; the binary installs a
//! Prometheus recorder and serves its rendered output on the metrics
//! listener. Without an installed recorder every increment is a no-op, which
//! keeps the core testable in isolation.

use metrics::{Unit, counter, describe_counter};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::debug;

use crate::errors::{AppError, AppResult};
use crate::models::Spot;
use crate::services::Classification;

pub const SENT_TOTAL: &str = "pskreporter_spots_sent_total";
pub const RECEIVED_TOTAL: &str = "pskreporter_spots_received_total";
pub const LOCAL_TOTAL: &str = "pskreporter_spots_local_total";

/// Register help text with the active recorder
pub fn describe() {
    describe_counter!(
        SENT_TOTAL,
        Unit::Count,
        "Spots transmitted from the target country and heard abroad"
    );
    describe_counter!(
        RECEIVED_TOTAL,
        Unit::Count,
        "Spots heard in the target country from stations abroad"
    );
    describe_counter!(
        LOCAL_TOTAL,
        Unit::Count,
        "Spots between two stations of the same country"
    );
}

/// Install the process-wide Prometheus recorder.
pub fn install_recorder() -> AppResult<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| AppError::metrics(format!("failed to install Prometheus recorder: {e}")))?;
    describe();
    Ok(handle)
}

/// Counter front-end bound to the target country label
#[derive(Debug, Clone)]
pub struct SpotMetrics {
    country: String,
}

impl SpotMetrics {
    pub fn new(target_country: i32) -> Self {
        Self {
            country: target_country.to_string(),
        }
    }

    pub fn record(&self, classification: Classification, spot: &Spot) {
        let name = match classification {
            Classification::Sent => SENT_TOTAL,
            Classification::Received => RECEIVED_TOTAL,
            Classification::Local => LOCAL_TOTAL,
            Classification::Unmatched => return,
        };

        counter!(
            name,
            "country" => self.country.clone(),
            "band" => spot.band.clone(),
            "mode" => spot.mode.clone()
        )
        .increment(1);
        debug!(
            classification = classification.as_str(),
            band = %spot.band,
            mode = %spot.mode,
            "Spot counted"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::spot::fixtures;

    fn render_with<F: FnOnce()>(f: F) -> String {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        metrics::with_local_recorder(&recorder, f);
        handle.render()
    }

    #[test]
    fn test_record_labels() {
        let rendered = render_with(|| {
            let metrics = SpotMetrics::new(224);
            metrics.record(Classification::Sent, &fixtures::spot());
            metrics.record(Classification::Sent, &fixtures::spot());
        });

        assert!(
            rendered.contains(
                r#"pskreporter_spots_sent_total{country="224",band="2m",mode="FT8"} 2"#
            ),
            "{rendered}"
        );
        assert!(!rendered.contains(RECEIVED_TOTAL));
    }

    #[test]
    fn test_unmatched_not_counted() {
        let rendered = render_with(|| {
            SpotMetrics::new(224).record(Classification::Unmatched, &fixtures::spot());
        });
        assert!(!rendered.contains("pskreporter_spots"), "{rendered}");
    }
}
