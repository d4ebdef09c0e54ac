//! Amortized pruning policy shared by the dedup cache and the spot store.
//!
//! Instead of a dedicated timer, each hot-path call rolls a die and, with a
//! small fixed probability, sweeps expired entries while it already holds the
//! lock. Memory stays bounded without an extra task.

use rand::{Rng, rng};

/// Randomized sweep trigger
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PruneTrigger {
    probability: f64,
}

impl PruneTrigger {
    /// Probability is clamped to `0.0..=1.0`
    pub fn new(probability: f64) -> Self {
        let probability = if probability.is_nan() {
            0.0
        } else {
            probability.clamp(0.0, 1.0)
        };
        Self { probability }
    }

    /// Sweep on every call
    pub fn always() -> Self {
        Self::new(1.0)
    }

    /// Never sweep implicitly; callers prune explicitly
    pub fn never() -> Self {
        Self::new(0.0)
    }

    pub fn probability(&self) -> f64 {
        self.probability
    }

    pub fn fires(&self) -> bool {
        if self.probability <= 0.0 {
            false
        } else if self.probability >= 1.0 {
            true
        } else {
            rng().random_bool(self.probability)
        }
    }
}

impl Default for PruneTrigger {
    fn default() -> Self {
        Self::new(crate::config::defaults::DEFAULT_PRUNE_PROBABILITY)
    }
}
