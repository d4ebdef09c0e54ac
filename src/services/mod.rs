//! Core engine: deduplication, classification, retention and fan-out.
//!
//! These services know nothing about MQTT, HTTP or Prometheus. They are
//! built once at startup and shared by handle.

use std::sync::{Mutex, MutexGuard, PoisonError};

pub mod broadcaster;
pub mod classifier;
pub mod dedup_cache;
pub mod retention;
pub mod spot_filter;
pub mod spot_store;

pub use broadcaster::{Broadcaster, PublishReport, QueueClosed, Subscription};
pub use classifier::{Classification, classify};
pub use dedup_cache::{DedupCache, MessageId, message_id};
pub use retention::PruneTrigger;
pub use spot_filter::{FilterParams, SpotFilter};
pub use spot_store::SpotStore;

/// A panic while holding one of these locks cannot leave the guarded
/// collections half-updated, so a poisoned lock is still usable.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
