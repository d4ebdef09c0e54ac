//! Fan-out of freshly recorded spots to live viewers.
//!
//! Every viewer owns a bounded queue. Publishing never waits: a full queue
//! drops the new spot for that viewer only, so one slow browser cannot stall
//! ingestion or the other viewers. Viewers that stop sending keepalives are
//! reaped, which closes their queue and ends their session loop.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TryRecvError, error::TrySendError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use super::lock;
use crate::models::Spot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("subscriber queue closed")]
pub struct QueueClosed;

/// Result of one `publish` call
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PublishReport {
    pub delivered: usize,
    pub dropped: usize,
}

struct Subscriber {
    sender: mpsc::Sender<Arc<Spot>>,
    last_keepalive: Instant,
    created_at: Instant,
}

struct Inner {
    capacity: usize,
    subscribers: Mutex<HashMap<Uuid, Subscriber>>,
}

#[derive(Clone)]
pub struct Broadcaster {
    inner: Arc<Inner>,
}

impl Broadcaster {
    /// `capacity` is the number of pending spots per subscriber (at least 1)
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                capacity: capacity.max(1),
                subscribers: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    pub fn subscribe(&self) -> Subscription {
        let (sender, receiver) = mpsc::channel(self.inner.capacity);
        let id = Uuid::new_v4();
        let now = Instant::now();

        let count = {
            let mut subscribers = lock(&self.inner.subscribers);
            subscribers.insert(
                id,
                Subscriber {
                    sender,
                    last_keepalive: now,
                    created_at: now,
                },
            );
            subscribers.len()
        };
        debug!(subscriber = %id, subscribers = count, "Subscriber registered");

        Subscription {
            id,
            receiver,
            broadcaster: self.clone(),
        }
    }

    /// Idempotent; returns whether the subscriber was still registered
    pub fn unsubscribe(&self, id: Uuid) -> bool {
        let removed = lock(&self.inner.subscribers).remove(&id);
        match removed {
            Some(subscriber) => {
                debug!(
                    subscriber = %id,
                    lifetime_secs = subscriber.created_at.elapsed().as_secs(),
                    "Subscriber removed"
                );
                true
            }
            None => false,
        }
    }

    pub fn publish(&self, spot: &Arc<Spot>) -> PublishReport {
        let mut report = PublishReport::default();
        let mut subscribers = lock(&self.inner.subscribers);

        subscribers.retain(|id, subscriber| match subscriber.sender.try_send(Arc::clone(spot)) {
            Ok(()) => {
                report.delivered += 1;
                true
            }
            Err(TrySendError::Full(_)) => {
                report.dropped += 1;
                true
            }
            Err(TrySendError::Closed(_)) => {
                debug!(subscriber = %id, "Subscriber queue closed, removing");
                false
            }
        });

        report
    }

    /// Refresh liveness; returns false for an unknown id
    pub fn touch(&self, id: Uuid) -> bool {
        match lock(&self.inner.subscribers).get_mut(&id) {
            Some(subscriber) => {
                subscriber.last_keepalive = Instant::now();
                true
            }
            None => false,
        }
    }

    pub fn reap(&self, timeout: Duration) -> usize {
        self.reap_at(Instant::now(), timeout)
    }

    /// Remove subscribers whose last keepalive is older than `timeout` at `now`.
    /// Dropping their sender closes the queue.
    pub fn reap_at(&self, now: Instant, timeout: Duration) -> usize {
        let mut subscribers = lock(&self.inner.subscribers);
        let before = subscribers.len();
        subscribers.retain(|id, subscriber| {
            let alive = now.saturating_duration_since(subscriber.last_keepalive) <= timeout;
            if !alive {
                info!(subscriber = %id, "Reaping silent subscriber");
            }
            alive
        });
        before - subscribers.len()
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.inner.subscribers).len()
    }

    /// Periodic `reap` until `cancel` fires
    pub fn spawn_reaper(
        &self,
        interval: Duration,
        timeout: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let broadcaster = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("Subscriber reaper stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        let reaped = broadcaster.reap(timeout);
                        if reaped > 0 {
                            info!(reaped, remaining = broadcaster.subscriber_count(), "Reaped subscribers");
                        }
                    }
                }
            }
        })
    }
}

/// A live viewer's handle. Dropping it unsubscribes.
pub struct Subscription {
    id: Uuid,
    receiver: mpsc::Receiver<Arc<Spot>>,
    broadcaster: Broadcaster,
}

impl Subscription {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Take everything currently queued without waiting.
    ///
    /// Fails once the queue was closed by a reap and nothing is left to read.
    pub fn drain(&mut self) -> Result<Vec<Arc<Spot>>, QueueClosed> {
        let mut spots = Vec::new();
        loop {
            match self.receiver.try_recv() {
                Ok(spot) => spots.push(spot),
                Err(TryRecvError::Empty) => return Ok(spots),
                Err(TryRecvError::Disconnected) if spots.is_empty() => return Err(QueueClosed),
                Err(TryRecvError::Disconnected) => return Ok(spots),
            }
        }
    }

    pub fn touch(&self) -> bool {
        self.broadcaster.touch(self.id)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.broadcaster.unsubscribe(self.id);
    }
}
