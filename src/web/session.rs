//! Per-viewer live stream loop.
//!
//! A session polls its subscription queue, renders what passes the viewer's
//! filter and pushes it to a [`SpotSink`]. It also sends a periodic keepalive
//! and refreshes its liveness with the broadcaster. The session ends when the
//! viewer goes away or when the broadcaster reaped it.

use async_trait::async_trait;
use axum::response::sse::Event;
use std::convert::Infallible;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior, interval, interval_at};
use tracing::debug;

use super::render::render_rows;
use crate::services::{SpotFilter, Subscription};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("viewer disconnected")]
pub struct SinkClosed;

/// Where a live session delivers its output
#[async_trait]
pub trait SpotSink: Send + Sync {
    /// Deliver a batch of rendered rows and flush them to the viewer
    async fn send_rows(&mut self, rows: Vec<String>) -> Result<(), SinkClosed>;

    /// Comment-only heartbeat
    async fn send_keepalive(&mut self) -> Result<(), SinkClosed>;

    /// Resolves once the viewer is gone
    async fn closed(&self);
}

/// Server-sent events sink feeding an axum `Sse` response
pub struct SseSink {
    sender: mpsc::Sender<Result<Event, Infallible>>,
}

impl SseSink {
    pub fn new(sender: mpsc::Sender<Result<Event, Infallible>>) -> Self {
        Self { sender }
    }
}

#[async_trait]
impl SpotSink for SseSink {
    async fn send_rows(&mut self, rows: Vec<String>) -> Result<(), SinkClosed> {
        for row in rows {
            self.sender
                .send(Ok(Event::default().event("spot").data(row)))
                .await
                .map_err(|_| SinkClosed)?;
        }
        Ok(())
    }

    async fn send_keepalive(&mut self) -> Result<(), SinkClosed> {
        self.sender
            .send(Ok(Event::default().comment("keepalive")))
            .await
            .map_err(|_| SinkClosed)
    }

    async fn closed(&self) {
        self.sender.closed().await
    }
}

/// Why a session stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    ViewerGone,
    QueueClosed,
}

pub struct LiveSession<S> {
    subscription: Subscription,
    filter: SpotFilter,
    sink: S,
    poll_interval: Duration,
    keepalive_interval: Duration,
}

impl<S: SpotSink> LiveSession<S> {
    pub fn new(
        subscription: Subscription,
        filter: SpotFilter,
        sink: S,
        poll_interval: Duration,
        keepalive_interval: Duration,
    ) -> Self {
        Self {
            subscription,
            filter,
            sink,
            poll_interval,
            keepalive_interval,
        }
    }

    /// Run until the viewer disconnects or the queue is closed.
    /// The subscription is released when this returns.
    pub async fn run(mut self) -> SessionEnd {
        let id = self.subscription.id();
        let mut poll = interval(self.poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut keepalive = interval_at(
            Instant::now() + self.keepalive_interval,
            self.keepalive_interval,
        );
        keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);

        debug!(subscriber = %id, filtered = self.filter.is_enabled(), "Live session started");

        let end = loop {
            tokio::select! {
                _ = self.sink.closed() => break SessionEnd::ViewerGone,
                _ = poll.tick() => {
                    let spots = match self.subscription.drain() {
                        Ok(spots) => spots,
                        Err(_) => break SessionEnd::QueueClosed,
                    };
                    let rows = render_rows(&spots, &self.filter);
                    if !rows.is_empty() && self.sink.send_rows(rows).await.is_err() {
                        break SessionEnd::ViewerGone;
                    }
                }
                _ = keepalive.tick() => {
                    if self.sink.send_keepalive().await.is_err() {
                        break SessionEnd::ViewerGone;
                    }
                    self.subscription.touch();
                }
            }
        };

        debug!(subscriber = %id, reason = ?end, "Live session ended");
        end
    }
}
