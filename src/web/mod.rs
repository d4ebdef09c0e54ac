//! HTTP surfaces: the spot log dashboard and the Prometheus listener.

use axum::{Router, routing::get};
use metrics_exporter_prometheus::PrometheusHandle;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::Config;
use crate::errors::{WebError, WebResult};
use crate::services::{Broadcaster, SpotStore};

pub mod handlers;
pub mod render;
pub mod session;

/// State shared by the dashboard handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<SpotStore>,
    pub broadcaster: Broadcaster,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(config: Arc<Config>, store: Arc<SpotStore>, broadcaster: Broadcaster) -> Self {
        Self {
            config,
            store,
            broadcaster,
            started_at: Instant::now(),
        }
    }
}

/// Snapshot page, live stream and health check
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index::spot_log))
        .route("/stream", get(handlers::stream::live_stream))
        .route("/stream/{*rest}", get(handlers::stream::live_stream))
        .route("/health", get(handlers::health::health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Prometheus text exposition
pub fn metrics_router(handle: PrometheusHandle) -> Router {
    Router::new()
        .route("/metrics", get(handlers::metrics::prometheus_metrics))
        .with_state(handle)
}

/// One listener serving one router
pub struct WebServer {
    name: &'static str,
    app: Router,
    addr: SocketAddr,
}

impl WebServer {
    pub fn new(name: &'static str, app: Router, addr: SocketAddr) -> Self {
        Self { name, app, addr }
    }

    /// Serve until `cancellation_token` fires.
    ///
    /// `ready_signal` receives the bound address once the listener is up, or
    /// the bind error, so the caller can fail startup early.
    pub async fn serve_with_cancellation(
        self,
        ready_signal: oneshot::Sender<WebResult<SocketAddr>>,
        cancellation_token: CancellationToken,
    ) -> WebResult<()> {
        let listener = match tokio::net::TcpListener::bind(self.addr).await {
            Ok(listener) => listener,
            Err(bind_error) => {
                let kind = bind_error.kind();
                let message = bind_error.to_string();
                let _ = ready_signal.send(Err(WebError::Bind {
                    addr: self.addr.to_string(),
                    source: bind_error,
                }));
                return Err(WebError::Bind {
                    addr: self.addr.to_string(),
                    source: std::io::Error::new(kind, message),
                });
            }
        };

        let local_addr = listener.local_addr()?;
        info!(server = self.name, addr = %local_addr, "Listening");
        let _ = ready_signal.send(Ok(local_addr));

        let name = self.name;
        axum::serve(listener, self.app)
            .with_graceful_shutdown(async move {
                cancellation_token.cancelled().await;
                info!(server = name, "Shutting down gracefully");
            })
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bind_failure_is_signalled() {
        let taken = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = taken.local_addr().unwrap();

        let (ready_tx, ready_rx) = oneshot::channel();
        let server = WebServer::new("test", Router::new(), addr);
        let result = server
            .serve_with_cancellation(ready_tx, CancellationToken::new())
            .await;

        assert!(matches!(result, Err(WebError::Bind { .. })));
        assert!(matches!(ready_rx.await, Ok(Err(WebError::Bind { .. }))));
    }

    #[tokio::test]
    async fn test_serves_until_cancelled() {
        let (ready_tx, ready_rx) = oneshot::channel();
        let cancel = CancellationToken::new();
        let server = WebServer::new("test", Router::new(), "127.0.0.1:0".parse().unwrap());
        let task = tokio::spawn(server.serve_with_cancellation(ready_tx, cancel.clone()));

        let addr = ready_rx.await.unwrap().unwrap();
        assert_ne!(addr.port(), 0);

        cancel.cancel();
        assert!(task.await.unwrap().is_ok());
    }
}
