use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pskreporter_exporter::{
    config::Config,
    ingestor::{Ingestor, MqttSubscriber},
    metrics,
    web::{AppState, WebServer, create_router, metrics_router},
};

#[derive(Parser)]
#[command(name = "pskreporter-exporter")]
#[command(version)]
#[command(about = "Counts PSK Reporter spots for one country and serves a live spot log")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file path; missing file means defaults and environment only
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load_from_file(&cli.config)?;

    let log_filter = if cli.log_level == "trace" {
        format!("pskreporter_exporter={},tower_http=trace", cli.log_level)
    } else {
        format!("pskreporter_exporter={}", cli.log_level)
    };
    let json = cli.log_json || config.log_json;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_filter.into()),
        )
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(tracing_subscriber::fmt::layer))
        .init();

    info!(
        country = config.country,
        bands = %config.bands.join(","),
        broker = %config.broker,
        retention = %humantime::format_duration(config.spotlog_retention),
        "Starting pskreporter-exporter"
    );

    let prometheus = metrics::install_recorder()?;
    let ingestor = Ingestor::from_config(&config);
    let config = Arc::new(config);
    let cancel = CancellationToken::new();

    let state = AppState::new(
        Arc::clone(&config),
        Arc::clone(ingestor.store()),
        ingestor.broadcaster().clone(),
    );
    let spotlog = WebServer::new("spotlog", create_router(state), config.spotlog_addr()?);
    let metrics_server = WebServer::new(
        "metrics",
        metrics_router(prometheus),
        config.metrics_addr()?,
    );

    let mut tasks = vec![
        start_server(metrics_server, cancel.clone()).await?,
        start_server(spotlog, cancel.clone()).await?,
    ];

    tasks.push(ingestor.broadcaster().spawn_reaper(
        config.reap_interval,
        config.subscriber_timeout,
        cancel.clone(),
    ));

    let subscriber = MqttSubscriber::from_config(&config)?;
    let mqtt_cancel = cancel.clone();
    tasks.push(tokio::spawn(async move {
        if let Err(e) = subscriber.run(ingestor, mqtt_cancel).await {
            error!("MQTT subscriber failed: {}", e);
        }
    }));

    shutdown_signal().await;
    cancel.cancel();

    for task in tasks {
        if let Err(e) = task.await {
            warn!("Task ended abnormally: {}", e);
        }
    }
    info!("Shutdown complete");
    Ok(())
}

/// Spawn a server and wait until it is listening, failing on bind errors.
async fn start_server(server: WebServer, cancel: CancellationToken) -> Result<JoinHandle<()>> {
    let (ready_tx, ready_rx) = tokio::sync::oneshot::channel();

    let handle = tokio::spawn(async move {
        if let Err(e) = server.serve_with_cancellation(ready_tx, cancel).await {
            error!("Web server failed: {}", e);
        }
    });

    match ready_rx.await {
        Ok(Ok(_)) => Ok(handle),
        Ok(Err(bind_error)) => {
            error!("Failed to bind web server: {}", bind_error);
            Err(bind_error.into())
        }
        Err(_) => Err(anyhow::anyhow!("Web server task completed without signaling")),
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down gracefully"),
                    _ = tokio::signal::ctrl_c() => info!("Received SIGINT (Ctrl+C), shutting down gracefully"),
                }
                return;
            }
            Err(e) => warn!("Failed to install SIGTERM handler: {}", e),
        }
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl+C: {}", e);
    }
    info!("Received Ctrl+C, shutting down gracefully");
}
