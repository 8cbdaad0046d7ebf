//! Axum API server binary.

use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use headcount_api::{create_router, metrics, ApiConfig, AppState};
use headcount_worker::{
    Capabilities, FfmpegSinkFactory, FfmpegSourceOpener, HttpDelivery, IouTrackerFactory,
    RemoteDetector, WorkerConfig, WorkerRegistry,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Install rustls crypto provider (required for rustls 0.23+)
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    init_tracing()?;

    info!("Starting headcount-api");

    let config = ApiConfig::from_env();
    let worker_config = WorkerConfig::from_env();
    info!(
        "API config: bind={}, environment={}, start timeout {:?}, stats every {:?}, output dir {:?}",
        config.bind_addr,
        config.environment,
        config.start_timeout,
        worker_config.stats_interval,
        worker_config.output_dir
    );

    let metrics_enabled = std::env::var("METRICS_ENABLED")
        .map(|v| v == "true" || v == "1")
        .unwrap_or(true);

    let metrics_handle = if metrics_enabled {
        info!("Prometheus metrics enabled at /metrics");
        Some(metrics::init_metrics().context("Failed to install Prometheus recorder")?)
    } else {
        None
    };

    let detector = RemoteDetector::from_env().context("Failed to build detector client")?;
    if !detector.health_check().await {
        // Workers still start; frames fail detection until the service is up.
        tracing::warn!("Detector service is not healthy yet");
    }

    let capabilities = Capabilities::new(
        Arc::new(FfmpegSourceOpener::new()),
        Arc::new(detector),
        Arc::new(HttpDelivery::new().context("Failed to build webhook client")?),
    )
    .with_tracker(Arc::new(IouTrackerFactory::default()))
    .with_sink(Arc::new(FfmpegSinkFactory::new()));

    let registry = Arc::new(WorkerRegistry::new(capabilities, worker_config));
    let state = AppState::new(config.clone(), Arc::clone(&registry));
    let app = create_router(state, metrics_handle);

    let addr = config.bind_addr;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    registry.stop_all().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Colored output for dev, JSON when `LOG_FORMAT=json`.
fn init_tracing() -> anyhow::Result<()> {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env()
        .add_directive("headcount_api=info".parse()?)
        .add_directive("headcount_worker=info".parse()?);

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal, stopping camera workers");
}
