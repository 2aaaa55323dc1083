//! Axum API server binary.

use std::net::SocketAddr;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use actsense_api::{create_router, metrics, ApiConfig, AppState};
use actsense_media::{ActivityAnalyzer, AnalyzerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing with colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env().add_directive("actsense=info".parse()?);

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

    info!("Starting actsense-api");

    // Load configuration
    let config = ApiConfig::from_env();
    info!("API config: host={}, port={}", config.host, config.port);

    let analyzer_config = AnalyzerConfig::from_env();
    let analyzer = tokio::task::spawn_blocking(move || ActivityAnalyzer::from_config(&analyzer_config))
        .await
        .context("Analyzer initialization panicked")?
        .context("Failed to initialize analyzer")?;
    info!(
        method = %analyzer.method(),
        labels = ?analyzer.status().labels,
        "Analyzer ready"
    );

    // Initialize metrics
    let metrics_handle = if config.metrics_enabled {
        match metrics::init_metrics() {
            Ok(handle) => {
                info!("Prometheus metrics enabled at /metrics");
                Some(handle)
            }
            Err(e) => {
                warn!("Failed to install Prometheus recorder: {}", e);
                None
            }
        }
    } else {
        None
    };

    let state = AppState::new(config.clone(), analyzer);
    let app = create_router(state, metrics_handle);

    // Bind and serve
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("Invalid bind address")?;

    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to install CTRL+C handler: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal");
}
