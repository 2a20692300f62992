//! Cloudera Exporter HTTP Server
//!
//! Long-running sidecar process: polls the Cloudera Manager API for
//! service health on a fixed interval and serves the projected gauges to
//! a scraping Prometheus.
//!
//! # Endpoints
//!
//! - `GET /` - Landing page with a link to the metrics path
//! - `GET <telemetry-path>` - Prometheus metrics (default `/metrics`)
//! - `GET /healthz` - Exporter liveness
//!
//! # Example
//!
//! ```bash
//! cloudera_exporter \
//!   --cloudera.uri http://cm-host:7180 \
//!   --cloudera.user admin \
//!   --cloudera.clustername Cluster%201
//!
//! curl http://localhost:9107/metrics
//! ```
//!
//! The password is best supplied through the `CLOUDERA_PASSWORD`
//! environment variable rather than a flag.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{Html, IntoResponse},
    routing::get,
    Json, Router,
};
use clap::Parser;
use cloudera_exporter::{
    client::{ClientConfig, HealthClient},
    poller::{Poller, PollerConfig, Service, ServiceStatus},
    registry::{MetricRegistry, RegistryMode},
};
use serde::Serialize;
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

// =============================================================================
// Configuration
// =============================================================================

/// Exporter configuration, flag names preserved from the original exporter
#[derive(Debug, Clone, Parser)]
#[command(
    name = "cloudera_exporter",
    version,
    about = "Prometheus exporter for Cloudera Manager service health"
)]
struct ExporterConfig {
    /// Address to listen on for web interface and telemetry
    #[arg(long = "web.listen-address", default_value = "0.0.0.0:9107")]
    listen_address: String,

    /// Path under which to expose metrics
    #[arg(long = "web.telemetry-path", default_value = "/metrics")]
    telemetry_path: String,

    /// Base URI of the Cloudera Manager API
    #[arg(
        long = "cloudera.uri",
        env = "CLOUDERA_URI",
        default_value = "http://localhost:7180"
    )]
    cloudera_uri: String,

    /// Cloudera Manager API username
    #[arg(long = "cloudera.user", env = "CLOUDERA_USER", default_value = "admin")]
    cloudera_user: String,

    /// Cloudera Manager API password
    #[arg(
        long = "cloudera.password",
        env = "CLOUDERA_PASSWORD",
        default_value = "",
        hide_env_values = true
    )]
    cloudera_password: String,

    /// Cluster name path segment, percent-encoded
    #[arg(long = "cloudera.clustername", default_value = "Cluster%201")]
    cloudera_clustername: String,

    /// Seconds between poll cycles
    #[arg(long = "poll.interval-secs", default_value_t = 10)]
    poll_interval_secs: u64,

    /// Per-request timeout in seconds for the upstream API
    #[arg(long = "fetch.timeout-secs", default_value_t = 5)]
    fetch_timeout_secs: u64,

    /// Gauge layout: label-keyed family (dynamic) or fixed per-service gauges (static)
    #[arg(long = "metrics.mode", value_enum, default_value_t = RegistryMode::Dynamic)]
    metrics_mode: RegistryMode,
}

// =============================================================================
// Application State
// =============================================================================

/// Shared application state
struct AppState {
    registry: Arc<MetricRegistry>,
    poller: Arc<Poller>,
    telemetry_path: String,
}

// =============================================================================
// Handlers
// =============================================================================

/// Liveness response
#[derive(Debug, Serialize)]
struct HealthzResponse {
    status: &'static str,
    poller: String,
    version: &'static str,
}

/// Exporter liveness endpoint
async fn healthz(State(state): State<Arc<AppState>>) -> Json<HealthzResponse> {
    let poller_status = state.poller.status();
    Json(HealthzResponse {
        status: if matches!(poller_status, ServiceStatus::Failed(_)) {
            "failed"
        } else {
            "ok"
        },
        poller: format!("{poller_status:?}"),
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Prometheus metrics endpoint
async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.registry.encode_text() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, "failed to encode metrics").into_response()
        }
    }
}

/// Landing page, content preserved from the original exporter
async fn landing_page(State(state): State<Arc<AppState>>) -> Html<String> {
    Html(format!(
        "<html>\n\
         <head><title>Cloudera Exporter</title></head>\n\
         <body>\n\
         <h1>Cloudera Exporter</h1>\n\
         <p><a href='{}'>Metrics</a></p>\n\
         <h2>Build</h2>\n\
         <pre>cloudera_exporter v{}</pre>\n\
         </body>\n\
         </html>",
        state.telemetry_path,
        env!("CARGO_PKG_VERSION"),
    ))
}

/// Build the router with all endpoints
fn build_router(state: Arc<AppState>) -> Router {
    let telemetry_path = state.telemetry_path.clone();
    Router::new()
        .route("/", get(landing_page))
        .route("/healthz", get(healthz))
        .route(&telemetry_path, get(metrics))
        .with_state(state)
}

/// Graceful shutdown handler: waits for SIGINT/SIGTERM, then notifies the
/// background poll service
async fn shutdown_signal(shutdown: broadcast::Sender<()>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
    let _ = shutdown.send(());
}

// =============================================================================
// Main Entry Point
// =============================================================================

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("cloudera_exporter=info".parse()?),
        )
        .init();

    let config = ExporterConfig::parse();
    info!("Starting cloudera_exporter v{}", env!("CARGO_PKG_VERSION"));
    info!(
        uri = %config.cloudera_uri,
        cluster = %config.cloudera_clustername,
        mode = ?config.metrics_mode,
        "Upstream configuration"
    );

    if !config.telemetry_path.starts_with('/') {
        return Err(format!(
            "telemetry path must start with '/': {}",
            config.telemetry_path
        )
        .into());
    }

    // Registry is the single piece of shared state: written by the poll
    // service, read by every scrape request
    let registry = Arc::new(MetricRegistry::new(config.metrics_mode)?);

    let client = HealthClient::new(ClientConfig {
        base_uri: config.cloudera_uri.clone(),
        cluster_name: config.cloudera_clustername.clone(),
        user: config.cloudera_user.clone(),
        password: config.cloudera_password.clone(),
        timeout: Duration::from_secs(config.fetch_timeout_secs),
    })?;

    let poller = Arc::new(Poller::new(
        PollerConfig {
            interval: Duration::from_secs(config.poll_interval_secs),
        },
        client,
        registry.clone(),
    ));

    let (shutdown_tx, _) = broadcast::channel(1);
    let poller_rx = shutdown_tx.subscribe();
    let poller_task = poller.clone();
    let mut poller_handle = tokio::spawn(async move { poller_task.start(poller_rx).await });

    let state = Arc::new(AppState {
        registry,
        poller,
        telemetry_path: config.telemetry_path.clone(),
    });
    let app = build_router(state);

    let addr: SocketAddr = config.listen_address.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on {}", addr);

    let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal(shutdown_tx));

    let mut poller_finished = false;
    tokio::select! {
        result = server => {
            result?;
        }
        result = &mut poller_handle => {
            poller_finished = true;
            match result {
                Ok(Ok(())) => warn!("Poll service exited before shutdown was requested"),
                Ok(Err(e)) => {
                    error!(error = %e, "Poll service failed");
                    return Err(e.into());
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    if !poller_finished {
        match poller_handle.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                error!(error = %e, "Poll service failed during shutdown");
                return Err(e.into());
            }
            Err(e) => return Err(e.into()),
        }
    }

    info!("Exporter shutdown complete");
    Ok(())
}
