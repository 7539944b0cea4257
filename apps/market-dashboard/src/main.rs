//! Market Dashboard Binary
//!
//! Starts the price engine, the broadcast dispatcher and the HTTP server.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin market-dashboard
//! ```
//!
//! # Environment Variables
//!
//! ## Optional
//! - `DASHBOARD_HTTP_PORT`: HTTP/WebSocket port (default: 8080)
//! - `DASHBOARD_TICK_INTERVAL_MS`: Price tick interval (default: 2000)
//! - `DASHBOARD_MAX_CHANGE_BPS`: Max move per tick in basis points (default: 200)
//! - `DASHBOARD_SEND_TIMEOUT_MS`: Per-subscriber send deadline (default: 1000)
//! - `DASHBOARD_JWT_SECRET`: Token signing secret (default: development secret)
//! - `DASHBOARD_TOKEN_TTL_SECS`: Token lifetime (default: 86400)
//! - `DASHBOARD_OPERATOR_KEY`: Key required by `GET /api/orders/all` (default: unset, open)
//! - `DASHBOARD_DEMO_USER`: Seed the `demo` account (default: true)
//! - `DASHBOARD_BCRYPT_COST`: Password hashing work factor (default: 12)
//! - `OTEL_ENABLED`: Enable OpenTelemetry (default: false)
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint (default: <http://localhost:4318>)
//! - `OTEL_SERVICE_NAME`: Service name (default: market-dashboard)
//! - `RUST_LOG`: Log level (default: info)

use std::time::Duration;

use market_dashboard::infrastructure::telemetry;
use market_dashboard::{AppContext, DashboardConfig, HttpServer, init_metrics};
use tokio::signal;
use tokio_util::sync::CancellationToken;

/// Graceful shutdown timeout.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    load_dotenv();

    // Initialize telemetry (tracing, optional OpenTelemetry)
    let _telemetry_guard = telemetry::init();

    tracing::info!("Starting Market Dashboard");

    // Initialize Prometheus metrics
    let _metrics_handle = init_metrics();

    let config = DashboardConfig::from_env().inspect_err(|e| {
        tracing::error!(error = %e, "Invalid configuration");
    })?;
    log_config(&config);

    let shutdown_token = CancellationToken::new();

    let ctx = AppContext::from_config(&config, shutdown_token.clone());
    let background = ctx.spawn_background();

    let http_server = HttpServer::new(config.server.http_port, ctx, shutdown_token.clone());
    let http_shutdown = shutdown_token.clone();
    let http_task = tokio::spawn(async move {
        if let Err(e) = http_server.run().await {
            tracing::error!(error = %e, "HTTP server error");
            http_shutdown.cancel();
        }
    });

    tracing::info!("Market dashboard ready");

    tokio::select! {
        () = await_shutdown() => shutdown_token.cancel(),
        () = shutdown_token.cancelled() => {}
    }

    tracing::info!(
        timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
        "Graceful shutdown started"
    );

    let drained = tokio::time::timeout(SHUTDOWN_TIMEOUT, async {
        background.join().await;
        if let Err(e) = http_task.await {
            tracing::error!(error = %e, "HTTP server task failed");
        }
    })
    .await;

    if drained.is_err() {
        tracing::warn!("Shutdown timed out; exiting with tasks still running");
    }

    tracing::info!("Market dashboard stopped");
    Ok(())
}

/// Load .env file from current or ancestor directories.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Log the parsed configuration.
fn log_config(config: &DashboardConfig) {
    tracing::info!(
        http_port = config.server.http_port,
        tick_interval_ms = u64::try_from(config.pricing.tick_interval.as_millis()).unwrap_or(u64::MAX),
        max_change_bps = config.pricing.max_change_bps,
        send_timeout_ms = u64::try_from(config.broadcast.send_timeout.as_millis()).unwrap_or(u64::MAX),
        operator_key = config.auth.operator_key().is_some(),
        demo_user = config.auth.seed_demo_user,
        "Configuration loaded"
    );

    if config.auth.uses_default_secret() {
        tracing::warn!("DASHBOARD_JWT_SECRET not set; using the development signing secret");
    }
}

/// Wait for SIGTERM or SIGINT.
#[allow(clippy::expect_used)]
async fn await_shutdown() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }
}
