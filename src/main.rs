//! MDB Estimator: service entry point.
//!
//! Loads configuration, initialises structured logging, loads the rate
//! schedule (refusing to start on an invalid one) and serves the HTTP API
//! until Ctrl+C.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};

use mdb_estimator::api::{self, ApiState};
use mdb_estimator::config::AppConfig;
use mdb_estimator::rates::{RateSchedule, ScheduleHandle};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let config_path = AppConfig::path_from_env();
    let cfg = AppConfig::load(&config_path)?;

    init_logging();

    info!(
        service = %cfg.service.name,
        version = env!("CARGO_PKG_VERSION"),
        config = %config_path,
        "Starting up"
    );

    let schedule = RateSchedule::load(&cfg.rates.path)
        .with_context(|| format!("Invalid rate schedule: {}", cfg.rates.path.display()))?;
    info!(
        version = %schedule.version(),
        brackets = schedule.notary_brackets().len(),
        overrides = schedule.department_dmto_rates().len(),
        "Rate schedule active"
    );

    let state = Arc::new(ApiState::new(ScheduleHandle::new(schedule)).with_rates_path(cfg.rates.path.clone()));

    api::serve(state, cfg.server.socket_addr(), shutdown_signal()).await?;

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl+C");
        // Never resolve: without a signal handler the server runs until killed.
        std::future::pending::<()>().await;
    }
    info!("Ctrl+C received, shutting down");
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("mdb_estimator=info"));

    let json_logging = std::env::var("MDB_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
