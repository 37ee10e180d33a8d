//! Standalone poller: balance and currency workers with their own scrape
//! listener, no webhook endpoint.

use std::io;
use std::sync::Arc;

use monobank_exporter_domain::config::ExporterConfig;
use monobank_exporter_domain::services::telemetry::{init_telemetry, TelemetryConfig};
use monobank_exporter_monitor::{build_service, spawn_workers, MonitorError};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> io::Result<()> {
    if let Err(err) = bootstrap().await {
        eprintln!("[monitor] bootstrap failed: {err}");
        return Err(io::Error::other(err.to_string()));
    }

    Ok(())
}

async fn bootstrap() -> Result<(), MonitorError> {
    let config = Arc::new(ExporterConfig::load_from_env()?);
    let telemetry_config = TelemetryConfig::from_env("MONITOR");
    init_telemetry(&telemetry_config)?;
    if telemetry_config.metrics_address().is_none() {
        warn!("MONITOR_METRICS_ADDRESS is unset, gauges will not be scrapeable");
    }

    let service = build_service(&config)?;
    let workers = spawn_workers(service, config);
    info!("monitor running, press ctrl-c to stop");

    tokio::signal::ctrl_c().await?;
    workers.shutdown().await;
    Ok(())
}
