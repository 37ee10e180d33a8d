use std::sync::Arc;

use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn};

use monobank_exporter_domain::{
    config::{ConfigError, ExporterConfig},
    services::telemetry::TelemetryError,
    ClientConfig, InMemoryLookupCache, PrometheusMetricsExporter,
};

use crate::{
    bank::{BankError, HttpBankClient},
    service::MonobankService,
};

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),
    #[error("bank client error: {0}")]
    Bank(#[from] BankError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Wires the HTTP bank client, snapshot cache and Prometheus exporter into a
/// service.
pub fn build_service(config: &ExporterConfig) -> Result<Arc<MonobankService>, MonitorError> {
    let bank = HttpBankClient::new(config.api_base_url(), config.request_timeout())?;
    let exporter = PrometheusMetricsExporter::new(config.metric_names().clone());
    Ok(Arc::new(MonobankService::new(
        Arc::new(bank),
        Arc::new(InMemoryLookupCache::default()),
        Arc::new(exporter),
        config.snapshot_ttl(),
    )))
}

/// Handle to the running background workers.
pub struct Workers {
    stop: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl Workers {
    /// Signals both workers and waits for them to exit. An in-flight tick is
    /// abandoned.
    pub async fn shutdown(self) {
        let _ = self.stop.send(true);
        for handle in self.handles {
            if let Err(err) = handle.await {
                warn!(%err, "worker task ended abnormally");
            }
        }
        info!("workers stopped");
    }
}

pub fn spawn_workers(service: Arc<MonobankService>, config: Arc<ExporterConfig>) -> Workers {
    let (stop, stop_rx) = watch::channel(false);
    let balance = tokio::spawn(run_balance_worker(
        service.clone(),
        config.clone(),
        stop_rx.clone(),
    ));
    let currency = tokio::spawn(run_currency_worker(service, config, stop_rx));
    Workers {
        stop,
        handles: vec![balance, currency],
    }
}

/// The first tick registers webhooks and seeds the cache. Later ticks only
/// re-export balances for the clients that setup accepted. While no client
/// is accepted, setup is retried on every tick.
pub async fn run_balance_worker(
    service: Arc<MonobankService>,
    config: Arc<ExporterConfig>,
    mut stop: watch::Receiver<bool>,
) {
    let period = config.balance_refresh_interval();
    info!(minutes = period.as_secs() / 60, "balance worker started");
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut valid_clients: Vec<ClientConfig> = Vec::new();

    loop {
        tokio::select! {
            biased;
            _ = stopped(&mut stop) => break,
            _ = ticker.tick() => {}
        }

        let tick = async {
            if valid_clients.is_empty() {
                let report = service
                    .setup_webhook_and_export(config.webhook_url(), config.clients())
                    .await;
                Some(report.valid_clients)
            } else {
                service.export_balance_metrics(&valid_clients).await;
                None
            }
        };
        let accepted = tokio::select! {
            biased;
            _ = stopped(&mut stop) => break,
            accepted = tick => accepted,
        };

        if let Some(accepted) = accepted {
            if accepted.is_empty() {
                warn!("no valid clients after setup, retrying on next tick");
            } else {
                info!(clients = accepted.len(), "webhook setup finished");
            }
            valid_clients = accepted;
        }
    }

    info!("balance worker stopped");
}

pub async fn run_currency_worker(
    service: Arc<MonobankService>,
    config: Arc<ExporterConfig>,
    mut stop: watch::Receiver<bool>,
) {
    let period = config.currency_refresh_interval();
    info!(minutes = period.as_secs() / 60, "currency worker started");
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = stopped(&mut stop) => break,
            _ = ticker.tick() => {}
        }

        // Failures are logged by the service; the next tick retries.
        tokio::select! {
            biased;
            _ = stopped(&mut stop) => break,
            _ = service.export_currency_metrics() => {}
        }
    }

    info!("currency worker stopped");
}

/// Resolves once a stop is requested or the sender is gone.
async fn stopped(stop: &mut watch::Receiver<bool>) {
    while !*stop.borrow_and_update() {
        if stop.changed().await.is_err() {
            return;
        }
    }
}
