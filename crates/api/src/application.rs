use std::sync::Arc;

use actix_web::{middleware::Logger, web, App, HttpServer};
use monobank_exporter_domain::config::{ApiConfig, ConfigError, ExporterConfig};
use monobank_exporter_domain::services::telemetry::{init_telemetry, TelemetryConfig, TelemetryError};
use monobank_exporter_monitor::{build_service, spawn_workers, MonitorError};
use thiserror::Error;
use tracing::info;

use crate::{
    handlers::{index_handler, metrics_handler, webhook_handler, webhook_check_handler},
    state::AppState,
};

pub async fn run() -> Result<(), BootstrapError> {
    let api_config = ApiConfig::load_from_env()?;
    let exporter_config = Arc::new(ExporterConfig::load_from_env()?);

    let telemetry_config = TelemetryConfig::from_env("API");
    let telemetry = init_telemetry(&telemetry_config)?;
    info!(
        clients = exporter_config.clients().len(),
        basic_auth = api_config.basic_auth().is_enabled(),
        "configuration loaded"
    );

    let service = build_service(&exporter_config)?;
    let state = AppState::new(
        service.clone(),
        telemetry,
        api_config.basic_auth().clone(),
    );

    let server = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .wrap(Logger::default())
            .configure(routes)
    })
    .bind(api_config.api_bind_address())?
    .run();
    info!(address = api_config.api_bind_address(), "http server listening");

    // The bank calls the webhook during setup; the listener must be bound first.
    let workers = spawn_workers(service, exporter_config);
    let result = server.await;
    workers.shutdown().await;
    result?;

    Ok(())
}

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(index_handler))
        .route("/webhook", web::get().to(webhook_check_handler))
        .route("/webhook", web::post().to(webhook_handler))
        .route("/metrics", web::get().to(metrics_handler));
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),
    #[error("monitor error: {0}")]
    Monitor(#[from] MonitorError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
