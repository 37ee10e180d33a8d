use std::sync::Arc;

use monobank_exporter_domain::{
    config::BasicAuthCredentials, services::telemetry::TelemetryGuard,
};
use monobank_exporter_monitor::MonobankService;

#[derive(Clone)]
pub struct AppState {
    service: Arc<MonobankService>,
    telemetry: TelemetryGuard,
    basic_auth: BasicAuthCredentials,
}

impl AppState {
    pub fn new(
        service: Arc<MonobankService>,
        telemetry: TelemetryGuard,
        basic_auth: BasicAuthCredentials,
    ) -> Self {
        Self {
            service,
            telemetry,
            basic_auth,
        }
    }

    pub fn service(&self) -> &MonobankService {
        self.service.as_ref()
    }

    pub fn telemetry(&self) -> &TelemetryGuard {
        &self.telemetry
    }

    pub fn basic_auth(&self) -> &BasicAuthCredentials {
        &self.basic_auth
    }
}
