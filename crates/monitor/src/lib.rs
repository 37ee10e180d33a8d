//! Library entrypoint for embedding the exporter workers inside other
//! binaries. The API process runs them in-process next to the webhook
//! endpoint so reconciliation shares the snapshot cache.

pub mod bank;
pub mod service;
pub mod webhook;
pub mod worker;

pub use bank::{BankApi, BankError, HttpBankClient};
pub use service::{
    ClientExport, ClientOutcome, DiscardReason, MonobankService, ReconcileOutcome, ServiceError,
    SetupReport, WebhookStatus,
};
pub use webhook::validate_webhook_url;
pub use worker::{build_service, spawn_workers, MonitorError, Workers};
