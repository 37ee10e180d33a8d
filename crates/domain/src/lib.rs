//! Domain-level building blocks shared by the API and monitor crates: the
//! configuration contract, the snapshot model, the lookup cache and the
//! metrics/telemetry wiring.

pub mod config;
pub mod model;
pub mod services;

pub use model::*;
pub use services::cache::{CacheCategory, InMemoryLookupCache, LookupCache, Snapshot};
pub use services::exporter::{MetricsExporter, PrometheusMetricsExporter, RateKind};
