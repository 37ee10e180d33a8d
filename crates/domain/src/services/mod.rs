//! Shared service helpers: the snapshot lookup cache, the gauge exporter and
//! telemetry wiring.

pub mod cache;
pub mod exporter;
pub mod telemetry;

pub use cache::*;
pub use exporter::*;
pub use telemetry::*;
