//! wattwatch - Electrical Telemetry Aggregation
//!
//! This crate turns per-device CSV meter logs into derived electrical
//! metrics, live snapshots and exports. It can be used as a library, or run
//! as the `wattwatch` binary which serves the results over HTTP.
//!
//! # Architecture
//!
//! - **Telemetry**: schema normalization, series loading, derived metrics,
//!   live aggregation, device discovery and export rendering
//! - **Config**: YAML configuration with environment overrides
//! - **Server**: read-only JSON/CSV/text API for dashboards
//!
//! # Example
//!
//! ```rust,no_run
//! use wattwatch::{DeviceRegistry, ExportFormatter, derive, snapshot};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = DeviceRegistry::new("data/");
//!     let store = registry.resolve("meter-1")?;
//!
//!     let derived = derive(&store.load()?, 7.5);
//!     let snap = snapshot(&derived, 10);
//!     print!("{}", ExportFormatter::default().to_summary(&snap, 7.5));
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod server;
pub mod telemetry;

pub use config::{AppConfig, ConfigError};
pub use telemetry::{
    AggregateSnapshot, DEFAULT_WINDOW_SIZE, DerivedSample, DeviceDescriptor, DeviceRegistry,
    ExportError, ExportFormatter, Field, LoadError, NormalizationError, NormalizationKind, Peaks,
    RawRow, RegistryError, Sample, SampleSchema, Series, TelemetryStore, derive, parse_series,
    snapshot,
};
