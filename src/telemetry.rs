//! Telemetry Aggregation Pipeline
//!
//! Turns per-device CSV meter logs into derived metrics and live views:
//! - **Schema**: column layout and row normalization into [`Sample`]s
//! - **Store**: full reload of a device log into an ordered [`Series`]
//! - **Metrics**: apparent power, power factor and estimated cost per sample
//! - **Aggregate**: latest sample, totals, recent window and peaks
//! - **Registry**: device discovery over a data directory
//! - **Export**: CSV table and fixed-precision text summary
//!
//! A refresh is always `load → derive → snapshot`, recomputed in full.

mod aggregate;
mod error;
mod export;
mod metrics;
mod registry;
mod schema;
mod store;

pub use aggregate::{AggregateSnapshot, DEFAULT_WINDOW_SIZE, Peaks, peaks, snapshot};
pub use error::{ExportError, LoadError, NormalizationError, NormalizationKind, RegistryError};
pub use export::{DEFAULT_CURRENCY, EXPORT_HEADER, ExportFormatter};
pub use metrics::{DerivedSample, derive};
pub use registry::{DeviceDescriptor, DeviceRegistry};
pub use schema::{Field, RawRow, Sample, SampleSchema, parse_timestamp};
pub use store::{Series, TelemetryStore, parse_series};
