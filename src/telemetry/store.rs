//! Per-device telemetry store.
//!
//! A [`TelemetryStore`] binds a device id to its append-only CSV log and
//! rebuilds the full [`Series`] from scratch on every load. Returned series
//! are immutable values: a later reload never touches a series a caller
//! already holds.

use std::cmp::Ordering;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use serde::Serialize;

use super::error::LoadError;
use super::schema::{Sample, SampleSchema};

/// Ordered readings for exactly one device, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Series {
    samples: Vec<Sample>,
}

impl Series {
    /// A series with no samples ("waiting for data").
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a series, sorting samples into timestamp order.
    ///
    /// Ties on timestamp are broken by the remaining fields so the result
    /// does not depend on input order.
    pub fn from_samples(mut samples: Vec<Sample>) -> Self {
        samples.sort_by(compare_samples);
        Self { samples }
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Sample> {
        self.samples.iter()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Most recent sample, if any.
    pub fn latest(&self) -> Option<&Sample> {
        self.samples.last()
    }

    /// Energy consumed over the series: the last meter reading, or 0 when empty.
    pub fn total_energy(&self) -> f64 {
        self.latest().map_or(0.0, |s| s.cumulative_energy)
    }
}

impl<'a> IntoIterator for &'a Series {
    type Item = &'a Sample;
    type IntoIter = std::slice::Iter<'a, Sample>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

fn compare_samples(a: &Sample, b: &Sample) -> Ordering {
    a.timestamp
        .cmp(&b.timestamp)
        .then_with(|| a.cumulative_energy.total_cmp(&b.cumulative_energy))
        .then_with(|| a.voltage.total_cmp(&b.voltage))
        .then_with(|| a.current.total_cmp(&b.current))
        .then_with(|| a.power.total_cmp(&b.power))
        .then_with(|| a.status.cmp(&b.status))
}

/// Parse a CSV telemetry log into a [`Series`].
///
/// Malformed rows are logged and skipped. An input with no header at all
/// (zero bytes) is an empty series.
///
/// # Errors
/// - [`LoadError::MissingColumns`] if the header lacks a required column.
/// - [`LoadError::Csv`] if the header is unreadable or the reader fails mid-stream.
pub fn parse_series<R: Read>(reader: R) -> Result<Series, LoadError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    if headers.is_empty() {
        tracing::debug!("Telemetry source has no header, treating as empty");
        return Ok(Series::empty());
    }
    let schema = SampleSchema::from_headers(&headers)?;

    let mut samples = Vec::new();
    let mut skipped = 0usize;

    for (idx, result) in rdr.records().enumerate() {
        let row = idx as u64 + 1;
        let record = match result {
            Ok(record) => record,
            Err(err) if err.is_io_error() => return Err(err.into()),
            Err(err) => {
                tracing::warn!(row, error = %err, "Skipping unreadable telemetry row");
                skipped += 1;
                continue;
            }
        };

        match SampleSchema::normalize(&schema.raw_row(&record)) {
            Ok(sample) => {
                let negative = sample.negative_readings();
                if !negative.is_empty() {
                    tracing::warn!(row, fields = ?negative, "Negative reading accepted unclamped");
                }
                samples.push(sample);
            }
            Err(err) => {
                let err = err.at_row(row);
                tracing::warn!(error = %err, "Skipping malformed telemetry row");
                skipped += 1;
            }
        }
    }

    let in_order = samples
        .windows(2)
        .all(|pair| pair[0].timestamp <= pair[1].timestamp);
    if !in_order {
        tracing::debug!("Telemetry rows out of timestamp order, re-sorting");
    }

    let series = Series::from_samples(samples);
    tracing::debug!(rows = series.len(), skipped, "Telemetry source parsed");
    Ok(series)
}

/// Binding between a device id and its backing log file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryStore {
    device_id: String,
    path: PathBuf,
}

impl TelemetryStore {
    pub fn open(device_id: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            device_id: device_id.into(),
            path: path.into(),
        }
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the full series from the backing file.
    ///
    /// A missing file is a valid "no data yet" state and yields an empty
    /// series. Anything present that is not a regular file fails immediately
    /// instead of blocking on it.
    ///
    /// # Errors
    /// Returns [`LoadError`] if the file exists but cannot be read or has the
    /// wrong header.
    pub fn load(&self) -> Result<Series, LoadError> {
        let _span = tracing::debug_span!(
            "load",
            device = %self.device_id,
            path = %self.path.display()
        )
        .entered();

        let metadata = match std::fs::metadata(&self.path) {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                tracing::debug!("Telemetry source not found, waiting for data");
                return Ok(Series::empty());
            }
            Err(err) => return Err(err.into()),
        };

        if !metadata.is_file() {
            return Err(LoadError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("'{}' is not a regular file", self.path.display()),
            )));
        }

        let file = match File::open(&self.path) {
            Ok(file) => file,
            // Removed between the metadata check and the open.
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Series::empty()),
            Err(err) => return Err(err.into()),
        };

        parse_series(file)
    }

    /// Re-read the series from scratch. There is no incremental diff.
    pub fn reload(&self) -> Result<Series, LoadError> {
        self.load()
    }
}
