//! Telemetry-specific error types.
//!
//! Row-level problems surface as [`NormalizationError`] and are recovered by
//! skipping the row. Source-level problems surface as [`LoadError`]; device
//! lookups fail with [`RegistryError`].

use thiserror::Error;

use super::schema::Field;

/// Why a raw row could not be normalized into a [`Sample`](super::Sample).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizationKind {
    /// Timestamp cell missing or not parseable to an absolute time.
    #[error("malformed timestamp '{value}'")]
    MalformedTimestamp { value: String },

    /// Numeric cell missing, not parseable, or not finite.
    #[error("malformed numeric value '{value}' in column '{field}'")]
    MalformedNumeric { field: Field, value: String },
}

/// A single row failed normalization.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}{kind}", row_prefix(.row))]
pub struct NormalizationError {
    #[source]
    pub kind: NormalizationKind,
    /// 1-based data row number within the source, when known.
    pub row: Option<u64>,
}

fn row_prefix(row: &Option<u64>) -> String {
    row.map(|row| format!("row {row}: ")).unwrap_or_default()
}

impl NormalizationError {
    pub fn new(kind: NormalizationKind) -> Self {
        Self { kind, row: None }
    }

    /// Attach the source row number.
    pub fn at_row(mut self, row: u64) -> Self {
        self.row = Some(row);
        self
    }
}

/// Errors that prevent a source from being loaded at all.
///
/// A missing source is not an error: it loads as an empty series.
#[derive(Debug, Error)]
pub enum LoadError {
    /// Source exists but could not be read.
    #[error("failed to read telemetry source: {0}")]
    Io(#[from] std::io::Error),

    /// Source header could not be parsed as CSV.
    #[error("malformed telemetry source: {0}")]
    Csv(#[from] csv::Error),

    /// Header present but the required columns are not.
    #[error("telemetry source is missing required columns: {}", .columns.join(", "))]
    MissingColumns { columns: Vec<String> },
}

/// Errors from device discovery and lookup.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The requested id is not in the current listing.
    #[error("unknown device: '{0}'")]
    UnknownDevice(String),

    /// Data directory exists but could not be listed.
    #[error("failed to list devices: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors while rendering an export.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to write export table: {0}")]
    Csv(#[from] csv::Error),

    #[error("failed to flush export table: {0}")]
    Io(#[from] std::io::Error),
}
