//! Telemetry sample schema.
//!
//! Defines the fixed column set of a device log and turns raw CSV rows into
//! typed [`Sample`]s. Normalization is strict about parseability but does not
//! clamp values: negative readings are kept and reported through
//! [`Sample::negative_readings`].

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use csv::StringRecord;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

use super::error::{LoadError, NormalizationError, NormalizationKind};

/// Zone-less timestamp layouts accepted in addition to RFC 3339. Interpreted as UTC.
const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// Offset-bearing layouts that RFC 3339 parsing rejects.
const OFFSET_DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%z"];

/// Columns of a device log, named exactly as they appear in the header.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display, AsRefStr,
)]
pub enum Field {
    #[strum(serialize = "Timestamp")]
    Timestamp,
    #[strum(serialize = "Voltage (V)")]
    Voltage,
    #[strum(serialize = "Current (A)")]
    Current,
    #[strum(serialize = "Power (W)")]
    Power,
    #[strum(serialize = "Energy (kWh)")]
    Energy,
    #[strum(serialize = "Status")]
    Status,
}

impl Field {
    /// Columns that must be present in every source header.
    pub const REQUIRED: [Field; 5] = [
        Field::Timestamp,
        Field::Voltage,
        Field::Current,
        Field::Power,
        Field::Energy,
    ];
}

/// One telemetry reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: DateTime<Utc>,
    /// Volts.
    pub voltage: f64,
    /// Amperes.
    pub current: f64,
    /// Watts.
    pub power: f64,
    /// Running meter reading in kWh, not a per-sample delta.
    pub cumulative_energy: f64,
    /// Opaque device status label, passed through untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl Sample {
    /// Electrical fields holding a negative reading.
    ///
    /// The meter side does not guarantee clamping, so such samples are
    /// accepted and only flagged.
    pub fn negative_readings(&self) -> Vec<Field> {
        [
            (Field::Voltage, self.voltage),
            (Field::Current, self.current),
            (Field::Power, self.power),
        ]
        .into_iter()
        .filter(|(_, value)| *value < 0.0)
        .map(|(field, _)| field)
        .collect()
    }
}

/// Unvalidated cells of one source row, keyed by column.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRow<'a> {
    pub timestamp: Option<&'a str>,
    pub voltage: Option<&'a str>,
    pub current: Option<&'a str>,
    pub power: Option<&'a str>,
    pub energy: Option<&'a str>,
    pub status: Option<&'a str>,
}

/// Column positions resolved from a source header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleSchema {
    timestamp: usize,
    voltage: usize,
    current: usize,
    power: usize,
    energy: usize,
    status: Option<usize>,
}

impl SampleSchema {
    /// Resolve column positions from a header record.
    ///
    /// Header names are matched after trimming; unknown columns are ignored.
    ///
    /// # Errors
    /// Returns [`LoadError::MissingColumns`] listing every required column
    /// the header lacks.
    pub fn from_headers(headers: &StringRecord) -> Result<Self, LoadError> {
        let position = |field: Field| {
            headers
                .iter()
                .position(|name| name.trim() == field.as_ref())
        };

        let missing: Vec<String> = Field::REQUIRED
            .iter()
            .filter(|field| position(**field).is_none())
            .map(|field| field.to_string())
            .collect();

        match (
            position(Field::Timestamp),
            position(Field::Voltage),
            position(Field::Current),
            position(Field::Power),
            position(Field::Energy),
        ) {
            (Some(timestamp), Some(voltage), Some(current), Some(power), Some(energy)) => {
                Ok(Self {
                    timestamp,
                    voltage,
                    current,
                    power,
                    energy,
                    status: position(Field::Status),
                })
            }
            _ => Err(LoadError::MissingColumns { columns: missing }),
        }
    }

    /// Pick this schema's cells out of a record. Short rows yield `None` cells.
    pub fn raw_row<'r>(&self, record: &'r StringRecord) -> RawRow<'r> {
        RawRow {
            timestamp: record.get(self.timestamp),
            voltage: record.get(self.voltage),
            current: record.get(self.current),
            power: record.get(self.power),
            energy: record.get(self.energy),
            status: self.status.and_then(|idx| record.get(idx)),
        }
    }

    /// Validate a raw row and convert it into a [`Sample`].
    ///
    /// A missing or empty cell is treated as unparseable. Non-finite numbers
    /// are rejected. An empty status cell is treated as absent.
    ///
    /// # Errors
    /// Returns [`NormalizationKind::MalformedTimestamp`] or
    /// [`NormalizationKind::MalformedNumeric`] for the first bad cell.
    pub fn normalize(raw: &RawRow<'_>) -> Result<Sample, NormalizationError> {
        let ts_cell = raw.timestamp.unwrap_or_default();
        let timestamp = parse_timestamp(ts_cell).ok_or_else(|| {
            NormalizationError::new(NormalizationKind::MalformedTimestamp {
                value: ts_cell.to_string(),
            })
        })?;

        Ok(Sample {
            timestamp,
            voltage: parse_numeric(Field::Voltage, raw.voltage)?,
            current: parse_numeric(Field::Current, raw.current)?,
            power: parse_numeric(Field::Power, raw.power)?,
            cumulative_energy: parse_numeric(Field::Energy, raw.energy)?,
            status: raw
                .status
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        })
    }
}

fn parse_numeric(field: Field, cell: Option<&str>) -> Result<f64, NormalizationError> {
    let cell = cell.unwrap_or_default();
    cell.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| {
            NormalizationError::new(NormalizationKind::MalformedNumeric {
                field,
                value: cell.to_string(),
            })
        })
}

/// Parse a timestamp cell into an absolute UTC time.
///
/// Accepts RFC 3339, `YYYY-MM-DD HH:MM[:SS[.fff]]` (space or `T`
/// separated, optionally with a numeric offset) and bare `YYYY-MM-DD`.
/// Zone-less values are taken as UTC.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.with_timezone(&Utc));
    }

    for fmt in OFFSET_DATETIME_FORMATS {
        if let Ok(ts) = DateTime::parse_from_str(value, fmt) {
            return Some(ts.with_timezone(&Utc));
        }
    }

    for fmt in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::str::FromStr;

    fn row<'a>(ts: &'a str, v: &'a str, i: &'a str, p: &'a str, e: &'a str) -> RawRow<'a> {
        RawRow {
            timestamp: Some(ts),
            voltage: Some(v),
            current: Some(i),
            power: Some(p),
            energy: Some(e),
            status: None,
        }
    }

    // =========================================================================
    // Field tests
    // =========================================================================

    #[test]
    fn test_field_names_match_header() {
        assert_eq!(Field::Timestamp.as_ref(), "Timestamp");
        assert_eq!(Field::Voltage.as_ref(), "Voltage (V)");
        assert_eq!(Field::Current.as_ref(), "Current (A)");
        assert_eq!(Field::Power.as_ref(), "Power (W)");
        assert_eq!(Field::Energy.as_ref(), "Energy (kWh)");
        assert_eq!(Field::from_str("Status").unwrap(), Field::Status);
    }

    #[test]
    fn test_field_from_unknown_header() {
        assert_eq!(
            Field::from_str("Frequency (Hz)"),
            Err(strum::ParseError::VariantNotFound)
        );
        // Header names are matched exactly.
        assert!(Field::from_str("voltage (v)").is_err());
    }

    // =========================================================================
    // Header resolution tests
    // =========================================================================

    #[test]
    fn test_from_headers_any_order_with_extras() {
        let headers = StringRecord::from(vec![
            "Energy (kWh)",
            " Timestamp ",
            "Location",
            "Power (W)",
            "Current (A)",
            "Voltage (V)",
        ]);
        let schema = SampleSchema::from_headers(&headers).unwrap();
        let record = StringRecord::from(vec!["0.5", "2024-01-01 00:00:00", "lab", "10", "1", "230"]);
        let raw = schema.raw_row(&record);
        assert_eq!(raw.energy, Some("0.5"));
        assert_eq!(raw.voltage, Some("230"));
        assert_eq!(raw.status, None);
    }

    #[test]
    fn test_from_headers_missing_columns() {
        let headers = StringRecord::from(vec!["Timestamp", "Voltage (V)", "Current (A)"]);
        match SampleSchema::from_headers(&headers) {
            Err(LoadError::MissingColumns { columns }) => {
                assert_eq!(columns, vec!["Power (W)", "Energy (kWh)"]);
            }
            other => panic!("expected MissingColumns, got {other:?}"),
        }
    }

    #[test]
    fn test_raw_row_short_record() {
        let headers = StringRecord::from(vec![
            "Timestamp",
            "Voltage (V)",
            "Current (A)",
            "Power (W)",
            "Energy (kWh)",
            "Status",
        ]);
        let schema = SampleSchema::from_headers(&headers).unwrap();
        let record = StringRecord::from(vec!["2024-01-01", "230"]);
        let raw = schema.raw_row(&record);
        assert_eq!(raw.current, None);
        assert_eq!(raw.status, None);
        assert!(SampleSchema::normalize(&raw).is_err());
    }

    // =========================================================================
    // Normalization tests
    // =========================================================================

    #[test]
    fn test_normalize_valid_row() {
        let mut raw = row("2024-03-01 12:30:00", "221", "2.0", "440", "0.010");
        raw.status = Some("online");
        let sample = SampleSchema::normalize(&raw).unwrap();
        assert_eq!(
            sample.timestamp,
            Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap()
        );
        assert_eq!(sample.voltage, 221.0);
        assert_eq!(sample.current, 2.0);
        assert_eq!(sample.power, 440.0);
        assert_eq!(sample.cumulative_energy, 0.010);
        assert_eq!(sample.status.as_deref(), Some("online"));
    }

    #[test]
    fn test_normalize_malformed_timestamp() {
        let raw = row("not-a-time", "221", "2.0", "440", "0.010");
        let err = SampleSchema::normalize(&raw).unwrap_err();
        assert_eq!(
            err.kind,
            NormalizationKind::MalformedTimestamp {
                value: "not-a-time".to_string()
            }
        );
    }

    #[test]
    fn test_normalize_malformed_numeric_names_field() {
        let raw = row("2024-03-01 12:30:00", "221", "two", "440", "0.010");
        let err = SampleSchema::normalize(&raw).unwrap_err();
        assert_eq!(
            err.kind,
            NormalizationKind::MalformedNumeric {
                field: Field::Current,
                value: "two".to_string()
            }
        );
    }

    #[test]
    fn test_normalize_rejects_non_finite() {
        let raw = row("2024-03-01 12:30:00", "NaN", "1", "1", "1");
        assert!(SampleSchema::normalize(&raw).is_err());
        let raw = row("2024-03-01 12:30:00", "1", "1", "inf", "1");
        assert!(SampleSchema::normalize(&raw).is_err());
    }

    #[test]
    fn test_normalize_empty_cell_is_malformed() {
        let raw = row("2024-03-01 12:30:00", "1", "1", "1", "");
        let err = SampleSchema::normalize(&raw).unwrap_err();
        assert!(matches!(
            err.kind,
            NormalizationKind::MalformedNumeric {
                field: Field::Energy,
                ..
            }
        ));
    }

    #[test]
    fn test_normalize_empty_status_is_absent() {
        let mut raw = row("2024-03-01 12:30:00", "1", "1", "1", "1");
        raw.status = Some("");
        assert_eq!(SampleSchema::normalize(&raw).unwrap().status, None);
    }

    #[test]
    fn test_normalize_keeps_negative_readings() {
        let raw = row("2024-03-01 12:30:00", "-5", "2", "-1", "0");
        let sample = SampleSchema::normalize(&raw).unwrap();
        assert_eq!(sample.voltage, -5.0);
        assert_eq!(
            sample.negative_readings(),
            vec![Field::Voltage, Field::Power]
        );
    }

    // =========================================================================
    // Timestamp tests
    // =========================================================================

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(parse_timestamp("2024-01-02T03:04:05Z"), Some(expected));
        assert_eq!(parse_timestamp("2024-01-02T09:04:05+06:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-01-02 09:04:05+06:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-01-02 03:04:05"), Some(expected));
        assert_eq!(parse_timestamp("2024-01-02T03:04:05"), Some(expected));
        assert_eq!(
            parse_timestamp("2024-01-02 03:04"),
            Some(Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 0).unwrap())
        );
        assert_eq!(
            parse_timestamp("2024-01-02"),
            Some(Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_parse_timestamp_fractional_seconds() {
        let ts = parse_timestamp("2024-01-02 03:04:05.250").unwrap();
        assert_eq!(ts.timestamp_subsec_millis(), 250);
    }

    #[test]
    fn test_parse_timestamp_invalid() {
        assert_eq!(parse_timestamp(""), None);
        assert_eq!(parse_timestamp("   "), None);
        assert_eq!(parse_timestamp("2024-13-40 00:00:00"), None);
        assert_eq!(parse_timestamp("12:00"), None);
    }
}
