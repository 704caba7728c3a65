//! Downloadable renderings of a derived series.
//!
//! Both outputs are pure functions of their input and byte-for-byte stable:
//! the CSV table round-trips losslessly through [`parse_series`](super::parse_series),
//! and the text summary uses fixed decimal precision.

use chrono::SecondsFormat;
use serde::Serialize;

use super::aggregate::AggregateSnapshot;
use super::error::ExportError;
use super::metrics::DerivedSample;

/// Default currency label for cost figures.
pub const DEFAULT_CURRENCY: &str = "BDT";

/// Column order of the exported table. The first six match the input log.
pub const EXPORT_HEADER: [&str; 9] = [
    "Timestamp",
    "Voltage (V)",
    "Current (A)",
    "Power (W)",
    "Energy (kWh)",
    "Status",
    "Apparent Power (VA)",
    "Power Factor",
    "Estimated Cost",
];

#[derive(Serialize)]
struct ExportRow<'a> {
    timestamp: String,
    voltage: f64,
    current: f64,
    power: f64,
    energy: f64,
    status: Option<&'a str>,
    apparent_power: f64,
    power_factor: f64,
    estimated_cost: f64,
}

impl<'a> From<&'a DerivedSample> for ExportRow<'a> {
    fn from(d: &'a DerivedSample) -> Self {
        Self {
            timestamp: d
                .sample
                .timestamp
                .to_rfc3339_opts(SecondsFormat::AutoSi, true),
            voltage: d.sample.voltage,
            current: d.sample.current,
            power: d.sample.power,
            energy: d.sample.cumulative_energy,
            status: d.sample.status.as_deref(),
            apparent_power: d.apparent_power,
            power_factor: d.power_factor,
            estimated_cost: d.estimated_cost,
        }
    }
}

/// Renders derived series and snapshots for download.
#[derive(Debug, Clone)]
pub struct ExportFormatter {
    currency: String,
}

impl Default for ExportFormatter {
    fn default() -> Self {
        Self::new(DEFAULT_CURRENCY)
    }
}

impl ExportFormatter {
    pub fn new(currency: impl Into<String>) -> Self {
        Self {
            currency: currency.into(),
        }
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    /// Render the series as CSV: header row, then one row per sample in order.
    ///
    /// The header is written even for an empty series.
    pub fn to_table(&self, derived: &[DerivedSample]) -> Result<Vec<u8>, ExportError> {
        let mut wtr = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(Vec::new());

        wtr.write_record(EXPORT_HEADER)?;
        for d in derived {
            wtr.serialize(ExportRow::from(d))?;
        }

        wtr.into_inner().map_err(|e| ExportError::Io(e.into_error()))
    }

    /// Render the fixed-field text summary of a snapshot.
    ///
    /// The cost line is `total_energy * unit_price` under the price printed
    /// on the first line, whatever price the snapshot was derived with.
    /// Energy uses 3 decimals, money 2, voltage and power 1, current 3,
    /// power factor 3. Fields with no data print `n/a`.
    pub fn to_summary(&self, snapshot: &AggregateSnapshot, unit_price: f64) -> String {
        let currency = &self.currency;
        let peaks = snapshot.peaks.as_ref();
        let latest = snapshot.latest.as_ref();
        let total_cost = snapshot.total_energy * unit_price;

        let lines = [
            format!("Unit Price: {unit_price:.2} {currency}/kWh"),
            format!("Total Energy: {:.3} kWh", snapshot.total_energy),
            format!("Total Cost: {total_cost:.2} {currency}"),
            format!("Peak Voltage: {} V", fixed(peaks.map(|p| p.max_voltage), 1)),
            format!("Peak Current: {} A", fixed(peaks.map(|p| p.max_current), 3)),
            format!("Peak Power: {} W", fixed(peaks.map(|p| p.max_power), 1)),
            format!(
                "Apparent Power: {} VA",
                fixed(latest.map(|d| d.apparent_power), 1)
            ),
            format!("Power Factor: {}", fixed(latest.map(|d| d.power_factor), 3)),
        ];

        let mut out = lines.join("\n");
        out.push('\n');
        out
    }
}

fn fixed(value: Option<f64>, precision: usize) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{v:.precision$}"))
}
