//! Derived electrical metrics.

use serde::Serialize;

use super::schema::Sample;
use super::store::Series;

/// A [`Sample`] together with the metrics computed from it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DerivedSample {
    #[serde(flatten)]
    pub sample: Sample,
    /// `voltage * current`, in VA. Not clamped.
    pub apparent_power: f64,
    /// `power / apparent_power`, or exactly 0 when apparent power is 0.
    pub power_factor: f64,
    /// `cumulative_energy * unit_price`.
    pub estimated_cost: f64,
}

impl DerivedSample {
    /// Compute the derived metrics for one sample under `unit_price` (per kWh).
    ///
    /// Plain IEEE-754 arithmetic: finite readings whose product exceeds
    /// `f64::MAX` yield an infinite apparent power or cost. Like other
    /// anomalies these are passed through, not clamped. JSON output renders
    /// them as `null`; the CSV export writes `inf`.
    pub fn from_sample(sample: &Sample, unit_price: f64) -> Self {
        let apparent_power = sample.voltage * sample.current;
        // No load: report a stable 0 instead of NaN or infinity.
        let power_factor = if apparent_power == 0.0 {
            0.0
        } else {
            sample.power / apparent_power
        };

        Self {
            sample: sample.clone(),
            apparent_power,
            power_factor,
            estimated_cost: sample.cumulative_energy * unit_price,
        }
    }
}

/// Derive metrics for every sample of `series`, preserving order.
///
/// Pure: the series is not modified and nothing is cached, so a new price
/// only needs a new call.
pub fn derive(series: &Series, unit_price: f64) -> Vec<DerivedSample> {
    series
        .iter()
        .map(|sample| DerivedSample::from_sample(sample, unit_price))
        .collect()
}
