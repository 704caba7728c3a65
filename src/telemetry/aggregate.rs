//! Live-state aggregation over a derived series.
//!
//! A snapshot is recomputed on every call and has no identity of its own.
//! "No data yet" is an ordinary state: an empty series produces a snapshot
//! with `latest = None`, zero totals, an empty window and no peaks.

use serde::Serialize;

use super::metrics::DerivedSample;

/// Default length of the recent-history window.
pub const DEFAULT_WINDOW_SIZE: usize = 10;

/// Per-field maxima over a whole series. Each maximum is taken independently.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Peaks {
    pub max_voltage: f64,
    pub max_current: f64,
    pub max_power: f64,
}

/// Live view of one device at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateSnapshot {
    pub latest: Option<DerivedSample>,
    /// Last cumulative meter reading, 0 when empty.
    pub total_energy: f64,
    /// `total_energy * unit_price`, 0 when empty.
    pub total_cost: f64,
    /// Up to `window_size` most recent samples, oldest first.
    pub recent_window: Vec<DerivedSample>,
    pub peaks: Option<Peaks>,
}

impl AggregateSnapshot {
    pub fn is_empty(&self) -> bool {
        self.latest.is_none()
    }
}

/// Build the live snapshot of `derived` with a window of `window_size` samples.
///
/// The total cost equals the latest sample's estimated cost, which is the
/// final meter reading times the unit price the series was derived under.
pub fn snapshot(derived: &[DerivedSample], window_size: usize) -> AggregateSnapshot {
    let latest = derived.last().cloned();
    let total_energy = latest
        .as_ref()
        .map_or(0.0, |d| d.sample.cumulative_energy);
    let total_cost = latest.as_ref().map_or(0.0, |d| d.estimated_cost);

    let start = derived.len().saturating_sub(window_size);
    let recent_window = derived[start..].to_vec();

    AggregateSnapshot {
        latest,
        total_energy,
        total_cost,
        recent_window,
        peaks: peaks(derived),
    }
}

/// Single pass over the series for per-field maxima. `None` when empty.
pub fn peaks(derived: &[DerivedSample]) -> Option<Peaks> {
    let (first, rest) = derived.split_first()?;
    let init = Peaks {
        max_voltage: first.sample.voltage,
        max_current: first.sample.current,
        max_power: first.sample.power,
    };

    Some(rest.iter().fold(init, |acc, d| Peaks {
        max_voltage: acc.max_voltage.max(d.sample.voltage),
        max_current: acc.max_current.max(d.sample.current),
        max_power: acc.max_power.max(d.sample.power),
    }))
}
