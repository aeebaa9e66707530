// Netdash is open-source under the Apache License 2.0; see LICENSE for usage and contributions.
// Sample points and the chart axis policy derived from them.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SamplePoint {
    /// Epoch milliseconds.
    pub time: i64,
    pub value: Option<f64>,
}

/// Y-axis bounds for a series: `[floor(min * 0.9), ceil(max * 1.1)]`.
///
/// Each bound falls back on its own to `0` / `100` when no sample carries a value.
pub fn y_domain(series: &[SamplePoint]) -> [f64; 2] {
    let values = series.iter().filter_map(|point| point.value);
    let (min, max) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });

    let lower = if min.is_finite() {
        (min * 0.9).floor()
    } else {
        0.0
    };
    let upper = if max.is_finite() {
        (max * 1.1).ceil()
    } else {
        100.0
    };
    [lower, upper]
}
