//! Window aggregates and z-score anomaly tagging.
//!
//! Statistics are ephemeral: recomputed from the window on every update,
//! never stored independently. Degenerate inputs (empty window, zero
//! standard deviation) yield defined zero/false results, never a division
//! fault.

use crate::types::Reading;
use crate::window::RollingWindow;
use serde::{Deserialize, Serialize};

/// Aggregate statistics over one window. All-zero for an empty window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowStats {
    pub average: f64,
    pub min: f64,
    pub max: f64,
    pub anomaly_count: usize,
}

impl WindowStats {
    pub const ZERO: WindowStats = WindowStats {
        average: 0.0,
        min: 0.0,
        max: 0.0,
        anomaly_count: 0,
    };
}

impl Default for WindowStats {
    fn default() -> Self {
        Self::ZERO
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Compute aggregates over the canonical values of a window, rounded to 2
/// decimals.
pub fn compute(window: &RollingWindow) -> WindowStats {
    compute_over(window.iter())
}

pub fn compute_over<'a>(readings: impl Iterator<Item = &'a Reading>) -> WindowStats {
    let mut count = 0usize;
    let mut sum = 0.0;
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    let mut anomaly_count = 0usize;

    for reading in readings {
        let value = reading.primary_value();
        count += 1;
        sum += value;
        min = min.min(value);
        max = max.max(value);
        if reading.is_anomaly {
            anomaly_count += 1;
        }
    }

    if count == 0 {
        return WindowStats::ZERO;
    }
    WindowStats {
        average: round2(sum / count as f64),
        min: round2(min),
        max: round2(max),
        anomaly_count,
    }
}

/// Population mean and standard deviation of a value series.
pub fn mean_stddev(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

/// Z-score anomaly test against historical values. Requires at least 3
/// samples of history; a zero standard deviation is defined as not anomalous.
pub fn is_anomaly(current: f64, history: &[f64], threshold: f64) -> bool {
    if history.len() < 3 {
        return false;
    }
    let (mean, stddev) = mean_stddev(history);
    if stddev == 0.0 {
        return false;
    }
    ((current - mean) / stddev).abs() > threshold
}

/// Re-tag a whole batch: each reading is z-tested against the batch's own
/// value distribution. Used when a backend feed arrives untagged.
pub fn flag_anomalies(readings: &mut [Reading], threshold: f64) {
    if readings.len() < 3 {
        return;
    }
    let values: Vec<f64> = readings.iter().map(|r| r.primary_value()).collect();
    let (mean, stddev) = mean_stddev(&values);
    if stddev == 0.0 {
        return;
    }
    for reading in readings.iter_mut() {
        let z = ((reading.primary_value() - mean) / stddev).abs();
        reading.is_anomaly = z > threshold;
    }
}
