//! Bounded FIFO reading history per stream.

use crate::types::Reading;
use std::collections::VecDeque;

/// An ordered, bounded reading window. Appending beyond capacity evicts the
/// oldest entry; order is always arrival order.
#[derive(Debug)]
pub struct RollingWindow {
    buf: VecDeque<Reading>,
    capacity: usize,
}

impl RollingWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// O(1) amortized append with FIFO eviction.
    pub fn append(&mut self, reading: Reading) {
        if self.buf.len() == self.capacity {
            self.buf.pop_front();
        }
        self.buf.push_back(reading);
    }

    pub fn append_batch(&mut self, readings: impl IntoIterator<Item = Reading>) {
        for reading in readings {
            self.append(reading);
        }
    }

    /// Replace the whole window contents, keeping only the last `capacity`
    /// entries of the replacement.
    pub fn replace(&mut self, readings: Vec<Reading>) {
        self.buf.clear();
        self.append_batch(readings);
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn latest(&self) -> Option<&Reading> {
        self.buf.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Reading> {
        self.buf.iter()
    }

    pub fn to_vec(&self) -> Vec<Reading> {
        self.buf.iter().cloned().collect()
    }

    /// Canonical values of all readings, in arrival order.
    pub fn values(&self) -> Vec<f64> {
        self.buf.iter().map(|r| r.primary_value()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Measurement;

    fn reading(n: i64) -> Reading {
        Reading {
            timestamp: n,
            is_anomaly: false,
            measurement: Measurement::WeighingScale {
                weight: n as f64,
                calibration_drift: 0.0,
            },
        }
    }

    #[test]
    fn eviction_keeps_exactly_the_last_capacity_entries() {
        let mut window = RollingWindow::new(5);
        for n in 0..12 {
            window.append(reading(n));
        }
        assert_eq!(window.len(), 5);
        let timestamps: Vec<i64> = window.iter().map(|r| r.timestamp).collect();
        assert_eq!(timestamps, vec![7, 8, 9, 10, 11]);
    }

    #[test]
    fn append_never_reorders() {
        let mut window = RollingWindow::new(50);
        for n in 0..30 {
            window.append(reading(n));
        }
        let timestamps: Vec<i64> = window.iter().map(|r| r.timestamp).collect();
        let mut sorted = timestamps.clone();
        sorted.sort_unstable();
        assert_eq!(timestamps, sorted);
    }

    #[test]
    fn replace_truncates_to_capacity() {
        let mut window = RollingWindow::new(3);
        window.replace((0..10).map(reading).collect());
        assert_eq!(window.len(), 3);
        assert_eq!(window.latest().unwrap().timestamp, 9);
    }

}
