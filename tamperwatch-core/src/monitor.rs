//! Per-stream owner and polling scheduler.
//!
//! Each `StreamMonitor` owns exactly one stream's window, statistics, status,
//! and latest reading; every update flows through its `tick`, so updates
//! within a stream are strictly serialized. The periodic driver follows the
//! suite-wide pattern: an `AtomicBool` running flag checked by a spawned
//! interval loop, so `stop()` is deterministic and an in-flight fetch that
//! lands after `stop()` is discarded rather than applied.

use crate::alerts::AlertManager;
use crate::classifier::{classify_dispense, classify_reading, DispenseCycle, DispenseState};
use crate::config::{AnomalyConfig, ThresholdConfig};
use crate::simulator::{DataSimulator, ScaleWalkState};
use crate::source::ReadingSource;
use crate::stats::{self, WindowStats};
use crate::types::{AlertCondition, DeviceType, DriftIndicator, Reading, Severity, Status};
use crate::window::RollingWindow;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// How a stream obtains new readings on each tick.
pub enum Generation {
    /// Independent noise around the device baseline (seed + general feeds).
    Batch(DataSimulator),
    /// Smoothed directional random walk (weighing-scale live view).
    ScaleWalk {
        sim: DataSimulator,
        state: ScaleWalkState,
    },
    /// Backend-fed stream conforming to the fetch contract.
    External(Arc<dyn ReadingSource>),
}

struct StreamState {
    window: RollingWindow,
    stats: WindowStats,
    current: Option<Reading>,
    status: Status,
    indicator: DriftIndicator,
    last_condition: Option<AlertCondition>,
    anomaly_active: bool,
    error: Option<String>,
    generation: Generation,
}

/// Read-only view of a stream handed to consumers.
#[derive(Debug, Clone)]
pub struct StreamSnapshot {
    pub data: Vec<Reading>,
    pub current: Option<Reading>,
    pub stats: WindowStats,
    pub status: Status,
    pub indicator: DriftIndicator,
    pub error: Option<String>,
}

pub struct StreamMonitor {
    stream_id: String,
    device_type: DeviceType,
    state: RwLock<StreamState>,
    alerts: Arc<AlertManager>,
    thresholds: ThresholdConfig,
    anomaly: AnomalyConfig,
    running: Arc<AtomicBool>,
    ticks: AtomicU64,
}

impl StreamMonitor {
    pub fn new(
        stream_id: &str,
        device_type: DeviceType,
        capacity: usize,
        generation: Generation,
        thresholds: ThresholdConfig,
        anomaly: AnomalyConfig,
        alerts: Arc<AlertManager>,
    ) -> Self {
        Self {
            stream_id: stream_id.to_string(),
            device_type,
            state: RwLock::new(StreamState {
                window: RollingWindow::new(capacity),
                stats: WindowStats::ZERO,
                current: None,
                status: Status::Healthy,
                indicator: DriftIndicator::Normal,
                last_condition: None,
                anomaly_active: false,
                error: None,
                generation,
            }),
            alerts,
            thresholds,
            anomaly,
            running: Arc::new(AtomicBool::new(false)),
            ticks: AtomicU64::new(0),
        }
    }

    pub fn stream_id(&self) -> &str {
        &self.stream_id
    }

    pub fn device_type(&self) -> DeviceType {
        self.device_type
    }

    pub fn capacity(&self) -> usize {
        self.state.read().window.capacity()
    }

    /// Fill the window with an initial batch before periodic updates start.
    /// For walk mode the walk continues from the last seeded weight.
    pub fn seed_initial(&self, count: usize) {
        let mut state = self.state.write();
        let readings = match &mut state.generation {
            Generation::Batch(sim) => sim.generate(self.device_type, count),
            Generation::ScaleWalk { sim, state: walk } => {
                let readings = sim.generate_weighing_scale(count);
                if let Some(last) = readings.last() {
                    let weight = last.primary_value();
                    *walk = ScaleWalkState {
                        base_weight: weight,
                        drift_direction: walk.drift_direction,
                        last_weight: weight,
                    };
                }
                readings
            }
            Generation::External(_) => Vec::new(),
        };
        for reading in readings {
            state.window.append(reading);
        }
        state.current = state.window.latest().cloned();
        state.stats = stats::compute(&state.window);
        info!(stream = %self.stream_id, points = state.window.len(), "Stream seeded");
    }

    /// One scheduled unit of work: acquire a reading, append it, recompute
    /// statistics, reclassify, and update alert state.
    pub async fn tick(&self) {
        match self.next_reading().await {
            Ok(Some(reading)) => self.apply_reading(reading),
            // External mode replaces the window wholesale inside
            // `next_reading`; nothing further to apply.
            Ok(None) => {}
            Err(reason) => {
                // Source failure: previous window/stats stay untouched.
                warn!(stream = %self.stream_id, %reason, "Tick failed, keeping previous state");
                self.state.write().error = Some(reason);
            }
        }
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }

    async fn next_reading(&self) -> Result<Option<Reading>, String> {
        // Clone the source handle out so no lock is held across the fetch.
        let was_running = self.running.load(Ordering::Relaxed);
        let source = {
            let mut state = self.state.write();
            match &mut state.generation {
                Generation::Batch(sim) => {
                    let reading = sim
                        .generate(self.device_type, 1)
                        .into_iter()
                        .next()
                        .ok_or_else(|| "generator produced no reading".to_string())?;
                    return Ok(Some(reading));
                }
                Generation::ScaleWalk { sim, state: walk } => {
                    let (next, reading) = sim.step_walk(*walk);
                    *walk = next;
                    return Ok(Some(reading));
                }
                Generation::External(source) => Arc::clone(source),
            }
        };

        let fetched = source
            .fetch_readings(self.device_type, &self.stream_id)
            .await
            .map_err(|e| e.to_string())?;

        // Discard results that land after cancellation. Manual one-shot
        // refreshes outside the scheduler still apply.
        if was_running && !self.running.load(Ordering::Relaxed) {
            debug!(stream = %self.stream_id, "Fetch completed after stop, discarded");
            return Ok(None);
        }

        let mut readings = fetched;
        stats::flag_anomalies(&mut readings, self.anomaly.batch_z_threshold);

        let mut state = self.state.write();
        state.window.replace(readings);
        state.current = state.window.latest().cloned();
        state.stats = stats::compute(&state.window);
        state.error = None;
        if let Some(current) = state.current.clone() {
            self.reclassify(&mut state, &current);
        }
        Ok(None)
    }

    fn apply_reading(&self, mut reading: Reading) {
        let mut state = self.state.write();

        // Tag against pre-append history, then classify against the same.
        let history = state.window.values();
        reading.is_anomaly = history.len() >= self.anomaly.min_history
            && stats::is_anomaly(
                reading.primary_value(),
                &history,
                self.anomaly.z_score_threshold,
            );
        self.reclassify(&mut state, &reading);

        state.window.append(reading.clone());
        state.stats = stats::compute(&state.window);
        state.current = Some(reading);
        state.error = None;
    }

    /// Status/alert update from one reading. Classification is recomputed
    /// from scratch; the previous tick's condition is cleared if it no
    /// longer holds.
    fn reclassify(&self, state: &mut StreamState, reading: &Reading) {
        let classification = classify_reading(reading, &state.window, &self.thresholds);
        state.status = classification.status;
        state.indicator = classification.indicator;

        match &classification.condition {
            Some(tamper) => {
                if let Some(previous) = state.last_condition {
                    if previous != tamper.condition {
                        self.alerts.clear_condition(&self.stream_id, previous);
                    }
                }
                self.alerts.raise(
                    &self.stream_id,
                    tamper.condition,
                    tamper.severity,
                    &tamper.message,
                );
                state.last_condition = Some(tamper.condition);
            }
            None => {
                if let Some(previous) = state.last_condition.take() {
                    self.alerts.clear_condition(&self.stream_id, previous);
                }
            }
        }

        // Z-score tagging surfaces as a low-severity alert of its own.
        if reading.is_anomaly {
            self.alerts.raise(
                &self.stream_id,
                AlertCondition::AnomalySpike,
                Severity::Low,
                "Reading outside recent statistical profile",
            );
            state.anomaly_active = true;
        } else if state.anomaly_active {
            self.alerts
                .clear_condition(&self.stream_id, AlertCondition::AnomalySpike);
            state.anomaly_active = false;
        }
    }

    /// Start the periodic driver. Each loop iteration re-checks the running
    /// flag so `stop()` takes effect at the next tick boundary.
    pub fn start_periodic(self: &Arc<Self>, interval_ms: u64) {
        self.running.store(true, Ordering::Relaxed);
        let monitor = Arc::clone(self);
        info!(stream = %self.stream_id, interval_ms, "Stream monitor started");

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(std::time::Duration::from_millis(interval_ms));
            while monitor.running.load(Ordering::Relaxed) {
                ticker.tick().await;
                if !monitor.running.load(Ordering::Relaxed) {
                    break;
                }
                monitor.tick().await;
            }
            debug!(stream = %monitor.stream_id, "Stream monitor loop exited");
        });
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::Relaxed);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    pub fn ticks_completed(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    /// Regenerate the whole window (simulated) or re-fetch it (external).
    pub async fn refresh(&self) {
        let capacity = self.state.read().window.capacity();
        let is_external = matches!(self.state.read().generation, Generation::External(_));
        if is_external {
            self.tick().await;
        } else {
            self.state.write().window.clear();
            self.seed_initial(capacity);
            let mut state = self.state.write();
            if let Some(current) = state.current.clone() {
                self.reclassify(&mut state, &current);
            }
        }
    }

    /// Manually append one reading through the normal pipeline.
    pub fn add_reading(&self, reading: Reading) {
        self.apply_reading(reading);
    }

    /// Empty the window and reset derived state to zero.
    pub fn clear(&self) {
        let mut state = self.state.write();
        state.window.clear();
        state.stats = WindowStats::ZERO;
        state.current = None;
        state.status = Status::Healthy;
        state.indicator = DriftIndicator::Normal;
        state.error = None;
    }

    pub fn snapshot(&self) -> StreamSnapshot {
        let state = self.state.read();
        StreamSnapshot {
            data: state.window.to_vec(),
            current: state.current.clone(),
            stats: state.stats,
            status: state.status,
            indicator: state.indicator,
            error: state.error.clone(),
        }
    }
}

// ── Dispense cycle monitor ───────────────────────────────────────────────────

/// Drives one fuel-dispense demo cycle, raising and clearing volume alerts
/// as the cycle crosses the warning/critical thresholds.
pub struct DispenseMonitor {
    device_id: String,
    cycle: DispenseCycle,
    status: Status,
    alert_active: bool,
    alerts: Arc<AlertManager>,
    thresholds: ThresholdConfig,
}

impl DispenseMonitor {
    pub fn new(device_id: &str, thresholds: ThresholdConfig, alerts: Arc<AlertManager>) -> Self {
        Self {
            device_id: device_id.to_string(),
            cycle: DispenseCycle::new(),
            status: Status::Healthy,
            alert_active: false,
            alerts,
            thresholds,
        }
    }

    pub fn start(&mut self) {
        self.cycle.start();
        self.status = Status::Healthy;
    }

    pub fn tick(&mut self) -> DispenseState {
        let state = self.cycle.tick();
        let classification = classify_dispense(
            self.cycle.dispensed(),
            self.cycle.is_dispensing(),
            &self.thresholds,
        );
        self.status = classification.status;

        match classification.condition {
            Some(tamper) => {
                self.alerts.raise(
                    &self.device_id,
                    tamper.condition,
                    tamper.severity,
                    &tamper.message,
                );
                self.alert_active = true;
            }
            None => {
                if self.alert_active {
                    self.alerts
                        .clear_condition(&self.device_id, AlertCondition::DispenseVolume);
                    self.alert_active = false;
                }
            }
        }
        state
    }

    pub fn reset(&mut self) {
        self.cycle.reset();
        self.status = Status::Healthy;
        if self.alert_active {
            self.alerts
                .clear_condition(&self.device_id, AlertCondition::DispenseVolume);
            self.alert_active = false;
        }
    }

    pub fn state(&self) -> DispenseState {
        self.cycle.state()
    }

    pub fn dispensed(&self) -> f64 {
        self.cycle.dispensed()
    }

    pub fn status(&self) -> Status {
        self.status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AnomalyConfig, ThresholdConfig};

    fn batch_monitor(device_type: DeviceType, capacity: usize) -> Arc<StreamMonitor> {
        Arc::new(StreamMonitor::new(
            "test-stream",
            device_type,
            capacity,
            Generation::Batch(DataSimulator::new(42)),
            ThresholdConfig::default(),
            AnomalyConfig::default(),
            Arc::new(AlertManager::new()),
        ))
    }

    #[tokio::test]
    async fn seed_then_ticks_respect_capacity() {
        let monitor = batch_monitor(DeviceType::WeighingScale, 50);
        monitor.seed_initial(50);
        assert_eq!(monitor.snapshot().data.len(), 50);

        for _ in 0..20 {
            monitor.tick().await;
        }
        let snapshot = monitor.snapshot();
        assert_eq!(snapshot.data.len(), 50);
        assert_eq!(monitor.ticks_completed(), 20);
        assert!(snapshot.current.is_some());
        assert!(snapshot.stats.average > 0.0);
    }

    #[tokio::test]
    async fn clear_resets_to_zero_state() {
        let monitor = batch_monitor(DeviceType::EnergyMeter, 50);
        monitor.seed_initial(50);
        monitor.clear();

        let snapshot = monitor.snapshot();
        assert!(snapshot.data.is_empty());
        assert!(snapshot.current.is_none());
        assert_eq!(snapshot.stats, WindowStats::ZERO);
        assert_eq!(snapshot.status, Status::Healthy);
    }

    #[tokio::test]
    async fn walk_mode_produces_smooth_series() {
        let monitor = Arc::new(StreamMonitor::new(
            "scale-live",
            DeviceType::WeighingScale,
            60,
            Generation::ScaleWalk {
                sim: DataSimulator::new(7),
                state: ScaleWalkState::new(),
            },
            ThresholdConfig::default(),
            AnomalyConfig::default(),
            Arc::new(AlertManager::new()),
        ));
        monitor.seed_initial(60);
        let seeded_last = monitor.snapshot().current.unwrap().primary_value();

        monitor.tick().await;
        let next = monitor.snapshot().current.unwrap().primary_value();
        // The walk continues from the seeded weight in small steps.
        assert!((next - seeded_last).abs() <= 0.33);
    }

    #[tokio::test]
    async fn scheduler_stops_deterministically() {
        let monitor = batch_monitor(DeviceType::FuelDispenser, 50);
        monitor.seed_initial(50);
        monitor.start_periodic(10);
        tokio::time::sleep(std::time::Duration::from_millis(80)).await;
        monitor.stop();
        assert!(!monitor.is_running());

        tokio::time::sleep(std::time::Duration::from_millis(30)).await;
        let after_stop = monitor.ticks_completed();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(monitor.ticks_completed(), after_stop);
    }

    #[tokio::test]
    async fn manual_add_reading_drives_alerts() {
        let alerts = Arc::new(AlertManager::new());
        let monitor = StreamMonitor::new(
            "WS-001",
            DeviceType::WeighingScale,
            60,
            Generation::Batch(DataSimulator::new(1)),
            ThresholdConfig::default(),
            AnomalyConfig::default(),
            alerts.clone(),
        );

        let drifted = Reading {
            timestamp: 0,
            is_anomaly: false,
            measurement: crate::types::Measurement::WeighingScale {
                weight: 55.0,
                calibration_drift: 5.0,
            },
        };
        monitor.add_reading(drifted);
        assert_eq!(monitor.snapshot().status, Status::Critical);
        assert_eq!(monitor.snapshot().indicator, DriftIndicator::Alert);
        assert_eq!(alerts.active_count(Some("WS-001")), 1);

        let normal = Reading {
            timestamp: 1,
            is_anomaly: false,
            measurement: crate::types::Measurement::WeighingScale {
                weight: 50.0,
                calibration_drift: 0.0,
            },
        };
        monitor.add_reading(normal);
        assert_eq!(monitor.snapshot().status, Status::Healthy);
        // Back-to-normal auto-clears the drift alert.
        assert_eq!(alerts.active_count(Some("WS-001")), 0);
    }
}
