//! Threshold-based tamper/status classification.
//!
//! Classification is a pure function of the latest reading plus the window
//! history — evaluated fresh on every tick, no debouncing or hysteresis.
//! All boundary comparisons are strict `>`: a value exactly at a threshold
//! classifies into the lower band.

use crate::config::ThresholdConfig;
use crate::stats::mean_stddev;
use crate::types::{AlertCondition, DriftIndicator, Measurement, Reading, Severity, Status};
use crate::window::RollingWindow;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Minimum history before statistical tamper checks replace absolute
/// fallbacks.
const MIN_TAMPER_HISTORY: usize = 5;

/// A classified tamper condition ready to be raised as an alert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TamperCondition {
    pub condition: AlertCondition,
    pub severity: Severity,
    pub message: String,
}

/// The classifier's verdict for one reading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub status: Status,
    /// Scale-specific drift badge; `Normal` for other device types.
    pub indicator: DriftIndicator,
    pub condition: Option<TamperCondition>,
}

impl Classification {
    fn healthy() -> Self {
        Self {
            status: Status::Healthy,
            indicator: DriftIndicator::Normal,
            condition: None,
        }
    }
}

/// Classify the latest reading against the pre-append window history.
pub fn classify_reading(
    reading: &Reading,
    history: &RollingWindow,
    thresholds: &ThresholdConfig,
) -> Classification {
    match &reading.measurement {
        Measurement::WeighingScale {
            calibration_drift, ..
        } => classify_scale_drift(*calibration_drift, thresholds),
        Measurement::EnergyMeter { voltage, .. } => {
            classify_voltage(*voltage, history, thresholds)
        }
        Measurement::FuelDispenser {
            flow_rate,
            magnetic_field,
            ..
        } => classify_fuel(*flow_rate, *magnetic_field, history, thresholds),
    }
}

/// Weighing scale: drift > critical ⇒ ALERT, drift > warning ⇒ DRIFTING,
/// else NORMAL.
pub fn classify_scale_drift(drift: f64, thresholds: &ThresholdConfig) -> Classification {
    if drift > thresholds.drift_critical {
        Classification {
            status: Status::Critical,
            indicator: DriftIndicator::Alert,
            condition: Some(TamperCondition {
                condition: AlertCondition::WeightDrift,
                severity: Severity::High,
                message: format!("Calibration drift {:.2} kg exceeds alert threshold", drift),
            }),
        }
    } else if drift > thresholds.drift_warning {
        Classification {
            status: Status::Warning,
            indicator: DriftIndicator::Drifting,
            condition: Some(TamperCondition {
                condition: AlertCondition::WeightDrift,
                severity: Severity::Medium,
                message: format!("Calibration drift {:.2} kg is drifting", drift),
            }),
        }
    } else {
        Classification::healthy()
    }
}

/// Energy meter: voltage z-score > bound against window history, or the
/// absolute spike fallback when history is too short.
fn classify_voltage(
    voltage: f64,
    history: &RollingWindow,
    thresholds: &ThresholdConfig,
) -> Classification {
    let voltages: Vec<f64> = history
        .iter()
        .filter_map(|r| match r.measurement {
            Measurement::EnergyMeter { voltage, .. } => Some(voltage),
            _ => None,
        })
        .collect();

    let spiked = if voltages.len() < MIN_TAMPER_HISTORY {
        voltage > thresholds.voltage_spike_v
    } else {
        let (mean, stddev) = mean_stddev(&voltages);
        if stddev > 0.0 {
            ((voltage - mean) / stddev).abs() > thresholds.voltage_z_score
        } else {
            voltage > thresholds.voltage_spike_v
        }
    };

    if spiked {
        Classification {
            status: Status::Critical,
            indicator: DriftIndicator::Normal,
            condition: Some(TamperCondition {
                condition: AlertCondition::VoltageSpike,
                severity: Severity::High,
                message: format!("Voltage spike: {:.2} V deviates from recent profile", voltage),
            }),
        }
    } else {
        Classification::healthy()
    }
}

/// Fuel dispenser: magnetic interference above the Tesla bound is tampering;
/// otherwise a sudden drop below the window's mean flow flags irregularity.
fn classify_fuel(
    flow_rate: f64,
    magnetic_field: f64,
    history: &RollingWindow,
    thresholds: &ThresholdConfig,
) -> Classification {
    if magnetic_field > thresholds.magnetic_field_t {
        return Classification {
            status: Status::Critical,
            indicator: DriftIndicator::Normal,
            condition: Some(TamperCondition {
                condition: AlertCondition::MagneticTamper,
                severity: Severity::Critical,
                message: format!(
                    "Magnetic field {:.2} T indicates pulser tampering",
                    magnetic_field
                ),
            }),
        };
    }

    let flows: Vec<f64> = history
        .iter()
        .filter_map(|r| match r.measurement {
            Measurement::FuelDispenser { flow_rate, .. } => Some(flow_rate),
            _ => None,
        })
        .collect();
    if flows.len() >= MIN_TAMPER_HISTORY {
        let (mean, _) = mean_stddev(&flows);
        if mean > 0.0 {
            let drop = (mean - flow_rate) / mean;
            if drop > thresholds.flow_drop_fraction {
                return Classification {
                    status: Status::Warning,
                    indicator: DriftIndicator::Normal,
                    condition: Some(TamperCondition {
                        condition: AlertCondition::FlowDrop,
                        severity: Severity::Medium,
                        message: format!(
                            "Flow rate {:.2} L/min dropped {:.0}% below recent mean",
                            flow_rate,
                            drop * 100.0
                        ),
                    }),
                };
            }
        }
    }

    Classification::healthy()
}

/// Classify a dispense cycle by accumulated volume while dispensing.
pub fn classify_dispense(
    volume: f64,
    dispensing: bool,
    thresholds: &ThresholdConfig,
) -> Classification {
    if !dispensing {
        return Classification::healthy();
    }
    if volume > thresholds.dispense_critical_l {
        Classification {
            status: Status::Critical,
            indicator: DriftIndicator::Normal,
            condition: Some(TamperCondition {
                condition: AlertCondition::DispenseVolume,
                severity: Severity::Critical,
                message: "Pressure spike detected".into(),
            }),
        }
    } else if volume > thresholds.dispense_warning_l {
        Classification {
            status: Status::Warning,
            indicator: DriftIndicator::Normal,
            condition: Some(TamperCondition {
                condition: AlertCondition::DispenseVolume,
                severity: Severity::High,
                message: "Flow rate anomaly detected".into(),
            }),
        }
    } else {
        Classification::healthy()
    }
}

// ── Dispense cycle state machine ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DispenseState {
    Idle,
    Dispensing,
    Complete,
}

/// One simulated dispensing run: volume advances a fixed increment per tick
/// until the target is reached.
#[derive(Debug, Clone)]
pub struct DispenseCycle {
    state: DispenseState,
    dispensed: f64,
    increment: f64,
    target: f64,
}

impl DispenseCycle {
    /// Reference demo: 0.8 L per 100 ms tick, completing at 50 L.
    pub fn new() -> Self {
        Self::with_rate(0.8, 50.0)
    }

    pub fn with_rate(increment: f64, target: f64) -> Self {
        Self {
            state: DispenseState::Idle,
            dispensed: 0.0,
            increment,
            target,
        }
    }

    pub fn start(&mut self) {
        self.state = DispenseState::Dispensing;
        self.dispensed = 0.0;
    }

    /// Advance one tick. Transitions DISPENSING → COMPLETE exactly when the
    /// accumulated volume reaches the target.
    pub fn tick(&mut self) -> DispenseState {
        if self.state == DispenseState::Dispensing {
            self.dispensed += self.increment;
            if self.dispensed >= self.target {
                self.dispensed = self.target;
                self.state = DispenseState::Complete;
                warn!(volume = self.dispensed, "Dispense cycle complete");
            }
        }
        self.state
    }

    pub fn reset(&mut self) {
        self.state = DispenseState::Idle;
        self.dispensed = 0.0;
    }

    pub fn state(&self) -> DispenseState {
        self.state
    }

    pub fn dispensed(&self) -> f64 {
        self.dispensed
    }

    pub fn is_dispensing(&self) -> bool {
        self.state == DispenseState::Dispensing
    }
}

impl Default for DispenseCycle {
    fn default() -> Self {
        Self::new()
    }
}
