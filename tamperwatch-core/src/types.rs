//! Shared types for the tamper monitoring pipeline.

use serde::{Deserialize, Serialize};

/// The three monitored metrology device categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceType {
    WeighingScale,
    EnergyMeter,
    FuelDispenser,
}

impl DeviceType {
    /// Wire/path name, e.g. `weighing_scale` in `GET /{type}/readings/{id}`.
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceType::WeighingScale => "weighing_scale",
            DeviceType::EnergyMeter => "energy_meter",
            DeviceType::FuelDispenser => "fuel_dispenser",
        }
    }
}

impl std::fmt::Display for DeviceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NozzleState {
    Open,
    Closed,
}

/// One timestamped device measurement. The measurement payload is a tagged
/// union per device type, so every reading carries a named canonical value —
/// no field-order fallback chains.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reading {
    /// Unix timestamp, milliseconds.
    pub timestamp: i64,
    /// Set by the z-score tagger or an upstream anomaly process.
    #[serde(default)]
    pub is_anomaly: bool,
    #[serde(flatten)]
    pub measurement: Measurement,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "device_type", rename_all = "snake_case")]
pub enum Measurement {
    WeighingScale {
        /// kg
        weight: f64,
        /// |weight − baseline| in kg
        calibration_drift: f64,
    },
    EnergyMeter {
        /// V
        voltage: f64,
        /// A
        current: f64,
        /// kW
        power: f64,
    },
    FuelDispenser {
        /// L/min
        flow_rate: f64,
        /// cumulative liters
        totalizer: f64,
        pulse_count: u32,
        /// T
        magnetic_field: f64,
        /// bar
        pressure: f64,
        nozzle_state: NozzleState,
    },
}

impl Measurement {
    pub fn device_type(&self) -> DeviceType {
        match self {
            Measurement::WeighingScale { .. } => DeviceType::WeighingScale,
            Measurement::EnergyMeter { .. } => DeviceType::EnergyMeter,
            Measurement::FuelDispenser { .. } => DeviceType::FuelDispenser,
        }
    }

    /// The canonical per-type value: weight (kg), power (kW), or flow rate
    /// (L/min).
    pub fn primary_value(&self) -> f64 {
        match self {
            Measurement::WeighingScale { weight, .. } => *weight,
            Measurement::EnergyMeter { power, .. } => *power,
            Measurement::FuelDispenser { flow_rate, .. } => *flow_rate,
        }
    }
}

impl Reading {
    pub fn device_type(&self) -> DeviceType {
        self.measurement.device_type()
    }

    pub fn primary_value(&self) -> f64 {
        self.measurement.primary_value()
    }
}

/// Discrete per-stream severity classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Healthy,
    Warning,
    Critical,
}

/// Weight-drift indicator shown on the scale live view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DriftIndicator {
    Normal,
    Drifting,
    Alert,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// The tamper condition an alert is keyed on. Raising the same
/// (device, condition) pair twice must not duplicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertCondition {
    WeightDrift,
    VoltageSpike,
    MagneticTamper,
    FlowDrop,
    DispenseVolume,
    AnomalySpike,
}

/// A recorded, resolvable tamper/anomaly alert. Resolved alerts are retained
/// for audit and only excluded from the active set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TamperAlert {
    pub id: u64,
    pub device_id: String,
    pub condition: AlertCondition,
    pub severity: Severity,
    pub message: String,
    /// Unix timestamp, milliseconds.
    pub raised_at: i64,
    pub resolved: bool,
    pub resolved_at: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceStatus {
    Active,
    Inactive,
    Tampered,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub device_id: String,
    pub device_type: DeviceType,
    pub location: Option<String>,
    pub status: DeviceStatus,
    /// Unix timestamp, milliseconds.
    pub registered_at: i64,
    pub last_seen: Option<i64>,
    pub last_calibration: Option<i64>,
}

/// Per-device health summary derived from active alerts and recent anomalies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub device_id: String,
    /// 0–100
    pub health_score: u8,
    pub status: Status,
    pub active_alert_count: usize,
    pub anomaly_count: usize,
    pub last_reading: Option<Reading>,
}
