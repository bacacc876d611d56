//! Monitoring configuration — every threshold and cadence the pipeline uses
//! is an overridable field here, loaded from TOML with serde defaults.

use crate::error::TamperResult;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub windows: WindowConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub anomaly: AnomalyConfig,
    #[serde(default)]
    pub thresholds: ThresholdConfig,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            windows: WindowConfig::default(),
            polling: PollingConfig::default(),
            anomaly: AnomalyConfig::default(),
            thresholds: ThresholdConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    pub log_level: String,
    /// Seed for the simulated reading generators. `None` seeds from entropy.
    pub seed: Option<u64>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    /// Capacity for general device streams.
    pub general_capacity: usize,
    /// Capacity for the weighing-scale live view.
    pub scale_live_capacity: usize,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            general_capacity: crate::DEFAULT_WINDOW_CAPACITY,
            scale_live_capacity: crate::SCALE_LIVE_WINDOW_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// General device data cadence.
    pub general_interval_ms: u64,
    /// Dashboard fuel feed cadence.
    pub fuel_feed_interval_ms: u64,
    /// Weighing-scale live view cadence.
    pub scale_live_interval_ms: u64,
    /// Alert list refresh cadence for polling consumers.
    pub alert_refresh_secs: u64,
    /// Device health refresh cadence.
    pub health_refresh_secs: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            general_interval_ms: 2_000,
            fuel_feed_interval_ms: 1_000,
            scale_live_interval_ms: 700,
            alert_refresh_secs: 10,
            health_refresh_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyConfig {
    /// Z-score threshold for per-reading anomaly tagging.
    pub z_score_threshold: f64,
    /// Z-score threshold for batch re-tagging of a whole window.
    pub batch_z_threshold: f64,
    /// Minimum history length before the z-score test applies.
    pub min_history: usize,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            z_score_threshold: 2.0,
            batch_z_threshold: 2.5,
            min_history: 3,
        }
    }
}

/// Tamper classification thresholds. Comparisons are strict `>` throughout,
/// matching the deployed behavior: a value exactly at a boundary classifies
/// into the lower band.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdConfig {
    /// kg of calibration drift above which the scale is DRIFTING.
    pub drift_warning: f64,
    /// kg of calibration drift above which the scale is in ALERT.
    pub drift_critical: f64,
    /// Liters dispensed above which a flow-rate anomaly is flagged.
    pub dispense_warning_l: f64,
    /// Liters dispensed above which a pressure spike is flagged.
    pub dispense_critical_l: f64,
    /// Absolute voltage fallback when history is too short for a z-test.
    pub voltage_spike_v: f64,
    /// Z-score bound for voltage spikes against window history.
    pub voltage_z_score: f64,
    /// Tesla; magnetic interference above this is tampering.
    pub magnetic_field_t: f64,
    /// Fractional drop below the window mean flow that flags irregularity.
    pub flow_drop_fraction: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            drift_warning: 2.0,
            drift_critical: 4.0,
            dispense_warning_l: 30.0,
            dispense_critical_l: 35.0,
            voltage_spike_v: 250.0,
            voltage_z_score: 3.0,
            magnetic_field_t: 1.0,
            flow_drop_fraction: 0.3,
        }
    }
}

impl MonitorConfig {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> TamperResult<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: MonitorConfig = toml::from_str(&raw)?;
        info!(path = %path.as_ref().display(), "Configuration loaded");
        Ok(config)
    }

    /// Write the configuration (e.g. generated defaults) to a TOML file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> TamperResult<()> {
        let raw = toml::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), raw)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_cadences() {
        let c = MonitorConfig::default();
        assert_eq!(c.windows.general_capacity, 50);
        assert_eq!(c.windows.scale_live_capacity, 60);
        assert_eq!(c.polling.general_interval_ms, 2_000);
        assert_eq!(c.polling.scale_live_interval_ms, 700);
        assert_eq!(c.polling.alert_refresh_secs, 10);
        assert_eq!(c.polling.health_refresh_secs, 30);
        assert_eq!(c.thresholds.drift_warning, 2.0);
        assert_eq!(c.thresholds.drift_critical, 4.0);
    }

    #[test]
    fn partial_toml_falls_back_to_defaults() {
        let config: MonitorConfig = toml::from_str(
            r#"
            [thresholds]
            drift_warning = 1.5
            drift_critical = 3.0
            dispense_warning_l = 30.0
            dispense_critical_l = 35.0
            voltage_spike_v = 250.0
            voltage_z_score = 3.0
            magnetic_field_t = 1.0
            flow_drop_fraction = 0.3
            "#,
        )
        .unwrap();
        assert_eq!(config.thresholds.drift_warning, 1.5);
        assert_eq!(config.windows.general_capacity, 50);
    }

    #[test]
    fn save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tamperwatch.toml");
        let mut config = MonitorConfig::default();
        config.general.seed = Some(42);
        config.save(&path).unwrap();

        let loaded = MonitorConfig::load(&path).unwrap();
        assert_eq!(loaded.general.seed, Some(42));
        assert_eq!(loaded.anomaly.z_score_threshold, 2.0);
    }
}
