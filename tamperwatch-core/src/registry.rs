//! Device registry and health scoring.

use crate::alerts::AlertManager;
use crate::types::{Device, DeviceStatus, DeviceType, HealthReport, Reading, Status};
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::info;

/// Health score thresholds. Score starts at 100 and loses 10 per active
/// alert and 5 per recent anomaly, floored at 0.
const HEALTHY_FLOOR: u8 = 80;
const WARNING_FLOOR: u8 = 50;
const ALERT_PENALTY: u32 = 10;
const ANOMALY_PENALTY: u32 = 5;

pub struct DeviceRegistry {
    devices: RwLock<HashMap<String, Device>>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self {
            devices: RwLock::new(HashMap::new()),
        }
    }

    /// Register a device, or return the existing record's id if already
    /// registered.
    pub fn register(
        &self,
        device_id: &str,
        device_type: DeviceType,
        location: Option<&str>,
    ) -> Device {
        let mut devices = self.devices.write();
        devices
            .entry(device_id.to_string())
            .or_insert_with(|| {
                info!(device = %device_id, %device_type, "Device registered");
                Device {
                    device_id: device_id.to_string(),
                    device_type,
                    location: location.map(|l| l.to_string()),
                    status: DeviceStatus::Active,
                    registered_at: Utc::now().timestamp_millis(),
                    last_seen: None,
                    last_calibration: None,
                }
            })
            .clone()
    }

    /// Record reading activity for a device.
    pub fn mark_seen(&self, device_id: &str) {
        if let Some(device) = self.devices.write().get_mut(device_id) {
            device.last_seen = Some(Utc::now().timestamp_millis());
        }
    }

    pub fn set_status(&self, device_id: &str, status: DeviceStatus) -> bool {
        match self.devices.write().get_mut(device_id) {
            Some(device) => {
                device.status = status;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, device_id: &str) -> Option<Device> {
        self.devices.read().get(device_id).cloned()
    }

    pub fn list(&self, device_type: Option<DeviceType>) -> Vec<Device> {
        let mut devices: Vec<Device> = self
            .devices
            .read()
            .values()
            .filter(|d| device_type.map_or(true, |t| d.device_type == t))
            .cloned()
            .collect();
        devices.sort_by(|a, b| a.device_id.cmp(&b.device_id));
        devices
    }

    pub fn count(&self) -> usize {
        self.devices.read().len()
    }

    /// Health score for one device from its active alerts and the anomaly
    /// count of its current window.
    pub fn health_report(
        &self,
        device_id: &str,
        alerts: &AlertManager,
        anomaly_count: usize,
        last_reading: Option<Reading>,
    ) -> HealthReport {
        let active_alert_count = alerts.active_count(Some(device_id));
        let penalty =
            active_alert_count as u32 * ALERT_PENALTY + anomaly_count as u32 * ANOMALY_PENALTY;
        let health_score = 100u32.saturating_sub(penalty) as u8;

        let status = if health_score >= HEALTHY_FLOOR {
            Status::Healthy
        } else if health_score >= WARNING_FLOOR {
            Status::Warning
        } else {
            Status::Critical
        };

        HealthReport {
            device_id: device_id.to_string(),
            health_score,
            status,
            active_alert_count,
            anomaly_count,
            last_reading,
        }
    }
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AlertCondition, Severity};

    #[test]
    fn register_is_idempotent() {
        let registry = DeviceRegistry::new();
        let first = registry.register("WS-001", DeviceType::WeighingScale, Some("Lane 3"));
        let second = registry.register("WS-001", DeviceType::WeighingScale, None);
        assert_eq!(first.registered_at, second.registered_at);
        assert_eq!(second.location.as_deref(), Some("Lane 3"));
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn list_filters_by_type_and_sorts() {
        let registry = DeviceRegistry::new();
        registry.register("FD-002", DeviceType::FuelDispenser, None);
        registry.register("FD-001", DeviceType::FuelDispenser, None);
        registry.register("EM-001", DeviceType::EnergyMeter, None);

        let fuel = registry.list(Some(DeviceType::FuelDispenser));
        assert_eq!(fuel.len(), 2);
        assert_eq!(fuel[0].device_id, "FD-001");
        assert_eq!(registry.list(None).len(), 3);
    }

    #[test]
    fn health_score_bands() {
        let registry = DeviceRegistry::new();
        registry.register("EM-001", DeviceType::EnergyMeter, None);
        let alerts = AlertManager::new();

        // No alerts, no anomalies: perfect score.
        let report = registry.health_report("EM-001", &alerts, 0, None);
        assert_eq!(report.health_score, 100);
        assert_eq!(report.status, Status::Healthy);

        // 1 alert + 2 anomalies: 100 - 10 - 10 = 80, still healthy.
        alerts.raise("EM-001", AlertCondition::VoltageSpike, Severity::High, "spike");
        let report = registry.health_report("EM-001", &alerts, 2, None);
        assert_eq!(report.health_score, 80);
        assert_eq!(report.status, Status::Healthy);

        // 3 alerts + 4 anomalies: 100 - 30 - 20 = 50, warning floor.
        alerts.raise("EM-001", AlertCondition::AnomalySpike, Severity::Low, "a");
        alerts.raise("EM-001", AlertCondition::FlowDrop, Severity::Medium, "b");
        let report = registry.health_report("EM-001", &alerts, 4, None);
        assert_eq!(report.health_score, 50);
        assert_eq!(report.status, Status::Warning);

        // Heavy anomaly load saturates at 0 rather than underflowing.
        let report = registry.health_report("EM-001", &alerts, 30, None);
        assert_eq!(report.health_score, 0);
        assert_eq!(report.status, Status::Critical);
    }

    #[test]
    fn set_status_flags_tampered_devices() {
        let registry = DeviceRegistry::new();
        registry.register("FD-001", DeviceType::FuelDispenser, None);
        assert!(registry.set_status("FD-001", DeviceStatus::Tampered));
        assert!(!registry.set_status("FD-999", DeviceStatus::Tampered));
        assert_eq!(registry.get("FD-001").unwrap().status, DeviceStatus::Tampered);
    }
}
