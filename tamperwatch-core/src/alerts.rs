//! Alert lifecycle: raise, resolve, active set.
//!
//! The manager exclusively owns the alert log. Raising an already-active
//! (device, condition) pair is idempotent; resolving keeps the alert in the
//! log for audit and only removes it from the active set.

use crate::types::{AlertCondition, Severity, TamperAlert};
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{info, warn};

/// Oldest entries are dropped once the log reaches this size.
const MAX_ALERT_LOG: usize = 5_000;

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct AlertSummary {
    pub total: usize,
    pub resolved: usize,
    pub unresolved: usize,
    pub by_severity: HashMap<Severity, usize>,
    pub by_condition: HashMap<AlertCondition, usize>,
}

pub struct AlertManager {
    alerts: RwLock<Vec<TamperAlert>>,
    next_id: AtomicU64,
}

impl AlertManager {
    pub fn new() -> Self {
        Self {
            alerts: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Raise an alert for (device, condition). If one is already active for
    /// the same pair, returns its id without duplicating; an escalation to a
    /// higher severity updates the active alert in place.
    pub fn raise(
        &self,
        device_id: &str,
        condition: AlertCondition,
        severity: Severity,
        message: &str,
    ) -> u64 {
        let mut alerts = self.alerts.write();
        if let Some(existing) = alerts
            .iter_mut()
            .find(|a| !a.resolved && a.device_id == device_id && a.condition == condition)
        {
            if severity > existing.severity {
                warn!(device = %device_id, ?condition, ?severity, "Active alert escalated");
                existing.severity = severity;
                existing.message = message.to_string();
            }
            return existing.id;
        }

        if alerts.len() >= MAX_ALERT_LOG {
            alerts.remove(0);
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        warn!(device = %device_id, ?condition, ?severity, %message, "Tamper alert raised");
        alerts.push(TamperAlert {
            id,
            device_id: device_id.to_string(),
            condition,
            severity,
            message: message.to_string(),
            raised_at: Utc::now().timestamp_millis(),
            resolved: false,
            resolved_at: None,
        });
        id
    }

    /// Mark an alert resolved (operator action). Returns false if the id is
    /// unknown or already resolved.
    pub fn resolve(&self, alert_id: u64) -> bool {
        let mut alerts = self.alerts.write();
        match alerts.iter_mut().find(|a| a.id == alert_id && !a.resolved) {
            Some(alert) => {
                alert.resolved = true;
                alert.resolved_at = Some(Utc::now().timestamp_millis());
                info!(id = alert_id, device = %alert.device_id, "Alert resolved");
                true
            }
            None => false,
        }
    }

    /// Implicit clear: conditions returned to normal for this (device,
    /// condition) pair. Returns true if an active alert was cleared.
    pub fn clear_condition(&self, device_id: &str, condition: AlertCondition) -> bool {
        let mut alerts = self.alerts.write();
        match alerts
            .iter_mut()
            .find(|a| !a.resolved && a.device_id == device_id && a.condition == condition)
        {
            Some(alert) => {
                alert.resolved = true;
                alert.resolved_at = Some(Utc::now().timestamp_millis());
                info!(device = %device_id, ?condition, "Alert auto-cleared, condition back to normal");
                true
            }
            None => false,
        }
    }

    /// Resolve every active alert for one device. Returns how many were
    /// resolved.
    pub fn resolve_device(&self, device_id: &str) -> usize {
        let now = Utc::now().timestamp_millis();
        let mut alerts = self.alerts.write();
        let mut count = 0;
        for alert in alerts.iter_mut().filter(|a| !a.resolved && a.device_id == device_id) {
            alert.resolved = true;
            alert.resolved_at = Some(now);
            count += 1;
        }
        count
    }

    /// Active (unresolved) alerts, optionally filtered by device.
    pub fn active_alerts(&self, device_id: Option<&str>) -> Vec<TamperAlert> {
        self.alerts
            .read()
            .iter()
            .filter(|a| !a.resolved)
            .filter(|a| device_id.map_or(true, |d| a.device_id == d))
            .cloned()
            .collect()
    }

    pub fn active_count(&self, device_id: Option<&str>) -> usize {
        self.alerts
            .read()
            .iter()
            .filter(|a| !a.resolved)
            .filter(|a| device_id.map_or(true, |d| a.device_id == d))
            .count()
    }

    /// Full log including resolved alerts, for audit.
    pub fn all_alerts(&self) -> Vec<TamperAlert> {
        self.alerts.read().clone()
    }

    /// Summary over alerts raised within the last `horizon_hours`.
    pub fn summary(&self, horizon_hours: i64) -> AlertSummary {
        let cutoff = Utc::now().timestamp_millis() - horizon_hours * 3_600_000;
        let alerts = self.alerts.read();
        let mut summary = AlertSummary::default();
        for alert in alerts.iter().filter(|a| a.raised_at >= cutoff) {
            summary.total += 1;
            if alert.resolved {
                summary.resolved += 1;
            } else {
                summary.unresolved += 1;
            }
            *summary.by_severity.entry(alert.severity).or_default() += 1;
            *summary.by_condition.entry(alert.condition).or_default() += 1;
        }
        summary
    }
}

impl Default for AlertManager {
    fn default() -> Self {
        Self::new()
    }
}
