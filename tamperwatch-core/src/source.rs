//! Backend reading sources.
//!
//! A monitor in external mode pulls its window through a `ReadingSource`
//! instead of generating it. The HTTP implementation follows the backend's
//! REST contract; envelope fields it does not recognize are ignored so the
//! backend can evolve without breaking pollers.

use crate::error::{TamperError, TamperResult};
use crate::types::{Device, DeviceType, HealthReport, Reading, TamperAlert};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{info, warn};

/// Anything that can supply a window of readings for one device stream.
#[async_trait]
pub trait ReadingSource: Send + Sync {
    async fn fetch_readings(
        &self,
        device_type: DeviceType,
        device_id: &str,
    ) -> TamperResult<Vec<Reading>>;
}

#[derive(Debug, Deserialize)]
struct ReadingsEnvelope {
    readings: Vec<Reading>,
}

#[derive(Debug, Deserialize)]
struct DevicesEnvelope {
    devices: Vec<Device>,
}

#[derive(Debug, Deserialize)]
struct AlertsEnvelope {
    alerts: Vec<TamperAlert>,
}

/// REST client for the monitoring backend.
pub struct HttpSource {
    http: reqwest::Client,
    base_url: String,
    total_requests: AtomicU64,
    total_errors: AtomicU64,
}

impl HttpSource {
    pub fn new(base_url: &str) -> TamperResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .user_agent("tamperwatch/0.3")
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            total_requests: AtomicU64::new(0),
            total_errors: AtomicU64::new(0),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> TamperResult<T> {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        let url = self.url(path);
        let resp = self.http.get(&url).send().await.map_err(|e| {
            self.total_errors.fetch_add(1, Ordering::Relaxed);
            e
        })?;
        if !resp.status().is_success() {
            self.total_errors.fetch_add(1, Ordering::Relaxed);
            return Err(TamperError::Source {
                stream: url,
                reason: format!("backend returned {}", resp.status()),
            });
        }
        Ok(resp.json::<T>().await?)
    }

    /// List registered devices, optionally filtered by type.
    pub async fn fetch_devices(&self, device_type: Option<DeviceType>) -> TamperResult<Vec<Device>> {
        let path = match device_type {
            Some(t) => format!("/devices?type={}", t.as_str()),
            None => "/devices".to_string(),
        };
        let envelope: DevicesEnvelope = self.get_json(&path).await?;
        info!(count = envelope.devices.len(), "Fetched device list");
        Ok(envelope.devices)
    }

    pub async fn fetch_health(&self, device_id: &str) -> TamperResult<HealthReport> {
        self.get_json(&format!("/devices/{}/health", device_id)).await
    }

    pub async fn fetch_alerts(&self, device_id: Option<&str>) -> TamperResult<Vec<TamperAlert>> {
        let path = match device_id {
            Some(id) => format!("/alerts?device_id={}", id),
            None => "/alerts".to_string(),
        };
        let envelope: AlertsEnvelope = self.get_json(&path).await?;
        Ok(envelope.alerts)
    }

    /// Push an operator resolution back to the backend.
    pub async fn resolve_alert(&self, alert_id: u64) -> TamperResult<()> {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        let url = self.url(&format!("/alerts/{}/resolve", alert_id));
        let resp = self.http.post(&url).send().await.map_err(|e| {
            self.total_errors.fetch_add(1, Ordering::Relaxed);
            e
        })?;
        if !resp.status().is_success() {
            self.total_errors.fetch_add(1, Ordering::Relaxed);
            warn!(alert_id, status = %resp.status(), "Remote alert resolution rejected");
            return Err(TamperError::AlertNotFound(alert_id));
        }
        info!(alert_id, "Alert resolved on backend");
        Ok(())
    }

    pub fn total_requests(&self) -> u64 {
        self.total_requests.load(Ordering::Relaxed)
    }

    pub fn total_errors(&self) -> u64 {
        self.total_errors.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ReadingSource for HttpSource {
    async fn fetch_readings(
        &self,
        device_type: DeviceType,
        device_id: &str,
    ) -> TamperResult<Vec<Reading>> {
        let path = format!("/{}/readings/{}", device_type.as_str(), device_id);
        let envelope: ReadingsEnvelope = self.get_json(&path).await?;
        Ok(envelope.readings)
    }
}
