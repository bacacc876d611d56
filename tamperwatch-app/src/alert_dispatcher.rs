//! Routes newly raised alerts to configured outputs.
//!
//! Polls the alert log on an interval and fans each new entry out to a
//! broadcast channel, an append-only JSONL file, and an optional webhook.
//! Delivery is best effort; a failed output never blocks the poll loop.

use std::path::PathBuf;
use std::sync::Arc;
use tamperwatch_core::types::TamperAlert;
use tamperwatch_core::AlertManager;
use tokio::sync::broadcast;
use tracing::{info, warn};

pub struct AlertDispatcher {
    alerts: Arc<AlertManager>,
    log_path: Option<PathBuf>,
    webhook_url: Option<String>,
    broadcast_tx: broadcast::Sender<TamperAlert>,
    poll_interval_secs: u64,
}

impl AlertDispatcher {
    pub fn new(alerts: Arc<AlertManager>) -> Self {
        let (tx, _) = broadcast::channel(1024);
        Self {
            alerts,
            log_path: None,
            webhook_url: None,
            broadcast_tx: tx,
            poll_interval_secs: 10,
        }
    }

    pub fn with_log_file(mut self, path: &str) -> Self {
        if !path.is_empty() {
            self.log_path = Some(PathBuf::from(path));
        }
        self
    }

    pub fn with_webhook(mut self, url: &str) -> Self {
        if !url.is_empty() {
            self.webhook_url = Some(url.into());
        }
        self
    }

    pub fn with_interval(mut self, secs: u64) -> Self {
        self.poll_interval_secs = secs;
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TamperAlert> {
        self.broadcast_tx.subscribe()
    }

    /// Start the background poll loop.
    pub fn start(self) -> AlertDispatchHandle {
        let handle = AlertDispatchHandle {
            tx: self.broadcast_tx.clone(),
        };

        tokio::spawn(async move {
            let mut seen_count: usize = 0;
            let mut ticker =
                tokio::time::interval(std::time::Duration::from_secs(self.poll_interval_secs));

            if let Some(ref path) = self.log_path {
                if let Some(parent) = path.parent() {
                    let _ = std::fs::create_dir_all(parent);
                }
            }

            loop {
                ticker.tick().await;

                // The log is append-only up to its retention cap, so a count
                // suffices as a cursor.
                let alerts = self.alerts.all_alerts();
                if alerts.len() <= seen_count {
                    seen_count = alerts.len();
                    continue;
                }
                let new_alerts = &alerts[seen_count..];
                seen_count = alerts.len();

                for alert in new_alerts {
                    let _ = self.broadcast_tx.send(alert.clone());

                    if let Some(ref path) = self.log_path {
                        if let Ok(line) = serde_json::to_string(alert) {
                            use std::io::Write;
                            if let Ok(mut f) = std::fs::OpenOptions::new()
                                .create(true)
                                .append(true)
                                .open(path)
                            {
                                let _ = writeln!(f, "{}", line);
                            }
                        }
                    }

                    if let Some(ref url) = self.webhook_url {
                        let url = url.clone();
                        let payload = alert.clone();
                        tokio::spawn(async move {
                            let client = reqwest::Client::new();
                            match client
                                .post(&url)
                                .json(&payload)
                                .timeout(std::time::Duration::from_secs(5))
                                .send()
                                .await
                            {
                                Ok(resp) if resp.status().is_success() => {}
                                Ok(resp) => {
                                    warn!(status = %resp.status(), "Webhook response not OK")
                                }
                                Err(e) => warn!(error = %e, "Webhook delivery failed"),
                            }
                        });
                    }
                }

                info!(new = new_alerts.len(), total = seen_count, "Alerts dispatched");
            }
        });

        handle
    }
}

pub struct AlertDispatchHandle {
    pub tx: broadcast::Sender<TamperAlert>,
}
