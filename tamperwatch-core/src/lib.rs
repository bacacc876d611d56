//! # Tamperwatch Core — Metrology Tamper Monitoring
//!
//! Real-time reading pipeline and anomaly classification for legal metrology
//! devices (weighing scales, energy meters, fuel dispensers). Readings flow
//! through the system as: Generation/Fetch → Rolling Window → Statistics →
//! Classification → Alerts.
//!
//! Components:
//! - `simulator` — synthetic reading generation per device type (batch and
//!   continuous random-walk modes), deterministic under a seeded RNG
//! - `window` — bounded FIFO reading history per stream
//! - `stats` — window aggregates and z-score anomaly tagging
//! - `classifier` — threshold-based tamper/status classification
//! - `alerts` — idempotent raise/resolve alert lifecycle
//! - `monitor` — per-stream owner driving the tick pipeline on a timer
//! - `source` — fetch contract for backend-fed (non-simulated) streams
//! - `registry` — device inventory and health scoring

pub mod alerts;
pub mod classifier;
pub mod config;
pub mod error;
pub mod monitor;
pub mod registry;
pub mod simulator;
pub mod source;
pub mod stats;
pub mod types;
pub mod window;

pub use alerts::AlertManager;
pub use config::MonitorConfig;
pub use error::{TamperError, TamperResult};
pub use monitor::StreamMonitor;
pub use types::{DeviceType, Reading, Severity, Status, TamperAlert};

/// Default window capacity for general device streams.
pub const DEFAULT_WINDOW_CAPACITY: usize = 50;
/// Window capacity for the weighing-scale live view.
pub const SCALE_LIVE_WINDOW_CAPACITY: usize = 60;
