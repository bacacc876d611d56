mod alert_dispatcher;

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use tamperwatch_core::classifier::DispenseState;
use tamperwatch_core::monitor::{DispenseMonitor, Generation, StreamMonitor};
use tamperwatch_core::registry::DeviceRegistry;
use tamperwatch_core::simulator::{DataSimulator, ScaleWalkState};
use tamperwatch_core::source::{HttpSource, ReadingSource};
use tamperwatch_core::types::DeviceType;
use tamperwatch_core::{AlertManager, MonitorConfig};

#[derive(Parser, Debug)]
#[command(name = "tamperwatch", version, about = "Metrology tamper monitoring daemon")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "tamperwatch.toml")]
    config: String,

    /// Log level (overrides config file)
    #[arg(short, long)]
    log_level: Option<String>,

    /// Generate a default config file and exit
    #[arg(long)]
    generate_config: bool,

    /// RNG seed for simulated streams (overrides config file)
    #[arg(short, long)]
    seed: Option<u64>,

    /// Backend base URL; when set, meter and dispenser streams poll the
    /// backend instead of simulating
    #[arg(long, default_value = "")]
    backend: String,

    /// Alert log file path (empty = disabled)
    #[arg(long, default_value = "tamperwatch-alerts.jsonl")]
    alert_log: String,

    /// Webhook URL for alert delivery (empty = disabled)
    #[arg(long, default_value = "")]
    alert_webhook: String,

    /// Run one fuel dispense cycle at startup and report its outcome
    #[arg(long)]
    dispense_demo: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Generate Config ──────────────────────────────────────────────
    if cli.generate_config {
        let config = MonitorConfig::default();
        config.save(&cli.config)?;
        println!("Default configuration written to {}", cli.config);
        return Ok(());
    }

    // ── Load Config ──────────────────────────────────────────────────
    let mut config = MonitorConfig::load(&cli.config).unwrap_or_else(|e| {
        eprintln!("Warning: {}, using defaults", e);
        MonitorConfig::default()
    });
    if let Some(seed) = cli.seed {
        config.general.seed = Some(seed);
    }

    // ── Tracing ──────────────────────────────────────────────────────
    let log_level = cli.log_level.as_deref().unwrap_or(&config.general.log_level);
    let level = match log_level {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("tamperwatch v{}", env!("CARGO_PKG_VERSION"));

    // ── Core Infrastructure ──────────────────────────────────────────
    let alerts = Arc::new(AlertManager::new());
    let registry = Arc::new(DeviceRegistry::new());
    registry.register("WS-001", DeviceType::WeighingScale, Some("Lane 1"));
    registry.register("EM-001", DeviceType::EnergyMeter, Some("Substation A"));
    registry.register("FD-001", DeviceType::FuelDispenser, Some("Pump 4"));

    let backend = if cli.backend.is_empty() {
        None
    } else {
        Some(Arc::new(HttpSource::new(&cli.backend)?))
    };

    let simulator = |offset: u64| match config.general.seed {
        Some(seed) => DataSimulator::new(seed.wrapping_add(offset)),
        None => DataSimulator::from_entropy(),
    };
    let generation = |offset: u64| match &backend {
        Some(source) => Generation::External(source.clone() as Arc<dyn ReadingSource>),
        None => Generation::Batch(simulator(offset)),
    };

    // ── Stream Monitors ──────────────────────────────────────────────
    let scale_live = Arc::new(StreamMonitor::new(
        "WS-001",
        DeviceType::WeighingScale,
        config.windows.scale_live_capacity,
        Generation::ScaleWalk {
            sim: simulator(0),
            state: ScaleWalkState::new(),
        },
        config.thresholds.clone(),
        config.anomaly.clone(),
        alerts.clone(),
    ));
    let energy = Arc::new(StreamMonitor::new(
        "EM-001",
        DeviceType::EnergyMeter,
        config.windows.general_capacity,
        generation(1),
        config.thresholds.clone(),
        config.anomaly.clone(),
        alerts.clone(),
    ));
    let fuel = Arc::new(StreamMonitor::new(
        "FD-001",
        DeviceType::FuelDispenser,
        config.windows.general_capacity,
        generation(2),
        config.thresholds.clone(),
        config.anomaly.clone(),
        alerts.clone(),
    ));

    let monitors = [&scale_live, &energy, &fuel];
    for monitor in monitors {
        // Each stream starts with a full window of its own capacity.
        monitor.seed_initial(monitor.capacity());
        registry.mark_seen(monitor.stream_id());
    }
    scale_live.start_periodic(config.polling.scale_live_interval_ms);
    energy.start_periodic(config.polling.general_interval_ms);
    fuel.start_periodic(config.polling.fuel_feed_interval_ms);

    // ── Alert Dispatcher ─────────────────────────────────────────────
    let _alert_handle = alert_dispatcher::AlertDispatcher::new(alerts.clone())
        .with_log_file(&cli.alert_log)
        .with_webhook(&cli.alert_webhook)
        .with_interval(config.polling.alert_refresh_secs)
        .start();
    info!(log = %cli.alert_log, "Alert dispatcher started");

    // ── Dispense Demo ────────────────────────────────────────────────
    if cli.dispense_demo {
        let mut demo = DispenseMonitor::new("FD-001", config.thresholds.clone(), alerts.clone());
        demo.start();
        while demo.state() != DispenseState::Complete {
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            demo.tick();
        }
        info!(dispensed = demo.dispensed(), status = ?demo.status(), "Dispense cycle complete");
        demo.reset();
    }

    // ── Periodic Health Reports ──────────────────────────────────────
    if config.polling.health_refresh_secs > 0 {
        let health_registry = registry.clone();
        let health_alerts = alerts.clone();
        let health_monitors: Vec<Arc<StreamMonitor>> =
            monitors.iter().map(|m| Arc::clone(*m)).collect();
        let interval = config.polling.health_refresh_secs;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(std::time::Duration::from_secs(interval));
            loop {
                ticker.tick().await;
                for monitor in &health_monitors {
                    let snapshot = monitor.snapshot();
                    let report = health_registry.health_report(
                        monitor.stream_id(),
                        &health_alerts,
                        snapshot.stats.anomaly_count,
                        snapshot.current,
                    );
                    if report.health_score < 80 {
                        warn!(
                            device = %report.device_id,
                            score = report.health_score,
                            status = ?report.status,
                            alerts = report.active_alert_count,
                            "Device health degraded"
                        );
                    } else {
                        info!(device = %report.device_id, score = report.health_score, "Device healthy");
                    }
                }
            }
        });
    }

    info!(
        streams = monitors.len(),
        devices = registry.count(),
        "tamperwatch running. Press Ctrl+C to stop."
    );
    tokio::signal::ctrl_c().await?;
    info!("Shutting down...");

    // ── Graceful Shutdown ────────────────────────────────────────────
    for monitor in monitors {
        monitor.stop();
        info!(
            stream = %monitor.stream_id(),
            ticks = monitor.ticks_completed(),
            "Stream monitor stopped"
        );
    }

    info!(
        active_alerts = alerts.active_count(None),
        total_alerts = alerts.all_alerts().len(),
        "Shutdown complete"
    );
    Ok(())
}
