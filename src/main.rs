use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use parley::clock::SystemClock;
use parley::engine::{Engine, EngineConfig};
use parley::model::HOUR_MS;
use parley::notify::NotifyHub;
use parley::store::InMemoryStore;
use parley::sweeper;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let metrics_port: Option<u16> = std::env::var("PARLEY_METRICS_PORT")
        .ok()
        .and_then(|s| s.parse().ok());
    parley::observability::init(metrics_port);

    let sweep_secs: u64 = std::env::var("PARLEY_SWEEP_INTERVAL_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(60);
    let pending_sla_hours: i64 = std::env::var("PARLEY_PENDING_SLA_HOURS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(48);
    let confirmed_sla_hours: i64 = std::env::var("PARLEY_CONFIRMED_SLA_HOURS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(72);

    let config = EngineConfig {
        pending_sla_ms: pending_sla_hours * HOUR_MS,
        confirmed_sla_ms: confirmed_sla_hours * HOUR_MS,
        sweep_interval: Duration::from_secs(sweep_secs),
        ..EngineConfig::default()
    };

    let notify = Arc::new(NotifyHub::new());
    let engine = Arc::new(Engine::new(
        Arc::new(InMemoryStore::new()),
        notify,
        Arc::new(SystemClock),
        config,
    ));

    // The engine is handed to the transport layer from here; this process
    // owns the sweeper for its whole lifetime.
    tokio::spawn(sweeper::run_sweeper(engine.clone()));

    info!("parley engine running");
    info!("  sweep_interval: {sweep_secs}s");
    info!("  pending_sla: {pending_sla_hours}h, confirmed_sla: {confirmed_sla_hours}h");
    info!(
        "  metrics: {}",
        metrics_port.map_or("disabled".to_string(), |p| format!(
            "http://0.0.0.0:{p}/metrics"
        ))
    );

    // Graceful shutdown on SIGTERM/ctrl-c.
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to register SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
    }

    info!("parley stopped");
    Ok(())
}
