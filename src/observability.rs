use std::net::SocketAddr;

// ── RED metrics (command-driven) ────────────────────────────────

/// Counter: commands executed. Labels: command.
pub const COMMANDS_TOTAL: &str = "parley_commands_total";

/// Counter: bookings rejected because the slot was occupied.
pub const SLOT_CONFLICTS_TOTAL: &str = "parley_slot_conflicts_total";

/// Counter: first responses that landed past the SLA window.
pub const SLA_BREACHES_TOTAL: &str = "parley_sla_breaches_total";

// ── Sweeper metrics ──────────────────────────────────────────────

/// Counter: bookings force-expired by the sweeper.
pub const BOOKINGS_EXPIRED_TOTAL: &str = "parley_bookings_expired_total";

/// Counter: reminders emitted (one per booking/threshold pair).
pub const REMINDERS_SENT_TOTAL: &str = "parley_reminders_sent_total";

/// Histogram: duration of one sweep cycle in seconds.
pub const SWEEP_DURATION_SECONDS: &str = "parley_sweep_duration_seconds";

// ── Notification metrics ─────────────────────────────────────────

/// Counter: notifications handed to the sink.
pub const NOTIFICATIONS_SENT_TOTAL: &str = "parley_notifications_sent_total";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) {
    let Some(port) = port else { return };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .expect("failed to install Prometheus metrics exporter");
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
}
