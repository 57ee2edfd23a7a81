//! Background task that expires overdue bookings and emits reminders.
//!
//! The sweeper is an explicitly owned worker: spawned by the process entry
//! point with injected clock and store handles, and one cycle is directly
//! callable (`Engine::sweep`) so tests advance a manual clock and sweep
//! synchronously instead of sleeping.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::engine::Engine;
use crate::model::{BookingStatus, MINUTE_MS, Ms};
use crate::notify::Severity;
use crate::observability;

/// What one sweep cycle did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub expired: usize,
    pub reminders: usize,
}

/// Run the sweeper for the lifetime of the process.
pub async fn run_sweeper(engine: Arc<Engine>) {
    let mut interval = tokio::time::interval(engine.config().sweep_interval);
    loop {
        interval.tick().await;
        let start = std::time::Instant::now();
        let report = engine.sweep().await;
        metrics::histogram!(observability::SWEEP_DURATION_SECONDS)
            .record(start.elapsed().as_secs_f64());
        if report.expired > 0 || report.reminders > 0 {
            info!(
                expired = report.expired,
                reminders = report.reminders,
                "sweep finished"
            );
        }
    }
}

impl Engine {
    /// One sweep cycle: expire SLA-breached bookings and emit due reminders.
    /// Per-booking failures are logged and skipped; a malformed record or a
    /// lost race never halts the sweep.
    pub async fn sweep(&self) -> SweepReport {
        let now = self.clock.now_ms();
        let mut report = SweepReport::default();

        // Pending requests the agent never answered within the SLA window.
        report.expired += self
            .expire_batch(BookingStatus::Pending, now - self.config.pending_sla_ms)
            .await;

        // Confirmed bookings never completed within the window past their start.
        report.expired += self
            .expire_batch(BookingStatus::Confirmed, now - self.config.confirmed_sla_ms)
            .await;

        report.reminders = self.emit_reminders(now).await;
        report
    }

    async fn expire_batch(&self, status: BookingStatus, threshold: Ms) -> usize {
        let stale = match self.store.find_by_status_before(status, threshold).await {
            Ok(stale) => stale,
            Err(e) => {
                warn!("sweep: {} scan failed: {e}", status.as_str());
                return 0;
            }
        };
        let mut expired = 0;
        for booking in stale {
            match self.expire(booking.id).await {
                Ok(_) => {
                    info!(booking = %booking.id, from = status.as_str(), "expired overdue booking");
                    expired += 1;
                }
                // Lost a race with a user command; fine.
                Err(e) => debug!(booking = %booking.id, "sweep skip: {e}"),
            }
        }
        expired
    }

    /// Exactly one reminder per (booking, threshold). The sent-threshold
    /// marker is persisted before dispatch so a 60-second cadence never
    /// duplicates a reminder within the same window.
    async fn emit_reminders(&self, now: Ms) -> usize {
        let confirmed = match self.store.find_by_status(BookingStatus::Confirmed).await {
            Ok(confirmed) => confirmed,
            Err(e) => {
                warn!("sweep: reminder scan failed: {e}");
                return 0;
            }
        };

        let mut sent = 0;
        for candidate in confirmed {
            // Cheap pre-filter before taking the agent lock.
            if candidate.slot.start <= now || !self.has_due_reminder(&candidate, now) {
                continue;
            }

            let _guard = self.lock_agent(candidate.agent_id).await;
            let mut booking = match self.store.find_by_id(candidate.id).await {
                Ok(Some(booking)) => booking,
                _ => continue,
            };
            // Re-judge under the lock: a confirm/reschedule may have raced us.
            if booking.status != BookingStatus::Confirmed || booking.slot.start <= now {
                continue;
            }
            let due: Vec<Ms> = self
                .config
                .reminder_thresholds_ms
                .iter()
                .copied()
                .filter(|&t| !booking.reminder_sent(t) && booking.slot.start - now <= t)
                .collect();
            if due.is_empty() {
                continue;
            }

            booking.reminders_sent.extend(&due);
            let booking = match self.store.save(booking).await {
                Ok(booking) => booking,
                Err(e) => {
                    warn!(booking = %candidate.id, "sweep: reminder marker save failed: {e}");
                    continue;
                }
            };
            for &threshold in &due {
                let message = format!(
                    "reminder: consultation {} starts in under {} minutes",
                    booking.id,
                    threshold / MINUTE_MS
                );
                self.send(booking.requester_id, &message, Severity::Info);
                self.send(booking.agent_id, &message, Severity::Info);
                metrics::counter!(observability::REMINDERS_SENT_TOTAL).increment(1);
                sent += 1;
            }
        }
        sent
    }

    fn has_due_reminder(&self, booking: &crate::model::Booking, now: Ms) -> bool {
        self.config
            .reminder_thresholds_ms
            .iter()
            .any(|&t| !booking.reminder_sent(t) && booking.slot.start - now <= t)
    }
}
