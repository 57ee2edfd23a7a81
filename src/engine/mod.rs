mod commands;
mod conflict;
mod error;
pub mod lifecycle;
mod queries;

pub use error::EngineError;
pub use queries::{FunnelMetrics, TimelineEntry};

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use ulid::Ulid;

use crate::clock::Clock;
use crate::model::{Booking, HOUR_MS, Ms};
use crate::notify::{NotifySink, Severity};
use crate::store::BookingStore;

use lifecycle::{Recipient, SideEffect};

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// How long a Pending booking may wait for the agent's first response.
    pub pending_sla_ms: Ms,
    /// How long past its start a Confirmed booking may sit uncompleted.
    pub confirmed_sla_ms: Ms,
    /// Reminder lookahead thresholds before the slot start.
    pub reminder_thresholds_ms: Vec<Ms>,
    pub sweep_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            pending_sla_ms: 48 * HOUR_MS,
            confirmed_sla_ms: 72 * HOUR_MS,
            reminder_thresholds_ms: vec![24 * HOUR_MS, HOUR_MS],
            sweep_interval: Duration::from_secs(60),
        }
    }
}

/// Booking orchestrator: the single entry point for externally triggered
/// commands. Validates input, checks slot conflicts, applies the lifecycle
/// state machine, persists, then emits side effects best-effort.
pub struct Engine {
    pub(crate) store: Arc<dyn BookingStore>,
    pub(crate) notify: Arc<dyn NotifySink>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) config: EngineConfig,
    /// Per-agent mutual exclusion, held across check-then-insert and across
    /// every transition on that agent's bookings. Racing commands on the
    /// same booking are serialized here; the loser observes the new status
    /// and gets a definitive InvalidTransition.
    agent_locks: DashMap<Ulid, Arc<Mutex<()>>>,
}

impl Engine {
    pub fn new(
        store: Arc<dyn BookingStore>,
        notify: Arc<dyn NotifySink>,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            notify,
            clock,
            config,
            agent_locks: DashMap::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub(crate) async fn lock_agent(&self, agent_id: Ulid) -> OwnedMutexGuard<()> {
        let lock = self
            .agent_locks
            .entry(agent_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }

    /// Fetch a booking and take its agent's lock, then re-read under the
    /// lock so racing commands observe each other's writes.
    pub(crate) async fn checkout(
        &self,
        id: Ulid,
    ) -> Result<(OwnedMutexGuard<()>, Booking), EngineError> {
        let found = self
            .store
            .find_by_id(id)
            .await?
            .ok_or(EngineError::NotFound(id))?;
        let guard = self.lock_agent(found.agent_id).await;
        let booking = self
            .store
            .find_by_id(id)
            .await?
            .ok_or(EngineError::NotFound(id))?;
        Ok((guard, booking))
    }

    /// Hand one notification to the sink. Fire-and-forget: by the time this
    /// runs the command has already committed.
    pub(crate) fn send(&self, recipient: Ulid, message: &str, severity: Severity) {
        self.notify.notify(recipient, message, severity);
        metrics::counter!(crate::observability::NOTIFICATIONS_SENT_TOTAL).increment(1);
    }

    /// Execute the side effects a transition described.
    pub(crate) fn dispatch(&self, booking: &Booking, effects: Vec<SideEffect>) {
        for effect in effects {
            let recipients = match effect.recipient {
                Recipient::Requester => vec![booking.requester_id],
                Recipient::Agent => vec![booking.agent_id],
                Recipient::BothParties => vec![booking.requester_id, booking.agent_id],
            };
            for recipient in recipients {
                self.send(recipient, &effect.message, effect.severity);
            }
        }
    }
}
