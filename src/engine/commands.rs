use tracing::info;
use ulid::Ulid;

use crate::model::{Booking, Ms};
use crate::notify::Severity;
use crate::observability;

use super::conflict::{find_conflict, validate_slot};
use super::lifecycle::{self, Action};
use super::{Engine, EngineError};

impl Engine {
    /// File a new consultation request. The booking enters Pending and the
    /// slot is provisionally reserved on the agent's calendar.
    pub async fn create_booking(
        &self,
        requester_id: Ulid,
        agent_id: Ulid,
        start: Ms,
        end: Ms,
        subject_id: Option<Ulid>,
        reason: Option<String>,
    ) -> Result<Booking, EngineError> {
        if requester_id == agent_id {
            return Err(EngineError::Validation(
                "requester and agent must differ; use block_slot to reserve own time",
            ));
        }
        let now = self.clock.now_ms();
        let slot = validate_slot(start, end, now)?;

        // Check-then-insert is serialized per agent.
        let _guard = self.lock_agent(agent_id).await;
        let calendar = self.store.find_by_agent(agent_id, true).await?;
        if let Some(existing) = find_conflict(&calendar, &slot, None) {
            metrics::counter!(observability::SLOT_CONFLICTS_TOTAL).increment(1);
            return Err(EngineError::SlotConflict(existing));
        }

        let booking = Booking::new(requester_id, agent_id, subject_id, slot, reason, now);
        let booking = self.store.save(booking).await?;
        info!(booking = %booking.id, agent = %agent_id, "booking created");
        metrics::counter!(observability::COMMANDS_TOTAL, "command" => "create_booking")
            .increment(1);

        self.send(
            agent_id,
            &format!("new consultation request {}", booking.id),
            Severity::Info,
        );
        self.send(
            requester_id,
            &format!("consultation request {} submitted", booking.id),
            Severity::Success,
        );
        Ok(booking)
    }

    /// Reserve calendar capacity with no requester-side semantics. Same
    /// conflict check as `create_booking`.
    pub async fn block_slot(
        &self,
        agent_id: Ulid,
        start: Ms,
        end: Ms,
    ) -> Result<Booking, EngineError> {
        let now = self.clock.now_ms();
        let slot = validate_slot(start, end, now)?;

        let _guard = self.lock_agent(agent_id).await;
        let calendar = self.store.find_by_agent(agent_id, true).await?;
        if let Some(existing) = find_conflict(&calendar, &slot, None) {
            metrics::counter!(observability::SLOT_CONFLICTS_TOTAL).increment(1);
            return Err(EngineError::SlotConflict(existing));
        }

        let booking = self.store.save(Booking::blocked(agent_id, slot, now)).await?;
        info!(booking = %booking.id, agent = %agent_id, "slot blocked");
        metrics::counter!(observability::COMMANDS_TOTAL, "command" => "block_slot").increment(1);
        Ok(booking)
    }

    /// Move a booking to a new interval. Re-validates and re-checks
    /// conflicts with the booking itself excluded; a rescheduled booking
    /// re-enters the approval queue.
    pub async fn reschedule(
        &self,
        id: Ulid,
        new_start: Ms,
        new_end: Ms,
    ) -> Result<Booking, EngineError> {
        let now = self.clock.now_ms();
        let slot = validate_slot(new_start, new_end, now)?;

        let (_guard, mut booking) = self.checkout(id).await?;
        let (next, effects) = lifecycle::transition(&booking, Action::Reschedule)?;

        let calendar = self.store.find_by_agent(booking.agent_id, true).await?;
        if let Some(existing) = find_conflict(&calendar, &slot, Some(id)) {
            metrics::counter!(observability::SLOT_CONFLICTS_TOTAL).increment(1);
            return Err(EngineError::SlotConflict(existing));
        }

        booking.slot = slot;
        booking.status = next;
        // New time, reminders fire again.
        booking.reminders_sent.clear();
        let booking = self.store.save(booking).await?;
        info!(booking = %booking.id, "booking rescheduled");
        metrics::counter!(observability::COMMANDS_TOTAL, "command" => "reschedule").increment(1);
        self.dispatch(&booking, effects);
        Ok(booking)
    }

    /// Agent accepts a Pending booking and fixes the meeting moment.
    pub async fn confirm(
        &self,
        id: Ulid,
        agent_id: Ulid,
        appointment_at: Ms,
    ) -> Result<Booking, EngineError> {
        let (_guard, mut booking) = self.checkout(id).await?;
        if booking.agent_id != agent_id {
            return Err(EngineError::Forbidden("only the booked agent can confirm"));
        }
        let (next, effects) = lifecycle::transition(&booking, Action::Confirm)?;

        let now = self.clock.now_ms();
        if booking.mark_responded(now, self.config.pending_sla_ms) {
            metrics::counter!(observability::SLA_BREACHES_TOTAL).increment(1);
        }
        booking.appointment_at = Some(appointment_at);
        booking.status = next;
        let booking = self.store.save(booking).await?;
        info!(booking = %booking.id, sla_breached = booking.sla_breached, "booking confirmed");
        metrics::counter!(observability::COMMANDS_TOTAL, "command" => "confirm").increment(1);
        self.dispatch(&booking, effects);
        Ok(booking)
    }

    /// Mark a Confirmed consultation as having taken place.
    pub async fn complete(&self, id: Ulid, notes: Option<String>) -> Result<Booking, EngineError> {
        let (_guard, mut booking) = self.checkout(id).await?;
        let (next, effects) = lifecycle::transition(&booking, Action::Complete)?;

        booking.completed_at = Some(self.clock.now_ms());
        if notes.is_some() {
            booking.notes = notes;
        }
        booking.status = next;
        let booking = self.store.save(booking).await?;
        info!(booking = %booking.id, "booking completed");
        metrics::counter!(observability::COMMANDS_TOTAL, "command" => "complete").increment(1);
        self.dispatch(&booking, effects);
        Ok(booking)
    }

    /// Reject a booking. The reason is mandatory; a blank reason is a
    /// validation error, not a silent default.
    pub async fn reject(&self, id: Ulid, reason: &str) -> Result<Booking, EngineError> {
        if reason.trim().is_empty() {
            return Err(EngineError::Validation("rejection reason must not be blank"));
        }
        let (_guard, mut booking) = self.checkout(id).await?;
        booking.rejection_reason = Some(reason.to_string());
        let (next, effects) = lifecycle::transition(&booking, Action::Reject)?;

        let now = self.clock.now_ms();
        // A rejection may be the agent's first response.
        if booking.mark_responded(now, self.config.pending_sla_ms) {
            metrics::counter!(observability::SLA_BREACHES_TOTAL).increment(1);
        }
        booking.reviewed_at = Some(now);
        booking.status = next;
        let booking = self.store.save(booking).await?;
        info!(booking = %booking.id, "booking rejected");
        metrics::counter!(observability::COMMANDS_TOTAL, "command" => "reject").increment(1);
        self.dispatch(&booking, effects);
        Ok(booking)
    }

    /// Requester withdraws a booking it owns. For a Blocked booking the
    /// agent is the owner, so this is also the unblock path.
    pub async fn cancel(&self, id: Ulid, requester_id: Ulid) -> Result<Booking, EngineError> {
        let (_guard, mut booking) = self.checkout(id).await?;
        if booking.requester_id != requester_id {
            return Err(EngineError::Forbidden("caller does not own this booking"));
        }
        let (next, effects) = lifecycle::transition(&booking, Action::Cancel)?;

        booking.status = next;
        let booking = self.store.save(booking).await?;
        info!(booking = %booking.id, "booking cancelled");
        metrics::counter!(observability::COMMANDS_TOTAL, "command" => "cancel").increment(1);
        self.dispatch(&booking, effects);
        Ok(booking)
    }

    /// Post-completion approval: issue the policy under discussion.
    pub async fn approve_policy(&self, id: Ulid) -> Result<Booking, EngineError> {
        let (_guard, mut booking) = self.checkout(id).await?;
        let (next, effects) = lifecycle::transition(&booking, Action::ApprovePolicy)?;

        booking.reviewed_at = Some(self.clock.now_ms());
        booking.status = next;
        let booking = self.store.save(booking).await?;
        info!(booking = %booking.id, "policy issued");
        metrics::counter!(observability::COMMANDS_TOTAL, "command" => "approve_policy")
            .increment(1);
        self.dispatch(&booking, effects);
        Ok(booking)
    }

    /// Force-expire a booking past its SLA deadline. Sweeper path, but it
    /// goes through the same transition table as every user command, so it
    /// can never clobber a transition that already won.
    pub(crate) async fn expire(&self, id: Ulid) -> Result<Booking, EngineError> {
        let (_guard, mut booking) = self.checkout(id).await?;
        let (next, effects) = lifecycle::transition(&booking, Action::Expire)?;

        booking.sla_breached = true;
        booking.status = next;
        let booking = self.store.save(booking).await?;
        metrics::counter!(observability::BOOKINGS_EXPIRED_TOTAL).increment(1);
        self.dispatch(&booking, effects);
        Ok(booking)
    }

    // ── Reads for the transport layer ────────────────────────

    pub async fn find_booking(&self, id: Ulid) -> Result<Option<Booking>, EngineError> {
        Ok(self.store.find_by_id(id).await?)
    }

    /// The agent's occupied intervals.
    pub async fn agent_calendar(&self, agent_id: Ulid) -> Result<Vec<Booking>, EngineError> {
        Ok(self.store.find_by_agent(agent_id, true).await?)
    }
}
