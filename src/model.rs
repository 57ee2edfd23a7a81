use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unix milliseconds, the only time type.
pub type Ms = i64;

pub const MINUTE_MS: Ms = 60_000;
pub const HOUR_MS: Ms = 3_600_000;

/// Half-open interval `[start, end)` during which an agent is occupied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub start: Ms,
    pub end: Ms,
}

impl Slot {
    pub fn new(start: Ms, end: Ms) -> Self {
        debug_assert!(start < end, "Slot start must be before end");
        Self { start, end }
    }

    pub fn duration_ms(&self) -> Ms {
        self.end - self.start
    }

    /// Half-open overlap: touching endpoints do not conflict.
    pub fn overlaps(&self, other: &Slot) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains_instant(&self, t: Ms) -> bool {
        self.start <= t && t < self.end
    }
}

/// Lifecycle states of a booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BookingStatus {
    /// Awaiting the agent's first response. Still occupies the slot.
    Pending,
    /// Agent accepted; the consultation is scheduled.
    Confirmed,
    /// Consultation took place. Accepts a post-completion decision.
    Completed,
    /// Post-completion approval granted.
    PolicyIssued,
    Rejected,
    /// Force-expired by the sweeper after an SLA breach.
    Expired,
    Cancelled,
    /// Awaiting an administrative decision after completion.
    PendingAdminApproval,
    /// Agent self-reservation with no requester-side semantics.
    Blocked,
}

impl BookingStatus {
    pub const ALL: [BookingStatus; 9] = [
        BookingStatus::Pending,
        BookingStatus::Confirmed,
        BookingStatus::Completed,
        BookingStatus::PolicyIssued,
        BookingStatus::Rejected,
        BookingStatus::Expired,
        BookingStatus::Cancelled,
        BookingStatus::PendingAdminApproval,
        BookingStatus::Blocked,
    ];

    /// No outbound transitions from these states.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            BookingStatus::PolicyIssued
                | BookingStatus::Rejected
                | BookingStatus::Expired
                | BookingStatus::Cancelled
        )
    }

    /// Whether a booking in this state still reserves its slot on the
    /// agent's calendar. Pending counts: an unconfirmed request
    /// provisionally holds the slot to avoid overbooking races.
    pub fn occupies_calendar(self) -> bool {
        !matches!(
            self,
            BookingStatus::Rejected | BookingStatus::Expired | BookingStatus::Cancelled
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Completed => "completed",
            BookingStatus::PolicyIssued => "policy_issued",
            BookingStatus::Rejected => "rejected",
            BookingStatus::Expired => "expired",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::PendingAdminApproval => "pending_admin_approval",
            BookingStatus::Blocked => "blocked",
        }
    }
}

/// A consultation booking between a requester and a service agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Ulid,
    pub requester_id: Ulid,
    /// Equals `requester_id` for Blocked self-reservations.
    pub agent_id: Ulid,
    /// Optional topic under discussion (e.g. a policy).
    pub subject_id: Option<Ulid>,
    pub slot: Slot,
    pub status: BookingStatus,
    pub created_at: Ms,
    /// First time the agent acted on the booking. Set once.
    pub responded_at: Option<Ms>,
    pub completed_at: Option<Ms>,
    /// Set on reject / approve-after-completion decisions.
    pub reviewed_at: Option<Ms>,
    /// Concrete meeting moment fixed by the agent at confirmation.
    pub appointment_at: Option<Ms>,
    /// Irreversible: late first response or force-expiry.
    pub sla_breached: bool,
    pub reason: Option<String>,
    pub rejection_reason: Option<String>,
    pub notes: Option<String>,
    pub meeting_ref: Option<String>,
    /// Reminder thresholds already fired, so a 60s sweep cadence never
    /// duplicates a reminder within the same window.
    pub reminders_sent: Vec<Ms>,
}

impl Booking {
    pub fn new(
        requester_id: Ulid,
        agent_id: Ulid,
        subject_id: Option<Ulid>,
        slot: Slot,
        reason: Option<String>,
        now: Ms,
    ) -> Self {
        Self {
            id: Ulid::new(),
            requester_id,
            agent_id,
            subject_id,
            slot,
            status: BookingStatus::Pending,
            created_at: now,
            responded_at: None,
            completed_at: None,
            reviewed_at: None,
            appointment_at: None,
            sla_breached: false,
            reason,
            rejection_reason: None,
            notes: None,
            meeting_ref: None,
            reminders_sent: Vec::new(),
        }
    }

    /// A slot the agent reserves for itself, with no counterpart requester.
    pub fn blocked(agent_id: Ulid, slot: Slot, now: Ms) -> Self {
        let mut b = Self::new(agent_id, agent_id, None, slot, None, now);
        b.status = BookingStatus::Blocked;
        b
    }

    /// Stamp the agent's first response and the SLA verdict. A response
    /// strictly later than the window breaches; exactly at the window
    /// does not. Returns true when the breach flag is newly set.
    pub fn mark_responded(&mut self, now: Ms, sla_window_ms: Ms) -> bool {
        if self.responded_at.is_some() {
            return false;
        }
        self.responded_at = Some(now);
        if now - self.created_at > sla_window_ms {
            self.sla_breached = true;
            return true;
        }
        false
    }

    pub fn reminder_sent(&self, threshold_ms: Ms) -> bool {
        self.reminders_sent.contains(&threshold_ms)
    }
}
