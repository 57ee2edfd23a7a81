//! Pure lifecycle state machine.
//!
//! `transition` maps (current status, action) to the next status plus a
//! list of side-effect descriptors, or rejects with `InvalidTransition`.
//! It performs no I/O (the orchestrator executes the effects), so the
//! table is unit-testable with zero mocking.

use crate::model::{Booking, BookingStatus};
use crate::notify::Severity;

use super::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Confirm,
    Complete,
    Reject,
    Cancel,
    Expire,
    ApprovePolicy,
    Reschedule,
}

impl Action {
    pub const ALL: [Action; 7] = [
        Action::Confirm,
        Action::Complete,
        Action::Reject,
        Action::Cancel,
        Action::Expire,
        Action::ApprovePolicy,
        Action::Reschedule,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Action::Confirm => "confirm",
            Action::Complete => "complete",
            Action::Reject => "reject",
            Action::Cancel => "cancel",
            Action::Expire => "expire",
            Action::ApprovePolicy => "approve_policy",
            Action::Reschedule => "reschedule",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    Requester,
    Agent,
    BothParties,
}

/// Notification descriptor returned by a successful transition. Triggered
/// by, but not required for, the transition itself.
#[derive(Debug, Clone)]
pub struct SideEffect {
    pub recipient: Recipient,
    pub message: String,
    pub severity: Severity,
}

/// The transition table. `None` means the edge does not exist.
pub fn next_status(current: BookingStatus, action: Action) -> Option<BookingStatus> {
    use Action as A;
    use BookingStatus as S;
    match (current, action) {
        (S::Pending, A::Confirm) => Some(S::Confirmed),
        (S::Pending, A::Reject) => Some(S::Rejected),
        (S::Pending, A::Expire) => Some(S::Expired),
        (S::Pending, A::Cancel) => Some(S::Cancelled),
        // A reschedule always re-enters the approval queue.
        (S::Pending, A::Reschedule) => Some(S::Pending),
        (S::Confirmed, A::Complete) => Some(S::Completed),
        (S::Confirmed, A::Cancel) => Some(S::Cancelled),
        (S::Confirmed, A::Expire) => Some(S::Expired),
        (S::Confirmed, A::Reschedule) => Some(S::Pending),
        (S::Completed, A::ApprovePolicy) => Some(S::PolicyIssued),
        (S::Completed, A::Reject) => Some(S::Rejected),
        (S::PendingAdminApproval, A::ApprovePolicy) => Some(S::PolicyIssued),
        (S::PendingAdminApproval, A::Reject) => Some(S::Rejected),
        // An agent may release or move its own reserved slot.
        (S::Blocked, A::Cancel) => Some(S::Cancelled),
        (S::Blocked, A::Reschedule) => Some(S::Blocked),
        _ => None,
    }
}

/// Validate a transition and describe its side effects. Attempting to set
/// a terminal booking to any status, including its current one, is an
/// error rather than a no-op.
pub fn transition(
    booking: &Booking,
    action: Action,
) -> Result<(BookingStatus, Vec<SideEffect>), EngineError> {
    let Some(next) = next_status(booking.status, action) else {
        return Err(EngineError::InvalidTransition {
            from: booking.status,
            action,
        });
    };
    Ok((next, effects_for(booking, action)))
}

fn effect(recipient: Recipient, message: String, severity: Severity) -> SideEffect {
    SideEffect {
        recipient,
        message,
        severity,
    }
}

fn effects_for(booking: &Booking, action: Action) -> Vec<SideEffect> {
    let id = booking.id;
    match action {
        Action::Confirm => vec![effect(
            Recipient::Requester,
            format!("consultation {id} confirmed by the agent"),
            Severity::Success,
        )],
        Action::Complete => vec![effect(
            Recipient::Requester,
            format!("consultation {id} completed"),
            Severity::Info,
        )],
        Action::Reject => vec![effect(
            Recipient::Requester,
            match &booking.rejection_reason {
                Some(reason) => format!("consultation {id} rejected: {reason}"),
                None => format!("consultation {id} rejected"),
            },
            Severity::Warning,
        )],
        Action::Cancel => {
            if booking.status == BookingStatus::Blocked {
                // Releasing a self-reservation has no counterpart to tell.
                vec![]
            } else {
                vec![effect(
                    Recipient::Agent,
                    format!("consultation {id} cancelled by the requester"),
                    Severity::Warning,
                )]
            }
        }
        Action::Expire => match booking.status {
            BookingStatus::Pending => vec![effect(
                Recipient::Requester,
                format!("consultation request {id} expired without a response"),
                Severity::Warning,
            )],
            BookingStatus::Confirmed => vec![effect(
                Recipient::BothParties,
                format!("confirmed consultation {id} expired without completion"),
                Severity::Warning,
            )],
            _ => vec![],
        },
        Action::ApprovePolicy => vec![effect(
            Recipient::Requester,
            format!("policy issued for consultation {id}"),
            Severity::Success,
        )],
        Action::Reschedule => {
            if booking.status == BookingStatus::Blocked {
                vec![]
            } else {
                vec![effect(
                    Recipient::Agent,
                    format!("consultation {id} rescheduled, awaiting confirmation"),
                    Severity::Info,
                )]
            }
        }
    }
}
