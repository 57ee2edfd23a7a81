use ulid::Ulid;

use crate::model::BookingStatus;
use crate::store::StoreError;

use super::lifecycle::Action;

#[derive(Debug)]
pub enum EngineError {
    NotFound(Ulid),
    /// Malformed interval: end at or before start, or start in the past.
    InvalidInterval(&'static str),
    /// The agent already has an active booking overlapping the slot.
    SlotConflict(Ulid),
    /// The requested status change is not an edge of the transition table.
    InvalidTransition {
        from: BookingStatus,
        action: Action,
    },
    /// Caller does not own the booking being mutated.
    Forbidden(&'static str),
    /// Mandatory field missing or malformed.
    Validation(&'static str),
    Store(StoreError),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::NotFound(id) => write!(f, "not found: {id}"),
            EngineError::InvalidInterval(msg) => write!(f, "invalid interval: {msg}"),
            EngineError::SlotConflict(id) => {
                write!(f, "slot conflict with existing booking: {id}")
            }
            EngineError::InvalidTransition { from, action } => {
                write!(
                    f,
                    "invalid transition: cannot {} a {} booking",
                    action.as_str(),
                    from.as_str()
                )
            }
            EngineError::Forbidden(msg) => write!(f, "forbidden: {msg}"),
            EngineError::Validation(msg) => write!(f, "validation error: {msg}"),
            EngineError::Store(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        EngineError::Store(e)
    }
}
