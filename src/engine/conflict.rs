use ulid::Ulid;

use crate::model::{Booking, Ms, Slot};

use super::EngineError;

/// Reject malformed or past-starting intervals.
pub(crate) fn validate_slot(start: Ms, end: Ms, now: Ms) -> Result<Slot, EngineError> {
    if start >= end {
        return Err(EngineError::InvalidInterval("end must be after start"));
    }
    if start < now {
        return Err(EngineError::InvalidInterval("start is in the past"));
    }
    Ok(Slot::new(start, end))
}

/// First booking on the agent's calendar whose active interval overlaps
/// `slot`, if any. `exclude` skips the booking being rescheduled so it
/// cannot conflict with itself. Read-only, safe to call repeatedly.
pub(crate) fn find_conflict(
    calendar: &[Booking],
    slot: &Slot,
    exclude: Option<Ulid>,
) -> Option<Ulid> {
    calendar
        .iter()
        .filter(|b| b.status.occupies_calendar())
        .filter(|b| exclude != Some(b.id))
        .find(|b| b.slot.overlaps(slot))
        .map(|b| b.id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BookingStatus;

    const H: Ms = 3_600_000;

    fn booking_at(start: Ms, end: Ms, status: BookingStatus) -> Booking {
        let mut b = Booking::new(
            Ulid::new(),
            Ulid::new(),
            None,
            Slot::new(start, end),
            None,
            0,
        );
        b.status = status;
        b
    }

    #[test]
    fn validate_slot_rules() {
        assert!(validate_slot(10 * H, 11 * H, 0).is_ok());
        assert!(matches!(
            validate_slot(11 * H, 10 * H, 0),
            Err(EngineError::InvalidInterval(_))
        ));
        assert!(matches!(
            validate_slot(10 * H, 10 * H, 0),
            Err(EngineError::InvalidInterval(_))
        ));
        // Start in the past.
        assert!(matches!(
            validate_slot(10 * H, 11 * H, 12 * H),
            Err(EngineError::InvalidInterval(_))
        ));
        // Start exactly now is fine.
        assert!(validate_slot(10 * H, 11 * H, 10 * H).is_ok());
    }

    #[test]
    fn overlap_detected_for_occupying_statuses() {
        use BookingStatus::*;
        for status in [Pending, Confirmed, Completed, PendingAdminApproval, Blocked] {
            let calendar = vec![booking_at(10 * H, 11 * H, status)];
            let hit = find_conflict(&calendar, &Slot::new(10 * H + H / 2, 12 * H), None);
            assert!(hit.is_some(), "{status:?} should occupy the slot");
        }
    }

    #[test]
    fn released_statuses_do_not_occupy() {
        use BookingStatus::*;
        for status in [Rejected, Expired, Cancelled] {
            let calendar = vec![booking_at(10 * H, 11 * H, status)];
            let hit = find_conflict(&calendar, &Slot::new(10 * H, 11 * H), None);
            assert!(hit.is_none(), "{status:?} should free the slot");
        }
    }

    #[test]
    fn back_to_back_is_not_a_conflict() {
        let calendar = vec![booking_at(10 * H, 11 * H, BookingStatus::Confirmed)];
        assert!(find_conflict(&calendar, &Slot::new(11 * H, 12 * H), None).is_none());
        assert!(find_conflict(&calendar, &Slot::new(9 * H, 10 * H), None).is_none());
    }

    #[test]
    fn exclusion_allows_self_move() {
        let existing = booking_at(10 * H, 11 * H, BookingStatus::Confirmed);
        let id = existing.id;
        let calendar = vec![existing];
        // Moving the booking half an hour later overlaps itself; excluded.
        let slot = Slot::new(10 * H + H / 2, 11 * H + H / 2);
        assert!(find_conflict(&calendar, &slot, Some(id)).is_none());
        assert_eq!(find_conflict(&calendar, &slot, None), Some(id));
    }
}
