use ulid::Ulid;

use crate::limits::*;
use crate::model::{Booking, Ms, TimeSlot};

use super::BookingError;

pub(crate) fn now_ms() -> Ms {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_millis() as Ms
}

/// Sanity bounds for caller-supplied query windows (search, utilization).
pub(crate) fn validate_window(window: &TimeSlot) -> Result<(), BookingError> {
    if window.start < MIN_VALID_TIMESTAMP_MS || window.end > MAX_VALID_TIMESTAMP_MS {
        return Err(BookingError::LimitExceeded("timestamp out of range"));
    }
    if window.duration_ms() > MAX_QUERY_WINDOW_MS {
        return Err(BookingError::LimitExceeded("query window too wide"));
    }
    Ok(())
}

/// First active booking overlapping `slot`, skipping `exclude` (used when a
/// booking is rescheduled in place so it can't conflict with itself).
pub(crate) fn find_conflict<'a>(
    bookings: &'a [Booking],
    slot: &TimeSlot,
    exclude: Option<Ulid>,
) -> Option<&'a Booking> {
    bookings
        .iter()
        .find(|b| b.status.is_active() && exclude != Some(b.id) && b.slot.overlaps(slot))
}
