use ulid::Ulid;

use crate::model::{BookingStatus, Ms, TimeSlot};
use crate::store::{Entity, StoreError};

use super::validate::ValidationReport;

/// Every expected business outcome of an engine operation. Only genuine
/// infrastructure faults escape as anything else.
#[derive(Debug)]
pub enum BookingError {
    /// Structural/business-rule violations, all of them at once.
    Validation(ValidationReport),
    /// The room is taken for the requested interval — re-search, don't retry.
    Conflict { room_id: Ulid, slot: TimeSlot },
    NotFound(Entity, Ulid),
    AlreadyExists(Entity, Ulid),
    /// The booking's current status forbids the attempted operation.
    IllegalTransition { from: BookingStatus, attempted: &'static str },
    /// The room exists but is flagged non-bookable or inactive.
    RoomNotBookable(Ulid),
    HasActiveBookings(Ulid),
    HasRooms(Ulid),
    RateLimited { retry_after_ms: Ms },
    LimitExceeded(&'static str),
    /// Store or collaborator timeout/outage. Retryable, but never retried
    /// silently — the caller decides.
    Transient(String),
}

impl BookingError {
    /// Lift a store failure, tagging lifecycle refusals with the operation
    /// that was attempted.
    pub(super) fn from_store(err: StoreError, attempted: &'static str) -> Self {
        match err {
            StoreError::NotFound(entity, id) => BookingError::NotFound(entity, id),
            StoreError::AlreadyExists(entity, id) => BookingError::AlreadyExists(entity, id),
            StoreError::Conflict { room_id, slot } => BookingError::Conflict { room_id, slot },
            StoreError::IllegalTransition { from } => {
                BookingError::IllegalTransition { from, attempted }
            }
            StoreError::HasActiveBookings(id) => BookingError::HasActiveBookings(id),
            StoreError::HasRooms(id) => BookingError::HasRooms(id),
            StoreError::Unavailable(msg) => BookingError::Transient(msg),
        }
    }
}

impl std::fmt::Display for BookingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BookingError::Validation(report) => {
                write!(f, "validation failed: ")?;
                for (i, v) in report.violations.iter().enumerate() {
                    if i > 0 {
                        write!(f, "; ")?;
                    }
                    write!(f, "{v}")?;
                }
                Ok(())
            }
            BookingError::Conflict { room_id, slot } => write!(
                f,
                "room {room_id} is no longer available for [{}, {})",
                slot.start, slot.end
            ),
            BookingError::NotFound(entity, id) => {
                write!(f, "{} not found: {id}", entity.as_str())
            }
            BookingError::AlreadyExists(entity, id) => {
                write!(f, "{} already exists: {id}", entity.as_str())
            }
            BookingError::IllegalTransition { from, attempted } => {
                write!(f, "cannot {attempted} a {} booking", from.as_str())
            }
            BookingError::RoomNotBookable(id) => write!(f, "room {id} is not bookable"),
            BookingError::HasActiveBookings(id) => {
                write!(f, "room {id} still has active bookings")
            }
            BookingError::HasRooms(id) => write!(f, "building {id} still has rooms"),
            BookingError::RateLimited { retry_after_ms } => {
                write!(f, "too many attempts, retry in {retry_after_ms}ms")
            }
            BookingError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            BookingError::Transient(msg) => write!(f, "transient failure: {msg}"),
        }
    }
}

impl std::error::Error for BookingError {}
