//! Persistence seam. The engine only ever talks to a `CampusStore`; the
//! backing implementation is resolved once at startup from configuration.
//!
//! The store owns the crate's one concurrency-critical contract: no two
//! active bookings for the same room may ever persist with overlapping
//! intervals, regardless of request interleaving. `MemoryStore` discharges
//! it by re-running the overlap scan under the room's write lock immediately
//! before committing an insert or a time-changing edit (lock-and-recheck).
//! A relational backend would discharge the same contract with an exclusion
//! constraint; either way the loser of a race sees `StoreError::Conflict`.

mod memory;

pub use memory::MemoryStore;

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use ulid::Ulid;

use crate::config::{Config, StoreBackend};
use crate::model::{
    Booking, BookingQuery, BookingStatus, Building, BuildingPatch, Ms, Room, RoomFilter,
    RoomPatch, TimeSlot, User,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Building,
    Room,
    Booking,
    User,
}

impl Entity {
    pub fn as_str(self) -> &'static str {
        match self {
            Entity::Building => "building",
            Entity::Room => "room",
            Entity::Booking => "booking",
            Entity::User => "user",
        }
    }
}

#[derive(Debug)]
pub enum StoreError {
    NotFound(Entity, Ulid),
    AlreadyExists(Entity, Ulid),
    /// The commit-time overlap recheck found a competing active booking.
    Conflict { room_id: Ulid, slot: TimeSlot },
    /// A status change or edit the booking's current status forbids.
    IllegalTransition { from: BookingStatus },
    HasActiveBookings(Ulid),
    HasRooms(Ulid),
    /// Backend outage or corruption. Callers may retry.
    Unavailable(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::NotFound(entity, id) => write!(f, "{} not found: {id}", entity.as_str()),
            StoreError::AlreadyExists(entity, id) => {
                write!(f, "{} already exists: {id}", entity.as_str())
            }
            StoreError::Conflict { room_id, slot } => write!(
                f,
                "room {room_id} already booked in [{}, {})",
                slot.start, slot.end
            ),
            StoreError::IllegalTransition { from } => {
                write!(f, "booking status {} forbids this change", from.as_str())
            }
            StoreError::HasActiveBookings(id) => {
                write!(f, "cannot delete room {id}: has active bookings")
            }
            StoreError::HasRooms(id) => write!(f, "cannot delete building {id}: has rooms"),
            StoreError::Unavailable(msg) => write!(f, "store unavailable: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// A booking mutation applied atomically under the room's lock.
#[derive(Debug, Clone)]
pub enum BookingUpdate {
    /// Lifecycle move. The store re-validates the transition against the
    /// booking's status as read under the lock, so a racing transition can't
    /// slip through a stale engine-side check. `Confirmed → Confirmed` is a
    /// no-op returning the stored booking unchanged.
    Transition {
        to: BookingStatus,
        /// Appended to existing notes on its own line, never overwriting.
        notes_append: Option<String>,
        now: Ms,
    },
    /// Field edit, legal only while the booking is PENDING or CONFIRMED.
    /// A `slot` change triggers the commit-time overlap recheck (excluding
    /// the booking itself) and a cost recompute passed in by the engine.
    Edit {
        slot: Option<TimeSlot>,
        purpose: Option<String>,
        notes: Option<String>,
        cost: Option<f64>,
        now: Ms,
    },
}

#[async_trait]
pub trait CampusStore: Send + Sync {
    // ── Lookups ──────────────────────────────────────────────
    async fn building(&self, id: Ulid) -> Result<Option<Building>, StoreError>;
    async fn room(&self, id: Ulid) -> Result<Option<Room>, StoreError>;
    async fn user(&self, id: Ulid) -> Result<Option<User>, StoreError>;
    async fn booking(&self, id: Ulid) -> Result<Option<Booking>, StoreError>;
    async fn buildings(&self) -> Result<Vec<Building>, StoreError>;

    // ── Booking reads ────────────────────────────────────────
    /// All bookings for a room in any of `statuses`, sorted by start.
    /// An unknown room yields an empty list.
    async fn bookings_for_room(
        &self,
        room_id: Ulid,
        statuses: &[BookingStatus],
    ) -> Result<Vec<Booking>, StoreError>;

    /// A user's bookings matching `query`, newest start first.
    async fn bookings_for_user(
        &self,
        user_id: Ulid,
        query: &BookingQuery,
    ) -> Result<Vec<Booking>, StoreError>;

    /// Bookings in `statuses` starting strictly after `window.start` and at
    /// or before `window.end`, soonest first.
    async fn bookings_starting_in(
        &self,
        window: TimeSlot,
        statuses: &[BookingStatus],
    ) -> Result<Vec<Booking>, StoreError>;

    // ── Room reads ───────────────────────────────────────────
    async fn rooms_matching(&self, filter: &RoomFilter) -> Result<Vec<Room>, StoreError>;

    /// Set-wise exclusion query: which of `room_ids` have a booking in
    /// `statuses` overlapping `slot`. One pass instead of per-room calls.
    async fn rooms_with_overlap(
        &self,
        room_ids: &[Ulid],
        slot: TimeSlot,
        statuses: &[BookingStatus],
    ) -> Result<HashSet<Ulid>, StoreError>;

    // ── Mutations ────────────────────────────────────────────
    /// Commit a new booking. Re-runs the overlap scan against the room's
    /// active bookings under the room lock; a hit is `StoreError::Conflict`.
    async fn insert_booking(&self, booking: Booking) -> Result<Booking, StoreError>;

    async fn update_booking(&self, id: Ulid, update: BookingUpdate)
        -> Result<Booking, StoreError>;

    async fn insert_building(&self, building: Building) -> Result<Building, StoreError>;
    async fn update_building(&self, id: Ulid, patch: BuildingPatch, now: Ms)
        -> Result<Building, StoreError>;
    async fn delete_building(&self, id: Ulid) -> Result<(), StoreError>;

    async fn insert_room(&self, room: Room) -> Result<Room, StoreError>;
    async fn update_room(&self, id: Ulid, patch: RoomPatch, now: Ms) -> Result<Room, StoreError>;
    async fn delete_room(&self, id: Ulid) -> Result<(), StoreError>;

    async fn insert_user(&self, user: User) -> Result<User, StoreError>;
}

/// Instantiate the configured backend. Called exactly once at startup;
/// every engine call thereafter goes through the returned handle.
pub fn resolve(config: &Config) -> Arc<dyn CampusStore> {
    match config.store_backend {
        StoreBackend::Memory => Arc::new(MemoryStore::new()),
    }
}
