use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::broadcast;
use ulid::Ulid;

use serde::Serialize;

use crate::model::{Booking, Building, Room, User};

const CHANNEL_CAPACITY: usize = 256;

/// Everything a downstream channel (email, UI event stream) needs to render
/// a booking message without further lookups.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingNotice {
    pub booking: Booking,
    pub room: Room,
    pub building: Building,
    pub user: User,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BookingEvent {
    Created(BookingNotice),
    Cancelled(BookingNotice),
}

impl BookingEvent {
    pub fn notice(&self) -> &BookingNotice {
        match self {
            BookingEvent::Created(n) | BookingEvent::Cancelled(n) => n,
        }
    }
}

#[derive(Debug)]
pub struct NotifyError(pub String);

impl std::fmt::Display for NotifyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "notification failed: {}", self.0)
    }
}

impl std::error::Error for NotifyError {}

/// Outbound notification seam. The engine calls this after a booking is
/// created or cancelled, on a detached task: an `Err` is logged and
/// swallowed, never surfaced to the booking caller.
#[async_trait]
pub trait BookingNotifier: Send + Sync {
    async fn booking_created(&self, notice: &BookingNotice) -> Result<(), NotifyError>;
    async fn booking_cancelled(&self, notice: &BookingNotice) -> Result<(), NotifyError>;
}

/// Discards every notice. For embedders that handle messaging elsewhere.
pub struct NullNotifier;

#[async_trait]
impl BookingNotifier for NullNotifier {
    async fn booking_created(&self, _notice: &BookingNotice) -> Result<(), NotifyError> {
        Ok(())
    }

    async fn booking_cancelled(&self, _notice: &BookingNotice) -> Result<(), NotifyError> {
        Ok(())
    }
}

/// In-process fan-out: one broadcast channel per room, for live UI updates
/// (availability grids, admin dashboards).
pub struct BroadcastNotifier {
    channels: DashMap<Ulid, broadcast::Sender<BookingEvent>>,
}

impl BroadcastNotifier {
    pub fn new() -> Self {
        Self { channels: DashMap::new() }
    }

    /// Subscribe to events for a room. Creates the channel if needed.
    pub fn subscribe(&self, room_id: Ulid) -> broadcast::Receiver<BookingEvent> {
        let sender = self
            .channels
            .entry(room_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        sender.subscribe()
    }

    /// Remove a channel (e.g. when a room is deleted).
    pub fn remove(&self, room_id: &Ulid) {
        self.channels.remove(room_id);
    }

    fn send(&self, event: BookingEvent) {
        // No-op if nobody is listening on this room.
        if let Some(sender) = self.channels.get(&event.notice().booking.room_id) {
            let _ = sender.send(event);
        }
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BookingNotifier for BroadcastNotifier {
    async fn booking_created(&self, notice: &BookingNotice) -> Result<(), NotifyError> {
        self.send(BookingEvent::Created(notice.clone()));
        Ok(())
    }

    async fn booking_cancelled(&self, notice: &BookingNotice) -> Result<(), NotifyError> {
        self.send(BookingEvent::Cancelled(notice.clone()));
        Ok(())
    }
}
