use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::identity::Role;

/// Unix milliseconds — the only time type.
pub type Ms = i64;

/// Half-open interval `[start, end)`.
///
/// Half-open means two back-to-back slots (one ending exactly where the next
/// starts) never conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlot {
    pub start: Ms,
    pub end: Ms,
}

impl TimeSlot {
    pub fn new(start: Ms, end: Ms) -> Self {
        debug_assert!(start < end, "TimeSlot start must be before end");
        Self { start, end }
    }

    pub fn duration_ms(&self) -> Ms {
        self.end - self.start
    }

    pub fn duration_hours(&self) -> f64 {
        self.duration_ms() as f64 / 3_600_000.0
    }

    /// The single overlap rule. Every conflict check in the crate — the
    /// availability read, the search exclusion scan, and the store's
    /// commit-time recheck — goes through this predicate.
    pub fn overlaps(&self, other: &TimeSlot) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains_instant(&self, t: Ms) -> bool {
        self.start <= t && t < self.end
    }
}

/// Booking lifecycle states. PENDING and CONFIRMED count toward conflict
/// detection; the rest are inert history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
    NoShow,
}

impl BookingStatus {
    /// The statuses that block a room's time.
    pub const ACTIVE: [BookingStatus; 2] = [BookingStatus::Pending, BookingStatus::Confirmed];

    pub const ALL: [BookingStatus; 5] = [
        BookingStatus::Pending,
        BookingStatus::Confirmed,
        BookingStatus::Cancelled,
        BookingStatus::Completed,
        BookingStatus::NoShow,
    ];

    pub fn is_active(self) -> bool {
        matches!(self, BookingStatus::Pending | BookingStatus::Confirmed)
    }

    pub fn is_terminal(self) -> bool {
        !self.is_active()
    }

    /// Legal lifecycle moves. Everything not listed is forbidden; terminal
    /// states have no exits, and nothing ever returns to PENDING.
    pub fn can_transition_to(self, to: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, to),
            (Pending, Confirmed)
                | (Pending, Cancelled)
                | (Confirmed, Cancelled)
                | (Confirmed, Completed)
                | (Confirmed, NoShow)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BookingStatus::Pending => "PENDING",
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::Cancelled => "CANCELLED",
            BookingStatus::Completed => "COMPLETED",
            BookingStatus::NoShow => "NO_SHOW",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomType {
    StudyRoom,
    LectureHall,
    Laboratory,
    ConferenceRoom,
    SportsVenue,
    LibrarySpace,
    MeetingRoom,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Building {
    pub id: Ulid,
    /// Short unique token, e.g. "ENG" or "LIB".
    pub code: String,
    pub name: String,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
    pub floors: u32,
    pub is_accessible: bool,
    pub description: Option<String>,
    /// Free-text, e.g. "Mon-Fri 07:00-22:00". Informational only.
    pub operating_hours: Option<String>,
    pub created_at: Ms,
    pub updated_at: Ms,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub id: Ulid,
    /// A room belongs to exactly one building for its lifetime.
    pub building_id: Ulid,
    pub room_number: String,
    pub name: String,
    #[serde(rename = "type")]
    pub room_type: RoomType,
    pub capacity: u32,
    pub floor: i32,
    pub is_accessible: bool,
    pub is_bookable: bool,
    pub is_active: bool,
    pub hourly_rate: f64,
    pub description: Option<String>,
    pub created_at: Ms,
    pub updated_at: Ms,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Ulid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: Ulid,
    pub user_id: Ulid,
    pub room_id: Ulid,
    #[serde(flatten)]
    pub slot: TimeSlot,
    pub purpose: String,
    pub status: BookingStatus,
    /// Recurrence fields are reserved; no expansion logic reads them.
    pub is_recurring: bool,
    pub recurrence_pattern: Option<String>,
    pub parent_booking_id: Option<Ulid>,
    pub cost: f64,
    pub notes: Option<String>,
    pub created_at: Ms,
    pub updated_at: Ms,
}

impl Booking {
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }
}

// ── Inbound shapes (deserialized from the route layer) ───────────

/// A booking request as it arrives from the client, before validation.
/// Everything is optional so the validator can report every missing field
/// instead of failing to parse.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BookingDraft {
    pub user_id: Option<Ulid>,
    pub room_id: Option<Ulid>,
    pub start_time: Option<Ms>,
    pub end_time: Option<Ms>,
    pub purpose: Option<String>,
    pub notes: Option<String>,
}

/// Field edits allowed while a booking is still PENDING or CONFIRMED.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BookingPatch {
    pub start_time: Option<Ms>,
    pub end_time: Option<Ms>,
    pub purpose: Option<String>,
    pub notes: Option<String>,
}

impl BookingPatch {
    pub fn changes_times(&self) -> bool {
        self.start_time.is_some() || self.end_time.is_some()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildingDraft {
    pub code: String,
    pub name: String,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default = "one")]
    pub floors: u32,
    #[serde(default = "yes")]
    pub is_accessible: bool,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub operating_hours: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomDraft {
    pub building_id: Ulid,
    pub room_number: String,
    pub name: String,
    #[serde(rename = "type")]
    pub room_type: RoomType,
    pub capacity: u32,
    #[serde(default = "one_floor")]
    pub floor: i32,
    #[serde(default = "yes")]
    pub is_accessible: bool,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub hourly_rate: f64,
    #[serde(default = "yes")]
    pub is_bookable: bool,
    #[serde(default = "yes")]
    pub is_active: bool,
}

/// Explicit allowed-field set for room edits. Absent fields are untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RoomPatch {
    pub room_number: Option<String>,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub room_type: Option<RoomType>,
    pub capacity: Option<u32>,
    pub floor: Option<i32>,
    pub is_accessible: Option<bool>,
    pub description: Option<String>,
    pub hourly_rate: Option<f64>,
    pub is_bookable: Option<bool>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BuildingPatch {
    pub name: Option<String>,
    pub address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub floors: Option<u32>,
    pub is_accessible: Option<bool>,
    pub description: Option<String>,
    pub operating_hours: Option<String>,
}

fn one() -> u32 {
    1
}
fn one_floor() -> i32 {
    1
}
fn yes() -> bool {
    true
}

// ── Query shapes ─────────────────────────────────────────────────

/// Room search constraints. All fields optional; absent means "any".
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RoomFilter {
    pub building_id: Option<Ulid>,
    #[serde(rename = "type")]
    pub room_type: Option<RoomType>,
    pub min_capacity: Option<u32>,
    pub floor: Option<i32>,
    pub is_accessible: Option<bool>,
    pub is_bookable: Option<bool>,
    pub is_active: Option<bool>,
}

impl RoomFilter {
    pub fn matches(&self, room: &Room) -> bool {
        self.building_id.is_none_or(|b| room.building_id == b)
            && self.room_type.is_none_or(|t| room.room_type == t)
            && self.min_capacity.is_none_or(|c| room.capacity >= c)
            && self.floor.is_none_or(|f| room.floor == f)
            && self.is_accessible.is_none_or(|a| room.is_accessible == a)
            && self.is_bookable.is_none_or(|b| room.is_bookable == b)
            && self.is_active.is_none_or(|a| room.is_active == a)
    }
}

/// Constraints for booking listings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BookingQuery {
    pub status: Option<BookingStatus>,
    /// Keep bookings starting at or after this instant.
    pub start_date: Option<Ms>,
    /// Keep bookings ending at or before this instant.
    pub end_date: Option<Ms>,
    pub limit: Option<usize>,
}

impl BookingQuery {
    pub fn matches(&self, booking: &Booking) -> bool {
        self.status.is_none_or(|s| booking.status == s)
            && self.start_date.is_none_or(|d| booking.slot.start >= d)
            && self.end_date.is_none_or(|d| booking.slot.end <= d)
    }
}

// ── Query result types ───────────────────────────────────────────

/// Per-room usage rollup over a date range.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomUtilization {
    pub total_bookings: u64,
    pub total_hours_booked: f64,
    pub avg_booking_duration_hours: f64,
    pub completed_bookings: u64,
    pub cancelled_bookings: u64,
    pub no_show_bookings: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_basics() {
        let s = TimeSlot::new(100, 200);
        assert_eq!(s.duration_ms(), 100);
        assert!(s.contains_instant(100));
        assert!(s.contains_instant(199));
        assert!(!s.contains_instant(200)); // half-open
    }

    #[test]
    fn slot_overlap_symmetric() {
        let a = TimeSlot::new(100, 200);
        let b = TimeSlot::new(150, 250);
        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
    }

    #[test]
    fn slot_overlaps_itself() {
        let a = TimeSlot::new(100, 200);
        assert!(a.overlaps(&a));
    }

    #[test]
    fn touching_slots_do_not_overlap() {
        // [10:00,11:00) and [11:00,12:00) are back-to-back-safe
        let a = TimeSlot::new(36_000_000, 39_600_000);
        let b = TimeSlot::new(39_600_000, 43_200_000);
        assert!(!a.overlaps(&b));
        assert!(!b.overlaps(&a));
    }

    #[test]
    fn contained_slot_overlaps() {
        let outer = TimeSlot::new(100, 400);
        let inner = TimeSlot::new(200, 300);
        assert!(outer.overlaps(&inner));
        assert!(inner.overlaps(&outer));
    }

    #[test]
    fn duration_hours() {
        let s = TimeSlot::new(0, 5_400_000); // 90 minutes
        assert!((s.duration_hours() - 1.5).abs() < f64::EPSILON);
    }

    #[test]
    fn active_statuses() {
        assert!(BookingStatus::Pending.is_active());
        assert!(BookingStatus::Confirmed.is_active());
        assert!(!BookingStatus::Cancelled.is_active());
        assert!(!BookingStatus::Completed.is_active());
        assert!(!BookingStatus::NoShow.is_active());
    }

    #[test]
    fn status_serde_screaming_case() {
        let json = serde_json::to_string(&BookingStatus::NoShow).unwrap();
        assert_eq!(json, "\"NO_SHOW\"");
        let back: BookingStatus = serde_json::from_str("\"CONFIRMED\"").unwrap();
        assert_eq!(back, BookingStatus::Confirmed);
    }

    #[test]
    fn room_filter_matches() {
        let room = Room {
            id: Ulid::new(),
            building_id: Ulid::new(),
            room_number: "204".into(),
            name: "Group Study 204".into(),
            room_type: RoomType::StudyRoom,
            capacity: 8,
            floor: 2,
            is_accessible: true,
            is_bookable: true,
            is_active: true,
            hourly_rate: 0.0,
            description: None,
            created_at: 0,
            updated_at: 0,
        };

        assert!(RoomFilter::default().matches(&room));
        assert!(RoomFilter { min_capacity: Some(8), ..Default::default() }.matches(&room));
        assert!(!RoomFilter { min_capacity: Some(9), ..Default::default() }.matches(&room));
        assert!(!RoomFilter { floor: Some(3), ..Default::default() }.matches(&room));
        assert!(
            !RoomFilter { room_type: Some(RoomType::LectureHall), ..Default::default() }
                .matches(&room)
        );
        assert!(
            RoomFilter { building_id: Some(room.building_id), ..Default::default() }.matches(&room)
        );
    }

    #[test]
    fn booking_draft_deserializes_partial_input() {
        // Missing fields must parse, not error — the validator reports them.
        let draft: BookingDraft = serde_json::from_str(r#"{"purpose": "study group"}"#).unwrap();
        assert_eq!(draft.purpose.as_deref(), Some("study group"));
        assert!(draft.user_id.is_none());
        assert!(draft.start_time.is_none());
    }

    #[test]
    fn booking_serializes_flat_slot() {
        let b = Booking {
            id: Ulid::new(),
            user_id: Ulid::new(),
            room_id: Ulid::new(),
            slot: TimeSlot::new(1000, 2000),
            purpose: "seminar".into(),
            status: BookingStatus::Pending,
            is_recurring: false,
            recurrence_pattern: None,
            parent_booking_id: None,
            cost: 0.0,
            notes: None,
            created_at: 0,
            updated_at: 0,
        };
        let json = serde_json::to_value(&b).unwrap();
        assert_eq!(json["start"], 1000);
        assert_eq!(json["end"], 2000);
        assert_eq!(json["status"], "PENDING");
    }
}
