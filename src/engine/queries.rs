use std::collections::HashMap;

use ulid::Ulid;

use crate::limits::{MAX_LIST_LIMIT, MAX_SEARCH_ROOM_IDS};
use crate::model::{
    Booking, BookingQuery, BookingStatus, Ms, Room, RoomFilter, RoomUtilization, TimeSlot,
};
use crate::observability;

use super::conflict::{find_conflict, now_ms, validate_window};
use super::{BookingEngine, BookingError};

impl BookingEngine {
    /// True iff no active booking overlaps `slot`, optionally ignoring one
    /// booking (reschedule-in-place). Pure read: correctness under racing
    /// writes is the store's commit-time recheck, not this call.
    ///
    /// Callers guarantee `slot.start < slot.end`; ordering is not re-checked.
    pub async fn check_room_availability(
        &self,
        room_id: Ulid,
        slot: TimeSlot,
        exclude: Option<Ulid>,
    ) -> Result<bool, BookingError> {
        self.require_room(room_id).await?;
        let bookings = self
            .store_call(
                "bookings_for_room",
                self.store.bookings_for_room(room_id, &BookingStatus::ACTIVE),
            )
            .await?;
        Ok(find_conflict(&bookings, &slot, exclude).is_none())
    }

    /// Campus-wide availability search: bookable, active rooms matching the
    /// filter, minus every room with an active booking overlapping `slot`.
    /// One set-wise exclusion query, not a per-room loop.
    ///
    /// Ordering is stable — building name, then room number, then id — so
    /// pagination and tests see the same sequence every time.
    pub async fn search_available_rooms(
        &self,
        slot: TimeSlot,
        filter: &RoomFilter,
    ) -> Result<Vec<Room>, BookingError> {
        validate_window(&slot)?;
        metrics::counter!(observability::ROOM_SEARCHES_TOTAL).increment(1);

        let candidate_filter = RoomFilter {
            is_bookable: Some(true),
            is_active: Some(true),
            ..filter.clone()
        };
        let rooms = self
            .store_call("rooms_matching", self.store.rooms_matching(&candidate_filter))
            .await?;
        if rooms.len() > MAX_SEARCH_ROOM_IDS {
            return Err(BookingError::LimitExceeded("too many candidate rooms"));
        }

        let ids: Vec<Ulid> = rooms.iter().map(|r| r.id).collect();
        let busy = self
            .store_call(
                "rooms_with_overlap",
                self.store.rooms_with_overlap(&ids, slot, &BookingStatus::ACTIVE),
            )
            .await?;
        let mut free: Vec<Room> = rooms.into_iter().filter(|r| !busy.contains(&r.id)).collect();

        let buildings = self.store_call("buildings", self.store.buildings()).await?;
        let names: HashMap<Ulid, String> =
            buildings.into_iter().map(|b| (b.id, b.name)).collect();
        free.sort_by(|a, b| {
            let a_name = names.get(&a.building_id).map(String::as_str).unwrap_or("");
            let b_name = names.get(&b.building_id).map(String::as_str).unwrap_or("");
            a_name
                .cmp(b_name)
                .then_with(|| a.room_number.cmp(&b.room_number))
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(free)
    }

    /// Building-scoped variant: same exclusion logic over one building's rooms.
    pub async fn search_building_rooms(
        &self,
        building_id: Ulid,
        slot: TimeSlot,
        filter: &RoomFilter,
    ) -> Result<Vec<Room>, BookingError> {
        self.require_building(building_id).await?;
        let scoped = RoomFilter { building_id: Some(building_id), ..filter.clone() };
        self.search_available_rooms(slot, &scoped).await
    }

    pub async fn get_booking(&self, id: Ulid) -> Result<Booking, BookingError> {
        self.require_booking(id).await
    }

    /// A user's bookings, newest start first.
    pub async fn user_bookings(
        &self,
        user_id: Ulid,
        query: &BookingQuery,
    ) -> Result<Vec<Booking>, BookingError> {
        self.require_user(user_id).await?;
        self.store_call("bookings_for_user", self.store.bookings_for_user(user_id, query))
            .await
    }

    /// A room's bookings, oldest start first.
    pub async fn room_bookings(
        &self,
        room_id: Ulid,
        query: &BookingQuery,
    ) -> Result<Vec<Booking>, BookingError> {
        self.require_room(room_id).await?;
        let statuses: Vec<BookingStatus> = match query.status {
            Some(s) => vec![s],
            None => BookingStatus::ALL.to_vec(),
        };
        let mut bookings = self
            .store_call("bookings_for_room", self.store.bookings_for_room(room_id, &statuses))
            .await?;
        bookings.retain(|b| query.matches(b));
        bookings.truncate(query.limit.unwrap_or(MAX_LIST_LIMIT).min(MAX_LIST_LIMIT));
        Ok(bookings)
    }

    /// Active bookings starting within the next `hours_ahead` hours,
    /// soonest first.
    pub async fn upcoming_bookings(&self, hours_ahead: u32) -> Result<Vec<Booking>, BookingError> {
        let now = now_ms();
        let window = TimeSlot::new(now, now + Ms::from(hours_ahead) * 3_600_000);
        validate_window(&window)?;
        self.store_call(
            "bookings_starting_in",
            self.store.bookings_starting_in(window, &BookingStatus::ACTIVE),
        )
        .await
    }

    /// Usage rollup for one room over `range` (bookings fully inside it).
    pub async fn room_utilization(
        &self,
        room_id: Ulid,
        range: TimeSlot,
    ) -> Result<RoomUtilization, BookingError> {
        validate_window(&range)?;
        self.require_room(room_id).await?;
        let bookings = self
            .store_call(
                "bookings_for_room",
                self.store.bookings_for_room(room_id, &BookingStatus::ALL),
            )
            .await?;

        let mut stats = RoomUtilization {
            total_bookings: 0,
            total_hours_booked: 0.0,
            avg_booking_duration_hours: 0.0,
            completed_bookings: 0,
            cancelled_bookings: 0,
            no_show_bookings: 0,
        };
        for b in bookings
            .iter()
            .filter(|b| b.slot.start >= range.start && b.slot.end <= range.end)
        {
            stats.total_bookings += 1;
            stats.total_hours_booked += b.slot.duration_hours();
            match b.status {
                BookingStatus::Completed => stats.completed_bookings += 1,
                BookingStatus::Cancelled => stats.cancelled_bookings += 1,
                BookingStatus::NoShow => stats.no_show_bookings += 1,
                _ => {}
            }
        }
        if stats.total_bookings > 0 {
            stats.avg_booking_duration_hours =
                stats.total_hours_booked / stats.total_bookings as f64;
        }
        Ok(stats)
    }
}
