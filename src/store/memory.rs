use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::RwLock;
use ulid::Ulid;

use crate::limits::MAX_LIST_LIMIT;
use crate::model::{
    Booking, BookingQuery, BookingStatus, Building, BuildingPatch, Ms, Room, RoomFilter,
    RoomPatch, TimeSlot, User,
};

use super::{BookingUpdate, CampusStore, Entity, StoreError};

/// Booking history for one room, sorted by slot start. The surrounding
/// `RwLock`'s write guard is the room's critical section: every commit-time
/// conflict recheck happens while holding it, which is what makes the
/// query-then-insert race lose cleanly.
#[derive(Debug, Default)]
struct RoomLedger {
    bookings: Vec<Booking>,
}

impl RoomLedger {
    /// Insert maintaining sort order by slot.start.
    fn insert_sorted(&mut self, booking: Booking) {
        let pos = self
            .bookings
            .binary_search_by_key(&booking.slot.start, |b| b.slot.start)
            .unwrap_or_else(|e| e);
        self.bookings.insert(pos, booking);
    }

    fn position(&self, id: Ulid) -> Option<usize> {
        self.bookings.iter().position(|b| b.id == id)
    }

    /// Bookings whose slot overlaps the query window.
    /// Binary search skips everything starting at or after `query.end`.
    fn overlapping(&self, query: &TimeSlot) -> impl Iterator<Item = &Booking> {
        let right_bound = self.bookings.partition_point(|b| b.slot.start < query.end);
        self.bookings[..right_bound]
            .iter()
            .filter(move |b| b.slot.end > query.start)
    }

    /// True if an active booking other than `exclude` overlaps `slot`.
    fn has_conflict(&self, slot: &TimeSlot, exclude: Option<Ulid>) -> bool {
        self.overlapping(slot)
            .any(|b| b.status.is_active() && exclude != Some(b.id) && b.slot.overlaps(slot))
    }
}

/// In-process `CampusStore`. Rooms, buildings, and users live in concurrent
/// maps; each room's bookings live behind that room's own `RwLock`.
pub struct MemoryStore {
    buildings: DashMap<Ulid, Building>,
    /// code → building id, for the unique-code invariant
    building_codes: DashMap<String, Ulid>,
    rooms: DashMap<Ulid, Room>,
    users: DashMap<Ulid, User>,
    ledgers: DashMap<Ulid, Arc<RwLock<RoomLedger>>>,
    /// booking id → room id
    booking_rooms: DashMap<Ulid, Ulid>,
    /// building id → room ids
    building_rooms: DashMap<Ulid, Vec<Ulid>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            buildings: DashMap::new(),
            building_codes: DashMap::new(),
            rooms: DashMap::new(),
            users: DashMap::new(),
            ledgers: DashMap::new(),
            booking_rooms: DashMap::new(),
            building_rooms: DashMap::new(),
        }
    }

    fn ledger(&self, room_id: &Ulid) -> Option<Arc<RwLock<RoomLedger>>> {
        self.ledgers.get(room_id).map(|e| e.value().clone())
    }

    fn apply_edit_fields(
        booking: &mut Booking,
        purpose: Option<String>,
        notes: Option<String>,
        cost: Option<f64>,
        now: Ms,
    ) {
        if let Some(p) = purpose {
            booking.purpose = p;
        }
        if let Some(n) = notes {
            booking.notes = Some(n);
        }
        if let Some(c) = cost {
            booking.cost = c;
        }
        booking.updated_at = now;
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CampusStore for MemoryStore {
    async fn building(&self, id: Ulid) -> Result<Option<Building>, StoreError> {
        Ok(self.buildings.get(&id).map(|e| e.value().clone()))
    }

    async fn room(&self, id: Ulid) -> Result<Option<Room>, StoreError> {
        Ok(self.rooms.get(&id).map(|e| e.value().clone()))
    }

    async fn user(&self, id: Ulid) -> Result<Option<User>, StoreError> {
        Ok(self.users.get(&id).map(|e| e.value().clone()))
    }

    async fn booking(&self, id: Ulid) -> Result<Option<Booking>, StoreError> {
        let Some(room_id) = self.booking_rooms.get(&id).map(|e| *e.value()) else {
            return Ok(None);
        };
        let Some(ledger) = self.ledger(&room_id) else {
            return Ok(None);
        };
        let guard = ledger.read().await;
        Ok(guard.position(id).map(|pos| guard.bookings[pos].clone()))
    }

    async fn buildings(&self) -> Result<Vec<Building>, StoreError> {
        let mut all: Vec<Building> =
            self.buildings.iter().map(|e| e.value().clone()).collect();
        all.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(all)
    }

    async fn bookings_for_room(
        &self,
        room_id: Ulid,
        statuses: &[BookingStatus],
    ) -> Result<Vec<Booking>, StoreError> {
        let Some(ledger) = self.ledger(&room_id) else {
            return Ok(Vec::new());
        };
        let guard = ledger.read().await;
        Ok(guard
            .bookings
            .iter()
            .filter(|b| statuses.contains(&b.status))
            .cloned()
            .collect())
    }

    async fn bookings_for_user(
        &self,
        user_id: Ulid,
        query: &BookingQuery,
    ) -> Result<Vec<Booking>, StoreError> {
        // Snapshot the ledger handles before awaiting any of their locks, so
        // no map shard stays held across an await.
        let ledgers: Vec<_> = self.ledgers.iter().map(|e| e.value().clone()).collect();
        let mut found = Vec::new();
        for ledger in ledgers {
            let guard = ledger.read().await;
            found.extend(
                guard
                    .bookings
                    .iter()
                    .filter(|b| b.user_id == user_id && query.matches(b))
                    .cloned(),
            );
        }
        // Newest start first; id breaks ties for stable pagination.
        found.sort_by(|a, b| b.slot.start.cmp(&a.slot.start).then(a.id.cmp(&b.id)));
        found.truncate(query.limit.unwrap_or(MAX_LIST_LIMIT).min(MAX_LIST_LIMIT));
        Ok(found)
    }

    async fn bookings_starting_in(
        &self,
        window: TimeSlot,
        statuses: &[BookingStatus],
    ) -> Result<Vec<Booking>, StoreError> {
        let ledgers: Vec<_> = self.ledgers.iter().map(|e| e.value().clone()).collect();
        let mut found = Vec::new();
        for ledger in ledgers {
            let guard = ledger.read().await;
            found.extend(
                guard
                    .bookings
                    .iter()
                    .filter(|b| {
                        statuses.contains(&b.status)
                            && b.slot.start > window.start
                            && b.slot.start <= window.end
                    })
                    .cloned(),
            );
        }
        found.sort_by(|a, b| a.slot.start.cmp(&b.slot.start).then(a.id.cmp(&b.id)));
        Ok(found)
    }

    async fn rooms_matching(&self, filter: &RoomFilter) -> Result<Vec<Room>, StoreError> {
        let mut rooms: Vec<Room> = self
            .rooms
            .iter()
            .filter(|e| filter.matches(e.value()))
            .map(|e| e.value().clone())
            .collect();
        rooms.sort_by_key(|r| r.id);
        Ok(rooms)
    }

    async fn rooms_with_overlap(
        &self,
        room_ids: &[Ulid],
        slot: TimeSlot,
        statuses: &[BookingStatus],
    ) -> Result<HashSet<Ulid>, StoreError> {
        let mut busy = HashSet::new();
        for room_id in room_ids {
            let Some(ledger) = self.ledger(room_id) else {
                continue;
            };
            let guard = ledger.read().await;
            if guard
                .overlapping(&slot)
                .any(|b| statuses.contains(&b.status) && b.slot.overlaps(&slot))
            {
                busy.insert(*room_id);
            }
        }
        Ok(busy)
    }

    async fn insert_booking(&self, booking: Booking) -> Result<Booking, StoreError> {
        if self.booking_rooms.contains_key(&booking.id) {
            return Err(StoreError::AlreadyExists(Entity::Booking, booking.id));
        }
        let ledger = self
            .ledger(&booking.room_id)
            .ok_or(StoreError::NotFound(Entity::Room, booking.room_id))?;
        let mut guard = ledger.write().await;
        // The room may have been deleted between the map lookup and the lock.
        if !self.rooms.contains_key(&booking.room_id) {
            return Err(StoreError::NotFound(Entity::Room, booking.room_id));
        }
        if guard.has_conflict(&booking.slot, None) {
            return Err(StoreError::Conflict { room_id: booking.room_id, slot: booking.slot });
        }
        guard.insert_sorted(booking.clone());
        self.booking_rooms.insert(booking.id, booking.room_id);
        Ok(booking)
    }

    async fn update_booking(
        &self,
        id: Ulid,
        update: BookingUpdate,
    ) -> Result<Booking, StoreError> {
        let room_id = *self
            .booking_rooms
            .get(&id)
            .ok_or(StoreError::NotFound(Entity::Booking, id))?;
        let ledger = self
            .ledger(&room_id)
            .ok_or(StoreError::NotFound(Entity::Room, room_id))?;
        let mut guard = ledger.write().await;
        let pos = guard
            .position(id)
            .ok_or(StoreError::NotFound(Entity::Booking, id))?;

        match update {
            BookingUpdate::Transition { to, notes_append, now } => {
                let current = guard.bookings[pos].status;
                if current == BookingStatus::Confirmed && to == BookingStatus::Confirmed {
                    // Idempotent confirm: report the stored state unchanged.
                    return Ok(guard.bookings[pos].clone());
                }
                if !current.can_transition_to(to) {
                    return Err(StoreError::IllegalTransition { from: current });
                }
                let booking = &mut guard.bookings[pos];
                booking.status = to;
                if let Some(line) = notes_append {
                    booking.notes = Some(match booking.notes.take() {
                        Some(existing) => format!("{existing}\n{line}"),
                        None => line,
                    });
                }
                booking.updated_at = now;
                Ok(booking.clone())
            }
            BookingUpdate::Edit { slot, purpose, notes, cost, now } => {
                let current = guard.bookings[pos].status;
                if !current.is_active() {
                    return Err(StoreError::IllegalTransition { from: current });
                }
                if let Some(new_slot) = slot {
                    if guard.has_conflict(&new_slot, Some(id)) {
                        return Err(StoreError::Conflict { room_id, slot: new_slot });
                    }
                    // Reposition under the new start.
                    let mut booking = guard.bookings.remove(pos);
                    booking.slot = new_slot;
                    Self::apply_edit_fields(&mut booking, purpose, notes, cost, now);
                    guard.insert_sorted(booking.clone());
                    return Ok(booking);
                }
                let booking = &mut guard.bookings[pos];
                Self::apply_edit_fields(booking, purpose, notes, cost, now);
                Ok(booking.clone())
            }
        }
    }

    async fn insert_building(&self, building: Building) -> Result<Building, StoreError> {
        if self.buildings.contains_key(&building.id) {
            return Err(StoreError::AlreadyExists(Entity::Building, building.id));
        }
        if let Some(existing) = self.building_codes.get(&building.code) {
            return Err(StoreError::AlreadyExists(Entity::Building, *existing.value()));
        }
        self.building_codes.insert(building.code.clone(), building.id);
        self.building_rooms.entry(building.id).or_default();
        self.buildings.insert(building.id, building.clone());
        Ok(building)
    }

    async fn update_building(
        &self,
        id: Ulid,
        patch: BuildingPatch,
        now: Ms,
    ) -> Result<Building, StoreError> {
        let mut entry = self
            .buildings
            .get_mut(&id)
            .ok_or(StoreError::NotFound(Entity::Building, id))?;
        let building = entry.value_mut();
        if let Some(v) = patch.name {
            building.name = v;
        }
        if let Some(v) = patch.address {
            building.address = v;
        }
        if let Some(v) = patch.latitude {
            building.latitude = v;
        }
        if let Some(v) = patch.longitude {
            building.longitude = v;
        }
        if let Some(v) = patch.floors {
            building.floors = v;
        }
        if let Some(v) = patch.is_accessible {
            building.is_accessible = v;
        }
        if let Some(v) = patch.description {
            building.description = Some(v);
        }
        if let Some(v) = patch.operating_hours {
            building.operating_hours = Some(v);
        }
        building.updated_at = now;
        Ok(building.clone())
    }

    async fn delete_building(&self, id: Ulid) -> Result<(), StoreError> {
        let code = match self.buildings.get(&id) {
            Some(e) => e.value().code.clone(),
            None => return Err(StoreError::NotFound(Entity::Building, id)),
        };
        if self
            .building_rooms
            .get(&id)
            .is_some_and(|rooms| !rooms.is_empty())
        {
            return Err(StoreError::HasRooms(id));
        }
        self.buildings.remove(&id);
        self.building_codes.remove(&code);
        self.building_rooms.remove(&id);
        Ok(())
    }

    async fn insert_room(&self, room: Room) -> Result<Room, StoreError> {
        if !self.buildings.contains_key(&room.building_id) {
            return Err(StoreError::NotFound(Entity::Building, room.building_id));
        }
        if self.rooms.contains_key(&room.id) {
            return Err(StoreError::AlreadyExists(Entity::Room, room.id));
        }
        // Room numbers are unique within a building.
        if let Some(siblings) = self.building_rooms.get(&room.building_id) {
            for sibling_id in siblings.value() {
                if let Some(sibling) = self.rooms.get(sibling_id)
                    && sibling.room_number == room.room_number
                {
                    return Err(StoreError::AlreadyExists(Entity::Room, *sibling_id));
                }
            }
        }
        self.rooms.insert(room.id, room.clone());
        self.ledgers.insert(room.id, Arc::new(RwLock::new(RoomLedger::default())));
        self.building_rooms.entry(room.building_id).or_default().push(room.id);
        Ok(room)
    }

    async fn update_room(
        &self,
        id: Ulid,
        patch: RoomPatch,
        now: Ms,
    ) -> Result<Room, StoreError> {
        let mut entry = self
            .rooms
            .get_mut(&id)
            .ok_or(StoreError::NotFound(Entity::Room, id))?;
        let room = entry.value_mut();
        if let Some(v) = patch.room_number {
            room.room_number = v;
        }
        if let Some(v) = patch.name {
            room.name = v;
        }
        if let Some(v) = patch.room_type {
            room.room_type = v;
        }
        if let Some(v) = patch.capacity {
            room.capacity = v;
        }
        if let Some(v) = patch.floor {
            room.floor = v;
        }
        if let Some(v) = patch.is_accessible {
            room.is_accessible = v;
        }
        if let Some(v) = patch.description {
            room.description = Some(v);
        }
        if let Some(v) = patch.hourly_rate {
            room.hourly_rate = v;
        }
        if let Some(v) = patch.is_bookable {
            room.is_bookable = v;
        }
        if let Some(v) = patch.is_active {
            room.is_active = v;
        }
        room.updated_at = now;
        Ok(room.clone())
    }

    async fn delete_room(&self, id: Ulid) -> Result<(), StoreError> {
        let building_id = match self.rooms.get(&id) {
            Some(e) => e.value().building_id,
            None => return Err(StoreError::NotFound(Entity::Room, id)),
        };
        let ledger = self
            .ledger(&id)
            .ok_or(StoreError::NotFound(Entity::Room, id))?;
        // Hold the room's write lock while unlinking so a racing insert
        // either commits before us (and blocks the delete) or loses its room.
        let guard = ledger.write().await;
        if guard.bookings.iter().any(|b| b.status.is_active()) {
            return Err(StoreError::HasActiveBookings(id));
        }
        for booking in &guard.bookings {
            self.booking_rooms.remove(&booking.id);
        }
        self.rooms.remove(&id);
        self.ledgers.remove(&id);
        if let Some(mut siblings) = self.building_rooms.get_mut(&building_id) {
            siblings.retain(|r| r != &id);
        }
        Ok(())
    }

    async fn insert_user(&self, user: User) -> Result<User, StoreError> {
        if self.users.contains_key(&user.id) {
            return Err(StoreError::AlreadyExists(Entity::User, user.id));
        }
        self.users.insert(user.id, user.clone());
        Ok(user)
    }
}
