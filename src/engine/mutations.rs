use ulid::Ulid;

use crate::identity::RequestContext;
use crate::limits::MAX_NAME_LEN;
use crate::model::{
    Booking, BookingDraft, BookingPatch, BookingStatus, Building, BuildingDraft, BuildingPatch,
    Room, RoomDraft, RoomPatch, TimeSlot,
};
use crate::observability;
use crate::store::BookingUpdate;

use super::conflict::{find_conflict, now_ms};
use super::lifecycle::{self, Transition};
use super::validate::{self, ValidationReport, Violation};
use super::{BookingEngine, BookingError, NoticeKind};

impl BookingEngine {
    /// Structural validation only — no store access. Exposed so the route
    /// layer can pre-check a payload without attempting a write.
    pub fn validate_booking(&self, draft: &BookingDraft) -> ValidationReport {
        validate::screen(draft, now_ms())
    }

    /// Validate → availability check → persist as PENDING. The pre-write
    /// availability check is a fast path; the store re-runs the overlap scan
    /// under the room's lock at commit, so a racing request for the same
    /// slot gets `Conflict` even if both passed the check here.
    pub async fn create_booking(
        &self,
        ctx: &RequestContext,
        draft: BookingDraft,
    ) -> Result<Booking, BookingError> {
        self.check_rate(ctx.user_id, "create_booking")?;
        let now = now_ms();
        // The identity collaborator, not the payload, says who is booking.
        let draft = BookingDraft { user_id: Some(ctx.user_id), ..draft };
        let candidate = validate::admit(draft, now).map_err(BookingError::Validation)?;

        let user = self.require_user(candidate.user_id).await?;
        let room = self.require_room(candidate.room_id).await?;
        if !room.is_bookable || !room.is_active {
            return Err(BookingError::RoomNotBookable(room.id));
        }

        let existing = self
            .store_call(
                "bookings_for_room",
                self.store.bookings_for_room(room.id, &BookingStatus::ACTIVE),
            )
            .await?;
        if find_conflict(&existing, &candidate.slot, None).is_some() {
            metrics::counter!(observability::BOOKING_CONFLICTS_TOTAL, "stage" => "precheck")
                .increment(1);
            return Err(BookingError::Conflict { room_id: room.id, slot: candidate.slot });
        }

        let booking = Booking {
            id: Ulid::new(),
            user_id: user.id,
            room_id: room.id,
            slot: candidate.slot,
            purpose: candidate.purpose,
            status: BookingStatus::Pending,
            is_recurring: false,
            recurrence_pattern: None,
            parent_booking_id: None,
            cost: candidate.slot.duration_hours() * room.hourly_rate,
            notes: candidate.notes,
            created_at: now,
            updated_at: now,
        };
        let stored = self
            .store_call("insert_booking", self.store.insert_booking(booking))
            .await
            .inspect_err(|e| {
                if matches!(e, BookingError::Conflict { .. }) {
                    metrics::counter!(observability::BOOKING_CONFLICTS_TOTAL, "stage" => "commit")
                        .increment(1);
                }
            })?;

        metrics::counter!(observability::BOOKINGS_CREATED_TOTAL).increment(1);
        tracing::info!(
            booking = %stored.id,
            room = %stored.room_id,
            user = %ctx.user_id,
            "booking created"
        );
        self.dispatch(NoticeKind::Created, stored.clone());
        Ok(stored)
    }

    pub async fn confirm_booking(
        &self,
        ctx: &RequestContext,
        id: Ulid,
    ) -> Result<Booking, BookingError> {
        self.apply_transition(ctx, id, Transition::Confirm, None).await
    }

    pub async fn cancel_booking(
        &self,
        ctx: &RequestContext,
        id: Ulid,
        reason: Option<String>,
    ) -> Result<Booking, BookingError> {
        self.check_rate(ctx.user_id, "cancel_booking")?;
        let notes_append = reason.map(|r| format!("Cancellation reason: {r}"));
        let cancelled = self.apply_transition(ctx, id, Transition::Cancel, notes_append).await?;
        self.dispatch(NoticeKind::Cancelled, cancelled.clone());
        Ok(cancelled)
    }

    pub async fn complete_booking(
        &self,
        ctx: &RequestContext,
        id: Ulid,
    ) -> Result<Booking, BookingError> {
        self.apply_transition(ctx, id, Transition::Complete, None).await
    }

    pub async fn mark_no_show(
        &self,
        ctx: &RequestContext,
        id: Ulid,
    ) -> Result<Booking, BookingError> {
        self.apply_transition(ctx, id, Transition::MarkNoShow, None).await
    }

    async fn apply_transition(
        &self,
        ctx: &RequestContext,
        id: Ulid,
        transition: Transition,
        notes_append: Option<String>,
    ) -> Result<Booking, BookingError> {
        let booking = self.require_booking(id).await?;
        if transition == Transition::Confirm && booking.status == BookingStatus::Confirmed {
            // Confirming a confirmed booking is a no-op, not an error.
            return Ok(booking);
        }
        if !booking.status.can_transition_to(transition.target()) {
            return Err(BookingError::IllegalTransition {
                from: booking.status,
                attempted: transition.label(),
            });
        }
        // The store re-validates against the status it reads under the room
        // lock, so a stale read here can't smuggle in a forbidden move.
        let updated = self
            .store_call(
                transition.label(),
                self.store.update_booking(
                    id,
                    BookingUpdate::Transition {
                        to: transition.target(),
                        notes_append,
                        now: now_ms(),
                    },
                ),
            )
            .await?;
        metrics::counter!(
            observability::BOOKING_TRANSITIONS_TOTAL,
            "to" => updated.status.as_str()
        )
        .increment(1);
        tracing::info!(
            booking = %id,
            user = %ctx.user_id,
            to = updated.status.as_str(),
            "booking transition"
        );
        Ok(updated)
    }

    /// Edit time/purpose/notes on a still-active booking. A time change
    /// re-runs the same structural rules as creation (including the
    /// future-start rule when the start moves) and the availability check
    /// excluding this booking, then recomputes cost.
    pub async fn update_booking(
        &self,
        ctx: &RequestContext,
        id: Ulid,
        patch: BookingPatch,
    ) -> Result<Booking, BookingError> {
        if patch.changes_times() {
            self.check_rate(ctx.user_id, "update_booking")?;
        }
        let booking = self.require_booking(id).await?;
        if !lifecycle::can_edit(booking.status) {
            return Err(BookingError::IllegalTransition {
                from: booking.status,
                attempted: "edit",
            });
        }

        let now = now_ms();
        let merged_start = patch.start_time.unwrap_or(booking.slot.start);
        let merged_end = patch.end_time.unwrap_or(booking.slot.end);
        let probe = BookingDraft {
            user_id: Some(booking.user_id),
            room_id: Some(booking.room_id),
            start_time: Some(merged_start),
            end_time: Some(merged_end),
            purpose: Some(patch.purpose.clone().unwrap_or_else(|| booking.purpose.clone())),
            notes: patch.notes.clone().or_else(|| booking.notes.clone()),
        };
        let mut report = validate::screen(&probe, now);
        if patch.start_time.is_none() {
            // The start isn't moving; an in-progress booking may still have
            // its end or text fields edited.
            report.violations.retain(|v| *v != Violation::StartNotInFuture);
        }
        if !report.is_valid() {
            return Err(BookingError::Validation(report));
        }

        let mut slot_change = None;
        let mut cost = None;
        if patch.changes_times() {
            let new_slot = TimeSlot::new(merged_start, merged_end);
            let existing = self
                .store_call(
                    "bookings_for_room",
                    self.store.bookings_for_room(booking.room_id, &BookingStatus::ACTIVE),
                )
                .await?;
            if find_conflict(&existing, &new_slot, Some(id)).is_some() {
                metrics::counter!(observability::BOOKING_CONFLICTS_TOTAL, "stage" => "precheck")
                    .increment(1);
                return Err(BookingError::Conflict { room_id: booking.room_id, slot: new_slot });
            }
            let room = self.require_room(booking.room_id).await?;
            cost = Some(new_slot.duration_hours() * room.hourly_rate);
            slot_change = Some(new_slot);
        }

        let updated = self
            .store_call(
                "edit",
                self.store.update_booking(
                    id,
                    BookingUpdate::Edit {
                        slot: slot_change,
                        purpose: patch.purpose.map(|p| p.trim().to_string()),
                        notes: patch.notes,
                        cost,
                        now,
                    },
                ),
            )
            .await
            .inspect_err(|e| {
                if matches!(e, BookingError::Conflict { .. }) {
                    metrics::counter!(observability::BOOKING_CONFLICTS_TOTAL, "stage" => "commit")
                        .increment(1);
                }
            })?;
        tracing::info!(booking = %id, user = %ctx.user_id, "booking updated");
        Ok(updated)
    }

    // ── Inventory management (admin surface) ─────────────────

    pub async fn create_building(
        &self,
        ctx: &RequestContext,
        draft: BuildingDraft,
    ) -> Result<Building, BookingError> {
        if draft.code.trim().is_empty() {
            return Err(BookingError::LimitExceeded("building code required"));
        }
        if draft.name.len() > MAX_NAME_LEN {
            return Err(BookingError::LimitExceeded("building name too long"));
        }
        let now = now_ms();
        let building = Building {
            id: Ulid::new(),
            code: draft.code,
            name: draft.name,
            address: draft.address,
            latitude: draft.latitude,
            longitude: draft.longitude,
            floors: draft.floors,
            is_accessible: draft.is_accessible,
            description: draft.description,
            operating_hours: draft.operating_hours,
            created_at: now,
            updated_at: now,
        };
        let stored = self
            .store_call("insert_building", self.store.insert_building(building))
            .await?;
        tracing::info!(building = %stored.id, user = %ctx.user_id, "building created");
        Ok(stored)
    }

    pub async fn update_building(
        &self,
        ctx: &RequestContext,
        id: Ulid,
        patch: BuildingPatch,
    ) -> Result<Building, BookingError> {
        if patch.name.as_ref().is_some_and(|n| n.len() > MAX_NAME_LEN) {
            return Err(BookingError::LimitExceeded("building name too long"));
        }
        let updated = self
            .store_call("update_building", self.store.update_building(id, patch, now_ms()))
            .await?;
        tracing::info!(building = %id, user = %ctx.user_id, "building updated");
        Ok(updated)
    }

    pub async fn delete_building(
        &self,
        ctx: &RequestContext,
        id: Ulid,
    ) -> Result<(), BookingError> {
        self.store_call("delete_building", self.store.delete_building(id)).await?;
        tracing::info!(building = %id, user = %ctx.user_id, "building deleted");
        Ok(())
    }

    pub async fn create_room(
        &self,
        ctx: &RequestContext,
        draft: RoomDraft,
    ) -> Result<Room, BookingError> {
        if draft.capacity == 0 {
            return Err(BookingError::LimitExceeded("room capacity must be positive"));
        }
        if draft.name.len() > MAX_NAME_LEN {
            return Err(BookingError::LimitExceeded("room name too long"));
        }
        self.require_building(draft.building_id).await?;
        let now = now_ms();
        let room = Room {
            id: Ulid::new(),
            building_id: draft.building_id,
            room_number: draft.room_number,
            name: draft.name,
            room_type: draft.room_type,
            capacity: draft.capacity,
            floor: draft.floor,
            is_accessible: draft.is_accessible,
            is_bookable: draft.is_bookable,
            is_active: draft.is_active,
            hourly_rate: draft.hourly_rate,
            description: draft.description,
            created_at: now,
            updated_at: now,
        };
        let stored = self.store_call("insert_room", self.store.insert_room(room)).await?;
        tracing::info!(room = %stored.id, user = %ctx.user_id, "room created");
        Ok(stored)
    }

    pub async fn update_room(
        &self,
        ctx: &RequestContext,
        id: Ulid,
        patch: RoomPatch,
    ) -> Result<Room, BookingError> {
        if patch.capacity == Some(0) {
            return Err(BookingError::LimitExceeded("room capacity must be positive"));
        }
        if patch.name.as_ref().is_some_and(|n| n.len() > MAX_NAME_LEN) {
            return Err(BookingError::LimitExceeded("room name too long"));
        }
        let updated = self
            .store_call("update_room", self.store.update_room(id, patch, now_ms()))
            .await?;
        tracing::info!(room = %id, user = %ctx.user_id, "room updated");
        Ok(updated)
    }

    pub async fn delete_room(&self, ctx: &RequestContext, id: Ulid) -> Result<(), BookingError> {
        self.store_call("delete_room", self.store.delete_room(id)).await?;
        tracing::info!(room = %id, user = %ctx.user_id, "room deleted");
        Ok(())
    }
}
