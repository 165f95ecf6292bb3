//! Structural booking validation. Runs against the draft alone — never the
//! store — and reports every violated rule, not just the first, because the
//! UI renders them as a list.

use serde::Serialize;
use ulid::Ulid;

use crate::limits::*;
use crate::model::{BookingDraft, Ms, TimeSlot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Violation {
    MissingUserId,
    MissingRoomId,
    MissingStartTime,
    MissingEndTime,
    MissingPurpose,
    EndNotAfterStart,
    StartNotInFuture,
    DurationTooLong,
    DurationTooShort,
    TimestampOutOfRange,
    PurposeTooLong,
    NotesTooLong,
}

impl Violation {
    pub fn message(self) -> &'static str {
        match self {
            Violation::MissingUserId => "user id is required",
            Violation::MissingRoomId => "room id is required",
            Violation::MissingStartTime => "start time is required",
            Violation::MissingEndTime => "end time is required",
            Violation::MissingPurpose => "purpose is required",
            Violation::EndNotAfterStart => "end time must be after start time",
            Violation::StartNotInFuture => "start time must be in the future",
            Violation::DurationTooLong => "booking duration cannot exceed 24 hours",
            Violation::DurationTooShort => "minimum booking duration is 30 minutes",
            Violation::TimestampOutOfRange => "booking time is out of range",
            Violation::PurposeTooLong => "purpose is too long",
            Violation::NotesTooLong => "notes are too long",
        }
    }
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

/// The validator's verdict: valid iff no violations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub violations: Vec<Violation>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn messages(&self) -> Vec<&'static str> {
        self.violations.iter().map(|v| v.message()).collect()
    }

    pub fn contains(&self, violation: Violation) -> bool {
        self.violations.contains(&violation)
    }
}

/// Check every structural rule against the draft and collect all violations,
/// in rule order. Pure: no store access, no side effects.
pub fn screen(draft: &BookingDraft, now: Ms) -> ValidationReport {
    let mut violations = Vec::new();

    if draft.user_id.is_none() {
        violations.push(Violation::MissingUserId);
    }
    if draft.room_id.is_none() {
        violations.push(Violation::MissingRoomId);
    }
    if draft.start_time.is_none() {
        violations.push(Violation::MissingStartTime);
    }
    if draft.end_time.is_none() {
        violations.push(Violation::MissingEndTime);
    }
    match &draft.purpose {
        Some(p) if !p.trim().is_empty() => {
            if p.len() > MAX_PURPOSE_LEN {
                violations.push(Violation::PurposeTooLong);
            }
        }
        _ => violations.push(Violation::MissingPurpose),
    }

    if let (Some(start), Some(end)) = (draft.start_time, draft.end_time) {
        if start >= end {
            violations.push(Violation::EndNotAfterStart);
        }
    }
    if let Some(start) = draft.start_time
        && start <= now
    {
        violations.push(Violation::StartNotInFuture);
    }
    if let (Some(start), Some(end)) = (draft.start_time, draft.end_time)
        && start < end
    {
        let duration = end - start;
        if duration > MAX_BOOKING_DURATION_MS {
            violations.push(Violation::DurationTooLong);
        }
        if duration < MIN_BOOKING_DURATION_MS {
            violations.push(Violation::DurationTooShort);
        }
        if start < MIN_VALID_TIMESTAMP_MS || end > MAX_VALID_TIMESTAMP_MS {
            violations.push(Violation::TimestampOutOfRange);
        }
    }
    if let Some(notes) = &draft.notes
        && notes.len() > MAX_NOTES_LEN
    {
        violations.push(Violation::NotesTooLong);
    }

    ValidationReport { violations }
}

/// A draft that passed every check, with the optionality peeled off.
#[derive(Debug, Clone)]
pub(super) struct Candidate {
    pub user_id: Ulid,
    pub room_id: Ulid,
    pub slot: TimeSlot,
    pub purpose: String,
    pub notes: Option<String>,
}

/// Screen the draft; a clean one becomes a fully-populated candidate.
pub(super) fn admit(draft: BookingDraft, now: Ms) -> Result<Candidate, ValidationReport> {
    let report = screen(&draft, now);
    match (draft.user_id, draft.room_id, draft.start_time, draft.end_time, draft.purpose) {
        (Some(user_id), Some(room_id), Some(start), Some(end), Some(purpose))
            if report.is_valid() =>
        {
            Ok(Candidate {
                user_id,
                room_id,
                slot: TimeSlot::new(start, end),
                purpose: purpose.trim().to_string(),
                notes: draft.notes,
            })
        }
        _ => Err(report),
    }
}
