//! Hard limits on inputs. Everything here is enforced before any state is
//! touched, so a malformed or hostile request can't bloat a room's ledger or
//! scan an unbounded window.

use crate::model::Ms;

/// Shortest bookable slot: 30 minutes.
pub const MIN_BOOKING_DURATION_MS: Ms = 30 * 60_000;

/// Longest bookable slot: 24 hours.
pub const MAX_BOOKING_DURATION_MS: Ms = 24 * 3_600_000;

/// Timestamps before the epoch are always garbage input.
pub const MIN_VALID_TIMESTAMP_MS: Ms = 0;

/// 2100-01-01T00:00:00Z. Anything later is garbage input.
pub const MAX_VALID_TIMESTAMP_MS: Ms = 4_102_444_800_000;

pub const MAX_PURPOSE_LEN: usize = 500;
pub const MAX_NOTES_LEN: usize = 2_000;
pub const MAX_NAME_LEN: usize = 256;

/// Widest window an availability search may scan: 90 days.
pub const MAX_QUERY_WINDOW_MS: Ms = 90 * 24 * 3_600_000;

/// Cap on the candidate-room set handed to the set-wise overlap query.
pub const MAX_SEARCH_ROOM_IDS: usize = 1_000;

/// Default cap on listing queries that don't pass their own limit.
pub const MAX_LIST_LIMIT: usize = 500;
