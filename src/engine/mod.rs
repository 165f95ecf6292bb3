//! The booking engine: the operation surface route handlers call into.
//! Reads and writes go through the injected `CampusStore`; notifications and
//! rate limiting are collaborators wired in at construction.

mod conflict;
mod error;
mod lifecycle;
mod mutations;
mod queries;
pub mod validate;

pub use error::BookingError;
pub use lifecycle::Transition;
pub use validate::{ValidationReport, Violation};

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use ulid::Ulid;

use crate::config::Config;
use crate::model::{Booking, Building, Room, User};
use crate::notify::{BookingNotice, BookingNotifier, NullNotifier};
use crate::observability;
use crate::ratelimit::SlidingWindowLimiter;
use crate::store::{self, CampusStore, Entity, StoreError};

pub struct BookingEngine {
    store: Arc<dyn CampusStore>,
    notifier: Arc<dyn BookingNotifier>,
    limiter: SlidingWindowLimiter,
    store_timeout: Duration,
}

impl BookingEngine {
    pub fn new(
        config: &Config,
        store: Arc<dyn CampusStore>,
        notifier: Arc<dyn BookingNotifier>,
    ) -> Self {
        Self {
            store,
            notifier,
            limiter: SlidingWindowLimiter::new(config.rate_limit.clone()),
            store_timeout: config.store_timeout,
        }
    }

    /// Resolve the configured store backend and wire a null notifier.
    pub fn from_config(config: &Config) -> Self {
        Self::new(config, store::resolve(config), Arc::new(NullNotifier))
    }

    /// Bound a store call. Expiry surfaces as a retryable transient error
    /// instead of hanging the request handler.
    pub(super) async fn store_call<T>(
        &self,
        op: &'static str,
        fut: impl Future<Output = Result<T, StoreError>> + Send,
    ) -> Result<T, BookingError> {
        match tokio::time::timeout(self.store_timeout, fut).await {
            Ok(result) => result.map_err(|e| BookingError::from_store(e, op)),
            Err(_) => {
                metrics::counter!(observability::STORE_TIMEOUTS_TOTAL).increment(1);
                tracing::warn!("store call timed out during {op}");
                Err(BookingError::Transient(format!("store timed out during {op}")))
            }
        }
    }

    pub(super) fn check_rate(&self, user_id: Ulid, op: &'static str) -> Result<(), BookingError> {
        self.limiter
            .check(user_id, op, conflict::now_ms())
            .map_err(|retry_after_ms| {
                metrics::counter!(observability::RATE_LIMITED_TOTAL).increment(1);
                tracing::debug!(user = %user_id, "rate limited on {op}");
                BookingError::RateLimited { retry_after_ms }
            })
    }

    // ── Fetch-or-fail helpers ────────────────────────────────

    pub(super) async fn require_building(&self, id: Ulid) -> Result<Building, BookingError> {
        self.store_call("building", self.store.building(id))
            .await?
            .ok_or(BookingError::NotFound(Entity::Building, id))
    }

    pub(super) async fn require_room(&self, id: Ulid) -> Result<Room, BookingError> {
        self.store_call("room", self.store.room(id))
            .await?
            .ok_or(BookingError::NotFound(Entity::Room, id))
    }

    pub(super) async fn require_user(&self, id: Ulid) -> Result<User, BookingError> {
        self.store_call("user", self.store.user(id))
            .await?
            .ok_or(BookingError::NotFound(Entity::User, id))
    }

    pub(super) async fn require_booking(&self, id: Ulid) -> Result<Booking, BookingError> {
        self.store_call("booking", self.store.booking(id))
            .await?
            .ok_or(BookingError::NotFound(Entity::Booking, id))
    }

    /// Fire-and-forget notification dispatch. The collaborator's failure is
    /// logged and swallowed; it must never roll back or fail the booking.
    pub(super) fn dispatch(&self, kind: NoticeKind, booking: Booking) {
        let store = Arc::clone(&self.store);
        let notifier = Arc::clone(&self.notifier);
        tokio::spawn(async move {
            let booking_id = booking.id;
            let notice = match assemble_notice(store.as_ref(), booking).await {
                Ok(notice) => notice,
                Err(reason) => {
                    tracing::warn!(
                        booking = %booking_id,
                        "skipping {} notification: {reason}",
                        kind.label()
                    );
                    return;
                }
            };
            let result = match kind {
                NoticeKind::Created => notifier.booking_created(&notice).await,
                NoticeKind::Cancelled => notifier.booking_cancelled(&notice).await,
            };
            if let Err(e) = result {
                metrics::counter!(observability::NOTIFY_FAILURES_TOTAL).increment(1);
                tracing::warn!(booking = %booking_id, "{} notification failed: {e}", kind.label());
            }
        });
    }
}

#[derive(Debug, Clone, Copy)]
pub(super) enum NoticeKind {
    Created,
    Cancelled,
}

impl NoticeKind {
    fn label(self) -> &'static str {
        match self {
            NoticeKind::Created => "created",
            NoticeKind::Cancelled => "cancelled",
        }
    }
}

/// Join the booking with its room, building, and user so the notifier gets a
/// self-contained payload.
async fn assemble_notice(
    store: &dyn CampusStore,
    booking: Booking,
) -> Result<BookingNotice, String> {
    let room = store
        .room(booking.room_id)
        .await
        .map_err(|e| e.to_string())?
        .ok_or("room no longer exists")?;
    let building = store
        .building(room.building_id)
        .await
        .map_err(|e| e.to_string())?
        .ok_or("building no longer exists")?;
    let user = store
        .user(booking.user_id)
        .await
        .map_err(|e| e.to_string())?
        .ok_or("user no longer exists")?;
    Ok(BookingNotice { booking, room, building, user })
}
