//! End-to-end booking flows through the crate's public surface only:
//! config → resolved store → engine → operations.

use std::sync::Arc;

use ulid::Ulid;

use hallpass::config::Config;
use hallpass::engine::{BookingEngine, BookingError};
use hallpass::identity::{RequestContext, Role};
use hallpass::model::*;
use hallpass::notify::NullNotifier;
use hallpass::ratelimit::RateLimitPolicy;
use hallpass::store::{self, CampusStore};

const H: Ms = 3_600_000;

fn now_ms() -> Ms {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_millis() as Ms
}

struct TestApp {
    engine: Arc<BookingEngine>,
    store: Arc<dyn CampusStore>,
    admin: RequestContext,
}

async fn start_app() -> TestApp {
    let config = Config {
        rate_limit: RateLimitPolicy { window_ms: 15 * 60_000, max_attempts: 10_000 },
        ..Config::default()
    };
    let store = store::resolve(&config);
    let engine =
        Arc::new(BookingEngine::new(&config, store.clone(), Arc::new(NullNotifier)));
    TestApp { engine, store, admin: RequestContext::new(Ulid::new(), Role::Administrator) }
}

async fn seed_student(app: &TestApp) -> RequestContext {
    let id = Ulid::new();
    app.store
        .insert_user(User {
            id,
            username: format!("s{id}"),
            email: format!("s{id}@campus.edu"),
            first_name: "Ada".into(),
            last_name: "Okafor".into(),
            role: Role::Student,
        })
        .await
        .unwrap();
    RequestContext::new(id, Role::Student)
}

fn building_draft(code: &str, name: &str) -> BuildingDraft {
    BuildingDraft {
        code: code.into(),
        name: name.into(),
        address: "1 Campus Way".into(),
        latitude: 40.0,
        longitude: -83.0,
        floors: 2,
        is_accessible: true,
        description: None,
        operating_hours: None,
    }
}

fn room_draft(building_id: Ulid, number: &str) -> RoomDraft {
    RoomDraft {
        building_id,
        room_number: number.into(),
        name: format!("Room {number}"),
        room_type: RoomType::MeetingRoom,
        capacity: 10,
        floor: 1,
        is_accessible: true,
        description: None,
        hourly_rate: 5.0,
        is_bookable: true,
        is_active: true,
    }
}

fn booking_draft(room_id: Ulid, start: Ms, end: Ms) -> BookingDraft {
    BookingDraft {
        room_id: Some(room_id),
        start_time: Some(start),
        end_time: Some(end),
        purpose: Some("club meeting".into()),
        ..Default::default()
    }
}

#[tokio::test]
async fn book_confirm_cancel_roundtrip() {
    let app = start_app().await;
    let student = seed_student(&app).await;

    let building =
        app.engine.create_building(&app.admin, building_draft("LIB", "Main Library")).await.unwrap();
    let room_a = app.engine.create_room(&app.admin, room_draft(building.id, "101")).await.unwrap();
    let room_b = app.engine.create_room(&app.admin, room_draft(building.id, "102")).await.unwrap();

    let t = now_ms() + 24 * H;
    let slot = TimeSlot::new(t, t + 2 * H);

    // Both rooms free
    let free = app.engine.search_available_rooms(slot, &RoomFilter::default()).await.unwrap();
    assert_eq!(free.len(), 2);

    // Book one
    let booking =
        app.engine.create_booking(&student, booking_draft(room_a.id, t, t + 2 * H)).await.unwrap();
    assert_eq!(booking.status, BookingStatus::Pending);
    assert!((booking.cost - 10.0).abs() < f64::EPSILON);

    // Only the other room remains available for that window
    let free = app.engine.search_available_rooms(slot, &RoomFilter::default()).await.unwrap();
    assert_eq!(free.iter().map(|r| r.id).collect::<Vec<_>>(), vec![room_b.id]);

    // Confirm, then cancel with a reason
    app.engine.confirm_booking(&student, booking.id).await.unwrap();
    let cancelled = app
        .engine
        .cancel_booking(&student, booking.id, Some("found a bigger room".into()))
        .await
        .unwrap();
    assert_eq!(cancelled.status, BookingStatus::Cancelled);
    assert!(cancelled.notes.unwrap().contains("found a bigger room"));

    // Cancellation frees the slot again
    let free = app.engine.search_available_rooms(slot, &RoomFilter::default()).await.unwrap();
    assert_eq!(free.len(), 2);
}

#[tokio::test]
async fn reschedule_respects_other_bookings() {
    let app = start_app().await;
    let student = seed_student(&app).await;
    let building =
        app.engine.create_building(&app.admin, building_draft("ENG", "Engineering Hall")).await.unwrap();
    let room = app.engine.create_room(&app.admin, room_draft(building.id, "210")).await.unwrap();

    let t = now_ms() + 24 * H;
    let first =
        app.engine.create_booking(&student, booking_draft(room.id, t, t + H)).await.unwrap();
    let second = app
        .engine
        .create_booking(&student, booking_draft(room.id, t + 3 * H, t + 4 * H))
        .await
        .unwrap();

    // Sliding the second onto the first is refused
    let refused = app
        .engine
        .update_booking(
            &student,
            second.id,
            BookingPatch {
                start_time: Some(t + 30 * 60_000),
                end_time: Some(t + H + 30 * 60_000),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(refused, Err(BookingError::Conflict { .. })));

    // Back-to-back with the first is fine
    let moved = app
        .engine
        .update_booking(
            &student,
            second.id,
            BookingPatch { start_time: Some(t + H), end_time: Some(t + 2 * H), ..Default::default() },
        )
        .await
        .unwrap();
    assert_eq!(moved.slot, TimeSlot::new(t + H, t + 2 * H));

    let _ = first;
}

#[tokio::test]
async fn many_racers_single_winner() {
    let app = start_app().await;
    let building =
        app.engine.create_building(&app.admin, building_draft("GYM", "Field House")).await.unwrap();
    let room = app.engine.create_room(&app.admin, room_draft(building.id, "COURT1")).await.unwrap();

    let t = now_ms() + 24 * H;
    let mut handles = Vec::new();
    for _ in 0..8 {
        let ctx = seed_student(&app).await;
        let engine = app.engine.clone();
        let draft = booking_draft(room.id, t, t + H);
        handles.push(tokio::spawn(async move { engine.create_booking(&ctx, draft).await }));
    }

    let mut winners = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => winners += 1,
            Err(BookingError::Conflict { .. }) => {}
            Err(other) => panic!("losers must see Conflict, got: {other}"),
        }
    }
    assert_eq!(winners, 1);

    let active = app
        .store
        .bookings_for_room(room.id, &BookingStatus::ACTIVE)
        .await
        .unwrap();
    assert_eq!(active.len(), 1);
}

#[tokio::test]
async fn unknown_store_backend_is_rejected() {
    // The backend is resolved explicitly; garbage never falls back silently.
    assert!("redis".parse::<hallpass::config::StoreBackend>().is_err());
}
