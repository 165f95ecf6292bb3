//! Latency stress for the booking engine on the in-memory store.
//! Run with `cargo bench` (plain binary, no harness).

use std::sync::Arc;
use std::time::{Duration, Instant};

use ulid::Ulid;

use hallpass::config::Config;
use hallpass::engine::BookingEngine;
use hallpass::identity::{RequestContext, Role};
use hallpass::model::{
    BookingDraft, BuildingDraft, Ms, RoomDraft, RoomFilter, RoomType, TimeSlot, User,
};
use hallpass::notify::NullNotifier;
use hallpass::ratelimit::RateLimitPolicy;
use hallpass::store::{self, CampusStore};

const HOUR: Ms = 3_600_000;
const ROOMS: usize = 20;
const BOOKINGS_PER_ROOM: usize = 200;
const RACERS: usize = 64;

fn now_ms() -> Ms {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_millis() as Ms
}

fn percentile(sorted: &[Duration], p: f64) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let idx = ((sorted.len() as f64) * p / 100.0) as usize;
    sorted[idx.min(sorted.len() - 1)]
}

fn print_latency(label: &str, latencies: &mut [Duration]) {
    latencies.sort();
    let total: Duration = latencies.iter().sum();
    let avg = total / latencies.len() as u32;
    println!("  {label}:");
    println!(
        "    n={}, avg={:.3}ms, p50={:.3}ms, p95={:.3}ms, p99={:.3}ms, max={:.3}ms",
        latencies.len(),
        avg.as_secs_f64() * 1000.0,
        percentile(latencies, 50.0).as_secs_f64() * 1000.0,
        percentile(latencies, 95.0).as_secs_f64() * 1000.0,
        percentile(latencies, 99.0).as_secs_f64() * 1000.0,
        latencies.last().unwrap().as_secs_f64() * 1000.0,
    );
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = Config {
        rate_limit: RateLimitPolicy { window_ms: 15 * 60_000, max_attempts: usize::MAX },
        ..Config::default()
    };
    let campus = store::resolve(&config);
    let engine = Arc::new(BookingEngine::new(&config, campus.clone(), Arc::new(NullNotifier)));

    let admin = RequestContext::new(Ulid::new(), Role::Administrator);
    let user_id = Ulid::new();
    campus
        .insert_user(User {
            id: user_id,
            username: "bench".into(),
            email: "bench@campus.edu".into(),
            first_name: "Bench".into(),
            last_name: "Bot".into(),
            role: Role::Staff,
        })
        .await
        .unwrap();
    let ctx = RequestContext::new(user_id, Role::Staff);

    let building = engine
        .create_building(
            &admin,
            BuildingDraft {
                code: "BCH".into(),
                name: "Benchmark Hall".into(),
                address: "0 Campus Way".into(),
                latitude: 0.0,
                longitude: 0.0,
                floors: 1,
                is_accessible: true,
                description: None,
                operating_hours: None,
            },
        )
        .await
        .unwrap();

    let mut rooms = Vec::with_capacity(ROOMS);
    for i in 0..ROOMS {
        let room = engine
            .create_room(
                &admin,
                RoomDraft {
                    building_id: building.id,
                    room_number: format!("{i:03}"),
                    name: format!("Bench {i:03}"),
                    room_type: RoomType::StudyRoom,
                    capacity: 8,
                    floor: 1,
                    is_accessible: true,
                    description: None,
                    hourly_rate: 0.0,
                    is_bookable: true,
                    is_active: true,
                },
            )
            .await
            .unwrap();
        rooms.push(room.id);
    }

    let base = now_ms() + 24 * HOUR;

    println!("hallpass stress: {ROOMS} rooms x {BOOKINGS_PER_ROOM} bookings");

    // Back-to-back inserts per room
    let mut create_lat = Vec::with_capacity(ROOMS * BOOKINGS_PER_ROOM);
    for &room_id in &rooms {
        for slot in 0..BOOKINGS_PER_ROOM {
            let start = base + (slot as Ms) * HOUR;
            let draft = BookingDraft {
                room_id: Some(room_id),
                start_time: Some(start),
                end_time: Some(start + HOUR),
                purpose: Some("bench".into()),
                ..Default::default()
            };
            let begin = Instant::now();
            engine.create_booking(&ctx, draft).await.unwrap();
            create_lat.push(begin.elapsed());
        }
    }
    print_latency("create_booking", &mut create_lat);

    // Availability probes against full ledgers
    let mut avail_lat = Vec::with_capacity(ROOMS * BOOKINGS_PER_ROOM);
    for &room_id in &rooms {
        for slot in 0..BOOKINGS_PER_ROOM {
            let start = base + (slot as Ms) * HOUR;
            let begin = Instant::now();
            let free = engine
                .check_room_availability(room_id, TimeSlot::new(start, start + HOUR), None)
                .await
                .unwrap();
            avail_lat.push(begin.elapsed());
            assert!(!free);
        }
    }
    print_latency("check_room_availability", &mut avail_lat);

    // Campus-wide searches
    let mut search_lat = Vec::with_capacity(200);
    for i in 0..200 {
        let start = base + (i as Ms) * HOUR;
        let begin = Instant::now();
        let _ = engine
            .search_available_rooms(TimeSlot::new(start, start + HOUR), &RoomFilter::default())
            .await
            .unwrap();
        search_lat.push(begin.elapsed());
    }
    print_latency("search_available_rooms", &mut search_lat);

    // Contended slot: many racers, one winner
    let contended_start = base + (BOOKINGS_PER_ROOM as Ms + 10) * HOUR;
    let mut handles = Vec::with_capacity(RACERS);
    for i in 0..RACERS {
        let engine = engine.clone();
        let campus = campus.clone();
        let room_id = rooms[0];
        handles.push(tokio::spawn(async move {
            let id = Ulid::new();
            campus
                .insert_user(User {
                    id,
                    username: format!("racer{i}"),
                    email: format!("racer{i}@campus.edu"),
                    first_name: "Racer".into(),
                    last_name: format!("{i}"),
                    role: Role::Student,
                })
                .await
                .unwrap();
            let ctx = RequestContext::new(id, Role::Student);
            let draft = BookingDraft {
                room_id: Some(room_id),
                start_time: Some(contended_start),
                end_time: Some(contended_start + HOUR),
                purpose: Some("bench race".into()),
                ..Default::default()
            };
            engine.create_booking(&ctx, draft).await.is_ok()
        }));
    }
    let mut winners = 0usize;
    for handle in handles {
        if handle.await.unwrap() {
            winners += 1;
        }
    }
    println!("  contended slot: {RACERS} racers, {winners} winner");
    assert_eq!(winners, 1);
}
