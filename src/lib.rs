//! hallpass — the booking core of a campus facility reservation service.
//!
//! Users browse buildings and rooms, check availability, and reserve time
//! slots; staff confirm, complete, or no-show bookings; admins manage the
//! room inventory. This crate is the engine behind those operations: the
//! overlap predicate, availability checks, structural validation, the
//! booking lifecycle, and room search. HTTP routing, authentication, the
//! durable database, and email delivery are external collaborators wired in
//! through the seams in [`store`], [`identity`], and [`notify`].
//!
//! The one invariant everything here defends: for any room, bookings in
//! PENDING or CONFIRMED status never overlap in time — not even under
//! concurrent requests, which lose their race at the store's commit-time
//! recheck rather than double-booking.
//!
//! ```no_run
//! use hallpass::config::Config;
//! use hallpass::engine::BookingEngine;
//!
//! let config = Config::from_env().expect("bad configuration");
//! hallpass::observability::init(config.metrics_port);
//! let engine = BookingEngine::from_config(&config);
//! // hand `engine` to the route layer
//! # let _ = engine;
//! ```

pub mod config;
pub mod engine;
pub mod identity;
pub mod limits;
pub mod model;
pub mod notify;
pub mod observability;
pub mod ratelimit;
pub mod store;
