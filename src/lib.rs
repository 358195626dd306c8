//! Durak server core: the room actor, rules engine, matchmaker actor, and
//! auth layer described in SPEC_FULL.md. `main.rs` wires these modules
//! into an `axum` service; `tests/` exercises them directly through this
//! crate root the way `game/backend`'s integration tests reach its `http`
//! and `room` modules.

pub mod auth;
pub mod config;
pub mod error;
pub mod http;
pub mod matchmaker;
pub mod room;
pub mod rules;
pub mod store;
pub mod telemetry;
pub mod types;
pub mod ws;
