//! # Tourflow
//!
//! Progress engine for location- and audio-driven walking tours:
//! - Geodesic utilities (haversine distance, bearing, route length)
//! - Sequential geofence evaluation with a GPS accuracy buffer
//! - Scoring with per-attempt riddle bonus decay
//! - Media clock synchronization (transcript reveal, timed images,
//!   in-audio quizzes that gate the answer segment)
//! - The tour progress state machine with snapshot persistence
//! - A cross-tour ledger with badge unlocking
//!
//! The crate is platform-agnostic: GPS and audio playback are supplied
//! by the host through the traits in [`providers`], and all state
//! transitions are driven by explicit calls (`on_position_fix`,
//! `on_playback_tick`, ...) rather than internal timers.

pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod geo;
pub mod geofence;
pub mod ledger;
pub mod model;
pub mod persist;
pub mod progress;
pub mod providers;
pub mod scoring;
pub mod sync;

pub use config::EngineConfig;
pub use engine::TourEngine;
pub use error::{Error, Result};
pub use events::{EventBus, TourEvent};
