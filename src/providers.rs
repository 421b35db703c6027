//! Collaborator contracts
//!
//! The engine consumes positioning and playback through these traits;
//! the concrete subsystems (platform location APIs, audio decode/output)
//! live outside this crate. Permission or load failures surface as
//! [`crate::Error::Positioning`] / [`crate::Error::Playback`] values and
//! must disable the affected subsystem without touching the active
//! tour's progress.

use async_trait::async_trait;

use crate::error::Result;
use crate::geo::GeoPoint;

/// Handle to a live positioning subscription
///
/// Cancellation is synchronous: once `cancel` returns, no further fix is
/// delivered to the callback.
pub trait WatchHandle: Send {
    fn cancel(self: Box<Self>);
}

/// Positioning subsystem contract
///
/// Fixes should be delivered at a bounded rate, time- and
/// distance-filtered at the source; implementations take
/// [`EngineConfig::gps_update_interval_ms`](crate::EngineConfig::gps_update_interval_ms)
/// and
/// [`EngineConfig::gps_distance_filter_m`](crate::EngineConfig::gps_distance_filter_m)
/// as the requested filter settings. Accuracy is not guaranteed, which
/// is why the geofence evaluator applies an accuracy buffer.
#[async_trait]
pub trait PositioningProvider: Send + Sync {
    /// Ask the platform for location permission
    async fn request_permission(&self) -> Result<bool>;

    /// One-shot current position
    async fn current_fix(&self) -> Result<GeoPoint>;

    /// Start a continuous watch, delivering fixes to `callback`
    async fn watch(
        &self,
        callback: Box<dyn FnMut(GeoPoint) + Send>,
    ) -> Result<Box<dyn WatchHandle>>;
}

/// Playback transport state snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackPosition {
    pub position_ms: u64,
    pub duration_ms: u64,
    pub is_playing: bool,
}

/// Media playback subsystem contract
///
/// `audio_ref` values come from checkpoint content and are opaque to the
/// engine. Position change notifications from the implementation drive
/// [`crate::engine::TourEngine::on_playback_tick`]; implementations may
/// coalesce them down to
/// [`EngineConfig::position_throttle_ms`](crate::EngineConfig::position_throttle_ms)
/// granularity.
#[async_trait]
pub trait PlaybackControl: Send + Sync {
    async fn load(&self, audio_ref: &str) -> Result<()>;
    async fn play(&self) -> Result<()>;
    async fn pause(&self) -> Result<()>;
    async fn seek(&self, position_ms: u64) -> Result<()>;
    async fn stop(&self) -> Result<()>;
    async fn position(&self) -> Result<PlaybackPosition>;
}
