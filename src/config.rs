//! Engine configuration
//!
//! Tuning constants for geofencing and media synchronization. Every value
//! has a sensible default; deployments may override them from a TOML file.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::Path;

/// Tour engine tuning parameters
///
/// Defaults match field-tested values: a 10 m GPS accuracy buffer absorbs
/// urban-canyon noise without triggering checkpoints from across the street,
/// and a 200 ms reveal lookahead keeps transcript segments appearing in
/// step with narration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Meters added to each checkpoint's trigger radius to absorb GPS noise
    pub gps_accuracy_buffer_m: f64,

    /// Fallback trigger radius when a checkpoint declares none (meters)
    pub default_geofence_radius_m: f64,

    /// Advisory fix interval for the positioning collaborator (ms)
    pub gps_update_interval_ms: u64,

    /// Advisory minimum distance between fixes (meters)
    pub gps_distance_filter_m: f64,

    /// Lookahead applied when revealing segments and images (ms)
    pub sync_buffer_ms: u64,

    /// Playback tick quantization granularity (ms)
    ///
    /// Callers may coalesce position updates down to this granularity
    /// without changing sync outcomes beyond quantization.
    pub position_throttle_ms: u64,

    /// Base points awarded per checkpoint when the tour declares none
    pub default_checkpoint_points: u32,

    /// Riddle bonus points when the checkpoint declares none
    pub default_riddle_bonus: u32,

    /// Event bus broadcast channel capacity
    pub event_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            gps_accuracy_buffer_m: 10.0,
            default_geofence_radius_m: 30.0,
            gps_update_interval_ms: 3000,
            gps_distance_filter_m: 5.0,
            sync_buffer_ms: 200,
            position_throttle_ms: 100,
            default_checkpoint_points: 100,
            default_riddle_bonus: 50,
            event_capacity: 256,
        }
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file
    ///
    /// Missing keys take their defaults; an unreadable or malformed file
    /// is an error (silent fallback would mask deployment mistakes).
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        toml::from_str(&raw).map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }
}
