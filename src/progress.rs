//! User progress aggregate
//!
//! [`UserProgress`] is the single mutable aggregate for an active tour.
//! It is owned exclusively by the tour engine and mutated only through
//! the engine's operations; this module only defines the shape and a few
//! read-side helpers so the invariants stay enforceable in one place.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::TourMode;

/// Tour lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TourStatus {
    NotStarted,
    InProgress,
    Completed,
    Abandoned,
}

impl std::fmt::Display for TourStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TourStatus::NotStarted => write!(f, "not_started"),
            TourStatus::InProgress => write!(f, "in_progress"),
            TourStatus::Completed => write!(f, "completed"),
            TourStatus::Abandoned => write!(f, "abandoned"),
        }
    }
}

/// Outcome of the riddle attached to a reached checkpoint
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiddleOutcome {
    /// Sticky: set on the first correct answer and never reverts
    pub solved: bool,
    pub attempts: u32,
}

/// Outcome of one in-audio quiz
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizOutcome {
    pub quiz_id: Uuid,
    pub correct: bool,
    /// Time from quiz trigger to answer, milliseconds
    pub response_ms: u64,
}

/// Per-checkpoint progress record
///
/// Created the instant a checkpoint is entered; mutated as riddle/quiz
/// events arrive; never deleted while the tour is active.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointProgress {
    pub checkpoint_id: Uuid,
    pub reached_at: DateTime<Utc>,
    pub audio_listened: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub riddle: Option<RiddleOutcome>,
    pub points_earned: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub quiz_outcomes: Vec<QuizOutcome>,
}

impl CheckpointProgress {
    pub fn new(checkpoint_id: Uuid, points_earned: u32, reached_at: DateTime<Utc>) -> Self {
        Self {
            checkpoint_id,
            reached_at,
            audio_listened: false,
            riddle: None,
            points_earned,
            quiz_outcomes: Vec::new(),
        }
    }
}

/// The authoritative progress record for one tour run
///
/// Invariants maintained by the engine:
/// - `checkpoints_reached` is ordered by reach time with no duplicate ids
/// - the geofence cursor equals `checkpoints_reached.len()`
/// - `total_score` never decreases
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProgress {
    pub tour_id: Uuid,
    pub mode: TourMode,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Insertion order == reach order
    pub checkpoints_reached: Vec<CheckpointProgress>,
    pub total_score: u32,
    pub riddles_correct: u32,
    pub riddles_total: u32,
    pub status: TourStatus,
    pub elapsed_minutes: f64,
    pub distance_walked_m: f64,
}

impl UserProgress {
    pub fn new(tour_id: Uuid, mode: TourMode, riddles_total: u32, started_at: DateTime<Utc>) -> Self {
        Self {
            tour_id,
            mode,
            started_at,
            completed_at: None,
            checkpoints_reached: Vec::new(),
            total_score: 0,
            riddles_correct: 0,
            riddles_total,
            status: TourStatus::InProgress,
            elapsed_minutes: 0.0,
            distance_walked_m: 0.0,
        }
    }

    /// Geofence cursor: the index of the next checkpoint to unlock
    pub fn cursor(&self) -> usize {
        self.checkpoints_reached.len()
    }

    pub fn is_reached(&self, checkpoint_id: Uuid) -> bool {
        self.checkpoints_reached
            .iter()
            .any(|cp| cp.checkpoint_id == checkpoint_id)
    }

    pub fn checkpoint_mut(&mut self, checkpoint_id: Uuid) -> Option<&mut CheckpointProgress> {
        self.checkpoints_reached
            .iter_mut()
            .find(|cp| cp.checkpoint_id == checkpoint_id)
    }

    /// True when every riddle the run counts has been answered correctly
    pub fn is_perfect(&self) -> bool {
        self.riddles_total > 0 && self.riddles_correct == self.riddles_total
    }
}
