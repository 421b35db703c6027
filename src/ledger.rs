//! Completed-tours ledger and badges
//!
//! Keeps the cross-tour record the engine itself does not: which tours
//! finished, cumulative stats, and which badges those unlocked. The
//! ledger is fed the final [`UserProgress`] returned by
//! `TourEngine::complete_tour`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::progress::UserProgress;

/// One finished tour run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletedTour {
    pub tour_id: Uuid,
    pub completed_at: DateTime<Utc>,
    pub total_score: u32,
    pub checkpoints_reached: usize,
    pub riddles_correct: u32,
    pub riddles_total: u32,
    pub elapsed_minutes: f64,
    pub distance_walked_m: f64,
}

/// What a badge requires
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BadgeCondition {
    /// Finish one specific tour
    TourCompleted { tour_id: Uuid },
    /// Finish at least `count` tours (repeats of the same tour count)
    ToursCount { count: u32 },
    /// Walk at least this many meters across all completed tours
    TotalDistance { meters: f64 },
    /// Finish the given tour with every riddle solved
    PerfectScore { tour_id: Uuid },
    /// Finish any tour within the time limit
    SpeedRun { max_minutes: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Badge {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub condition: BadgeCondition,
}

/// Cross-tour achievement record
///
/// Append-only: recording a completion can only add entries and unlock
/// badges, never remove them. Plain data, serialized as one JSON
/// document by whoever owns long-term storage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TourLedger {
    pub completed: Vec<CompletedTour>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unlocked_badges: Vec<Uuid>,
}

impl TourLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a finished run and evaluate badge conditions against the
    /// updated ledger. Returns the badges newly unlocked by this run.
    ///
    /// A progress record without a completion stamp is rejected as a
    /// caller bug surface; the entry timestamp falls back to now.
    pub fn record_completion<'a>(
        &mut self,
        progress: &UserProgress,
        badges: &'a [Badge],
    ) -> Vec<&'a Badge> {
        let entry = CompletedTour {
            tour_id: progress.tour_id,
            completed_at: progress.completed_at.unwrap_or_else(Utc::now),
            total_score: progress.total_score,
            checkpoints_reached: progress.checkpoints_reached.len(),
            riddles_correct: progress.riddles_correct,
            riddles_total: progress.riddles_total,
            elapsed_minutes: progress.elapsed_minutes,
            distance_walked_m: progress.distance_walked_m,
        };
        info!(tour_id = %entry.tour_id, score = entry.total_score, "recording completed tour");
        self.completed.push(entry);

        let mut newly = Vec::new();
        for badge in badges {
            if self.unlocked_badges.contains(&badge.id) {
                continue;
            }
            if self.is_satisfied(&badge.condition, progress) {
                info!(badge = %badge.name, "badge unlocked");
                self.unlocked_badges.push(badge.id);
                newly.push(badge);
            }
        }
        newly
    }

    fn is_satisfied(&self, condition: &BadgeCondition, latest: &UserProgress) -> bool {
        match condition {
            BadgeCondition::TourCompleted { tour_id } => {
                self.completed.iter().any(|c| c.tour_id == *tour_id)
            }
            BadgeCondition::ToursCount { count } => self.completed.len() as u32 >= *count,
            BadgeCondition::TotalDistance { meters } => self.total_distance_m() >= *meters,
            BadgeCondition::PerfectScore { tour_id } => {
                latest.tour_id == *tour_id && latest.is_perfect()
            }
            BadgeCondition::SpeedRun { max_minutes } => latest.elapsed_minutes <= *max_minutes,
        }
    }

    pub fn tours_completed(&self) -> usize {
        self.completed.len()
    }

    pub fn total_score(&self) -> u64 {
        self.completed.iter().map(|c| u64::from(c.total_score)).sum()
    }

    pub fn total_distance_m(&self) -> f64 {
        self.completed.iter().map(|c| c.distance_walked_m).sum()
    }

    pub fn has_completed(&self, tour_id: Uuid) -> bool {
        self.completed.iter().any(|c| c.tour_id == tour_id)
    }

    pub fn is_unlocked(&self, badge_id: Uuid) -> bool {
        self.unlocked_badges.contains(&badge_id)
    }
}
