//! Tour reference data model
//!
//! Tours, checkpoints, riddles and the per-checkpoint immersive experience
//! (transcript / image / quiz timeline). All of this is read-only content:
//! the engine never mutates it, only the progress aggregate in
//! [`crate::progress`] changes during a run.

use crate::geo::GeoPoint;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How a tour is played
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TourMode {
    /// Classic audio-guide walk, riddles optional and unscored
    Guided,
    /// Escape-game mode: riddles count toward the score and completion stats
    EscapeGame,
}

/// Tour difficulty rating (display metadata)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

/// Static illustration attached to checkpoint narrative content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentImage {
    pub uri: String,
    pub caption: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credit: Option<String>,
}

/// Narrative content delivered when a checkpoint is reached
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointContent {
    /// Opaque audio reference, resolved by the playback collaborator
    pub audio_ref: String,
    pub audio_duration_ms: u64,
    pub title: String,
    pub narrative_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub historical_fact: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fun_fact: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<ContentImage>,
    /// Synchronized transcript/image/quiz timeline, when authored
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experience: Option<ImmersiveExperience>,
}

/// Riddle payload, one variant per riddle type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RiddleKind {
    MultipleChoice {
        options: Vec<String>,
        correct_index: usize,
    },
    TextInput {
        accepted_answers: Vec<String>,
    },
    PhotoSpot {
        prompt: String,
    },
    Observation {
        prompt: String,
    },
}

/// An on-location riddle attached to a checkpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Riddle {
    pub id: Uuid,
    pub question: String,
    pub kind: RiddleKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    /// Shown after the riddle is resolved, right or wrong
    pub explanation: String,
    /// Attempt budget driving the bonus decay; at least 1
    pub max_attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_limit_seconds: Option<u32>,
}

/// A single stop in a tour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub id: Uuid,
    pub tour_id: Uuid,
    /// Position within the tour's checkpoint sequence, 0-based
    pub ordinal: u32,
    pub title: String,
    pub location: GeoPoint,
    /// Geofence trigger radius in meters (before the accuracy buffer)
    pub trigger_radius_m: f64,
    pub content: CheckpointContent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub riddle: Option<Riddle>,
    /// Base points awarded on reach
    pub points: u32,
    /// Bonus awarded for solving the riddle, subject to attempt decay
    #[serde(default)]
    pub bonus_points: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_checkpoint_hint: Option<String>,
}

/// A walking tour: identity, route metadata, and its owned checkpoint
/// sequence. Immutable once loaded; checkpoints are never shared between
/// tours.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tour {
    pub id: Uuid,
    pub title: String,
    pub subtitle: String,
    pub description: String,
    pub difficulty: Difficulty,
    /// Estimated walking duration in minutes
    pub duration_minutes: u32,
    /// Estimated route length in meters
    pub distance_meters: u32,
    pub start_point: GeoPoint,
    /// Ordered by `ordinal`; geofencing unlocks them strictly in sequence
    pub checkpoints: Vec<Checkpoint>,
    pub total_points: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default = "default_true")]
    pub available: bool,
}

fn default_true() -> bool {
    true
}

impl Tour {
    /// Number of checkpoints carrying a riddle (escape-game scoring basis)
    pub fn riddle_count(&self) -> u32 {
        self.checkpoints.iter().filter(|cp| cp.riddle.is_some()).count() as u32
    }

    pub fn checkpoint(&self, id: Uuid) -> Option<&Checkpoint> {
        self.checkpoints.iter().find(|cp| cp.id == id)
    }
}

// ========================================
// Immersive experience timeline
// ========================================

/// Speaker rendering hint for a transcript segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeakerRole {
    Narrator,
    Character,
    Guide,
}

/// Section heading displayed when the first segment of a section reveals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionMarker {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
}

/// One transcript line, aligned to the checkpoint's audio track
///
/// Segments of one experience are totally ordered by `start_ms` and must
/// not overlap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub id: Uuid,
    pub start_ms: u64,
    pub end_ms: u64,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<SectionMarker>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speaker: Option<SpeakerRole>,
}

/// Where a timed image is rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImagePosition {
    Inline,
    Overlay,
}

/// An image surfaced at a given playback offset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimedImage {
    pub id: Uuid,
    pub trigger_ms: u64,
    pub uri: String,
    pub caption: String,
    pub position: ImagePosition,
    /// When set, the image is hidden again once playback passes
    /// `trigger_ms + display_duration_ms` (display lifecycle only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_duration_ms: Option<u64>,
}

/// An in-audio quiz fired at a transcript boundary
///
/// `trigger_ms` equals the end offset of the "question" segment; the
/// "answer" segment starting at that same offset is withheld until the
/// quiz is completed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quiz {
    pub id: Uuid,
    pub trigger_ms: u64,
    pub question: String,
    pub options: Vec<String>,
    pub correct_index: usize,
    pub explanation: String,
    pub timer_seconds: u32,
    /// Pause playback while the quiz is on screen
    pub pause_audio: bool,
    /// Resume playback automatically once answered
    pub resume_after_answer: bool,
}

/// The transcript/image/quiz timeline attached to one checkpoint's audio
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImmersiveExperience {
    pub audio_duration_ms: u64,
    pub transcript: Vec<TranscriptSegment>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<TimedImage>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub quizzes: Vec<Quiz>,
}
