//! Event system for the tour engine
//!
//! Outbound notifications are broadcast on an [`EventBus`]
//! (tokio::broadcast): one-to-many, non-blocking for the producer, with
//! automatic cleanup when subscribers drop. UI, notification and
//! analytics consumers subscribe here instead of registering callbacks,
//! so tests can assert on emitted events without a UI harness.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Tour engine event types
///
/// Events are broadcast via [`EventBus`] and serialize with a `type` tag
/// for transport to out-of-process consumers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TourEvent {
    /// A tour run started
    TourStarted {
        tour_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    /// The visitor entered the pending checkpoint's geofence
    CheckpointReached {
        checkpoint_id: Uuid,
        /// Index within the tour sequence
        index: usize,
        /// Base points awarded on reach
        points: u32,
        timestamp: DateTime<Utc>,
    },

    /// A transcript segment became visible
    SegmentRevealed {
        checkpoint_id: Uuid,
        segment_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    /// A timed image came on screen
    ImageTriggered {
        checkpoint_id: Uuid,
        image_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    /// A timed image's display window elapsed (display lifecycle only)
    ImageHidden {
        checkpoint_id: Uuid,
        image_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    /// An in-audio quiz reached its trigger boundary
    QuizTriggered {
        checkpoint_id: Uuid,
        quiz_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    /// A quiz was answered (or timed out, reported as incorrect)
    QuizAnswered {
        checkpoint_id: Uuid,
        quiz_id: Uuid,
        correct: bool,
        response_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// A riddle attempt was submitted
    RiddleAnswered {
        checkpoint_id: Uuid,
        correct: bool,
        attempts: u32,
        /// Bonus added to the total score by this attempt
        bonus_awarded: u32,
        timestamp: DateTime<Utc>,
    },

    /// The checkpoint's audio track was listened to completion
    AudioListened {
        checkpoint_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    /// The run finished; carries the final score
    TourCompleted {
        tour_id: Uuid,
        total_score: u32,
        checkpoints_reached: usize,
        timestamp: DateTime<Utc>,
    },

    /// The run was abandoned; no progress record survives
    TourAbandoned {
        tour_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    /// A snapshot write failed (non-fatal; in-memory state is authoritative)
    PersistenceFailed {
        operation: String,
        error: String,
        timestamp: DateTime<Utc>,
    },
}

impl TourEvent {
    /// Get event type as string for filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            TourEvent::TourStarted { .. } => "TourStarted",
            TourEvent::CheckpointReached { .. } => "CheckpointReached",
            TourEvent::SegmentRevealed { .. } => "SegmentRevealed",
            TourEvent::ImageTriggered { .. } => "ImageTriggered",
            TourEvent::ImageHidden { .. } => "ImageHidden",
            TourEvent::QuizTriggered { .. } => "QuizTriggered",
            TourEvent::QuizAnswered { .. } => "QuizAnswered",
            TourEvent::RiddleAnswered { .. } => "RiddleAnswered",
            TourEvent::AudioListened { .. } => "AudioListened",
            TourEvent::TourCompleted { .. } => "TourCompleted",
            TourEvent::TourAbandoned { .. } => "TourAbandoned",
            TourEvent::PersistenceFailed { .. } => "PersistenceFailed",
        }
    }
}

/// Central event distribution bus
///
/// Backed by tokio::broadcast: slow subscribers lag (and observe
/// `RecvError::Lagged`) rather than blocking the engine.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<TourEvent>,
    capacity: usize,
}

impl EventBus {
    /// Create a bus buffering up to `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<TourEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` when no subscriber is listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(&self, event: TourEvent) -> Result<usize, broadcast::error::SendError<TourEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring the no-subscriber case
    ///
    /// Position-derived events (reveals, image lifecycle) are emitted
    /// lossy: it is fine if nobody is currently listening.
    pub fn emit_lossy(&self, event: TourEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
