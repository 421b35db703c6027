//! Media clock synchronizer
//!
//! Drives progressive reveal of transcript segments, timed images and
//! in-audio quizzes from playback position ticks, scoped to one
//! checkpoint's immersive experience.
//!
//! Quiz timing is aligned on transcript boundaries: each quiz triggers at
//! the end offset of its "question" segment, and the "answer" segment
//! starting at exactly that offset is withheld until the quiz completes.
//! Without that gate the reveal lookahead would print the answer on
//! screen before the quiz appears.
//!
//! **Design:**
//! - Reveal sets are append-only: seeking backward never un-reveals.
//! - Segments and images use a small lookahead buffer for perceptual
//!   smoothness; quizzes use none, so the question audio finishes first.
//! - The synchronizer never completes a quiz on its own:
//!   [`MediaClockSynchronizer::complete_quiz`] is an explicit external
//!   call driven by user interaction or a timeout.

use crate::model::{ImmersiveExperience, Quiz, TimedImage, TranscriptSegment};
use std::collections::HashSet;
use uuid::Uuid;

/// What one position tick newly produced
///
/// Ids reference the experience this synchronizer was built from; order
/// within `revealed` is ascending start offset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncOutcome {
    pub revealed: Vec<Uuid>,
    pub images_shown: Vec<Uuid>,
    /// Images whose display duration elapsed (display lifecycle only;
    /// the underlying "has been displayed" state never regresses)
    pub images_hidden: Vec<Uuid>,
    pub quiz_triggered: Option<Uuid>,
}

impl SyncOutcome {
    pub fn is_empty(&self) -> bool {
        self.revealed.is_empty()
            && self.images_shown.is_empty()
            && self.images_hidden.is_empty()
            && self.quiz_triggered.is_none()
    }
}

/// Per-experience reveal state machine
///
/// Created fresh when a checkpoint's experience loads; dropped (state and
/// all) when the experience changes.
#[derive(Debug)]
pub struct MediaClockSynchronizer {
    experience: ImmersiveExperience,
    sync_buffer_ms: u64,

    revealed_segments: HashSet<Uuid>,
    /// Every image ever displayed (monotone)
    displayed_images: HashSet<Uuid>,
    /// Images currently on screen (subset of `displayed_images`)
    visible_images: HashSet<Uuid>,
    active_quiz: Option<Uuid>,
    completed_quizzes: HashSet<Uuid>,
}

impl MediaClockSynchronizer {
    pub fn new(mut experience: ImmersiveExperience, sync_buffer_ms: u64) -> Self {
        // Reveal order must be ascending start offset regardless of
        // authoring order.
        experience.transcript.sort_by_key(|s| s.start_ms);
        experience.images.sort_by_key(|i| i.trigger_ms);
        experience.quizzes.sort_by_key(|q| q.trigger_ms);

        Self {
            experience,
            sync_buffer_ms,
            revealed_segments: HashSet::new(),
            displayed_images: HashSet::new(),
            visible_images: HashSet::new(),
            active_quiz: None,
            completed_quizzes: HashSet::new(),
        }
    }

    /// Process a playback position update
    ///
    /// Valid at any granularity: callers may throttle ticks without
    /// changing outcomes beyond quantization, and a rewound position is
    /// accepted but reveals nothing new.
    pub fn tick(&mut self, position_ms: u64) -> SyncOutcome {
        let mut outcome = SyncOutcome::default();
        let lookahead = position_ms.saturating_add(self.sync_buffer_ms);

        // Trigger offsets of quizzes not yet completed. A segment whose
        // start sits on one of these boundaries is an answer segment and
        // must wait for its quiz.
        let pending_boundaries: HashSet<u64> = self
            .experience
            .quizzes
            .iter()
            .filter(|q| !self.completed_quizzes.contains(&q.id))
            .map(|q| q.trigger_ms)
            .collect();

        for seg in &self.experience.transcript {
            if seg.start_ms <= lookahead
                && !self.revealed_segments.contains(&seg.id)
                && !pending_boundaries.contains(&seg.start_ms)
            {
                self.revealed_segments.insert(seg.id);
                outcome.revealed.push(seg.id);
            }
        }

        for img in &self.experience.images {
            if img.trigger_ms <= lookahead && !self.displayed_images.contains(&img.id) {
                self.displayed_images.insert(img.id);
                self.visible_images.insert(img.id);
                outcome.images_shown.push(img.id);
            }
        }

        // Hide timed-out images. Uses the raw position, not the lookahead:
        // hiding early would visibly cut the image short.
        for img in &self.experience.images {
            if let Some(duration) = img.display_duration_ms {
                if self.visible_images.contains(&img.id)
                    && position_ms > img.trigger_ms.saturating_add(duration)
                {
                    self.visible_images.remove(&img.id);
                    outcome.images_hidden.push(img.id);
                }
            }
        }

        // Quizzes fire only once the boundary has actually passed (no
        // lookahead) and only one can be active at a time.
        if self.active_quiz.is_none() {
            let next_quiz = self
                .experience
                .quizzes
                .iter()
                .find(|q| q.trigger_ms <= position_ms && !self.completed_quizzes.contains(&q.id));
            if let Some(quiz) = next_quiz {
                self.active_quiz = Some(quiz.id);
                outcome.quiz_triggered = Some(quiz.id);
            }
        }

        outcome
    }

    /// Mark a quiz completed, clearing it from the active slot
    ///
    /// This is the only way a quiz leaves the active state. Completing it
    /// unblocks the answer segment's reveal on the next tick. Unknown or
    /// inactive quiz ids are accepted (defensive no-op for the id set,
    /// but only the active quiz is cleared).
    pub fn complete_quiz(&mut self, quiz_id: Uuid) {
        self.completed_quizzes.insert(quiz_id);
        if self.active_quiz == Some(quiz_id) {
            self.active_quiz = None;
        }
    }

    /// Reveal a segment out of band (manual scroll-ahead by the user)
    ///
    /// Returns true when the segment was newly revealed.
    pub fn reveal_manually(&mut self, segment_id: Uuid) -> bool {
        if self.experience.transcript.iter().any(|s| s.id == segment_id) {
            self.revealed_segments.insert(segment_id)
        } else {
            false
        }
    }

    // ---- read-only queries ----

    pub fn active_quiz(&self) -> Option<&Quiz> {
        let id = self.active_quiz?;
        self.experience.quizzes.iter().find(|q| q.id == id)
    }

    pub fn quiz(&self, quiz_id: Uuid) -> Option<&Quiz> {
        self.experience.quizzes.iter().find(|q| q.id == quiz_id)
    }

    pub fn is_revealed(&self, segment_id: Uuid) -> bool {
        self.revealed_segments.contains(&segment_id)
    }

    pub fn is_quiz_completed(&self, quiz_id: Uuid) -> bool {
        self.completed_quizzes.contains(&quiz_id)
    }

    /// Revealed segments in transcript order
    pub fn revealed_segments(&self) -> Vec<&TranscriptSegment> {
        self.experience
            .transcript
            .iter()
            .filter(|s| self.revealed_segments.contains(&s.id))
            .collect()
    }

    /// Images currently on screen, in trigger order
    pub fn visible_images(&self) -> Vec<&TimedImage> {
        self.experience
            .images
            .iter()
            .filter(|i| self.visible_images.contains(&i.id))
            .collect()
    }

    pub fn experience(&self) -> &ImmersiveExperience {
        &self.experience
    }
}
