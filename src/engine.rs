//! Tour progress state machine
//!
//! [`TourEngine`] owns the authoritative [`UserProgress`] aggregate and is
//! the only writer to it. It fuses two independent event streams (GPS
//! fixes and playback position ticks) into one consistent progress model:
//! fixes drive the geofence cursor, ticks drive the media synchronizer,
//! and the single integration point is the hand-off that loads a
//! checkpoint's experience the moment its geofence is entered.
//!
//! **Concurrency model:** single logical owner. Every mutating operation
//! takes `&mut self`; callers serialize access (a mutex-held engine or a
//! single-task actor both work). Event fan-out happens on the broadcast
//! bus and never blocks the engine.
//!
//! **Failure semantics:** duplicate/late events (re-reached checkpoint,
//! answer for an inactive quiz, operation with no active tour) are silent
//! no-ops; they legitimately occur. Persistence failures are logged and
//! reported on the bus; in-memory state remains the source of truth.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::events::{EventBus, TourEvent};
use crate::geo::GeoPoint;
use crate::geofence::{CheckpointEntry, GeofenceEvaluator};
use crate::model::{Checkpoint, Tour, TourMode};
use crate::persist::{ProgressStore, SavedTour, SNAPSHOT_VERSION};
use crate::progress::{
    CheckpointProgress, QuizOutcome, RiddleOutcome, TourStatus, UserProgress,
};
use crate::scoring;
use crate::sync::{MediaClockSynchronizer, SyncOutcome};

/// State scoped to one running tour
struct ActiveTour {
    tour: Arc<Tour>,
    progress: UserProgress,
    /// Synchronizer for the most recently opened checkpoint experience
    sync: Option<MediaClockSynchronizer>,
    /// Checkpoint the synchronizer belongs to
    sync_checkpoint: Option<Uuid>,
}

/// The tour progress engine
///
/// Lifecycle: `NotStarted → InProgress → {Completed, Abandoned}`.
/// Geofencing and media sync operate only while `InProgress`.
pub struct TourEngine {
    config: EngineConfig,
    geofence: GeofenceEvaluator,
    bus: EventBus,
    store: Arc<dyn ProgressStore>,
    active: Option<ActiveTour>,
}

impl TourEngine {
    pub fn new(config: EngineConfig, store: Arc<dyn ProgressStore>) -> Self {
        let bus = EventBus::new(config.event_capacity);
        let geofence = GeofenceEvaluator::new(config.gps_accuracy_buffer_m);
        Self {
            config,
            geofence,
            bus,
            store,
            active: None,
        }
    }

    /// Access the outbound event bus (subscribe before starting a tour to
    /// observe the full run)
    pub fn event_bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ========================================
    // Lifecycle
    // ========================================

    /// Start a new tour run
    ///
    /// Fails with [`Error::InvalidState`] while another tour is active;
    /// the caller must complete or abandon it first. A tour with zero
    /// checkpoints is accepted: geofencing simply never fires.
    pub async fn start_tour(&mut self, tour: Arc<Tour>, mode: TourMode) -> Result<()> {
        if self.active.is_some() {
            return Err(Error::InvalidState(
                "a tour is already active; complete or abandon it first".into(),
            ));
        }

        // Riddles only count toward the run in escape-game mode
        let riddles_total = match mode {
            TourMode::EscapeGame => tour.riddle_count(),
            TourMode::Guided => 0,
        };

        let progress = UserProgress::new(tour.id, mode, riddles_total, Utc::now());
        info!(tour_id = %tour.id, ?mode, riddles_total, "starting tour");

        self.active = Some(ActiveTour {
            tour: tour.clone(),
            progress,
            sync: None,
            sync_checkpoint: None,
        });

        self.persist("start_tour").await;
        self.bus.emit_lossy(TourEvent::TourStarted {
            tour_id: tour.id,
            timestamp: Utc::now(),
        });
        Ok(())
    }

    /// Complete the active tour
    ///
    /// Valid only from `InProgress`. Stops geofencing/media sync, stamps
    /// the completion time, persists the final snapshot and returns the
    /// final progress record for the completed-tours ledger.
    pub async fn complete_tour(&mut self) -> Result<UserProgress> {
        let active = self
            .active
            .as_mut()
            .ok_or_else(|| Error::InvalidState("no active tour to complete".into()))?;

        active.progress.status = TourStatus::Completed;
        active.progress.completed_at = Some(Utc::now());
        let final_progress = active.progress.clone();
        let tour_id = active.tour.id;

        self.persist("complete_tour").await;
        self.active = None;

        info!(%tour_id, total_score = final_progress.total_score, "tour completed");
        self.bus.emit_lossy(TourEvent::TourCompleted {
            tour_id,
            total_score: final_progress.total_score,
            checkpoints_reached: final_progress.checkpoints_reached.len(),
            timestamp: Utc::now(),
        });
        Ok(final_progress)
    }

    /// Abandon the active tour
    ///
    /// No partial record survives: in-memory state and the persisted slot
    /// are both cleared. A no-op when nothing is active.
    pub async fn abandon_tour(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };
        let tour_id = active.tour.id;
        info!(%tour_id, "tour abandoned");

        if let Err(e) = self.store.clear().await {
            warn!(error = %e, "failed to clear persisted tour on abandon");
            self.bus.emit_lossy(TourEvent::PersistenceFailed {
                operation: "abandon_tour".into(),
                error: e.to_string(),
                timestamp: Utc::now(),
            });
        }
        self.bus.emit_lossy(TourEvent::TourAbandoned {
            tour_id,
            timestamp: Utc::now(),
        });
    }

    /// Restore a previously persisted run, if any
    ///
    /// Invoked once at process start. Resumes only snapshots that are
    /// still `InProgress` and of a known schema version; anything else
    /// (a completed/abandoned snapshot left behind by a crash, a snapshot
    /// from a future version) is discarded. Tour reference data is
    /// re-bound from `catalog`.
    ///
    /// Returns true when a tour was resumed.
    pub async fn load_saved_tour(&mut self, catalog: &[Arc<Tour>]) -> Result<bool> {
        if self.active.is_some() {
            return Err(Error::InvalidState(
                "cannot restore while a tour is active".into(),
            ));
        }

        let Some(saved) = self.store.load().await? else {
            return Ok(false);
        };

        if saved.version != SNAPSHOT_VERSION {
            warn!(
                version = saved.version,
                expected = SNAPSHOT_VERSION,
                "discarding snapshot with unknown schema version"
            );
            self.store.clear().await.ok();
            return Ok(false);
        }

        if saved.progress.status != TourStatus::InProgress {
            debug!(status = %saved.progress.status, "stale snapshot is not resumable, discarding");
            self.store.clear().await.ok();
            return Ok(false);
        }

        let Some(tour) = catalog.iter().find(|t| t.id == saved.tour_id) else {
            warn!(tour_id = %saved.tour_id, "saved tour not present in catalog");
            return Ok(false);
        };

        info!(tour_id = %saved.tour_id, score = saved.progress.total_score, "resuming saved tour");
        self.active = Some(ActiveTour {
            tour: tour.clone(),
            progress: saved.progress,
            sync: None,
            sync_checkpoint: None,
        });
        Ok(true)
    }

    // ========================================
    // Positioning stream
    // ========================================

    /// Feed one GPS fix through the geofence evaluator
    ///
    /// Returns the entry event when the pending checkpoint was just
    /// reached. Entering a checkpoint hands off to the media side by
    /// loading its immersive experience into a fresh synchronizer.
    pub async fn on_position_fix(&mut self, fix: &GeoPoint) -> Option<CheckpointEntry> {
        let active = self.active.as_ref()?;
        if active.progress.status != TourStatus::InProgress {
            return None;
        }

        let reached: HashSet<Uuid> = active
            .progress
            .checkpoints_reached
            .iter()
            .map(|cp| cp.checkpoint_id)
            .collect();

        let entry = self.geofence.evaluate(
            fix,
            &active.tour.checkpoints,
            active.progress.cursor(),
            &reached,
        )?;

        let points = active.tour.checkpoints[entry.index].points;
        self.on_checkpoint_reached(entry.checkpoint_id, points).await;
        Some(entry)
    }

    /// Record a checkpoint as reached
    ///
    /// Idempotent: a duplicate id is a no-op. Appends the progress
    /// record (advancing the cursor), awards the base points, loads the
    /// checkpoint's experience, and persists a snapshot.
    pub async fn on_checkpoint_reached(&mut self, checkpoint_id: Uuid, points: u32) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        if active.progress.status != TourStatus::InProgress
            || active.progress.is_reached(checkpoint_id)
        {
            return;
        }

        let index = active.progress.cursor();
        active
            .progress
            .checkpoints_reached
            .push(CheckpointProgress::new(checkpoint_id, points, Utc::now()));
        active.progress.total_score += points;
        debug!(%checkpoint_id, index, points, "checkpoint reached");

        // Hand-off: the new checkpoint's timeline replaces the previous
        // synchronizer, reveal state and all.
        let experience = active
            .tour
            .checkpoint(checkpoint_id)
            .and_then(|cp| cp.content.experience.clone());
        match experience {
            Some(exp) => {
                active.sync = Some(MediaClockSynchronizer::new(exp, self.config.sync_buffer_ms));
                active.sync_checkpoint = Some(checkpoint_id);
            }
            None => {
                active.sync = None;
                active.sync_checkpoint = None;
            }
        }

        self.persist("checkpoint_reached").await;
        self.bus.emit_lossy(TourEvent::CheckpointReached {
            checkpoint_id,
            index,
            points,
            timestamp: Utc::now(),
        });
    }

    // ========================================
    // Playback stream
    // ========================================

    /// Feed one playback position tick through the media synchronizer
    ///
    /// Safe at any rate; callers may throttle to
    /// [`EngineConfig::position_throttle_ms`] granularity. Returns what
    /// the tick newly produced (also emitted on the bus).
    pub fn on_playback_tick(&mut self, position_ms: u64) -> SyncOutcome {
        let Some(active) = self.active.as_mut() else {
            return SyncOutcome::default();
        };
        if active.progress.status != TourStatus::InProgress {
            return SyncOutcome::default();
        }
        let (Some(sync), Some(checkpoint_id)) = (active.sync.as_mut(), active.sync_checkpoint)
        else {
            return SyncOutcome::default();
        };

        let outcome = sync.tick(position_ms);
        let now = Utc::now();
        for segment_id in &outcome.revealed {
            self.bus.emit_lossy(TourEvent::SegmentRevealed {
                checkpoint_id,
                segment_id: *segment_id,
                timestamp: now,
            });
        }
        for image_id in &outcome.images_shown {
            self.bus.emit_lossy(TourEvent::ImageTriggered {
                checkpoint_id,
                image_id: *image_id,
                timestamp: now,
            });
        }
        for image_id in &outcome.images_hidden {
            self.bus.emit_lossy(TourEvent::ImageHidden {
                checkpoint_id,
                image_id: *image_id,
                timestamp: now,
            });
        }
        if let Some(quiz_id) = outcome.quiz_triggered {
            self.bus.emit_lossy(TourEvent::QuizTriggered {
                checkpoint_id,
                quiz_id,
                timestamp: now,
            });
        }
        outcome
    }

    /// Answer the active quiz (a timeout is reported as `selected: None`)
    ///
    /// Correctness is judged against the quiz's correct option index.
    /// Answering a quiz that is not currently active is a no-op.
    pub async fn answer_quiz(&mut self, quiz_id: Uuid, selected: Option<usize>, response_ms: u64) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        let (Some(sync), Some(checkpoint_id)) = (active.sync.as_mut(), active.sync_checkpoint)
        else {
            return;
        };
        let Some(quiz) = sync.active_quiz() else {
            return;
        };
        if quiz.id != quiz_id {
            debug!(%quiz_id, "answer for a quiz that is not active, ignoring");
            return;
        }

        let correct = selected == Some(quiz.correct_index);
        sync.complete_quiz(quiz_id);

        if let Some(cp) = active.progress.checkpoint_mut(checkpoint_id) {
            cp.quiz_outcomes.push(QuizOutcome {
                quiz_id,
                correct,
                response_ms,
            });
        }

        self.persist("quiz_answered").await;
        self.bus.emit_lossy(TourEvent::QuizAnswered {
            checkpoint_id,
            quiz_id,
            correct,
            response_ms,
            timestamp: Utc::now(),
        });
    }

    // ========================================
    // User actions
    // ========================================

    /// Record a riddle attempt for a reached checkpoint
    ///
    /// Attempts increment per call; `solved` is sticky and the bonus,
    /// decayed by attempt count, is awarded exactly once, on the first
    /// correct answer. Unknown checkpoint ids and re-answers after a
    /// solve are no-ops. Returns the bonus awarded by this attempt.
    pub async fn answer_riddle(&mut self, checkpoint_id: Uuid, correct: bool, bonus_points: u32) -> u32 {
        let Some(active) = self.active.as_mut() else {
            return 0;
        };
        if active.progress.status != TourStatus::InProgress {
            return 0;
        }

        let max_attempts = active
            .tour
            .checkpoint(checkpoint_id)
            .and_then(|cp| cp.riddle.as_ref())
            .map(|r| r.max_attempts)
            .unwrap_or(1);

        let Some(cp) = active.progress.checkpoint_mut(checkpoint_id) else {
            debug!(%checkpoint_id, "riddle answer for unknown checkpoint, ignoring");
            return 0;
        };

        let outcome = cp.riddle.get_or_insert_with(RiddleOutcome::default);
        if outcome.solved {
            return 0;
        }
        outcome.attempts += 1;
        let attempts = outcome.attempts;

        let mut awarded = 0;
        if correct {
            outcome.solved = true;
            awarded = scoring::riddle_score(true, attempts, max_attempts, bonus_points);
            cp.points_earned += awarded;
            active.progress.total_score += awarded;
            active.progress.riddles_correct += 1;
        }

        self.persist("riddle_answered").await;
        self.bus.emit_lossy(TourEvent::RiddleAnswered {
            checkpoint_id,
            correct,
            attempts,
            bonus_awarded: awarded,
            timestamp: Utc::now(),
        });
        awarded
    }

    /// Mark a reached checkpoint's audio as fully listened (no scoring effect)
    pub async fn mark_audio_listened(&mut self, checkpoint_id: Uuid) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        let Some(cp) = active.progress.checkpoint_mut(checkpoint_id) else {
            return;
        };
        if cp.audio_listened {
            return;
        }
        cp.audio_listened = true;

        self.persist("audio_listened").await;
        self.bus.emit_lossy(TourEvent::AudioListened {
            checkpoint_id,
            timestamp: Utc::now(),
        });
    }

    /// Report elapsed walking time (logical timer tick)
    ///
    /// Monotone: a lower reading than the current value is kept out.
    pub fn on_elapsed_minutes(&mut self, minutes: f64) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        if minutes.is_finite() && minutes > active.progress.elapsed_minutes {
            active.progress.elapsed_minutes = minutes;
        }
    }

    /// Accumulate walked distance in meters (negative input ignored)
    pub fn on_distance_walked(&mut self, meters: f64) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        if meters.is_finite() && meters > 0.0 {
            active.progress.distance_walked_m += meters;
        }
    }

    // ========================================
    // Read side
    // ========================================

    pub fn progress(&self) -> Option<&UserProgress> {
        self.active.as_ref().map(|a| &a.progress)
    }

    pub fn active_tour(&self) -> Option<&Arc<Tour>> {
        self.active.as_ref().map(|a| &a.tour)
    }

    /// The checkpoint geofencing is currently armed for
    pub fn next_checkpoint(&self) -> Option<&Checkpoint> {
        let active = self.active.as_ref()?;
        active.tour.checkpoints.get(active.progress.cursor())
    }

    /// Distance from a fix to the pending checkpoint, for display
    pub fn distance_to_next(&self, fix: &GeoPoint) -> Option<f64> {
        let active = self.active.as_ref()?;
        self.geofence
            .distance_to_next(fix, &active.tour.checkpoints, active.progress.cursor())
    }

    /// Synchronizer for the currently open experience, read-only
    pub fn media_sync(&self) -> Option<&MediaClockSynchronizer> {
        self.active.as_ref()?.sync.as_ref()
    }

    // ========================================
    // Persistence
    // ========================================

    /// Snapshot the aggregate; failures log and notify but never roll
    /// back or propagate; in-memory state stays authoritative.
    async fn persist(&mut self, operation: &str) {
        let Some(active) = self.active.as_ref() else {
            return;
        };
        let snapshot = SavedTour::new(active.progress.clone());
        if let Err(e) = self.store.save(&snapshot).await {
            warn!(operation, error = %e, "progress snapshot write failed");
            self.bus.emit_lossy(TourEvent::PersistenceFailed {
                operation: operation.into(),
                error: e.to_string(),
                timestamp: Utc::now(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        CheckpointContent, Difficulty, ImagePosition, ImmersiveExperience, Quiz, Riddle,
        RiddleKind, TimedImage, TranscriptSegment,
    };
    use crate::persist::MemoryStore;

    fn experience_with_quiz(quiz_trigger_ms: u64) -> ImmersiveExperience {
        ImmersiveExperience {
            audio_duration_ms: 60_000,
            transcript: vec![
                TranscriptSegment {
                    id: Uuid::new_v4(),
                    start_ms: 0,
                    end_ms: quiz_trigger_ms,
                    text: "question".into(),
                    section: None,
                    speaker: None,
                },
                TranscriptSegment {
                    id: Uuid::new_v4(),
                    start_ms: quiz_trigger_ms,
                    end_ms: quiz_trigger_ms + 2_000,
                    text: "answer".into(),
                    section: None,
                    speaker: None,
                },
            ],
            images: vec![TimedImage {
                id: Uuid::new_v4(),
                trigger_ms: 1_000,
                uri: "img.jpg".into(),
                caption: "c".into(),
                position: ImagePosition::Inline,
                display_duration_ms: None,
            }],
            quizzes: vec![Quiz {
                id: Uuid::new_v4(),
                trigger_ms: quiz_trigger_ms,
                question: "?".into(),
                options: vec!["a".into(), "b".into(), "c".into()],
                correct_index: 1,
                explanation: "e".into(),
                timer_seconds: 15,
                pause_audio: true,
                resume_after_answer: true,
            }],
        }
    }

    fn checkpoint(
        tour_id: Uuid,
        ordinal: u32,
        lat: f64,
        lon: f64,
        riddle: Option<Riddle>,
        experience: Option<ImmersiveExperience>,
    ) -> Checkpoint {
        Checkpoint {
            id: Uuid::new_v4(),
            tour_id,
            ordinal,
            title: format!("Stop {ordinal}"),
            location: GeoPoint::new(lat, lon),
            trigger_radius_m: 30.0,
            content: CheckpointContent {
                audio_ref: format!("stop{ordinal}.m4a"),
                audio_duration_ms: 60_000,
                title: format!("Stop {ordinal}"),
                narrative_text: "…".into(),
                historical_fact: None,
                fun_fact: None,
                images: vec![],
                experience,
            },
            riddle,
            points: 100,
            bonus_points: 50,
            hint: None,
            next_checkpoint_hint: None,
        }
    }

    fn riddle(max_attempts: u32) -> Riddle {
        Riddle {
            id: Uuid::new_v4(),
            question: "?".into(),
            kind: RiddleKind::MultipleChoice {
                options: vec!["a".into(), "b".into()],
                correct_index: 0,
            },
            hint: None,
            explanation: "e".into(),
            max_attempts,
            time_limit_seconds: None,
        }
    }

    fn two_stop_tour() -> Arc<Tour> {
        let tour_id = Uuid::new_v4();
        Arc::new(Tour {
            id: tour_id,
            title: "Left Bank".into(),
            subtitle: "1940".into(),
            description: "d".into(),
            difficulty: Difficulty::Medium,
            duration_minutes: 90,
            distance_meters: 3_000,
            start_point: GeoPoint::new(48.8530, 2.3499),
            checkpoints: vec![
                checkpoint(tour_id, 0, 48.8530, 2.3499, Some(riddle(3)), Some(experience_with_quiz(13_400))),
                checkpoint(tour_id, 1, 48.8566, 2.3522, None, None),
            ],
            total_points: 250,
            tags: vec![],
            available: true,
        })
    }

    fn engine() -> TourEngine {
        TourEngine::new(EngineConfig::default(), Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn starting_twice_is_rejected() {
        let mut eng = engine();
        let tour = two_stop_tour();
        eng.start_tour(tour.clone(), TourMode::EscapeGame).await.unwrap();
        assert!(matches!(
            eng.start_tour(tour, TourMode::Guided).await,
            Err(Error::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn escape_game_counts_riddles_guided_does_not() {
        let tour = two_stop_tour();

        let mut eng = engine();
        eng.start_tour(tour.clone(), TourMode::EscapeGame).await.unwrap();
        assert_eq!(eng.progress().unwrap().riddles_total, 1);
        eng.abandon_tour().await;

        eng.start_tour(tour, TourMode::Guided).await.unwrap();
        assert_eq!(eng.progress().unwrap().riddles_total, 0);
    }

    #[tokio::test]
    async fn full_run_scores_250() {
        let mut eng = engine();
        let tour = two_stop_tour();
        let cp0 = tour.checkpoints[0].id;
        let cp1 = tour.checkpoints[1].id;
        eng.start_tour(tour, TourMode::EscapeGame).await.unwrap();

        eng.on_checkpoint_reached(cp0, 100).await;
        let awarded = eng.answer_riddle(cp0, true, 50).await;
        assert_eq!(awarded, 50); // first attempt, no decay
        eng.on_checkpoint_reached(cp1, 100).await;

        let progress = eng.progress().unwrap();
        assert_eq!(progress.total_score, 250);
        assert_eq!(progress.riddles_correct, 1);
        assert_eq!(progress.cursor(), 2);
    }

    #[tokio::test]
    async fn duplicate_reach_is_a_no_op() {
        let mut eng = engine();
        let tour = two_stop_tour();
        let cp0 = tour.checkpoints[0].id;
        eng.start_tour(tour, TourMode::EscapeGame).await.unwrap();

        eng.on_checkpoint_reached(cp0, 100).await;
        eng.on_checkpoint_reached(cp0, 100).await;

        let progress = eng.progress().unwrap();
        assert_eq!(progress.checkpoints_reached.len(), 1);
        assert_eq!(progress.total_score, 100);
    }

    #[tokio::test]
    async fn position_fix_enters_only_the_pending_checkpoint() {
        let mut eng = engine();
        let tour = two_stop_tour();
        let at_stop1 = tour.checkpoints[1].location.clone();
        let at_stop0 = tour.checkpoints[0].location.clone();
        eng.start_tour(tour.clone(), TourMode::EscapeGame).await.unwrap();

        // Standing at stop 1 first: sequential unlock keeps it locked
        assert!(eng.on_position_fix(&at_stop1).await.is_none());

        let entry = eng.on_position_fix(&at_stop0).await.unwrap();
        assert_eq!(entry.checkpoint_id, tour.checkpoints[0].id);
        assert_eq!(eng.progress().unwrap().cursor(), 1);

        // Re-delivered fix at the same spot does nothing
        assert!(eng.on_position_fix(&at_stop0).await.is_none());

        // Now stop 1 is armed
        let entry = eng.on_position_fix(&at_stop1).await.unwrap();
        assert_eq!(entry.checkpoint_id, tour.checkpoints[1].id);
    }

    #[tokio::test]
    async fn reach_loads_experience_and_quiz_gates_answer_segment() {
        let mut eng = engine();
        let tour = two_stop_tour();
        let cp0 = tour.checkpoints[0].id;
        let answer_seg = tour.checkpoints[0].content.experience.as_ref().unwrap().transcript[1].id;
        let quiz_id = tour.checkpoints[0].content.experience.as_ref().unwrap().quizzes[0].id;
        eng.start_tour(tour, TourMode::EscapeGame).await.unwrap();
        eng.on_checkpoint_reached(cp0, 100).await;
        assert!(eng.media_sync().is_some());

        // Run the clock past the quiz boundary
        let out = eng.on_playback_tick(13_400);
        assert_eq!(out.quiz_triggered, Some(quiz_id));
        assert!(!out.revealed.contains(&answer_seg));

        // Far past it, still gated
        let out = eng.on_playback_tick(20_000);
        assert!(!out.revealed.contains(&answer_seg));

        // Wrong option: the quiz completes (recorded incorrect) and the
        // answer segment unblocks on the next tick
        eng.answer_quiz(quiz_id, Some(0), 4_000).await;
        let out = eng.on_playback_tick(20_000);
        assert_eq!(out.revealed, vec![answer_seg]);

        let cp = &eng.progress().unwrap().checkpoints_reached[0];
        assert_eq!(cp.quiz_outcomes.len(), 1);
        assert!(!cp.quiz_outcomes[0].correct);
        assert_eq!(cp.quiz_outcomes[0].response_ms, 4_000);
    }

    #[tokio::test]
    async fn quiz_timeout_counts_as_incorrect_and_inactive_answers_ignored() {
        let mut eng = engine();
        let tour = two_stop_tour();
        let cp0 = tour.checkpoints[0].id;
        let quiz_id = tour.checkpoints[0].content.experience.as_ref().unwrap().quizzes[0].id;
        eng.start_tour(tour, TourMode::EscapeGame).await.unwrap();
        eng.on_checkpoint_reached(cp0, 100).await;

        // Answer before the quiz is active: ignored
        eng.answer_quiz(quiz_id, Some(1), 100).await;
        assert!(eng.progress().unwrap().checkpoints_reached[0].quiz_outcomes.is_empty());

        eng.on_playback_tick(13_400);
        // Timeout
        eng.answer_quiz(quiz_id, None, 15_000).await;
        let cp = &eng.progress().unwrap().checkpoints_reached[0];
        assert_eq!(cp.quiz_outcomes.len(), 1);
        assert!(!cp.quiz_outcomes[0].correct);

        // A second answer for the now-completed quiz is ignored
        eng.answer_quiz(quiz_id, Some(1), 99).await;
        assert_eq!(eng.progress().unwrap().checkpoints_reached[0].quiz_outcomes.len(), 1);
    }

    #[tokio::test]
    async fn riddle_decay_and_sticky_solve() {
        let mut eng = engine();
        let tour = two_stop_tour();
        let cp0 = tour.checkpoints[0].id;
        eng.start_tour(tour, TourMode::EscapeGame).await.unwrap();
        eng.on_checkpoint_reached(cp0, 100).await;

        // Two wrong attempts, then correct on the third (floor: 10%)
        assert_eq!(eng.answer_riddle(cp0, false, 50).await, 0);
        assert_eq!(eng.answer_riddle(cp0, false, 50).await, 0);
        let awarded = eng.answer_riddle(cp0, true, 50).await;
        assert_eq!(awarded, 5);

        let progress = eng.progress().unwrap();
        assert_eq!(progress.total_score, 105);
        assert_eq!(progress.riddles_correct, 1);
        let outcome = progress.checkpoints_reached[0].riddle.clone().unwrap();
        assert!(outcome.solved);
        assert_eq!(outcome.attempts, 3);

        // Solved is sticky; another answer changes nothing
        assert_eq!(eng.answer_riddle(cp0, true, 50).await, 0);
        assert_eq!(eng.progress().unwrap().total_score, 105);
    }

    #[tokio::test]
    async fn riddle_on_unknown_checkpoint_is_ignored() {
        let mut eng = engine();
        eng.start_tour(two_stop_tour(), TourMode::EscapeGame).await.unwrap();
        assert_eq!(eng.answer_riddle(Uuid::new_v4(), true, 50).await, 0);
        assert_eq!(eng.progress().unwrap().total_score, 0);
    }

    #[tokio::test]
    async fn trip_metadata_is_monotone() {
        let mut eng = engine();
        let tour = two_stop_tour();
        eng.start_tour(tour, TourMode::Guided).await.unwrap();

        eng.on_elapsed_minutes(5.0);
        eng.on_elapsed_minutes(3.0); // clock skew: ignored
        eng.on_elapsed_minutes(f64::NAN);
        assert_eq!(eng.progress().unwrap().elapsed_minutes, 5.0);

        eng.on_distance_walked(120.0);
        eng.on_distance_walked(-40.0);
        eng.on_distance_walked(30.0);
        assert_eq!(eng.progress().unwrap().distance_walked_m, 150.0);
    }

    #[tokio::test]
    async fn operations_without_active_tour_are_no_ops() {
        let mut eng = engine();
        eng.on_checkpoint_reached(Uuid::new_v4(), 100).await;
        assert!(eng.on_position_fix(&GeoPoint::new(48.85, 2.35)).await.is_none());
        assert!(eng.on_playback_tick(5_000).is_empty());
        assert_eq!(eng.answer_riddle(Uuid::new_v4(), true, 50).await, 0);
        eng.mark_audio_listened(Uuid::new_v4()).await;
        eng.on_elapsed_minutes(3.0);
        eng.abandon_tour().await;
        assert!(eng.progress().is_none());
        assert!(matches!(eng.complete_tour().await, Err(Error::InvalidState(_))));
    }

    #[tokio::test]
    async fn complete_returns_final_record_and_clears_engine() {
        let mut eng = engine();
        let tour = two_stop_tour();
        let cp0 = tour.checkpoints[0].id;
        eng.start_tour(tour.clone(), TourMode::EscapeGame).await.unwrap();
        eng.on_checkpoint_reached(cp0, 100).await;
        eng.mark_audio_listened(cp0).await;

        let record = eng.complete_tour().await.unwrap();
        assert_eq!(record.status, TourStatus::Completed);
        assert!(record.completed_at.is_some());
        assert_eq!(record.total_score, 100);
        assert!(record.checkpoints_reached[0].audio_listened);
        assert!(eng.progress().is_none());

        // The engine is free for a new run
        eng.start_tour(tour, TourMode::Guided).await.unwrap();
    }

    #[tokio::test]
    async fn zero_checkpoint_tour_is_accepted_and_completable() {
        let mut eng = engine();
        let tour = Arc::new(Tour {
            checkpoints: vec![],
            total_points: 0,
            ..(*two_stop_tour()).clone()
        });
        eng.start_tour(tour, TourMode::Guided).await.unwrap();

        assert!(eng.on_position_fix(&GeoPoint::new(48.85, 2.35)).await.is_none());
        assert!(eng.next_checkpoint().is_none());

        let record = eng.complete_tour().await.unwrap();
        assert_eq!(record.total_score, 0);
        assert_eq!(record.status, TourStatus::Completed);
    }

    #[tokio::test]
    async fn events_are_observable_on_the_bus() {
        let mut eng = engine();
        let mut rx = eng.event_bus().subscribe();
        let tour = two_stop_tour();
        let cp0 = tour.checkpoints[0].id;

        eng.start_tour(tour, TourMode::EscapeGame).await.unwrap();
        eng.on_checkpoint_reached(cp0, 100).await;

        assert_eq!(rx.recv().await.unwrap().event_type(), "TourStarted");
        match rx.recv().await.unwrap() {
            TourEvent::CheckpointReached {
                checkpoint_id,
                index,
                points,
                ..
            } => {
                assert_eq!(checkpoint_id, cp0);
                assert_eq!(index, 0);
                assert_eq!(points, 100);
            }
            other => panic!("unexpected event {}", other.event_type()),
        }
    }
}
