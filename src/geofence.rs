//! Geofence evaluator
//!
//! Decides whether a GPS fix has entered the geofence of the *next*
//! checkpoint. Checkpoints unlock strictly in sequence: only the
//! checkpoint at the cursor is ever tested, so a visitor walking past a
//! later stop cannot trigger it out of order.
//!
//! The evaluator is side-effect free: it returns at most one entry event
//! per call and never records anything. Applying the event exactly once
//! is the caller's job, which keeps this logic trivially testable.

use crate::geo::{self, GeoPoint};
use crate::model::Checkpoint;
use std::collections::HashSet;
use uuid::Uuid;

/// A checkpoint geofence entry detected from a fix
#[derive(Debug, Clone, PartialEq)]
pub struct CheckpointEntry {
    pub checkpoint_id: Uuid,
    /// Index of the entered checkpoint within the tour sequence
    pub index: usize,
    /// Distance from the fix to the checkpoint center, meters
    pub distance_m: f64,
}

/// Sequential-unlock geofence evaluator
///
/// The effective trigger radius is the checkpoint's declared radius plus
/// a fixed accuracy buffer absorbing GPS noise.
#[derive(Debug, Clone)]
pub struct GeofenceEvaluator {
    accuracy_buffer_m: f64,
}

impl GeofenceEvaluator {
    pub fn new(accuracy_buffer_m: f64) -> Self {
        Self { accuracy_buffer_m }
    }

    /// Evaluate a fix against the checkpoint at `cursor`
    ///
    /// Returns `None` when:
    /// - `cursor` is past the end of the list (tour finished or empty;
    ///   not an error, there is simply no pending checkpoint);
    /// - the fix is outside the effective radius;
    /// - the checkpoint was already reached (duplicate/late fix).
    pub fn evaluate(
        &self,
        fix: &GeoPoint,
        checkpoints: &[Checkpoint],
        cursor: usize,
        reached: &HashSet<Uuid>,
    ) -> Option<CheckpointEntry> {
        let next = checkpoints.get(cursor)?;
        if reached.contains(&next.id) {
            return None;
        }

        let distance_m = geo::distance(fix, &next.location);
        if distance_m <= next.trigger_radius_m + self.accuracy_buffer_m {
            Some(CheckpointEntry {
                checkpoint_id: next.id,
                index: cursor,
                distance_m,
            })
        } else {
            None
        }
    }

    /// Distance from a fix to the pending checkpoint, for UI display
    pub fn distance_to_next(
        &self,
        fix: &GeoPoint,
        checkpoints: &[Checkpoint],
        cursor: usize,
    ) -> Option<f64> {
        checkpoints
            .get(cursor)
            .map(|cp| geo::distance(fix, &cp.location))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CheckpointContent;

    fn checkpoint_at(lat: f64, lon: f64, ordinal: u32, radius_m: f64) -> Checkpoint {
        Checkpoint {
            id: Uuid::new_v4(),
            tour_id: Uuid::new_v4(),
            ordinal,
            title: format!("Stop {ordinal}"),
            location: GeoPoint::new(lat, lon),
            trigger_radius_m: radius_m,
            content: CheckpointContent {
                audio_ref: "a.m4a".into(),
                audio_duration_ms: 1000,
                title: "t".into(),
                narrative_text: "n".into(),
                historical_fact: None,
                fun_fact: None,
                images: vec![],
                experience: None,
            },
            riddle: None,
            points: 100,
            bonus_points: 0,
            hint: None,
            next_checkpoint_hint: None,
        }
    }

    /// Point offset east of `origin` by roughly `meters`
    fn east_of(origin: &GeoPoint, meters: f64) -> GeoPoint {
        let deg_per_m = 1.0 / (111_320.0 * origin.latitude.to_radians().cos());
        GeoPoint::new(origin.latitude, origin.longitude + meters * deg_per_m)
    }

    #[test]
    fn fix_at_center_always_enters() {
        let eval = GeofenceEvaluator::new(10.0);
        let cps = vec![checkpoint_at(48.8530, 2.3499, 0, 30.0)];
        let fix = cps[0].location.clone();

        let entry = eval.evaluate(&fix, &cps, 0, &HashSet::new()).unwrap();
        assert_eq!(entry.checkpoint_id, cps[0].id);
        assert_eq!(entry.index, 0);
        assert!(entry.distance_m < 0.01);
    }

    #[test]
    fn fix_outside_effective_radius_never_enters() {
        let eval = GeofenceEvaluator::new(10.0);
        let cps = vec![checkpoint_at(48.8530, 2.3499, 0, 30.0)];
        // radius + buffer + 1 meter
        let fix = east_of(&cps[0].location, 41.0);

        assert!(eval.evaluate(&fix, &cps, 0, &HashSet::new()).is_none());
    }

    #[test]
    fn buffer_extends_the_declared_radius() {
        let eval = GeofenceEvaluator::new(10.0);
        let cps = vec![checkpoint_at(48.8530, 2.3499, 0, 30.0)];
        // Between the declared radius and the effective one
        let fix = east_of(&cps[0].location, 35.0);

        assert!(eval.evaluate(&fix, &cps, 0, &HashSet::new()).is_some());
    }

    #[test]
    fn already_reached_checkpoint_is_ignored() {
        let eval = GeofenceEvaluator::new(10.0);
        let cps = vec![checkpoint_at(48.8530, 2.3499, 0, 30.0)];
        let fix = cps[0].location.clone();

        let mut reached = HashSet::new();
        assert!(eval.evaluate(&fix, &cps, 0, &reached).is_some());

        reached.insert(cps[0].id);
        assert!(eval.evaluate(&fix, &cps, 0, &reached).is_none());
    }

    #[test]
    fn only_the_cursor_checkpoint_is_tested() {
        let eval = GeofenceEvaluator::new(10.0);
        let cps = vec![
            checkpoint_at(48.8530, 2.3499, 0, 30.0),
            checkpoint_at(48.8600, 2.3600, 1, 30.0),
        ];
        // Standing on checkpoint 1 while the cursor still points at 0
        let fix = cps[1].location.clone();

        assert!(eval.evaluate(&fix, &cps, 0, &HashSet::new()).is_none());
        assert!(eval.evaluate(&fix, &cps, 1, &HashSet::new()).is_some());
    }

    #[test]
    fn empty_list_or_finished_cursor_yields_no_event() {
        let eval = GeofenceEvaluator::new(10.0);
        let fix = GeoPoint::new(48.8530, 2.3499);

        assert!(eval.evaluate(&fix, &[], 0, &HashSet::new()).is_none());

        let cps = vec![checkpoint_at(48.8530, 2.3499, 0, 30.0)];
        assert!(eval.evaluate(&fix, &cps, 1, &HashSet::new()).is_none());
        assert!(eval.evaluate(&fix, &cps, 99, &HashSet::new()).is_none());
    }

    #[test]
    fn distance_to_next_reports_pending_checkpoint() {
        let eval = GeofenceEvaluator::new(10.0);
        let cps = vec![checkpoint_at(48.8530, 2.3499, 0, 30.0)];
        let fix = east_of(&cps[0].location, 100.0);

        let d = eval.distance_to_next(&fix, &cps, 0).unwrap();
        assert!((d - 100.0).abs() < 2.0, "got {d}");
        assert!(eval.distance_to_next(&fix, &cps, 1).is_none());
    }
}
