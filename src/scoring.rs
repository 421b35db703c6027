//! Scoring engine
//!
//! Pure functions computing checkpoint scores and riddle bonuses.
//! The riddle bonus decays linearly with the number of attempts: 100% on
//! the first try down to a 10% floor on the last allowed try.

/// Total score for a reached checkpoint
pub fn checkpoint_score(base_points: u32, riddle_solved: bool, bonus_points: u32) -> u32 {
    base_points + if riddle_solved { bonus_points } else { 0 }
}

/// Riddle bonus after attempt decay
///
/// - Incorrect answers score 0.
/// - With `max_attempts <= 1` there is no decay: full bonus.
/// - Otherwise the fraction falls linearly from 1.0 at attempt 1 to 0.1
///   at `max_attempts`, clamped at the 0.1 floor (attempts past the
///   budget cannot go below it). Rounded to the nearest point.
pub fn riddle_score(correct: bool, attempts: u32, max_attempts: u32, bonus_points: u32) -> u32 {
    if !correct {
        return 0;
    }
    if max_attempts <= 1 {
        return bonus_points;
    }

    const MIN_FRACTION: f64 = 0.1;
    let decay_per_attempt = (1.0 - MIN_FRACTION) / (max_attempts - 1) as f64;
    let fraction = (1.0 - decay_per_attempt * attempts.saturating_sub(1) as f64).max(MIN_FRACTION);
    (bonus_points as f64 * fraction).round() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkpoint_score_adds_bonus_only_when_solved() {
        assert_eq!(checkpoint_score(100, false, 50), 100);
        assert_eq!(checkpoint_score(100, true, 50), 150);
        assert_eq!(checkpoint_score(0, true, 0), 0);
    }

    #[test]
    fn riddle_score_decay_table() {
        // 3 attempts allowed: 100% → 55% → 10%
        assert_eq!(riddle_score(true, 1, 3, 100), 100);
        assert_eq!(riddle_score(true, 2, 3, 100), 55);
        assert_eq!(riddle_score(true, 3, 3, 100), 10);
    }

    #[test]
    fn incorrect_answer_scores_zero() {
        assert_eq!(riddle_score(false, 1, 3, 100), 0);
        assert_eq!(riddle_score(false, 3, 3, 100), 0);
    }

    #[test]
    fn single_attempt_budget_has_no_decay() {
        assert_eq!(riddle_score(true, 1, 1, 50), 50);
        assert_eq!(riddle_score(true, 1, 0, 50), 50);
    }

    #[test]
    fn attempts_past_budget_stay_on_floor() {
        assert_eq!(riddle_score(true, 7, 3, 100), 10);
    }

    #[test]
    fn decay_is_non_increasing_in_attempts() {
        for max_attempts in 1..=6u32 {
            let mut prev = u32::MAX;
            for attempts in 1..=max_attempts + 2 {
                let score = riddle_score(true, attempts, max_attempts, 80);
                assert!(
                    score <= prev,
                    "score rose from {prev} to {score} at attempt {attempts}/{max_attempts}"
                );
                prev = score;
            }
        }
    }

    #[test]
    fn rounding_is_to_nearest() {
        // 4 attempts allowed: fractions 1.0, 0.7, 0.4, 0.1
        assert_eq!(riddle_score(true, 2, 4, 25), 18); // 17.5 rounds up
        assert_eq!(riddle_score(true, 3, 4, 25), 10);
    }
}
