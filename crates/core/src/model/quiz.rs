use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::QuizId;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ScoreError {
    #[error("quiz score must be between 0 and 100, got {0}")]
    OutOfRange(u32),
}

//
// ─── SCORE ─────────────────────────────────────────────────────────────────────
//

/// Integer percentage score of a quiz attempt, always within `0..=100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Score(u8);

impl Score {
    pub const MAX: u32 = 100;

    /// Validate a raw percentage.
    ///
    /// # Errors
    ///
    /// Returns `ScoreError::OutOfRange` when `value > 100`.
    pub fn new(value: u32) -> Result<Self, ScoreError> {
        if value > Self::MAX {
            return Err(ScoreError::OutOfRange(value));
        }
        u8::try_from(value)
            .map(Self)
            .map_err(|_| ScoreError::OutOfRange(value))
    }

    /// Score for `correct` right answers out of `total`, rounded half up.
    ///
    /// An empty quiz scores 0.
    #[must_use]
    pub fn from_correct(correct: usize, total: usize) -> Self {
        if total == 0 {
            return Self(0);
        }
        let correct = correct.min(total);
        // (correct * 100 + total / 2) / total, the integer form of round()
        let pct = (correct * 100 + total / 2) / total;
        Self(u8::try_from(pct).unwrap_or(100))
    }

    #[must_use]
    pub fn value(self) -> u32 {
        u32::from(self.0)
    }

    #[must_use]
    pub fn performance(self) -> Performance {
        match self.0 {
            80..=100 => Performance::Excellent,
            60..=79 => Performance::Good,
            _ => Performance::NeedsPractice,
        }
    }
}

impl TryFrom<u32> for Score {
    type Error = ScoreError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Score> for u32 {
    fn from(score: Score) -> Self {
        score.value()
    }
}

/// Coarse result band shown next to a finished quiz.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Performance {
    Excellent,
    Good,
    NeedsPractice,
}

//
// ─── QUIZ ATTEMPT ──────────────────────────────────────────────────────────────
//

/// One completed quiz attempt. Attempts are append-only history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizAttempt {
    pub quiz_id: QuizId,
    pub score: Score,
    pub completed_at: DateTime<Utc>,
}

impl QuizAttempt {
    #[must_use]
    pub fn new(quiz_id: QuizId, score: Score, completed_at: DateTime<Utc>) -> Self {
        Self {
            quiz_id,
            score,
            completed_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_rejects_values_above_hundred() {
        assert_eq!(Score::new(100).unwrap().value(), 100);
        assert_eq!(Score::new(101).unwrap_err(), ScoreError::OutOfRange(101));
    }

    #[test]
    fn from_correct_rounds_like_the_results_screen() {
        assert_eq!(Score::from_correct(2, 3).value(), 67);
        assert_eq!(Score::from_correct(1, 3).value(), 33);
        assert_eq!(Score::from_correct(1, 8).value(), 13);
        assert_eq!(Score::from_correct(0, 0).value(), 0);
        assert_eq!(Score::from_correct(5, 4).value(), 100);
    }

    #[test]
    fn performance_bands() {
        assert_eq!(Score::new(80).unwrap().performance(), Performance::Excellent);
        assert_eq!(Score::new(79).unwrap().performance(), Performance::Good);
        assert_eq!(Score::new(60).unwrap().performance(), Performance::Good);
        assert_eq!(
            Score::new(59).unwrap().performance(),
            Performance::NeedsPractice
        );
    }

    #[test]
    fn score_deserialization_enforces_range() {
        let ok: Score = serde_json::from_str("90").unwrap();
        assert_eq!(ok.value(), 90);
        assert!(serde_json::from_str::<Score>("150").is_err());
    }
}
