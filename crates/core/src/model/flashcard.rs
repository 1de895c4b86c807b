use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::SetId;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum MasteryError {
    #[error("a flashcard set must contain at least one card")]
    EmptySet,

    #[error("known count ({known}) exceeds total cards ({total})")]
    KnownExceedsTotal { known: u32, total: u32 },
}

//
// ─── MASTERY SNAPSHOT ──────────────────────────────────────────────────────────
//

/// Mastery snapshot of one flashcard set, taken at the end of the last session.
///
/// `known_count <= total_cards` and `total_cards > 0` hold for every value,
/// including values read back from storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawMastery")]
pub struct FlashcardMastery {
    known_count: u32,
    total_cards: u32,
    last_studied_at: DateTime<Utc>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMastery {
    known_count: u32,
    total_cards: u32,
    last_studied_at: DateTime<Utc>,
}

impl TryFrom<RawMastery> for FlashcardMastery {
    type Error = MasteryError;

    fn try_from(raw: RawMastery) -> Result<Self, Self::Error> {
        Self::new(raw.known_count, raw.total_cards, raw.last_studied_at)
    }
}

impl FlashcardMastery {
    /// # Errors
    ///
    /// Returns `MasteryError::EmptySet` if `total_cards == 0`.
    /// Returns `MasteryError::KnownExceedsTotal` if `known_count > total_cards`.
    pub fn new(
        known_count: u32,
        total_cards: u32,
        last_studied_at: DateTime<Utc>,
    ) -> Result<Self, MasteryError> {
        if total_cards == 0 {
            return Err(MasteryError::EmptySet);
        }
        if known_count > total_cards {
            return Err(MasteryError::KnownExceedsTotal {
                known: known_count,
                total: total_cards,
            });
        }
        Ok(Self {
            known_count,
            total_cards,
            last_studied_at,
        })
    }

    #[must_use]
    pub fn known_count(&self) -> u32 {
        self.known_count
    }

    #[must_use]
    pub fn total_cards(&self) -> u32 {
        self.total_cards
    }

    #[must_use]
    pub fn last_studied_at(&self) -> DateTime<Utc> {
        self.last_studied_at
    }

    /// Fraction of the set marked known, in `0.0..=1.0`.
    #[must_use]
    pub fn ratio(&self) -> f64 {
        f64::from(self.known_count) / f64::from(self.total_cards)
    }
}

//
// ─── SESSION COMPLETION EVENT ──────────────────────────────────────────────────
//

/// Emitted when a review session over a set reaches `Completed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlashcardSessionCompleted {
    pub set_id: SetId,
    pub known_count: u32,
    pub total_cards: u32,
    pub timestamp: DateTime<Utc>,
}

impl FlashcardSessionCompleted {
    /// The mastery snapshot this event stands for.
    ///
    /// # Errors
    ///
    /// Returns `MasteryError` if the counts violate the mastery invariant.
    pub fn to_mastery(&self) -> Result<FlashcardMastery, MasteryError> {
        FlashcardMastery::new(self.known_count, self.total_cards, self.timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    #[test]
    fn mastery_enforces_bounds() {
        assert_eq!(
            FlashcardMastery::new(0, 0, fixed_now()).unwrap_err(),
            MasteryError::EmptySet
        );
        assert_eq!(
            FlashcardMastery::new(5, 4, fixed_now()).unwrap_err(),
            MasteryError::KnownExceedsTotal { known: 5, total: 4 }
        );
        let ok = FlashcardMastery::new(2, 4, fixed_now()).unwrap();
        assert!((ok.ratio() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn persisted_mastery_is_validated_on_read() {
        let json = r#"{"knownCount":7,"totalCards":3,"lastStudiedAt":"2024-03-15T10:00:00Z"}"#;
        assert!(serde_json::from_str::<FlashcardMastery>(json).is_err());

        let json = r#"{"knownCount":3,"totalCards":3,"lastStudiedAt":"2024-03-15T10:00:00Z"}"#;
        let mastery: FlashcardMastery = serde_json::from_str(json).unwrap();
        assert_eq!(mastery.known_count(), 3);
    }
}
