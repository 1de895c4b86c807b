use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;

use crate::model::flashcard::{FlashcardMastery, FlashcardSessionCompleted, MasteryError};
use crate::model::ids::{MaterialId, QuizId, SetId};
use crate::model::material::{MaterialError, MaterialStatus, ReviewDecision, UploadedMaterial};
use crate::model::quiz::QuizAttempt;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum FoldError {
    #[error(transparent)]
    Mastery(#[from] MasteryError),

    #[error(transparent)]
    Material(#[from] MaterialError),

    #[error("material {0} already exists in this record")]
    DuplicateMaterial(MaterialId),

    #[error("material {0} not found")]
    MaterialNotFound(MaterialId),
}

//
// ─── EVENTS ────────────────────────────────────────────────────────────────────
//

/// Everything that can change a learner's persisted progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// Replaces the mastery snapshot of a set (last write wins by timestamp).
    FlashcardSessionCompleted(FlashcardSessionCompleted),
    /// Appended to the attempt log unconditionally.
    QuizCompleted(QuizAttempt),
    MaterialSubmitted(UploadedMaterial),
    MaterialReviewed {
        material_id: MaterialId,
        decision: ReviewDecision,
        feedback: Option<String>,
    },
}

//
// ─── RECORD ────────────────────────────────────────────────────────────────────
//

/// Persisted progress document of one learner.
///
/// Derived metrics are computed from this document on read and never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawRecord")]
pub struct UserProgressRecord {
    quiz_attempts: Vec<QuizAttempt>,
    flashcard_mastery: BTreeMap<SetId, FlashcardMastery>,
    uploaded_materials: Vec<UploadedMaterial>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRecord {
    #[serde(default)]
    quiz_attempts: Vec<QuizAttempt>,
    #[serde(default)]
    flashcard_mastery: BTreeMap<SetId, FlashcardMastery>,
    #[serde(default)]
    uploaded_materials: Vec<UploadedMaterial>,
}

impl TryFrom<RawRecord> for UserProgressRecord {
    type Error = FoldError;

    fn try_from(raw: RawRecord) -> Result<Self, Self::Error> {
        let mut seen = HashSet::with_capacity(raw.uploaded_materials.len());
        for material in &raw.uploaded_materials {
            if !seen.insert(material.material_id) {
                return Err(FoldError::DuplicateMaterial(material.material_id));
            }
        }
        Ok(Self {
            quiz_attempts: raw.quiz_attempts,
            flashcard_mastery: raw.flashcard_mastery,
            uploaded_materials: raw.uploaded_materials,
        })
    }
}

impl UserProgressRecord {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply `event` and return the next record state.
    ///
    /// On error the input record is consumed and nothing is returned, so a
    /// caller folding a clone never observes a partially applied event.
    ///
    /// # Errors
    ///
    /// Returns `FoldError` when the event violates a record invariant.
    pub fn fold(mut self, event: &ProgressEvent) -> Result<Self, FoldError> {
        match event {
            ProgressEvent::FlashcardSessionCompleted(completed) => {
                let snapshot = completed.to_mastery()?;
                let stale = self
                    .flashcard_mastery
                    .get(&completed.set_id)
                    .is_some_and(|current| current.last_studied_at() > snapshot.last_studied_at());
                if !stale {
                    self.flashcard_mastery
                        .insert(completed.set_id.clone(), snapshot);
                }
            }
            ProgressEvent::QuizCompleted(attempt) => {
                self.quiz_attempts.push(attempt.clone());
            }
            ProgressEvent::MaterialSubmitted(material) => {
                if self.material(material.material_id).is_some() {
                    return Err(FoldError::DuplicateMaterial(material.material_id));
                }
                self.uploaded_materials.push(material.clone());
            }
            ProgressEvent::MaterialReviewed {
                material_id,
                decision,
                feedback,
            } => {
                let material = self
                    .uploaded_materials
                    .iter_mut()
                    .find(|m| m.material_id == *material_id)
                    .ok_or(FoldError::MaterialNotFound(*material_id))?;
                material.review(*decision, feedback.as_deref())?;
            }
        }
        Ok(self)
    }

    #[must_use]
    pub fn quiz_attempts(&self) -> &[QuizAttempt] {
        &self.quiz_attempts
    }

    /// Attempts of a single quiz, oldest first.
    pub fn quiz_history<'a>(&'a self, quiz_id: &'a QuizId) -> impl Iterator<Item = &'a QuizAttempt> {
        self.quiz_attempts.iter().filter(move |a| &a.quiz_id == quiz_id)
    }

    #[must_use]
    pub fn flashcard_mastery(&self) -> &BTreeMap<SetId, FlashcardMastery> {
        &self.flashcard_mastery
    }

    #[must_use]
    pub fn mastery(&self, set_id: &SetId) -> Option<&FlashcardMastery> {
        self.flashcard_mastery.get(set_id)
    }

    #[must_use]
    pub fn uploaded_materials(&self) -> &[UploadedMaterial] {
        &self.uploaded_materials
    }

    #[must_use]
    pub fn material(&self, material_id: MaterialId) -> Option<&UploadedMaterial> {
        self.uploaded_materials
            .iter()
            .find(|m| m.material_id == material_id)
    }

    pub fn pending_materials(&self) -> impl Iterator<Item = &UploadedMaterial> {
        self.uploaded_materials
            .iter()
            .filter(|m| m.status == MaterialStatus::Pending)
    }

    //
    // ─── DERIVED METRICS ───────────────────────────────────────────────────────
    //

    /// Mean score over all attempts, `0.0` without attempts.
    #[must_use]
    pub fn average_quiz_score(&self) -> f64 {
        if self.quiz_attempts.is_empty() {
            return 0.0;
        }
        let total: f64 = self
            .quiz_attempts
            .iter()
            .map(|a| f64::from(a.score.value()))
            .sum();
        #[allow(clippy::cast_precision_loss)]
        let count = self.quiz_attempts.len() as f64;
        total / count
    }

    /// Mean of per-set mastery ratios as a percentage, `0.0` without sets.
    #[must_use]
    pub fn flashcard_mastery_percent(&self) -> f64 {
        if self.flashcard_mastery.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.flashcard_mastery.values().map(FlashcardMastery::ratio).sum();
        #[allow(clippy::cast_precision_loss)]
        let count = self.flashcard_mastery.len() as f64;
        sum / count * 100.0
    }

    /// Latest timestamp across attempts, study sessions and uploads.
    #[must_use]
    pub fn last_activity(&self) -> Option<DateTime<Utc>> {
        let quizzes = self.quiz_attempts.iter().map(|a| a.completed_at);
        let sets = self
            .flashcard_mastery
            .values()
            .map(FlashcardMastery::last_studied_at);
        let uploads = self.uploaded_materials.iter().map(|m| m.uploaded_at);
        quizzes.chain(sets).chain(uploads).max()
    }

    #[must_use]
    pub fn overview(&self) -> ProgressOverview {
        let count = |status: MaterialStatus| {
            self.uploaded_materials
                .iter()
                .filter(|m| m.status == status)
                .count()
        };
        ProgressOverview {
            quizzes_completed: self.quiz_attempts.len(),
            average_quiz_score: self.average_quiz_score(),
            flashcard_mastery_percent: self.flashcard_mastery_percent(),
            sets_studied: self.flashcard_mastery.len(),
            materials_pending: count(MaterialStatus::Pending),
            materials_approved: count(MaterialStatus::Approved),
            materials_rejected: count(MaterialStatus::Rejected),
            last_activity: self.last_activity(),
        }
    }
}

/// Dashboard figures for one learner, computed from the stored record.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressOverview {
    pub quizzes_completed: usize,
    pub average_quiz_score: f64,
    pub flashcard_mastery_percent: f64,
    pub sets_studied: usize,
    pub materials_pending: usize,
    pub materials_approved: usize,
    pub materials_rejected: usize,
    pub last_activity: Option<DateTime<Utc>>,
}

impl ProgressOverview {
    #[must_use]
    pub fn materials_total(&self) -> usize {
        self.materials_pending + self.materials_approved + self.materials_rejected
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
