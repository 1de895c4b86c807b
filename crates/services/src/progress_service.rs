use std::sync::Arc;

use tracing::debug;

use storage::repository::AssignmentRepository;
use study_core::model::{
    FlashcardMastery, FlashcardSessionCompleted, ProgressEvent, ProgressOverview, QuizAttempt,
    QuizId, UserId, UserProgressRecord,
};

use crate::error::ProgressError;
use crate::store::RecordStore;

/// Dashboard row of one student as seen by their reviewer.
#[derive(Debug, Clone, PartialEq)]
pub struct StudentProgress {
    pub student_id: UserId,
    pub overview: ProgressOverview,
}

/// Folds learning events into progress records and serves derived metrics.
///
/// Metrics are recomputed from the stored record on every read.
#[derive(Clone)]
pub struct ProgressService {
    store: RecordStore,
    assignments: Arc<dyn AssignmentRepository>,
}

impl ProgressService {
    #[must_use]
    pub fn new(store: RecordStore, assignments: Arc<dyn AssignmentRepository>) -> Self {
        Self { store, assignments }
    }

    /// Store the mastery snapshot of a finished flashcard session.
    ///
    /// Replaces the previous snapshot of the set unless that one is newer.
    /// Folding the same event again leaves the record unchanged.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Validation` if the counts are inconsistent.
    /// Returns `ProgressError::StoreUnavailable` if the store keeps failing.
    pub async fn fold_flashcard_session(
        &self,
        user_id: &UserId,
        event: &FlashcardSessionCompleted,
    ) -> Result<FlashcardMastery, ProgressError> {
        // Reject bad counts before touching the store.
        let snapshot = event.to_mastery()?;
        let folded = ProgressEvent::FlashcardSessionCompleted(event.clone());
        let record = self
            .store
            .update(user_id, |current| {
                Ok(current.unwrap_or_default().fold(&folded)?)
            })
            .await?;
        debug!(user_id = %user_id, set_id = %event.set_id, "flashcard session folded");
        Ok(record.mastery(&event.set_id).cloned().unwrap_or(snapshot))
    }

    /// Append a quiz attempt to the user's log. Duplicates are kept.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::StoreUnavailable` if the store keeps failing.
    pub async fn fold_quiz_attempt(
        &self,
        user_id: &UserId,
        attempt: &QuizAttempt,
    ) -> Result<usize, ProgressError> {
        let folded = ProgressEvent::QuizCompleted(attempt.clone());
        let record = self
            .store
            .update(user_id, |current| {
                Ok(current.unwrap_or_default().fold(&folded)?)
            })
            .await?;
        debug!(user_id = %user_id, quiz_id = %attempt.quiz_id, score = attempt.score.value(), "quiz attempt folded");
        Ok(record.quiz_attempts().len())
    }

    /// # Errors
    ///
    /// Returns `ProgressError::StoreUnavailable` if the store keeps failing.
    pub async fn record(&self, user_id: &UserId) -> Result<UserProgressRecord, ProgressError> {
        self.store.read(user_id).await
    }

    /// Mean quiz score, `0.0` for a user without attempts.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::StoreUnavailable` if the store keeps failing.
    pub async fn average_quiz_score(&self, user_id: &UserId) -> Result<f64, ProgressError> {
        Ok(self.store.read(user_id).await?.average_quiz_score())
    }

    /// Mean per-set mastery as a percentage, `0.0` for a user without sets.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::StoreUnavailable` if the store keeps failing.
    pub async fn flashcard_mastery_percent(&self, user_id: &UserId) -> Result<f64, ProgressError> {
        Ok(self.store.read(user_id).await?.flashcard_mastery_percent())
    }

    /// # Errors
    ///
    /// Returns `ProgressError::StoreUnavailable` if the store keeps failing.
    pub async fn overview(&self, user_id: &UserId) -> Result<ProgressOverview, ProgressError> {
        Ok(self.store.read(user_id).await?.overview())
    }

    /// Attempts of one quiz in the order they were taken.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::StoreUnavailable` if the store keeps failing.
    pub async fn quiz_history(
        &self,
        user_id: &UserId,
        quiz_id: &QuizId,
    ) -> Result<Vec<QuizAttempt>, ProgressError> {
        let record = self.store.read(user_id).await?;
        Ok(record.quiz_history(quiz_id).cloned().collect())
    }

    /// Every user with a stored record, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::StoreUnavailable` if the store keeps failing.
    pub async fn learners(&self) -> Result<Vec<UserId>, ProgressError> {
        self.store.list_users().await
    }

    /// One overview per student currently assigned to `reviewer_id`.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::StoreUnavailable` if the store keeps failing.
    pub async fn students_progress_for(
        &self,
        reviewer_id: &UserId,
    ) -> Result<Vec<StudentProgress>, ProgressError> {
        let students = self
            .store
            .policy()
            .run("students_for", || self.assignments.students_for(reviewer_id))
            .await?;

        let mut rows = Vec::with_capacity(students.len());
        for student_id in students {
            let overview = self.store.read(&student_id).await?.overview();
            rows.push(StudentProgress {
                student_id,
                overview,
            });
        }
        Ok(rows)
    }
}
