use std::sync::Arc;

use tracing::info;

use storage::repository::{AssignmentRepository, ReviewerAssignment};
use study_core::model::UserId;
use study_core::time::Clock;

use crate::error::ProgressError;
use crate::store::RetryPolicy;

/// Student to reviewer mapping. A student has at most one reviewer.
#[derive(Clone)]
pub struct AssignmentService {
    clock: Clock,
    assignments: Arc<dyn AssignmentRepository>,
    policy: RetryPolicy,
}

impl AssignmentService {
    #[must_use]
    pub fn new(clock: Clock, assignments: Arc<dyn AssignmentRepository>, policy: RetryPolicy) -> Self {
        Self {
            clock,
            assignments,
            policy,
        }
    }

    /// Make `reviewer_id` the reviewer of `student_id`, replacing any previous one.
    ///
    /// Whether `reviewer_id` may review at all is decided by the caller.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::StoreUnavailable` if the store keeps failing.
    pub async fn assign(&self, student_id: &UserId, reviewer_id: &UserId) -> Result<(), ProgressError> {
        let assignment = ReviewerAssignment {
            student_id: student_id.clone(),
            reviewer_id: reviewer_id.clone(),
            assigned_at: self.clock.now(),
        };
        self.policy
            .run("assign", || self.assignments.assign(&assignment))
            .await?;
        info!(student_id = %student_id, reviewer_id = %reviewer_id, "reviewer assigned");
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `ProgressError::StoreUnavailable` if the store keeps failing.
    pub async fn reviewer_for(&self, student_id: &UserId) -> Result<Option<UserId>, ProgressError> {
        self.policy
            .run("reviewer_for", || self.assignments.reviewer_for(student_id))
            .await
    }

    /// Students assigned to `reviewer_id`, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::StoreUnavailable` if the store keeps failing.
    pub async fn students_for(&self, reviewer_id: &UserId) -> Result<Vec<UserId>, ProgressError> {
        self.policy
            .run("students_for", || self.assignments.students_for(reviewer_id))
            .await
    }
}
