use std::sync::Arc;

use tracing::{debug, info};

use storage::repository::AssignmentRepository;
use study_core::model::{
    MaterialId, ProgressEvent, ReviewDecision, UploadedMaterial, UserId,
};
use study_core::time::Clock;

use crate::error::{Missing, ProgressError};
use crate::store::RecordStore;

/// A pending material together with the student who uploaded it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingMaterial {
    pub student_id: UserId,
    pub material: UploadedMaterial,
}

/// Upload and review workflow of study materials.
#[derive(Clone)]
pub struct MaterialService {
    clock: Clock,
    store: RecordStore,
    assignments: Arc<dyn AssignmentRepository>,
}

impl MaterialService {
    #[must_use]
    pub fn new(clock: Clock, store: RecordStore, assignments: Arc<dyn AssignmentRepository>) -> Self {
        Self {
            clock,
            store,
            assignments,
        }
    }

    /// Record a new pending material for `user_id` and return its fresh id.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Validation` if the title is blank.
    /// Returns `ProgressError::StoreUnavailable` if the store keeps failing.
    pub async fn submit_material(
        &self,
        user_id: &UserId,
        title: &str,
    ) -> Result<MaterialId, ProgressError> {
        let material = UploadedMaterial::submitted(MaterialId::generate(), title, self.clock.now())?;
        let material_id = material.material_id;
        let event = ProgressEvent::MaterialSubmitted(material);

        self.store
            .update(user_id, |current| {
                Ok(current.unwrap_or_default().fold(&event)?)
            })
            .await?;
        debug!(user_id = %user_id, material_id = %material_id, "material submitted");
        Ok(material_id)
    }

    /// Approve or reject a pending material on behalf of the student's reviewer.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::NotAuthorized` unless `reviewer_id` is the
    /// reviewer currently assigned to `user_id`.
    /// Returns `ProgressError::NotFound` if the user has no record or the
    /// material does not exist.
    /// Returns `ProgressError::InvalidTransition` if the material was already
    /// reviewed.
    pub async fn review_material(
        &self,
        reviewer_id: &UserId,
        user_id: &UserId,
        material_id: MaterialId,
        decision: ReviewDecision,
        feedback: Option<String>,
    ) -> Result<UploadedMaterial, ProgressError> {
        let assigned = self
            .store
            .policy()
            .run("reviewer_for", || self.assignments.reviewer_for(user_id))
            .await?;
        if assigned.as_ref() != Some(reviewer_id) {
            return Err(ProgressError::NotAuthorized {
                reviewer: reviewer_id.clone(),
                student: user_id.clone(),
            });
        }

        let event = ProgressEvent::MaterialReviewed {
            material_id,
            decision,
            feedback,
        };
        let record = self
            .store
            .update(user_id, |current| {
                let record = current.ok_or_else(|| ProgressError::NotFound(Missing::User(user_id.clone())))?;
                Ok(record.fold(&event)?)
            })
            .await?;

        let material = record
            .material(material_id)
            .cloned()
            .ok_or(ProgressError::NotFound(Missing::Material(material_id)))?;
        info!(
            reviewer_id = %reviewer_id,
            user_id = %user_id,
            material_id = %material_id,
            status = %material.status,
            "material reviewed"
        );
        Ok(material)
    }

    /// Pending materials of every student assigned to `reviewer_id`, oldest
    /// upload first.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::StoreUnavailable` if the store keeps failing.
    pub async fn pending_materials_for(
        &self,
        reviewer_id: &UserId,
    ) -> Result<Vec<PendingMaterial>, ProgressError> {
        let students = self
            .store
            .policy()
            .run("students_for", || self.assignments.students_for(reviewer_id))
            .await?;

        let mut pending = Vec::new();
        for student_id in students {
            let record = self.store.read(&student_id).await?;
            pending.extend(record.pending_materials().map(|material| PendingMaterial {
                student_id: student_id.clone(),
                material: material.clone(),
            }));
        }
        // Stable sort keeps upload order within a student on equal timestamps.
        pending.sort_by_key(|p| p.material.uploaded_at);
        Ok(pending)
    }

    /// Everything a learner uploaded, in upload order.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::StoreUnavailable` if the store keeps failing.
    pub async fn materials_for(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<UploadedMaterial>, ProgressError> {
        Ok(self.store.read(user_id).await?.uploaded_materials().to_vec())
    }
}
