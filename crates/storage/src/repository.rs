use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use study_core::model::{AnalysisJob, JobId, MaterialId, UserId, UserProgressRecord};
use thiserror::Error;
use tracing::debug;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl StorageError {
    /// Whether retrying the same call may succeed without any other change.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, StorageError::Connection(_))
    }
}

//
// ─── PROGRESS RECORDS ──────────────────────────────────────────────────────────
//

/// A stored progress document together with its optimistic-concurrency version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionedRecord {
    pub version: u64,
    pub record: UserProgressRecord,
}

/// Per-user progress documents with compare-and-swap writes.
///
/// Writers load a record, fold an event into a copy and swap it in. A swap
/// against a stale version fails with `StorageError::Conflict` and leaves
/// the stored document untouched.
#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// Fetch the current record and version for a user.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    async fn load(&self, user_id: &UserId) -> Result<Option<VersionedRecord>, StorageError>;

    /// Replace the record if its version still equals `expected`.
    ///
    /// `expected == None` inserts a record for a user that has none yet.
    /// Returns the new version.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the stored version differs.
    async fn compare_and_swap(
        &self,
        user_id: &UserId,
        expected: Option<u64>,
        record: &UserProgressRecord,
    ) -> Result<u64, StorageError>;

    /// All users with a stored record, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    async fn list_users(&self) -> Result<Vec<UserId>, StorageError>;
}

//
// ─── REVIEWER ASSIGNMENTS ──────────────────────────────────────────────────────
//

/// Current reviewer of a student. A student has at most one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewerAssignment {
    pub student_id: UserId,
    pub reviewer_id: UserId,
    pub assigned_at: DateTime<Utc>,
}

#[async_trait]
pub trait AssignmentRepository: Send + Sync {
    /// Set the reviewer of a student, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the assignment cannot be stored.
    async fn assign(&self, assignment: &ReviewerAssignment) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    async fn reviewer_for(&self, student_id: &UserId) -> Result<Option<UserId>, StorageError>;

    /// Students currently assigned to `reviewer_id`, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    async fn students_for(&self, reviewer_id: &UserId) -> Result<Vec<UserId>, StorageError>;
}

//
// ─── ANALYSIS JOBS ─────────────────────────────────────────────────────────────
//

#[async_trait]
pub trait AnalysisJobRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if a job with the same id exists.
    async fn insert_job(&self, job: &AnalysisJob) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the job does not exist.
    async fn update_job(&self, job: &AnalysisJob) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    async fn get_job(&self, id: JobId) -> Result<Option<AnalysisJob>, StorageError>;

    /// Jobs started for a material, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    async fn jobs_for_material(
        &self,
        material_id: MaterialId,
    ) -> Result<Vec<AnalysisJob>, StorageError>;
}

//
// ─── IN-MEMORY ADAPTER ─────────────────────────────────────────────────────────
//

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    records: Arc<Mutex<HashMap<UserId, VersionedRecord>>>,
    assignments: Arc<Mutex<HashMap<UserId, ReviewerAssignment>>>,
    jobs: Arc<Mutex<HashMap<JobId, AnalysisJob>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

#[async_trait]
impl ProgressRepository for InMemoryRepository {
    async fn load(&self, user_id: &UserId) -> Result<Option<VersionedRecord>, StorageError> {
        let guard = self.records.lock().map_err(poisoned)?;
        Ok(guard.get(user_id).cloned())
    }

    async fn compare_and_swap(
        &self,
        user_id: &UserId,
        expected: Option<u64>,
        record: &UserProgressRecord,
    ) -> Result<u64, StorageError> {
        let mut guard = self.records.lock().map_err(poisoned)?;
        let current = guard.get(user_id).map(|v| v.version);
        if current != expected {
            debug!(user_id = %user_id, ?expected, ?current, "progress record version mismatch");
            return Err(StorageError::Conflict);
        }
        let version = expected.map_or(1, |v| v + 1);
        guard.insert(
            user_id.clone(),
            VersionedRecord {
                version,
                record: record.clone(),
            },
        );
        Ok(version)
    }

    async fn list_users(&self) -> Result<Vec<UserId>, StorageError> {
        let guard = self.records.lock().map_err(poisoned)?;
        let mut users: Vec<UserId> = guard.keys().cloned().collect();
        users.sort();
        Ok(users)
    }
}

#[async_trait]
impl AssignmentRepository for InMemoryRepository {
    async fn assign(&self, assignment: &ReviewerAssignment) -> Result<(), StorageError> {
        let mut guard = self.assignments.lock().map_err(poisoned)?;
        guard.insert(assignment.student_id.clone(), assignment.clone());
        Ok(())
    }

    async fn reviewer_for(&self, student_id: &UserId) -> Result<Option<UserId>, StorageError> {
        let guard = self.assignments.lock().map_err(poisoned)?;
        Ok(guard.get(student_id).map(|a| a.reviewer_id.clone()))
    }

    async fn students_for(&self, reviewer_id: &UserId) -> Result<Vec<UserId>, StorageError> {
        let guard = self.assignments.lock().map_err(poisoned)?;
        let mut students: Vec<UserId> = guard
            .values()
            .filter(|a| &a.reviewer_id == reviewer_id)
            .map(|a| a.student_id.clone())
            .collect();
        students.sort();
        Ok(students)
    }
}

#[async_trait]
impl AnalysisJobRepository for InMemoryRepository {
    async fn insert_job(&self, job: &AnalysisJob) -> Result<(), StorageError> {
        let mut guard = self.jobs.lock().map_err(poisoned)?;
        if guard.contains_key(&job.id) {
            return Err(StorageError::Conflict);
        }
        guard.insert(job.id, job.clone());
        Ok(())
    }

    async fn update_job(&self, job: &AnalysisJob) -> Result<(), StorageError> {
        let mut guard = self.jobs.lock().map_err(poisoned)?;
        let slot = guard.get_mut(&job.id).ok_or(StorageError::NotFound)?;
        *slot = job.clone();
        Ok(())
    }

    async fn get_job(&self, id: JobId) -> Result<Option<AnalysisJob>, StorageError> {
        let guard = self.jobs.lock().map_err(poisoned)?;
        Ok(guard.get(&id).cloned())
    }

    async fn jobs_for_material(
        &self,
        material_id: MaterialId,
    ) -> Result<Vec<AnalysisJob>, StorageError> {
        let guard = self.jobs.lock().map_err(poisoned)?;
        let mut jobs: Vec<AnalysisJob> = guard
            .values()
            .filter(|j| j.material_id == material_id)
            .cloned()
            .collect();
        jobs.sort_by_key(|j| j.created_at);
        Ok(jobs)
    }
}

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub progress: Arc<dyn ProgressRepository>,
    pub assignments: Arc<dyn AssignmentRepository>,
    pub analysis_jobs: Arc<dyn AnalysisJobRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let progress: Arc<dyn ProgressRepository> = Arc::new(repo.clone());
        let assignments: Arc<dyn AssignmentRepository> = Arc::new(repo.clone());
        let analysis_jobs: Arc<dyn AnalysisJobRepository> = Arc::new(repo);
        Self {
            progress,
            assignments,
            analysis_jobs,
        }
    }
}
