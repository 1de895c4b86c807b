use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::model::ids::{JobId, MaterialId, UserId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum JobError {
    #[error("analysis job {job_id} cannot move from {from} to {to}")]
    InvalidTransition {
        job_id: JobId,
        from: JobState,
        to: JobState,
    },
}

//
// ─── STATUS ────────────────────────────────────────────────────────────────────
//

/// A subtopic reported by the document analysis service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subtopic {
    pub subtopic_id: String,
    pub title: String,
}

/// Lifecycle of an analysis job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Processing,
    Done { subtopics: Vec<Subtopic> },
    Failed { reason: String },
}

/// Payload-free discriminant of [`JobStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobState {
    Queued,
    Processing,
    Done,
    Failed,
}

impl JobState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            JobState::Queued => "queued",
            JobState::Processing => "processing",
            JobState::Done => "done",
            JobState::Failed => "failed",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl JobStatus {
    #[must_use]
    pub fn state(&self) -> JobState {
        match self {
            JobStatus::Queued => JobState::Queued,
            JobStatus::Processing => JobState::Processing,
            JobStatus::Done { .. } => JobState::Done,
            JobStatus::Failed { .. } => JobState::Failed,
        }
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Done { .. } | JobStatus::Failed { .. })
    }
}

//
// ─── JOB ───────────────────────────────────────────────────────────────────────
//

/// Tracks one document handed to the analysis service.
///
/// `ticket` is the collaborator's opaque reference used when polling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisJob {
    pub id: JobId,
    pub user_id: UserId,
    pub material_id: MaterialId,
    pub ticket: String,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AnalysisJob {
    #[must_use]
    pub fn queued(
        id: JobId,
        user_id: UserId,
        material_id: MaterialId,
        ticket: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            user_id,
            material_id,
            ticket: ticket.into(),
            status: JobStatus::Queued,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a status reported by the analysis service.
    ///
    /// Returns `Ok(false)` when `next` equals the current status.
    ///
    /// # Errors
    ///
    /// Returns `JobError::InvalidTransition` when leaving a terminal status or
    /// moving from `Processing` back to `Queued`.
    pub fn apply(&mut self, next: JobStatus, at: DateTime<Utc>) -> Result<bool, JobError> {
        if self.status == next {
            return Ok(false);
        }
        let allowed = matches!(
            (self.status.state(), next.state()),
            (JobState::Queued, JobState::Processing | JobState::Done | JobState::Failed)
                | (JobState::Processing, JobState::Done | JobState::Failed)
        );
        if !allowed {
            return Err(JobError::InvalidTransition {
                job_id: self.id,
                from: self.status.state(),
                to: next.state(),
            });
        }
        self.status = next;
        self.updated_at = at;
        Ok(true)
    }

    /// Subtopics of a finished job, if any.
    #[must_use]
    pub fn subtopics(&self) -> Option<&[Subtopic]> {
        match &self.status {
            JobStatus::Done { subtopics } => Some(subtopics),
            _ => None,
        }
    }
}
