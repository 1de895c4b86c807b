use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use storage::repository::AnalysisJobRepository;
use study_core::model::{AnalysisJob, JobId, JobStatus, MaterialId, UserId};
use study_core::time::Clock;

use crate::error::{AnalyzerError, Missing, ProgressError};
use crate::store::RecordStore;

/// External document analysis service.
///
/// Documents are submitted once and polled by ticket until a terminal status
/// comes back. Stopping the polling is the only form of cancellation.
#[async_trait]
pub trait DocumentAnalyzer: Send + Sync {
    /// Hand over a document and return the ticket to poll with.
    ///
    /// # Errors
    ///
    /// Returns `AnalyzerError` if the service rejects or cannot take the document.
    async fn submit(&self, document: &[u8]) -> Result<String, AnalyzerError>;

    /// Current status of a submitted document.
    ///
    /// # Errors
    ///
    /// Returns `AnalyzerError` if the service cannot be reached or the ticket is unknown.
    async fn poll(&self, ticket: &str) -> Result<JobStatus, AnalyzerError>;
}

/// Tracks analysis jobs of uploaded materials.
#[derive(Clone)]
pub struct AnalysisService {
    clock: Clock,
    store: RecordStore,
    jobs: Arc<dyn AnalysisJobRepository>,
    analyzer: Arc<dyn DocumentAnalyzer>,
}

impl AnalysisService {
    #[must_use]
    pub fn new(
        clock: Clock,
        store: RecordStore,
        jobs: Arc<dyn AnalysisJobRepository>,
        analyzer: Arc<dyn DocumentAnalyzer>,
    ) -> Self {
        Self {
            clock,
            store,
            jobs,
            analyzer,
        }
    }

    /// Submit the document of one of the user's materials and store a queued job.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::NotFound` if the user has no such material.
    /// Returns `ProgressError::Analyzer` if the analysis service refuses the document.
    pub async fn enqueue(
        &self,
        user_id: &UserId,
        material_id: MaterialId,
        document: &[u8],
    ) -> Result<AnalysisJob, ProgressError> {
        let record = self.store.read(user_id).await?;
        if record.material(material_id).is_none() {
            return Err(ProgressError::NotFound(Missing::Material(material_id)));
        }

        let ticket = self.analyzer.submit(document).await?;
        let job = AnalysisJob::queued(
            JobId::generate(),
            user_id.clone(),
            material_id,
            ticket,
            self.clock.now(),
        );
        self.store
            .policy()
            .run("insert_job", || self.jobs.insert_job(&job))
            .await?;
        debug!(job_id = %job.id, material_id = %material_id, "analysis job queued");
        Ok(job)
    }

    /// Poll the analysis service and apply whatever it reports.
    ///
    /// Finished jobs are returned without polling.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::NotFound` for an unknown job,
    /// `ProgressError::Analyzer` if polling fails and
    /// `ProgressError::InvalidTransition` for a status the job cannot take.
    pub async fn refresh(&self, job_id: JobId) -> Result<AnalysisJob, ProgressError> {
        let job = self.load(job_id).await?;
        if job.status.is_terminal() {
            return Ok(job);
        }
        let status = self.analyzer.poll(&job.ticket).await?;
        self.transition(job, status).await
    }

    /// Apply a status pushed by the analysis service.
    ///
    /// A status equal to the current one changes nothing.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::NotFound` for an unknown job and
    /// `ProgressError::InvalidTransition` for a status the job cannot take.
    pub async fn apply_update(
        &self,
        job_id: JobId,
        status: JobStatus,
    ) -> Result<AnalysisJob, ProgressError> {
        let job = self.load(job_id).await?;
        self.transition(job, status).await
    }

    /// # Errors
    ///
    /// Returns `ProgressError::StoreUnavailable` if the store keeps failing.
    pub async fn job(&self, job_id: JobId) -> Result<Option<AnalysisJob>, ProgressError> {
        self.store
            .policy()
            .run("get_job", || self.jobs.get_job(job_id))
            .await
    }

    /// Jobs of a material, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::StoreUnavailable` if the store keeps failing.
    pub async fn jobs_for_material(
        &self,
        material_id: MaterialId,
    ) -> Result<Vec<AnalysisJob>, ProgressError> {
        self.store
            .policy()
            .run("jobs_for_material", || self.jobs.jobs_for_material(material_id))
            .await
    }

    async fn load(&self, job_id: JobId) -> Result<AnalysisJob, ProgressError> {
        self.job(job_id)
            .await?
            .ok_or(ProgressError::NotFound(Missing::Job(job_id)))
    }

    async fn transition(
        &self,
        mut job: AnalysisJob,
        status: JobStatus,
    ) -> Result<AnalysisJob, ProgressError> {
        if !job.apply(status, self.clock.now())? {
            return Ok(job);
        }
        self.store
            .policy()
            .run("update_job", || self.jobs.update_job(&job))
            .await?;
        if job.status.is_terminal() {
            info!(job_id = %job.id, state = %job.status.state(), "analysis job finished");
        } else {
            debug!(job_id = %job.id, state = %job.status.state(), "analysis job updated");
        }
        Ok(job)
    }
}
