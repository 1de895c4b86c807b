use study_core::model::{AnalysisJob, JobId, MaterialId};

use super::SqliteRepository;
use super::mapping::{db_err, map_job_row, ser};
use crate::repository::{AnalysisJobRepository, StorageError};

#[async_trait::async_trait]
impl AnalysisJobRepository for SqliteRepository {
    async fn insert_job(&self, job: &AnalysisJob) -> Result<(), StorageError> {
        let status = serde_json::to_string(&job.status).map_err(ser)?;

        let res = sqlx::query(
            r"
                INSERT INTO analysis_jobs (
                    id, user_id, material_id, ticket, state, status, created_at, updated_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                ON CONFLICT(id) DO NOTHING
            ",
        )
        .bind(job.id.to_string())
        .bind(job.user_id.as_str())
        .bind(job.material_id.to_string())
        .bind(job.ticket.as_str())
        .bind(job.status.state().as_str())
        .bind(status)
        .bind(job.created_at)
        .bind(job.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::Conflict);
        }
        Ok(())
    }

    async fn update_job(&self, job: &AnalysisJob) -> Result<(), StorageError> {
        let status = serde_json::to_string(&job.status).map_err(ser)?;

        let res = sqlx::query(
            r"
                UPDATE analysis_jobs
                SET state = ?2, status = ?3, updated_at = ?4
                WHERE id = ?1
            ",
        )
        .bind(job.id.to_string())
        .bind(job.status.state().as_str())
        .bind(status)
        .bind(job.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn get_job(&self, id: JobId) -> Result<Option<AnalysisJob>, StorageError> {
        let row = sqlx::query(
            r"
                SELECT id, user_id, material_id, ticket, status, created_at, updated_at
                FROM analysis_jobs
                WHERE id = ?1
            ",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.as_ref().map(map_job_row).transpose()
    }

    async fn jobs_for_material(
        &self,
        material_id: MaterialId,
    ) -> Result<Vec<AnalysisJob>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT id, user_id, material_id, ticket, status, created_at, updated_at
                FROM analysis_jobs
                WHERE material_id = ?1
                ORDER BY created_at ASC
            ",
        )
        .bind(material_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter().map(map_job_row).collect()
    }
}
