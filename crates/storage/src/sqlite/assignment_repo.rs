use sqlx::Row;
use study_core::model::UserId;

use super::SqliteRepository;
use super::mapping::{db_err, ser};
use crate::repository::{AssignmentRepository, ReviewerAssignment, StorageError};

#[async_trait::async_trait]
impl AssignmentRepository for SqliteRepository {
    async fn assign(&self, assignment: &ReviewerAssignment) -> Result<(), StorageError> {
        sqlx::query(
            r"
                INSERT INTO reviewer_assignments (student_id, reviewer_id, assigned_at)
                VALUES (?1, ?2, ?3)
                ON CONFLICT(student_id) DO UPDATE SET
                    reviewer_id = excluded.reviewer_id,
                    assigned_at = excluded.assigned_at
            ",
        )
        .bind(assignment.student_id.as_str())
        .bind(assignment.reviewer_id.as_str())
        .bind(assignment.assigned_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }

    async fn reviewer_for(&self, student_id: &UserId) -> Result<Option<UserId>, StorageError> {
        let row = sqlx::query("SELECT reviewer_id FROM reviewer_assignments WHERE student_id = ?1")
            .bind(student_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        row.map(|r| r.try_get::<String, _>("reviewer_id").map(UserId::new))
            .transpose()
            .map_err(ser)
    }

    async fn students_for(&self, reviewer_id: &UserId) -> Result<Vec<UserId>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT student_id
                FROM reviewer_assignments
                WHERE reviewer_id = ?1
                ORDER BY student_id ASC
            ",
        )
        .bind(reviewer_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter()
            .map(|row| {
                row.try_get::<String, _>("student_id")
                    .map(UserId::new)
                    .map_err(ser)
            })
            .collect()
    }
}
