use chrono::Utc;
use sqlx::Row;
use study_core::model::{UserId, UserProgressRecord};
use tracing::debug;

use super::SqliteRepository;
use super::mapping::{db_err, decode_record, encode_record, ser, version_from_i64, version_to_i64};
use crate::repository::{ProgressRepository, StorageError, VersionedRecord};

#[async_trait::async_trait]
impl ProgressRepository for SqliteRepository {
    async fn load(&self, user_id: &UserId) -> Result<Option<VersionedRecord>, StorageError> {
        let row = sqlx::query(
            r"
                SELECT version, document
                FROM progress_records
                WHERE user_id = ?1
            ",
        )
        .bind(user_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let version = version_from_i64(row.try_get::<i64, _>("version").map_err(ser)?)?;
        let record = decode_record(&row.try_get::<String, _>("document").map_err(ser)?)?;
        Ok(Some(VersionedRecord { version, record }))
    }

    async fn compare_and_swap(
        &self,
        user_id: &UserId,
        expected: Option<u64>,
        record: &UserProgressRecord,
    ) -> Result<u64, StorageError> {
        let document = encode_record(record)?;
        let now = Utc::now();

        let (res, next) = match expected {
            None => {
                let res = sqlx::query(
                    r"
                        INSERT INTO progress_records (user_id, version, document, updated_at)
                        VALUES (?1, 1, ?2, ?3)
                        ON CONFLICT(user_id) DO NOTHING
                    ",
                )
                .bind(user_id.as_str())
                .bind(document)
                .bind(now)
                .execute(&self.pool)
                .await
                .map_err(db_err)?;
                (res, 1)
            }
            Some(version) => {
                let res = sqlx::query(
                    r"
                        UPDATE progress_records
                        SET version = version + 1, document = ?2, updated_at = ?3
                        WHERE user_id = ?1 AND version = ?4
                    ",
                )
                .bind(user_id.as_str())
                .bind(document)
                .bind(now)
                .bind(version_to_i64(version)?)
                .execute(&self.pool)
                .await
                .map_err(db_err)?;
                (res, version + 1)
            }
        };

        if res.rows_affected() == 0 {
            debug!(user_id = %user_id, ?expected, "progress record swap lost the race");
            return Err(StorageError::Conflict);
        }
        Ok(next)
    }

    async fn list_users(&self) -> Result<Vec<UserId>, StorageError> {
        let rows = sqlx::query("SELECT user_id FROM progress_records ORDER BY user_id ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        rows.iter()
            .map(|row| {
                row.try_get::<String, _>("user_id")
                    .map(UserId::new)
                    .map_err(ser)
            })
            .collect()
    }
}
