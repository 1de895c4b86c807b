use sqlx::Row;
use study_core::model::{AnalysisJob, JobId, JobStatus, MaterialId, UserId, UserProgressRecord};

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

/// Classify a driver error. Only failures that may clear up on their own
/// (I/O, pool exhaustion, a busy or locked database) are transient.
pub(crate) fn db_err(e: sqlx::Error) -> StorageError {
    if is_transient(&e) {
        StorageError::Connection(e.to_string())
    } else {
        StorageError::Database(e.to_string())
    }
}

fn is_transient(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Io(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => true,
        // Extended result codes keep the primary code in the low byte.
        sqlx::Error::Database(db) => db
            .code()
            .and_then(|code| code.parse::<i32>().ok())
            .is_some_and(|code| matches!(code & 0xff, SQLITE_BUSY | SQLITE_LOCKED)),
        _ => false,
    }
}

const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;

pub(crate) fn version_to_i64(v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization("version overflow".into()))
}

pub(crate) fn version_from_i64(v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid version: {v}")))
}

pub(crate) fn encode_record(record: &UserProgressRecord) -> Result<String, StorageError> {
    serde_json::to_string(record).map_err(ser)
}

pub(crate) fn decode_record(document: &str) -> Result<UserProgressRecord, StorageError> {
    serde_json::from_str(document).map_err(ser)
}

pub(crate) fn map_job_row(row: &sqlx::sqlite::SqliteRow) -> Result<AnalysisJob, StorageError> {
    let id: JobId = row.try_get::<String, _>("id").map_err(ser)?.parse().map_err(ser)?;
    let material_id: MaterialId = row
        .try_get::<String, _>("material_id")
        .map_err(ser)?
        .parse()
        .map_err(ser)?;
    let user_id = UserId::new(row.try_get::<String, _>("user_id").map_err(ser)?);
    let status: JobStatus =
        serde_json::from_str(&row.try_get::<String, _>("status").map_err(ser)?).map_err(ser)?;

    Ok(AnalysisJob {
        id,
        user_id,
        material_id,
        ticket: row.try_get("ticket").map_err(ser)?,
        status,
        created_at: row.try_get("created_at").map_err(ser)?,
        updated_at: row.try_get("updated_at").map_err(ser)?,
    })
}
