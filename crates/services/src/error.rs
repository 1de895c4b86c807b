//! Shared error types for the services crate.

use std::fmt;

use thiserror::Error;

use study_core::model::{
    FoldError, JobError, JobId, MasteryError, MaterialError, MaterialId, ScoreError, UserId,
};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// What a lookup failed to find.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Missing {
    User(UserId),
    Material(MaterialId),
    Job(JobId),
}

impl fmt::Display for Missing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Missing::User(id) => write!(f, "user {id}"),
            Missing::Material(id) => write!(f, "material {id}"),
            Missing::Job(id) => write!(f, "analysis job {id}"),
        }
    }
}

/// Errors emitted by the progress, material, assignment and analysis services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressError {
    /// A material or job state machine rejected the requested move.
    #[error(transparent)]
    InvalidTransition(study_core::Error),

    #[error("{reviewer} is not the assigned reviewer of {student}")]
    NotAuthorized { reviewer: UserId, student: UserId },

    #[error("{0} not found")]
    NotFound(Missing),

    /// The store kept failing (or kept losing the swap race) until the
    /// attempt budget ran out. The caller may retry the whole action.
    #[error("progress store unavailable after {attempts} attempts")]
    StoreUnavailable {
        attempts: u32,
        #[source]
        source: StorageError,
    },

    #[error(transparent)]
    Validation(study_core::Error),

    #[error(transparent)]
    Storage(StorageError),

    #[error(transparent)]
    Analyzer(#[from] AnalyzerError),
}

impl ProgressError {
    /// Whether repeating the same action later may succeed.
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        matches!(self, ProgressError::StoreUnavailable { .. })
    }
}

impl From<study_core::Error> for ProgressError {
    fn from(err: study_core::Error) -> Self {
        use study_core::Error as E;
        match err {
            E::Fold(FoldError::MaterialNotFound(id)) => {
                ProgressError::NotFound(Missing::Material(id))
            }
            E::Material(MaterialError::InvalidTransition { .. })
            | E::Fold(FoldError::Material(MaterialError::InvalidTransition { .. }))
            | E::Job(JobError::InvalidTransition { .. }) => ProgressError::InvalidTransition(err),
            other => ProgressError::Validation(other),
        }
    }
}

macro_rules! from_domain_error {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for ProgressError {
                fn from(err: $ty) -> Self {
                    study_core::Error::from(err).into()
                }
            }
        )*
    };
}

from_domain_error!(FoldError, MaterialError, JobError, ScoreError, MasteryError);

impl From<StorageError> for ProgressError {
    fn from(err: StorageError) -> Self {
        if err.is_transient() {
            ProgressError::StoreUnavailable {
                attempts: 1,
                source: err,
            }
        } else {
            ProgressError::Storage(err)
        }
    }
}

/// Failures reported by the document analysis collaborator.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AnalyzerError {
    #[error("analysis service unavailable: {0}")]
    Unavailable(String),
    #[error("analysis service does not know ticket {0}")]
    UnknownTicket(String),
}

/// Rejected environment configuration.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("{key} must be {expected}, got {raw:?}")]
    Invalid {
        key: &'static str,
        expected: &'static str,
        raw: String,
    },
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_store_unavailable_is_retriable() {
        let unavailable = ProgressError::from(StorageError::Connection("reset".into()));
        assert!(unavailable.is_retriable());
        assert!(!ProgressError::from(StorageError::Serialization("bad".into())).is_retriable());
        assert!(!ProgressError::NotFound(Missing::User(UserId::new("ana"))).is_retriable());
    }

    #[test]
    fn domain_errors_are_classified() {
        let id = MaterialId::generate();
        assert!(matches!(
            ProgressError::from(FoldError::MaterialNotFound(id)),
            ProgressError::NotFound(Missing::Material(found)) if found == id
        ));
        assert!(matches!(
            ProgressError::from(MaterialError::InvalidTransition {
                material_id: id,
                from: study_core::model::MaterialStatus::Approved,
            }),
            ProgressError::InvalidTransition(_)
        ));
        assert!(matches!(
            ProgressError::from(ScoreError::OutOfRange(101)),
            ProgressError::Validation(_)
        ));
    }
}
