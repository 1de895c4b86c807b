use thiserror::Error;

use crate::model::{FoldError, JobError, MasteryError, MaterialError, ScoreError};
use crate::session::{QuizSessionError, ReviewSessionError};

/// Any domain rule violation raised by this crate.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Score(#[from] ScoreError),
    #[error(transparent)]
    Mastery(#[from] MasteryError),
    #[error(transparent)]
    Material(#[from] MaterialError),
    #[error(transparent)]
    Job(#[from] JobError),
    #[error(transparent)]
    Fold(#[from] FoldError),
    #[error(transparent)]
    ReviewSession(#[from] ReviewSessionError),
    #[error(transparent)]
    QuizSession(#[from] QuizSessionError),
}
