mod analysis;
mod flashcard;
mod ids;
mod material;
mod progress;
mod quiz;

pub use ids::{CardId, JobId, MaterialId, ParseIdError, QuestionId, QuizId, SetId, UserId};

pub use analysis::{AnalysisJob, JobError, JobState, JobStatus, Subtopic};
pub use flashcard::{FlashcardMastery, FlashcardSessionCompleted, MasteryError};
pub use material::{MaterialError, MaterialStatus, ReviewDecision, UploadedMaterial};
pub use progress::{FoldError, ProgressEvent, ProgressOverview, UserProgressRecord};
pub use quiz::{Performance, QuizAttempt, Score, ScoreError};
