mod flashcards;
mod quiz;

pub use flashcards::{CardMark, ReviewSession, ReviewSessionError, SessionProgress, SessionState};
pub use quiz::{QuizQuestion, QuizSession, QuizSessionError};
