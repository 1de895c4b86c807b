use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::{QuestionId, QuizAttempt, QuizId, Score};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuizSessionError {
    #[error("quiz has no questions")]
    Empty,

    #[error("question {question} must offer at least one option and a valid correct option")]
    InvalidQuestion { question: QuestionId },

    #[error("option {option} is out of range for a question with {count} options")]
    OptionOutOfRange { option: usize, count: usize },

    #[error("quiz already finished")]
    Finished,
}

/// Answer key for one multiple-choice question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizQuestion {
    id: QuestionId,
    option_count: usize,
    correct_option: usize,
}

impl QuizQuestion {
    /// # Errors
    ///
    /// Returns `QuizSessionError::InvalidQuestion` if there are no options or
    /// `correct_option` is not one of them.
    pub fn new(
        id: QuestionId,
        option_count: usize,
        correct_option: usize,
    ) -> Result<Self, QuizSessionError> {
        if option_count == 0 || correct_option >= option_count {
            return Err(QuizSessionError::InvalidQuestion { question: id });
        }
        Ok(Self {
            id,
            option_count,
            correct_option,
        })
    }

    #[must_use]
    pub fn id(&self) -> QuestionId {
        self.id
    }

    #[must_use]
    pub fn option_count(&self) -> usize {
        self.option_count
    }
}

/// One pass through a quiz.
///
/// Answers are kept per question, so stepping back shows the earlier choice.
/// Unanswered questions count as wrong when the quiz is finished.
#[derive(Debug, Clone)]
pub struct QuizSession {
    quiz_id: QuizId,
    questions: Vec<QuizQuestion>,
    answers: Vec<Option<usize>>,
    cursor: usize,
    attempt: Option<QuizAttempt>,
}

impl QuizSession {
    /// # Errors
    ///
    /// Returns `QuizSessionError::Empty` if `questions` is empty.
    pub fn new(quiz_id: QuizId, questions: Vec<QuizQuestion>) -> Result<Self, QuizSessionError> {
        if questions.is_empty() {
            return Err(QuizSessionError::Empty);
        }
        let answers = vec![None; questions.len()];
        Ok(Self {
            quiz_id,
            questions,
            answers,
            cursor: 0,
            attempt: None,
        })
    }

    #[must_use]
    pub fn quiz_id(&self) -> &QuizId {
        &self.quiz_id
    }

    #[must_use]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    #[must_use]
    pub fn total_questions(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn current_question(&self) -> &QuizQuestion {
        &self.questions[self.cursor]
    }

    #[must_use]
    pub fn selected(&self) -> Option<usize> {
        self.answers[self.cursor]
    }

    #[must_use]
    pub fn answered_count(&self) -> usize {
        self.answers.iter().filter(|a| a.is_some()).count()
    }

    #[must_use]
    pub fn correct_count(&self) -> usize {
        self.questions
            .iter()
            .zip(&self.answers)
            .filter(|(q, a)| **a == Some(q.correct_option))
            .count()
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.attempt.is_some()
    }

    #[must_use]
    pub fn attempt(&self) -> Option<&QuizAttempt> {
        self.attempt.as_ref()
    }

    /// Choose an option for the current question, replacing any earlier choice.
    ///
    /// # Errors
    ///
    /// Returns `QuizSessionError::Finished` after `finish`.
    /// Returns `QuizSessionError::OptionOutOfRange` for an option the question lacks.
    pub fn select(&mut self, option: usize) -> Result<(), QuizSessionError> {
        if self.is_finished() {
            return Err(QuizSessionError::Finished);
        }
        let count = self.current_question().option_count;
        if option >= count {
            return Err(QuizSessionError::OptionOutOfRange { option, count });
        }
        self.answers[self.cursor] = Some(option);
        Ok(())
    }

    /// Go to the next question. Returns `false` on the last question.
    pub fn next(&mut self) -> bool {
        if self.is_finished() || self.cursor + 1 >= self.questions.len() {
            return false;
        }
        self.cursor += 1;
        true
    }

    /// Go to the previous question. Returns `false` on the first question.
    pub fn previous(&mut self) -> bool {
        if self.is_finished() || self.cursor == 0 {
            return false;
        }
        self.cursor -= 1;
        true
    }

    /// Score the quiz and produce the attempt to record.
    ///
    /// # Errors
    ///
    /// Returns `QuizSessionError::Finished` if the quiz was already scored.
    pub fn finish(&mut self, now: DateTime<Utc>) -> Result<QuizAttempt, QuizSessionError> {
        if self.is_finished() {
            return Err(QuizSessionError::Finished);
        }
        let score = Score::from_correct(self.correct_count(), self.questions.len());
        let attempt = QuizAttempt::new(self.quiz_id.clone(), score, now);
        self.attempt = Some(attempt.clone());
        Ok(attempt)
    }
}
