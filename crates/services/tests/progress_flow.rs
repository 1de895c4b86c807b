use std::sync::Arc;

use chrono::Duration;
use services::{AppServices, Clock, ProgressService, RecordStore, RetryPolicy};
use storage::repository::InMemoryRepository;
use study_core::model::{
    CardId, FlashcardSessionCompleted, QuestionId, QuizAttempt, QuizId, Score, SetId, UserId,
};
use study_core::session::{QuizQuestion, QuizSession, ReviewSession};
use study_core::time::fixed_now;

mod common;

fn progress_service(repo: &InMemoryRepository) -> ProgressService {
    let store = RecordStore::new(Arc::new(repo.clone()), RetryPolicy::default());
    ProgressService::new(store, Arc::new(repo.clone()))
}

fn attempt(quiz: &str, score: u32, minutes: i64) -> QuizAttempt {
    QuizAttempt::new(
        QuizId::new(quiz),
        Score::new(score).unwrap(),
        fixed_now() + Duration::minutes(minutes),
    )
}

#[tokio::test]
async fn four_card_session_with_two_known_is_half_mastered() {
    let repo = InMemoryRepository::new();
    let progress = progress_service(&repo);
    let user = UserId::new("ana");
    let set = SetId::new("cells");

    let cards: Vec<CardId> = (1..=4).map(CardId::new).collect();
    let mut session = ReviewSession::new(set.clone(), cards, fixed_now()).unwrap();
    let mut completed = None;
    for id in 1..=4 {
        session.flip();
        let card = CardId::new(id);
        completed = if id % 2 == 1 {
            session.mark_known(card, fixed_now())
        } else {
            session.mark_review(card, fixed_now())
        };
    }
    let event = completed.expect("last mark completes the session");
    assert_eq!(session.known_percent(), 50);

    let mastery = progress.fold_flashcard_session(&user, &event).await.unwrap();
    assert_eq!(mastery.known_count(), 2);
    assert_eq!(mastery.total_cards(), 4);
    let percent = progress.flashcard_mastery_percent(&user).await.unwrap();
    assert!((percent - 50.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn folding_the_same_session_twice_changes_nothing() {
    let repo = InMemoryRepository::new();
    let progress = progress_service(&repo);
    let user = UserId::new("ana");
    let event = FlashcardSessionCompleted {
        set_id: SetId::new("cells"),
        known_count: 3,
        total_cards: 5,
        timestamp: fixed_now(),
    };

    progress.fold_flashcard_session(&user, &event).await.unwrap();
    let first = progress.record(&user).await.unwrap();
    progress.fold_flashcard_session(&user, &event).await.unwrap();
    let second = progress.record(&user).await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn inconsistent_session_counts_never_reach_the_store() {
    let repo = InMemoryRepository::new();
    let progress = progress_service(&repo);
    let user = UserId::new("ana");
    let event = FlashcardSessionCompleted {
        set_id: SetId::new("cells"),
        known_count: 6,
        total_cards: 5,
        timestamp: fixed_now(),
    };

    let err = progress.fold_flashcard_session(&user, &event).await.unwrap_err();
    assert!(matches!(err, services::ProgressError::Validation(_)));
    assert!(progress.record(&user).await.unwrap().flashcard_mastery().is_empty());
}

#[tokio::test]
async fn average_of_three_attempts_is_recomputed_on_read() {
    let repo = InMemoryRepository::new();
    let progress = progress_service(&repo);
    let user = UserId::new("ana");

    for (i, score) in [80, 90, 70].into_iter().enumerate() {
        let count = progress
            .fold_quiz_attempt(&user, &attempt("q1", score, i64::try_from(i).unwrap()))
            .await
            .unwrap();
        assert_eq!(count, i + 1);
    }

    let average = progress.average_quiz_score(&user).await.unwrap();
    assert!((average - 80.0).abs() < f64::EPSILON);
    let overview = progress.overview(&user).await.unwrap();
    assert_eq!(overview.quizzes_completed, 3);
    assert!((overview.average_quiz_score - average).abs() < f64::EPSILON);

    let history = progress.quiz_history(&user, &QuizId::new("q1")).await.unwrap();
    let scores: Vec<u32> = history.iter().map(|a| a.score.value()).collect();
    assert_eq!(scores, vec![80, 90, 70]);
}

#[tokio::test]
async fn unknown_user_reads_as_empty() {
    let repo = InMemoryRepository::new();
    let progress = progress_service(&repo);
    let nobody = UserId::new("nobody");

    assert_eq!(progress.average_quiz_score(&nobody).await.unwrap(), 0.0);
    assert_eq!(progress.flashcard_mastery_percent(&nobody).await.unwrap(), 0.0);
    assert!(progress.overview(&nobody).await.unwrap().last_activity.is_none());
}

#[tokio::test]
async fn finished_quiz_session_is_logged() {
    let services = AppServices::in_memory(Clock::fixed(fixed_now()), common::analyzer());
    let user = UserId::new("ana");

    let questions = (0..5)
        .map(|i| QuizQuestion::new(QuestionId::new(i), 3, 0).unwrap())
        .collect();
    let mut quiz = QuizSession::new(QuizId::new("genetics"), questions).unwrap();
    for _ in 0..4 {
        quiz.select(0).unwrap();
        quiz.next();
    }
    quiz.select(2).unwrap();
    let attempt = quiz.finish(fixed_now()).unwrap();
    assert_eq!(attempt.score.value(), 80);

    services
        .progress()
        .fold_quiz_attempt(&user, &attempt)
        .await
        .unwrap();
    let overview = services.progress().overview(&user).await.unwrap();
    assert_eq!(overview.quizzes_completed, 1);
    assert_eq!(overview.last_activity, Some(fixed_now()));
}

#[tokio::test]
async fn reviewer_dashboard_lists_assigned_students_only() {
    let services = AppServices::in_memory(Clock::fixed(fixed_now()), common::analyzer());
    let reviewer = UserId::new("docente");

    for (student, score) in [("bea", 60), ("ana", 90)] {
        let student = UserId::new(student);
        services.assignments().assign(&student, &reviewer).await.unwrap();
        services
            .progress()
            .fold_quiz_attempt(&student, &attempt("q1", score, 0))
            .await
            .unwrap();
    }
    services
        .progress()
        .fold_quiz_attempt(&UserId::new("carl"), &attempt("q1", 10, 0))
        .await
        .unwrap();

    let rows = services
        .progress()
        .students_progress_for(&reviewer)
        .await
        .unwrap();
    let ids: Vec<&str> = rows.iter().map(|r| r.student_id.as_str()).collect();
    assert_eq!(ids, vec!["ana", "bea"]);
    assert!((rows[0].overview.average_quiz_score - 90.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn learners_lists_everyone_with_a_record() {
    let repo = InMemoryRepository::new();
    let progress = progress_service(&repo);
    assert!(progress.learners().await.unwrap().is_empty());

    for user in ["carl", "ana"] {
        progress
            .fold_quiz_attempt(&UserId::new(user), &attempt("q1", 50, 0))
            .await
            .unwrap();
    }
    assert_eq!(
        progress.learners().await.unwrap(),
        vec![UserId::new("ana"), UserId::new("carl")]
    );
}
