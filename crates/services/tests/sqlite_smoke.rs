use services::{AppServices, Clock, EngineConfig};
use study_core::model::{
    FlashcardSessionCompleted, MaterialStatus, QuizAttempt, QuizId, ReviewDecision, Score, SetId,
    UserId,
};
use study_core::time::fixed_now;

mod common;

#[tokio::test]
async fn full_workflow_persists_through_sqlite() {
    let config = EngineConfig {
        database_url: "sqlite:file:memdb_services_smoke?mode=memory&cache=shared".into(),
        ..EngineConfig::default()
    };
    let services = AppServices::new_sqlite(&config, Clock::fixed(fixed_now()), common::analyzer())
        .await
        .expect("sqlite services");

    let student = UserId::new("ana");
    let reviewer = UserId::new("docente");
    services.assignments().assign(&student, &reviewer).await.unwrap();

    services
        .progress()
        .fold_quiz_attempt(
            &student,
            &QuizAttempt::new(QuizId::new("q1"), Score::new(75).unwrap(), fixed_now()),
        )
        .await
        .unwrap();
    services
        .progress()
        .fold_flashcard_session(
            &student,
            &FlashcardSessionCompleted {
                set_id: SetId::new("cells"),
                known_count: 1,
                total_cards: 4,
                timestamp: fixed_now(),
            },
        )
        .await
        .unwrap();
    let material_id = services
        .materials()
        .submit_material(&student, "Lab report")
        .await
        .unwrap();
    services
        .materials()
        .review_material(
            &reviewer,
            &student,
            material_id,
            ReviewDecision::Reject,
            Some("Missing conclusions".into()),
        )
        .await
        .unwrap();

    let overview = services.progress().overview(&student).await.unwrap();
    assert_eq!(overview.quizzes_completed, 1);
    assert!((overview.average_quiz_score - 75.0).abs() < f64::EPSILON);
    assert!((overview.flashcard_mastery_percent - 25.0).abs() < f64::EPSILON);
    assert_eq!(overview.materials_rejected, 1);

    let materials = services.materials().materials_for(&student).await.unwrap();
    assert_eq!(materials[0].status, MaterialStatus::Rejected);
    assert_eq!(materials[0].feedback.as_deref(), Some("Missing conclusions"));
}
