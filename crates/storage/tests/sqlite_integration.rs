use chrono::Duration;
use storage::repository::{
    AnalysisJobRepository, AssignmentRepository, ProgressRepository, ReviewerAssignment,
    StorageError,
};
use storage::sqlite::SqliteRepository;
use study_core::model::{
    AnalysisJob, FlashcardSessionCompleted, JobId, JobStatus, MaterialId, ProgressEvent,
    QuizAttempt, QuizId, ReviewDecision, Score, SetId, Subtopic, UploadedMaterial, UserId,
    UserProgressRecord,
};
use study_core::time::fixed_now;

async fn repo(name: &str) -> SqliteRepository {
    let url = format!("sqlite:file:{name}?mode=memory&cache=shared");
    let repo = SqliteRepository::connect(&url).await.expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

fn sample_record() -> UserProgressRecord {
    let material =
        UploadedMaterial::submitted(MaterialId::generate(), "Photosynthesis", fixed_now()).unwrap();
    let id = material.material_id;
    [
        ProgressEvent::QuizCompleted(QuizAttempt::new(
            QuizId::new("q1"),
            Score::new(80).unwrap(),
            fixed_now(),
        )),
        ProgressEvent::FlashcardSessionCompleted(FlashcardSessionCompleted {
            set_id: SetId::new("bio"),
            known_count: 2,
            total_cards: 4,
            timestamp: fixed_now() + Duration::minutes(5),
        }),
        ProgressEvent::MaterialSubmitted(material),
        ProgressEvent::MaterialReviewed {
            material_id: id,
            decision: ReviewDecision::Approve,
            feedback: Some("clear".into()),
        },
    ]
    .iter()
    .try_fold(UserProgressRecord::new(), |record, event| record.fold(event))
    .unwrap()
}

#[tokio::test]
async fn progress_record_round_trips_through_sqlite() {
    let repo = repo("memdb_progress_roundtrip").await;
    let user = UserId::new("ana");
    assert!(repo.load(&user).await.unwrap().is_none());

    let record = sample_record();
    let version = repo.compare_and_swap(&user, None, &record).await.unwrap();
    assert_eq!(version, 1);

    let stored = repo.load(&user).await.unwrap().expect("stored record");
    assert_eq!(stored.version, 1);
    assert_eq!(stored.record, record);
    assert!((stored.record.flashcard_mastery_percent() - 50.0).abs() < f64::EPSILON);
    assert_eq!(repo.list_users().await.unwrap(), vec![user]);
}

#[tokio::test]
async fn stale_swap_is_rejected_and_leaves_document_untouched() {
    let repo = repo("memdb_progress_cas").await;
    let user = UserId::new("ana");
    let first = sample_record();
    repo.compare_and_swap(&user, None, &first).await.unwrap();

    let err = repo
        .compare_and_swap(&user, None, &UserProgressRecord::new())
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Conflict));

    let v2 = repo
        .compare_and_swap(&user, Some(1), &UserProgressRecord::new())
        .await
        .unwrap();
    assert_eq!(v2, 2);

    let err = repo
        .compare_and_swap(&user, Some(1), &first)
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Conflict));

    let stored = repo.load(&user).await.unwrap().unwrap();
    assert_eq!(stored.version, 2);
    assert_eq!(stored.record, UserProgressRecord::new());
}

#[tokio::test]
async fn reassigning_a_student_moves_them_between_reviewers() {
    let repo = repo("memdb_assignments").await;
    let student = UserId::new("student");
    let a = UserId::new("docente-a");
    let b = UserId::new("docente-b");

    for (reviewer, minutes) in [(&a, 0), (&b, 1)] {
        repo.assign(&ReviewerAssignment {
            student_id: student.clone(),
            reviewer_id: reviewer.clone(),
            assigned_at: fixed_now() + Duration::minutes(minutes),
        })
        .await
        .unwrap();
    }

    assert_eq!(repo.reviewer_for(&student).await.unwrap(), Some(b.clone()));
    assert!(repo.students_for(&a).await.unwrap().is_empty());
    assert_eq!(repo.students_for(&b).await.unwrap(), vec![student]);
    assert!(
        repo.reviewer_for(&UserId::new("nobody"))
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn analysis_jobs_persist_status_payloads() {
    let repo = repo("memdb_jobs").await;
    let material_id = MaterialId::generate();
    let mut job = AnalysisJob::queued(
        JobId::generate(),
        UserId::new("ana"),
        material_id,
        "ticket-7",
        fixed_now(),
    );
    repo.insert_job(&job).await.unwrap();
    assert!(matches!(
        repo.insert_job(&job).await.unwrap_err(),
        StorageError::Conflict
    ));

    job.apply(
        JobStatus::Done {
            subtopics: vec![Subtopic {
                subtopic_id: "light".into(),
                title: "Light reactions".into(),
            }],
        },
        fixed_now() + Duration::minutes(3),
    )
    .unwrap();
    repo.update_job(&job).await.unwrap();

    let fetched = repo.get_job(job.id).await.unwrap().expect("job");
    assert_eq!(fetched, job);
    assert_eq!(fetched.subtopics().map(<[Subtopic]>::len), Some(1));
    assert_eq!(repo.jobs_for_material(material_id).await.unwrap(), vec![job]);

    let missing = AnalysisJob::queued(
        JobId::generate(),
        UserId::new("ana"),
        material_id,
        "ticket-8",
        fixed_now(),
    );
    assert!(matches!(
        repo.update_job(&missing).await.unwrap_err(),
        StorageError::NotFound
    ));
}
