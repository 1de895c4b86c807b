use std::fmt;

use chrono::{DateTime, Duration, Utc};
use storage::repository::{ReviewerAssignment, Storage};
use study_core::model::{
    FlashcardSessionCompleted, MaterialId, ProgressEvent, QuizAttempt, QuizId, Score, SetId,
    UploadedMaterial, UserId, UserProgressRecord,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone)]
struct Args {
    db_url: String,
    student: UserId,
    reviewer: UserId,
    quizzes: u32,
    now: Option<DateTime<Utc>>,
}

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidUser { flag: &'static str, raw: String },
    InvalidQuizzes { raw: String },
    InvalidDbUrl { raw: String },
    InvalidNow { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidUser { flag, raw } => write!(f, "invalid {flag} value: {raw:?}"),
            ArgsError::InvalidQuizzes { raw } => write!(f, "invalid --quizzes value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidNow { raw } => {
                write!(f, "invalid --now value (expected RFC3339): {raw}")
            }
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn parse_user(flag: &'static str, raw: String) -> Result<UserId, ArgsError> {
    raw.parse()
        .map_err(|_| ArgsError::InvalidUser { flag, raw })
}

impl Args {
    fn parse() -> Result<Self, ArgsError> {
        let mut db_url =
            std::env::var("STUDY_DB_URL").unwrap_or_else(|_| "sqlite://study.sqlite3".into());
        let mut student = std::env::var("STUDY_STUDENT")
            .ok()
            .and_then(|value| value.parse::<UserId>().ok())
            .unwrap_or_else(|| UserId::new("student-1"));
        let mut reviewer = std::env::var("STUDY_REVIEWER")
            .ok()
            .and_then(|value| value.parse::<UserId>().ok())
            .unwrap_or_else(|| UserId::new("reviewer-1"));
        let mut quizzes = std::env::var("STUDY_QUIZZES")
            .ok()
            .and_then(|value| value.parse::<u32>().ok())
            .unwrap_or(3);
        let mut now: Option<DateTime<Utc>> = None;

        let mut args = std::env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = value;
                }
                "--student" => {
                    let value = require_value(&mut args, "--student")?;
                    student = parse_user("--student", value)?;
                }
                "--reviewer" => {
                    let value = require_value(&mut args, "--reviewer")?;
                    reviewer = parse_user("--reviewer", value)?;
                }
                "--quizzes" => {
                    let value = require_value(&mut args, "--quizzes")?;
                    quizzes = value
                        .parse::<u32>()
                        .map_err(|_| ArgsError::InvalidQuizzes { raw: value.clone() })?;
                }
                "--now" => {
                    let value = require_value(&mut args, "--now")?;
                    let parsed = DateTime::parse_from_rfc3339(&value)
                        .map_err(|_| ArgsError::InvalidNow { raw: value.clone() })?
                        .with_timezone(&Utc);
                    now = Some(parsed);
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            db_url,
            student,
            reviewer,
            quizzes,
            now,
        })
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p storage --bin seed -- [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>         SQLite URL (default: sqlite://study.sqlite3)");
    eprintln!("  --student <id>            Student to seed (default: student-1)");
    eprintln!("  --reviewer <id>           Reviewer assigned to the student (default: reviewer-1)");
    eprintln!("  --quizzes <n>             Number of quiz attempts to append (default: 3)");
    eprintln!("  --now <rfc3339>           Fixed current time for deterministic seeding");
    eprintln!("  -h, --help                Show this help");
    eprintln!();
    eprintln!("Environment (same as flags):");
    eprintln!("  STUDY_DB_URL, STUDY_STUDENT, STUDY_REVIEWER, STUDY_QUIZZES");
}

fn sample_events(
    quizzes: u32,
    now: DateTime<Utc>,
) -> Result<Vec<ProgressEvent>, Box<dyn std::error::Error>> {
    let mut events = Vec::new();
    for i in 0..quizzes {
        let taken_at = now - Duration::days(i64::from(i)) - Duration::minutes(30);
        let score = Score::new(60 + (i * 15) % 41)?;
        events.push(ProgressEvent::QuizCompleted(QuizAttempt::new(
            QuizId::new(format!("quiz-{}", i + 1)),
            score,
            taken_at,
        )));
    }

    for (set, known, total) in [("cell-biology", 6, 10), ("genetics", 3, 4)] {
        events.push(ProgressEvent::FlashcardSessionCompleted(
            FlashcardSessionCompleted {
                set_id: SetId::new(set),
                known_count: known,
                total_cards: total,
                timestamp: now - Duration::hours(2),
            },
        ));
    }

    events.push(ProgressEvent::MaterialSubmitted(UploadedMaterial::submitted(
        MaterialId::generate(),
        "Mitosis summary",
        now - Duration::minutes(10),
    )?));

    Ok(events)
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse().map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let storage = Storage::sqlite(&args.db_url).await?;
    let now = args.now.unwrap_or_else(Utc::now);

    storage
        .assignments
        .assign(&ReviewerAssignment {
            student_id: args.student.clone(),
            reviewer_id: args.reviewer.clone(),
            assigned_at: now,
        })
        .await?;

    let current = storage.progress.load(&args.student).await?;
    let (expected, base) = match current {
        Some(stored) => (Some(stored.version), stored.record),
        None => (None, UserProgressRecord::new()),
    };
    let record = sample_events(args.quizzes, now)?
        .iter()
        .try_fold(base, |record, event| record.fold(event))?;
    let version = storage
        .progress
        .compare_and_swap(&args.student, expected, &record)
        .await?;

    info!(student = %args.student, version, "seeded progress record");
    println!(
        "Seeded {} (reviewer {}) with {} quiz attempts, {} flashcard sets and {} materials into {}",
        args.student,
        args.reviewer,
        record.quiz_attempts().len(),
        record.flashcard_mastery().len(),
        record.uploaded_materials().len(),
        args.db_url
    );

    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "storage=info,seed=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
