use std::sync::Arc;

use storage::repository::Storage;

use crate::analysis_service::{AnalysisService, DocumentAnalyzer};
use crate::assignment_service::AssignmentService;
use crate::config::EngineConfig;
use crate::error::AppServicesError;
use crate::material_service::MaterialService;
use crate::progress_service::ProgressService;
use crate::store::{RecordStore, RetryPolicy};
use crate::Clock;

/// Assembles the app-facing services over one storage backend.
#[derive(Clone)]
pub struct AppServices {
    progress: Arc<ProgressService>,
    materials: Arc<MaterialService>,
    assignments: Arc<AssignmentService>,
    analysis: Arc<AnalysisService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage at `config.database_url`.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(
        config: &EngineConfig,
        clock: Clock,
        analyzer: Arc<dyn DocumentAnalyzer>,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(&config.database_url).await?;
        Ok(Self::with_storage(
            &storage,
            RetryPolicy::from(config),
            clock,
            analyzer,
        ))
    }

    /// Build `SQLite`-backed services from `STUDY_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError::Config` for unusable variables and
    /// `AppServicesError::Sqlite` if storage initialization fails.
    pub async fn from_env(
        clock: Clock,
        analyzer: Arc<dyn DocumentAnalyzer>,
    ) -> Result<Self, AppServicesError> {
        let config = EngineConfig::from_env()?;
        Self::new_sqlite(&config, clock, analyzer).await
    }

    /// Build services over in-memory storage.
    #[must_use]
    pub fn in_memory(clock: Clock, analyzer: Arc<dyn DocumentAnalyzer>) -> Self {
        Self::with_storage(&Storage::in_memory(), RetryPolicy::default(), clock, analyzer)
    }

    #[must_use]
    pub fn with_storage(
        storage: &Storage,
        policy: RetryPolicy,
        clock: Clock,
        analyzer: Arc<dyn DocumentAnalyzer>,
    ) -> Self {
        let store = RecordStore::new(Arc::clone(&storage.progress), policy);

        let progress = Arc::new(ProgressService::new(
            store.clone(),
            Arc::clone(&storage.assignments),
        ));
        let materials = Arc::new(MaterialService::new(
            clock,
            store.clone(),
            Arc::clone(&storage.assignments),
        ));
        let assignments = Arc::new(AssignmentService::new(
            clock,
            Arc::clone(&storage.assignments),
            policy,
        ));
        let analysis = Arc::new(AnalysisService::new(
            clock,
            store,
            Arc::clone(&storage.analysis_jobs),
            analyzer,
        ));

        Self {
            progress,
            materials,
            assignments,
            analysis,
        }
    }

    #[must_use]
    pub fn progress(&self) -> Arc<ProgressService> {
        Arc::clone(&self.progress)
    }

    #[must_use]
    pub fn materials(&self) -> Arc<MaterialService> {
        Arc::clone(&self.materials)
    }

    #[must_use]
    pub fn assignments(&self) -> Arc<AssignmentService> {
        Arc::clone(&self.assignments)
    }

    #[must_use]
    pub fn analysis(&self) -> Arc<AnalysisService> {
        Arc::clone(&self.analysis)
    }
}
