#![forbid(unsafe_code)]

pub mod analysis_service;
pub mod app_services;
pub mod assignment_service;
pub mod config;
pub mod error;
pub mod material_service;
pub mod progress_service;
pub mod store;

pub use study_core::Clock;

pub use analysis_service::{AnalysisService, DocumentAnalyzer};
pub use app_services::AppServices;
pub use assignment_service::AssignmentService;
pub use config::EngineConfig;
pub use error::{AnalyzerError, AppServicesError, ConfigError, Missing, ProgressError};
pub use material_service::{MaterialService, PendingMaterial};
pub use progress_service::{ProgressService, StudentProgress};
pub use store::{RecordStore, RetryPolicy};
