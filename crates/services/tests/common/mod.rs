#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use services::{AnalyzerError, DocumentAnalyzer};
use study_core::model::JobStatus;

/// Analyzer double that hands out sequential tickets and reports whatever
/// status a test scripted for them.
#[derive(Default)]
pub struct ScriptedAnalyzer {
    next_ticket: AtomicU32,
    statuses: Mutex<HashMap<String, JobStatus>>,
    polls: AtomicU32,
}

impl ScriptedAnalyzer {
    pub fn report(&self, ticket: &str, status: JobStatus) {
        self.statuses
            .lock()
            .unwrap()
            .insert(ticket.to_owned(), status);
    }

    pub fn polls(&self) -> u32 {
        self.polls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentAnalyzer for ScriptedAnalyzer {
    async fn submit(&self, document: &[u8]) -> Result<String, AnalyzerError> {
        if document.is_empty() {
            return Err(AnalyzerError::Unavailable("empty document".into()));
        }
        let n = self.next_ticket.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("ticket-{n}"))
    }

    async fn poll(&self, ticket: &str) -> Result<JobStatus, AnalyzerError> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .statuses
            .lock()
            .unwrap()
            .get(ticket)
            .cloned()
            .unwrap_or(JobStatus::Queued))
    }
}

pub fn analyzer() -> Arc<ScriptedAnalyzer> {
    Arc::new(ScriptedAnalyzer::default())
}
