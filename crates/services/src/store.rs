//! Retrying access to the record store.
//!
//! Every progress mutation runs as load, fold on a copy, compare-and-swap.
//! A lost swap re-runs the fold against the fresh record; a transient store
//! failure backs off exponentially with jitter before trying again.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use rand::Rng;
use tokio::time::sleep;
use tracing::{debug, warn};

use storage::repository::{ProgressRepository, StorageError};
use study_core::model::{UserId, UserProgressRecord};

use crate::config::EngineConfig;
use crate::error::ProgressError;

/// Attempt budget for store calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_base: Duration,
    pub max_cas_conflicts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&EngineConfig::default())
    }
}

impl From<&EngineConfig> for RetryPolicy {
    fn from(config: &EngineConfig) -> Self {
        Self {
            max_attempts: config.store_max_attempts.max(1),
            backoff_base: config.store_backoff_base,
            max_cas_conflicts: config.max_cas_conflicts,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based): `base * 2^(attempt-1)`
    /// plus up to half of `base` of random jitter.
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = self
            .backoff_base
            .saturating_mul(2_u32.saturating_pow(attempt.saturating_sub(1)));
        let base_ms = u64::try_from(self.backoff_base.as_millis()).unwrap_or(u64::MAX);
        let jitter_ms = if base_ms < 2 {
            0
        } else {
            rand::rng().random_range(0..=base_ms / 2)
        };
        exp.saturating_add(Duration::from_millis(jitter_ms))
    }

    /// Run `call`, retrying transient failures until the budget is spent.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::StoreUnavailable` once every attempt failed
    /// transiently, or `ProgressError::Storage` for any other store error.
    pub async fn run<T, F, Fut>(&self, op: &'static str, mut call: F) -> Result<T, ProgressError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StorageError>>,
    {
        let mut attempt = 1;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() => {
                    if attempt >= self.max_attempts {
                        warn!(op, attempt, error = %err, "store unavailable, giving up");
                        return Err(ProgressError::StoreUnavailable {
                            attempts: attempt,
                            source: err,
                        });
                    }
                    let delay = self.backoff(attempt);
                    warn!(
                        op,
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %err,
                        "store call failed, retrying"
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(ProgressError::Storage(err)),
            }
        }
    }
}

/// Progress records behind optimistic concurrency and retries.
#[derive(Clone)]
pub struct RecordStore {
    records: Arc<dyn ProgressRepository>,
    policy: RetryPolicy,
}

impl RecordStore {
    #[must_use]
    pub fn new(records: Arc<dyn ProgressRepository>, policy: RetryPolicy) -> Self {
        Self { records, policy }
    }

    #[must_use]
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Current record of a user, `None` if nothing was ever stored.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::StoreUnavailable` or `ProgressError::Storage`.
    pub async fn find(&self, user_id: &UserId) -> Result<Option<UserProgressRecord>, ProgressError> {
        let stored = self
            .policy
            .run("load", || self.records.load(user_id))
            .await?;
        Ok(stored.map(|v| v.record))
    }

    /// # Errors
    ///
    /// Returns `ProgressError::StoreUnavailable` or `ProgressError::Storage`.
    pub async fn list_users(&self) -> Result<Vec<UserId>, ProgressError> {
        self.policy
            .run("list_users", || self.records.list_users())
            .await
    }

    /// Current record of a user; a user without a record reads as empty.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::StoreUnavailable` or `ProgressError::Storage`.
    pub async fn read(&self, user_id: &UserId) -> Result<UserProgressRecord, ProgressError> {
        Ok(self.find(user_id).await?.unwrap_or_default())
    }

    /// Atomically replace a user's record with `apply(current)`.
    ///
    /// `apply` receives a copy of the latest record (or `None` when the user
    /// has none yet) and may run more than once if another writer wins the
    /// swap. Its error aborts the update and leaves the store untouched.
    ///
    /// A swap that commits but whose reply is lost is recognised on the
    /// follow-up conflict and not folded a second time.
    ///
    /// # Errors
    ///
    /// Returns the error of `apply`, `ProgressError::StoreUnavailable` when
    /// the retry or conflict budget is exhausted, or `ProgressError::Storage`.
    pub async fn update<F>(
        &self,
        user_id: &UserId,
        mut apply: F,
    ) -> Result<UserProgressRecord, ProgressError>
    where
        F: FnMut(Option<UserProgressRecord>) -> Result<UserProgressRecord, ProgressError>,
    {
        let mut conflicts = 0;
        loop {
            let current = self
                .policy
                .run("load", || self.records.load(user_id))
                .await?;
            let (expected, base) = match current {
                Some(stored) => (Some(stored.version), Some(stored.record)),
                None => (None, None),
            };
            let next = apply(base)?;

            // A swap that failed transiently may still have committed.
            let unacknowledged = AtomicBool::new(false);
            let swapped = self
                .policy
                .run("compare_and_swap", || {
                    let swap = self.records.compare_and_swap(user_id, expected, &next);
                    let unacknowledged = &unacknowledged;
                    async move {
                        let res = swap.await;
                        if res.as_ref().is_err_and(StorageError::is_transient) {
                            unacknowledged.store(true, Ordering::Relaxed);
                        }
                        res
                    }
                })
                .await;
            let swapped = match swapped {
                Err(ProgressError::Storage(StorageError::Conflict))
                    if unacknowledged.load(Ordering::Relaxed) =>
                {
                    self.recover_lost_ack(user_id, expected, &next)
                        .await?
                        .ok_or(ProgressError::Storage(StorageError::Conflict))
                }
                other => other,
            };
            match swapped {
                Ok(version) => {
                    debug!(user_id = %user_id, version, "progress record updated");
                    return Ok(next);
                }
                Err(ProgressError::Storage(StorageError::Conflict)) => {
                    conflicts += 1;
                    if conflicts > self.policy.max_cas_conflicts {
                        warn!(user_id = %user_id, conflicts, "giving up after repeated swap conflicts");
                        return Err(ProgressError::StoreUnavailable {
                            attempts: conflicts,
                            source: StorageError::Conflict,
                        });
                    }
                    warn!(user_id = %user_id, conflicts, "progress record changed concurrently, refolding");
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Version of the swap that wrote `next` over `expected`, if the store
    /// shows it committed even though the reply was lost.
    async fn recover_lost_ack(
        &self,
        user_id: &UserId,
        expected: Option<u64>,
        next: &UserProgressRecord,
    ) -> Result<Option<u64>, ProgressError> {
        let committed = expected.map_or(1, |v| v + 1);
        let stored = self
            .policy
            .run("load", || self.records.load(user_id))
            .await?;
        Ok(stored
            .filter(|s| s.version == committed && &s.record == next)
            .map(|s| {
                debug!(user_id = %user_id, version = s.version, "lost swap acknowledgement resolved as committed");
                s.version
            }))
    }
}
