//! Submission Coordinator
//!
//! ```text
//! nonce + content_hash -> PENDING -> ledger.submit (bounded)
//!                                      ├── tx id              -> CONFIRMED
//!                                      ├── duplicate hash     -> REJECTED (DuplicateSubmission)
//!                                      ├── other rejection    -> REJECTED
//!                                      ├── unreachable        -> REJECTED (retryable)
//!                                      ├── outcome unknown    -> TIMED_OUT (not retryable)
//!                                      └── no answer in time  -> TIMED_OUT
//! ```
//!
//! Nothing is retried here. At most one ledger call per subject is in flight;
//! the call runs on a detached task that owns the subject lock, so a caller
//! that stops waiting still leaves a settled record behind.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{error, info, warn};
use uuid::Uuid;

use super::record::SubmissionRecord;
use super::replay::{ContentHash, Nonce, NonceGenerator};
use super::tracker::{SubmissionTracker, TrackerStats};
use crate::attestation::Attestation;
use crate::error::{LedgerError, SubmissionFailure};
use crate::ledger::{LedgerClient, LedgerPayload, LedgerReceipt};

pub const DEFAULT_LEDGER_TIMEOUT: Duration = Duration::from_secs(30);

/// Claim fields bound into the content hash besides the subject
#[derive(Debug, Clone, Copy, Default)]
pub struct ReplayScope<'a> {
    pub repo_ref: Option<&'a str>,
    pub event_name: Option<&'a str>,
}

type LedgerOutcome = Result<Result<LedgerReceipt, LedgerError>, tokio::time::error::Elapsed>;

#[derive(Clone)]
pub struct SubmissionCoordinator {
    ledger: Arc<dyn LedgerClient>,
    tracker: Arc<RwLock<SubmissionTracker>>,
    subject_locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
    nonces: Arc<NonceGenerator>,
    timeout: Duration,
}

impl SubmissionCoordinator {
    pub fn new(ledger: Arc<dyn LedgerClient>, timeout: Duration) -> Self {
        Self {
            ledger,
            tracker: Arc::new(RwLock::new(SubmissionTracker::new())),
            subject_locks: Arc::new(DashMap::new()),
            nonces: Arc::new(NonceGenerator::new()),
            timeout,
        }
    }

    /// Submit with a freshly generated nonce
    pub async fn submit(&self, attestation: Attestation, scope: ReplayScope<'_>) -> SubmissionRecord {
        let nonce = self.nonces.next();
        self.submit_with_nonce(attestation, scope, nonce).await
    }

    /// Submit with a caller-chosen nonce. Reusing the nonce of an anchored
    /// submission yields the same content hash and a `DuplicateSubmission`.
    pub async fn submit_with_nonce(
        &self,
        attestation: Attestation,
        scope: ReplayScope<'_>,
        nonce: Nonce,
    ) -> SubmissionRecord {
        let subject_id = attestation.subject_id.clone();
        let content_hash =
            ContentHash::compute(&subject_id, scope.repo_ref, scope.event_name, nonce);

        let body = match serde_json::to_vec(&attestation) {
            Ok(body) => body,
            Err(e) => {
                error!(subject_id = %subject_id, error = %e, "Could not encode attestation");
                let record = SubmissionRecord::pending(attestation, nonce, content_hash);
                let id = self.tracker.write().await.record_pending(record.clone());
                let outcome = Ok(Err(LedgerError::Rejected(format!(
                    "unencodable payload: {}",
                    e
                ))));
                return self.settle(id, outcome, record).await;
            }
        };

        let payload = LedgerPayload {
            subject_id: subject_id.clone(),
            nonce,
            content_hash,
            body,
        };
        let record = SubmissionRecord::pending(attestation, nonce, content_hash);
        let snapshot = record.clone();
        let id = self.tracker.write().await.record_pending(record);

        info!(
            subject_id = %subject_id,
            nonce = %nonce,
            content_hash = %content_hash,
            "Submission pending"
        );

        let lock = self
            .subject_locks
            .entry(subject_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let coordinator = self.clone();
        let fallback = snapshot.clone();

        let task = tokio::spawn(async move {
            let guard = lock.lock_owned().await;
            let outcome =
                tokio::time::timeout(coordinator.timeout, coordinator.ledger.submit(&payload))
                    .await;
            let settled = coordinator.settle(id, outcome, fallback).await;
            drop(guard);
            coordinator.release_lock(&payload.subject_id);
            settled
        });

        match task.await {
            Ok(record) => record,
            Err(join_error) => {
                error!(subject_id = %subject_id, error = %join_error, "Ledger task failed");
                let outcome = Ok(Err(LedgerError::OutcomeUnknown(format!(
                    "ledger task failed: {}",
                    join_error
                ))));
                self.settle(id, outcome, snapshot).await
            }
        }
    }

    async fn settle(
        &self,
        id: Uuid,
        outcome: LedgerOutcome,
        fallback: SubmissionRecord,
    ) -> SubmissionRecord {
        let mut tracker = self.tracker.write().await;
        let settled = match outcome {
            Ok(Ok(receipt)) => tracker.confirm(&id, receipt.tx_id),
            Ok(Err(e)) => tracker.fail(&id, SubmissionFailure::from(e)),
            Err(_) => tracker.fail(
                &id,
                SubmissionFailure::LedgerTimeout(self.timeout.as_millis() as u64),
            ),
        };

        match settled {
            Ok(record) => {
                match (&record.ledger_tx_id, &record.failure) {
                    (Some(tx_id), _) => info!(
                        subject_id = %record.attestation.subject_id,
                        tx_id = %tx_id,
                        "Submission confirmed"
                    ),
                    (None, Some(failure)) => warn!(
                        subject_id = %record.attestation.subject_id,
                        status = ?record.status,
                        failure = %failure,
                        "Submission did not confirm"
                    ),
                    (None, None) => {}
                }
                record
            }
            Err(e) => {
                warn!(submission = %id, error = %e, "Could not settle submission");
                tracker.get(&id).cloned().unwrap_or(fallback)
            }
        }
    }

    /// Drop the subject's lock entry once nobody else holds it
    fn release_lock(&self, subject_id: &str) {
        self.subject_locks
            .remove_if(subject_id, |_, lock| Arc::strong_count(lock) == 1);
    }

    pub fn tracker(&self) -> Arc<RwLock<SubmissionTracker>> {
        self.tracker.clone()
    }

    pub async fn stats(&self) -> TrackerStats {
        self.tracker.read().await.stats()
    }

    /// Attempts for a subject made by this process, oldest first
    pub async fn history(&self, subject_id: &str) -> Vec<SubmissionRecord> {
        self.tracker
            .read()
            .await
            .for_subject(subject_id)
            .into_iter()
            .cloned()
            .collect()
    }

    pub async fn latest_confirmed(&self, subject_id: &str) -> Option<SubmissionRecord> {
        self.tracker.read().await.latest_confirmed(subject_id).cloned()
    }

    /// Forget settled records older than `retention`
    pub async fn prune_settled(&self, retention: Duration) -> usize {
        let max_age = chrono::Duration::from_std(retention).unwrap_or(chrono::Duration::MAX);
        self.tracker.write().await.cleanup_old_records(max_age)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}
