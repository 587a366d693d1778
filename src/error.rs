//! Error taxonomy for the trust pipeline
//!
//! Only [`PipelineError`] ever aborts a run. Everything else is recovered
//! locally by the stage that sees it and shows up in the result as degraded
//! data: an unavailable category, a MOCK attestation, or a submission that did
//! not confirm.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fatal errors. A run that hits one of these ends in the `Failed` stage.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PipelineError {
    /// The request itself is unusable (bad subject id, repo ref, blob ids...)
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// The weighting policy does not sum to exactly 1.0
    #[error("invalid weights: {0}")]
    InvalidWeights(String),

    /// The caller cancelled the run before submission started
    #[error("analysis cancelled during {stage}")]
    Cancelled { stage: String },
}

impl From<ScoringError> for PipelineError {
    fn from(err: ScoringError) -> Self {
        match err {
            ScoringError::InvalidWeights(msg) => PipelineError::InvalidWeights(msg),
            ScoringError::DuplicateCategory(category) => PipelineError::MalformedInput(format!(
                "more than one signal reported for category {}",
                category
            )),
        }
    }
}

/// Errors raised by the composite scorer
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ScoringError {
    #[error("{0}")]
    InvalidWeights(String),

    #[error("duplicate signal for category {0}")]
    DuplicateCategory(String),
}

/// Why a collector could not produce a signal
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CollectorError {
    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("collector unavailable: {0}")]
    Unavailable(String),

    #[error("collector timed out after {0} ms")]
    Timeout(u64),
}

/// Blob store failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BlobStoreError {
    #[error("blob not found: {0}")]
    NotFound(String),

    #[error("blob rejected: {0}")]
    Rejected(String),

    #[error("blob store unavailable: {0}")]
    Unavailable(String),
}

/// Signer failures. Always recovered by falling back to a MOCK attestation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SignerError {
    #[error("signer unavailable: {0}")]
    Unavailable(String),

    #[error("signer timed out after {0} ms")]
    Timeout(u64),

    #[error("signer returned an invalid signature: {0}")]
    InvalidSignature(String),
}

/// What the ledger collaborator can answer besides a transaction id
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LedgerError {
    /// The content hash was already anchored
    #[error("duplicate content hash")]
    DuplicateContentHash,

    #[error("ledger rejected submission: {0}")]
    Rejected(String),

    /// Nothing reached the ledger
    #[error("ledger unavailable: {0}")]
    Unavailable(String),

    /// The request may have landed but no usable answer came back
    #[error("ledger outcome unknown: {0}")]
    OutcomeUnknown(String),
}

/// Reason a submission did not confirm. Surfaced to the caller, never retried
/// automatically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum SubmissionFailure {
    /// The ledger already holds this content hash. Expected when a caller
    /// retries after a success whose confirmation was lost.
    #[error("duplicate submission")]
    DuplicateSubmission,

    /// No confirmation within the ledger timeout. Retry with a fresh nonce.
    #[error("ledger timed out after {0} ms")]
    LedgerTimeout(u64),

    #[error("ledger rejected submission: {0}")]
    LedgerRejected(String),

    #[error("ledger unavailable: {0}")]
    LedgerUnavailable(String),

    /// The ledger may hold the submission. Retrying risks anchoring it twice.
    #[error("ledger outcome unknown: {0}")]
    OutcomeUnknown(String),
}

impl SubmissionFailure {
    /// Whether the caller may retry (always with a fresh nonce)
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SubmissionFailure::LedgerTimeout(_) | SubmissionFailure::LedgerUnavailable(_)
        )
    }
}

/// Illegal submission record transitions
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TrackerError {
    #[error("no submission with id {0}")]
    UnknownSubmission(String),

    #[error("submission {0} already settled")]
    AlreadySettled(String),
}

/// Key-value store failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<LedgerError> for SubmissionFailure {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::DuplicateContentHash => SubmissionFailure::DuplicateSubmission,
            LedgerError::Rejected(reason) => SubmissionFailure::LedgerRejected(reason),
            LedgerError::Unavailable(reason) => SubmissionFailure::LedgerUnavailable(reason),
            LedgerError::OutcomeUnknown(reason) => SubmissionFailure::OutcomeUnknown(reason),
        }
    }
}
