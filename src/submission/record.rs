use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::replay::{ContentHash, Nonce};
use crate::attestation::Attestation;
use crate::error::{SubmissionFailure, TrackerError};

/// Status of a ledger submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubmissionStatus {
    /// Sent to the ledger, no answer yet
    Pending,
    /// Anchored, `ledger_tx_id` is set
    Confirmed,
    /// The ledger refused it (duplicate, invalid or unreachable)
    Rejected,
    /// No answer within the ledger timeout, or no readable one
    TimedOut,
}

impl SubmissionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SubmissionStatus::Pending)
    }
}

/// One attempt to anchor an attestation. Leaves PENDING exactly once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionRecord {
    pub id: Uuid,
    pub attestation: Attestation,
    pub nonce: Nonce,
    pub content_hash: ContentHash,
    pub ledger_tx_id: Option<String>,
    pub status: SubmissionStatus,
    pub failure: Option<SubmissionFailure>,
    pub submitted_at: DateTime<Utc>,
    pub settled_at: Option<DateTime<Utc>>,
}

impl SubmissionRecord {
    pub fn pending(attestation: Attestation, nonce: Nonce, content_hash: ContentHash) -> Self {
        Self {
            id: Uuid::new_v4(),
            attestation,
            nonce,
            content_hash,
            ledger_tx_id: None,
            status: SubmissionStatus::Pending,
            failure: None,
            submitted_at: Utc::now(),
            settled_at: None,
        }
    }

    pub fn confirm(&mut self, tx_id: String) -> Result<(), TrackerError> {
        self.ensure_pending()?;
        self.status = SubmissionStatus::Confirmed;
        self.ledger_tx_id = Some(tx_id);
        self.settled_at = Some(Utc::now());
        Ok(())
    }

    /// Timeouts and unknown outcomes become TIMED_OUT, everything else REJECTED
    pub fn fail(&mut self, failure: SubmissionFailure) -> Result<(), TrackerError> {
        self.ensure_pending()?;
        self.status = match failure {
            SubmissionFailure::LedgerTimeout(_) | SubmissionFailure::OutcomeUnknown(_) => {
                SubmissionStatus::TimedOut
            }
            _ => SubmissionStatus::Rejected,
        };
        self.failure = Some(failure);
        self.settled_at = Some(Utc::now());
        Ok(())
    }

    fn ensure_pending(&self) -> Result<(), TrackerError> {
        if self.status.is_terminal() {
            return Err(TrackerError::AlreadySettled(self.id.to_string()));
        }
        Ok(())
    }
}
