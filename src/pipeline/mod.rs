//! Pipeline Orchestrator
//!
//! ```text
//! Claim ──validate──► COLLECTING ──► SCORING ──► ATTESTING ──► SUBMITTING ──► DONE
//!            │        (concurrent,    (pure)     (SIGNED or     (per-subject
//!            │         bounded)                    MOCK)          serialized)
//!            └── malformed input / bad weights ──────────────────────────► FAILED
//! ```
//!
//! Upstream unavailability never fails a run; it shows up as degraded
//! categories, a MOCK attestation or an unconfirmed submission.

pub mod orchestrator;
pub mod validation;
pub mod wiring;

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::attestation::{Attestation, SigningMode};
use crate::error::SubmissionFailure;
use crate::scoring::{CompositeScore, RiskReport, RiskTier};
use crate::signals::{SignalCategory, SignalResult};
use crate::submission::{ContentHash, Nonce, SubmissionRecord, SubmissionStatus};

pub use orchestrator::{DEFAULT_COLLECTION_TIMEOUT, TrustPipeline};
pub use validation::validate_claim;
pub use wiring::{OracleServices, build_services};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineStage {
    Collecting,
    Scoring,
    Attesting,
    Submitting,
    Done,
    Failed,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Collecting => "COLLECTING",
            PipelineStage::Scoring => "SCORING",
            PipelineStage::Attesting => "ATTESTING",
            PipelineStage::Submitting => "SUBMITTING",
            PipelineStage::Done => "DONE",
            PipelineStage::Failed => "FAILED",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happened to the ledger submission of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmissionOutcome {
    pub status: SubmissionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ledger_tx_id: Option<String>,
    /// Set whenever `ledger_tx_id` is not
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<SubmissionFailure>,
    pub retryable: bool,
    pub nonce: Nonce,
    pub content_hash: ContentHash,
}

impl From<&SubmissionRecord> for SubmissionOutcome {
    fn from(record: &SubmissionRecord) -> Self {
        Self {
            status: record.status,
            ledger_tx_id: record.ledger_tx_id.clone(),
            failure: record.failure.clone(),
            retryable: record
                .failure
                .as_ref()
                .is_some_and(SubmissionFailure::is_retryable),
            nonce: record.nonce,
            content_hash: record.content_hash,
        }
    }
}

/// Externally visible result of one run
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResult {
    pub subject_id: String,
    pub score: u8,
    pub risk_tier: RiskTier,
    pub breakdown: BTreeMap<SignalCategory, u8>,
    /// Categories scored as 0 because their source was unavailable
    pub degraded_categories: Vec<SignalCategory>,
    pub signing_mode: SigningMode,
    /// Only a SIGNED attestation verified under the trusted key is authoritative
    pub authoritative: bool,
    pub issued_at_ms: i64,
    pub submission: SubmissionOutcome,
    pub report: RiskReport,
    pub signals: Vec<SignalResult>,
    pub attestation: Attestation,
    pub stages: Vec<PipelineStage>,
}

impl AnalysisResult {
    pub(crate) fn assemble(
        composite: &CompositeScore,
        signals: Vec<SignalResult>,
        attestation: Attestation,
        authoritative: bool,
        record: &SubmissionRecord,
        stages: Vec<PipelineStage>,
    ) -> Self {
        Self {
            subject_id: attestation.subject_id.clone(),
            score: composite.value(),
            risk_tier: composite.risk_tier(),
            breakdown: composite.breakdown().clone(),
            degraded_categories: composite.degraded().to_vec(),
            signing_mode: attestation.signing_mode(),
            authoritative,
            issued_at_ms: attestation.issued_at_ms,
            submission: SubmissionOutcome::from(record),
            report: RiskReport::build(composite, &signals),
            signals,
            attestation,
            stages,
        }
    }

    pub fn ledger_tx_id(&self) -> Option<&str> {
        self.submission.ledger_tx_id.as_deref()
    }

    /// Reason the submission did not confirm, if it did not
    pub fn failure_reason(&self) -> Option<String> {
        self.submission.failure.as_ref().map(ToString::to_string)
    }
}
