//! Signal Collectors
//!
//! One adapter per category, each turning an external source into a bounded
//! sub-score plus evidence:
//!
//! ```text
//! signals/
//! ├── repo.rs     - repository activity (ownership share + recent commits)
//! ├── github.rs   - GitHub REST adapter for repository stats
//! ├── document.rs - document authenticity via the blob store
//! ├── blob.rs     - blob store trait, Walrus + in-memory stores, intake checks
//! ├── event.rs    - hackathon/event presence check
//! └── onchain.rs  - on-chain history (fixed placeholder for now)
//! ```
//!
//! Collectors may fail. [`collect_bounded`] is the only way the pipeline calls
//! them: it enforces the per-call timeout and turns every failure into an
//! unavailable [`SignalResult`] so that unavailability is data, not an error.

pub mod blob;
pub mod document;
pub mod event;
pub mod github;
pub mod onchain;
pub mod repo;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::CollectorError;

pub use blob::{BlobStore, DocumentIntake, InMemoryBlobStore, IntakeReceipt, WalrusBlobStore};
pub use document::DocumentCollector;
pub use event::EventCollector;
pub use github::GithubRepoClient;
pub use onchain::OnchainCollector;
pub use repo::{RepoActivityCollector, RepoStats, RepoStatsSource, repo_score};

/// Evidence tag for claims accepted on presence alone (nothing was checked
/// against an independent source).
pub const PRESENCE_ONLY_TAG: &str = "PresenceOnlyVerification";

/// Default bound on a single collector call
pub const DEFAULT_COLLECTOR_TIMEOUT: Duration = Duration::from_secs(10);

/// Signal categories. Ordering is the canonical order used for breakdowns and
/// for the attestation byte record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalCategory {
    RepoActivity,
    Document,
    Event,
    Onchain,
}

impl SignalCategory {
    pub const ALL: [SignalCategory; 4] = [
        SignalCategory::RepoActivity,
        SignalCategory::Document,
        SignalCategory::Event,
        SignalCategory::Onchain,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SignalCategory::RepoActivity => "repo_activity",
            SignalCategory::Document => "document",
            SignalCategory::Event => "event",
            SignalCategory::Onchain => "onchain",
        }
    }
}

impl fmt::Display for SignalCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How much a signal's evidence was actually checked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationLevel {
    /// The collector checked the claim against its source
    CollectorVerified,
    /// The claim was accepted because it was present
    PresenceOnly,
    /// Fixed score pending a real source
    Placeholder,
    /// The source could not be reached
    Unavailable,
}

/// One collector's output. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalResult {
    category: SignalCategory,
    score: u8,
    evidence: Vec<String>,
    source_available: bool,
    verification: VerificationLevel,
}

impl SignalResult {
    /// Scores above 100 are clamped
    pub fn new(
        category: SignalCategory,
        score: u32,
        evidence: Vec<String>,
        verification: VerificationLevel,
    ) -> Self {
        Self {
            category,
            score: score.min(100) as u8,
            evidence,
            source_available: verification != VerificationLevel::Unavailable,
            verification,
        }
    }

    pub fn verified(category: SignalCategory, score: u32, evidence: Vec<String>) -> Self {
        Self::new(category, score, evidence, VerificationLevel::CollectorVerified)
    }

    /// Presence-only result. Every evidence line carries [`PRESENCE_ONLY_TAG`].
    pub fn presence_only(category: SignalCategory, score: u32, evidence: Vec<String>) -> Self {
        let evidence = evidence
            .into_iter()
            .map(|line| format!("{}: {}", PRESENCE_ONLY_TAG, line))
            .collect();
        Self::new(category, score, evidence, VerificationLevel::PresenceOnly)
    }

    pub fn placeholder(category: SignalCategory, score: u32, evidence: Vec<String>) -> Self {
        Self::new(category, score, evidence, VerificationLevel::Placeholder)
    }

    /// Degraded result: score 0, source unavailable
    pub fn unavailable(category: SignalCategory, reason: impl Into<String>) -> Self {
        Self::new(
            category,
            0,
            vec![format!("source unavailable: {}", reason.into())],
            VerificationLevel::Unavailable,
        )
    }

    pub fn category(&self) -> SignalCategory {
        self.category
    }

    pub fn score(&self) -> u8 {
        self.score
    }

    pub fn evidence(&self) -> &[String] {
        &self.evidence
    }

    pub fn source_available(&self) -> bool {
        self.source_available
    }

    pub fn verification(&self) -> VerificationLevel {
        self.verification
    }

    pub fn is_presence_only(&self) -> bool {
        self.verification == VerificationLevel::PresenceOnly
    }
}

/// Claim inputs for one analysis run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Claim {
    pub subject_id: String,
    /// Repository full name, `owner/name`
    #[serde(default)]
    pub repo_ref: Option<String>,
    /// Access token for the repository API
    #[serde(default, skip_serializing)]
    pub repo_credential: Option<String>,
    #[serde(default)]
    pub event_name: Option<String>,
    #[serde(default)]
    pub document_blob_ids: Vec<String>,
    #[serde(default)]
    pub onchain_ref: Option<String>,
}

impl Claim {
    pub fn new(subject_id: impl Into<String>) -> Self {
        Self {
            subject_id: subject_id.into(),
            ..Default::default()
        }
    }

    pub fn with_repo(mut self, repo_ref: impl Into<String>, credential: impl Into<String>) -> Self {
        self.repo_ref = Some(repo_ref.into());
        self.repo_credential = Some(credential.into());
        self
    }

    pub fn with_event(mut self, event_name: impl Into<String>) -> Self {
        self.event_name = Some(event_name.into());
        self
    }

    pub fn with_documents<I, S>(mut self, blob_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.document_blob_ids = blob_ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_onchain(mut self, onchain_ref: impl Into<String>) -> Self {
        self.onchain_ref = Some(onchain_ref.into());
        self
    }

    /// Event name with surrounding whitespace removed, `None` if blank
    pub fn event_name_trimmed(&self) -> Option<&str> {
        self.event_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }
}

/// A signal source for one category
#[async_trait]
pub trait Collector: Send + Sync {
    fn category(&self) -> SignalCategory;

    async fn collect(&self, claim: &Claim) -> Result<SignalResult, CollectorError>;
}

/// Run a collector under `timeout`. Never fails: errors, timeouts and results
/// reported for the wrong category all become an unavailable signal.
pub async fn collect_bounded(
    collector: &dyn Collector,
    claim: &Claim,
    timeout: Duration,
) -> SignalResult {
    let category = collector.category();

    match tokio::time::timeout(timeout, collector.collect(claim)).await {
        Ok(Ok(result)) if result.category() == category => {
            debug!(
                category = %category,
                score = result.score(),
                available = result.source_available(),
                "Collector settled"
            );
            result
        }
        Ok(Ok(result)) => {
            warn!(
                expected = %category,
                got = %result.category(),
                "Collector reported the wrong category, discarding"
            );
            SignalResult::unavailable(category, "collector reported a different category")
        }
        Ok(Err(e)) => {
            warn!(category = %category, error = %e, "Collector failed, degrading signal");
            SignalResult::unavailable(category, e.to_string())
        }
        Err(_) => {
            let err = CollectorError::Timeout(timeout.as_millis() as u64);
            warn!(category = %category, error = %err, "Collector timed out, degrading signal");
            SignalResult::unavailable(category, err.to_string())
        }
    }
}
