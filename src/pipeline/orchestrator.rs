use std::sync::Arc;
use std::time::Duration;
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, warn};

use super::validation::validate_claim;
use super::{AnalysisResult, PipelineStage};
use crate::attestation::Attestor;
use crate::error::PipelineError;
use crate::scoring::CompositeScorer;
use crate::signals::{
    Claim, Collector, DEFAULT_COLLECTOR_TIMEOUT, SignalCategory, SignalResult, collect_bounded,
};
use crate::submission::{Nonce, ReplayScope, SubmissionCoordinator};

/// Bound on the whole collection stage
pub const DEFAULT_COLLECTION_TIMEOUT: Duration = Duration::from_secs(15);

/// Runs claims through collect, score, attest and submit
pub struct TrustPipeline {
    collectors: Vec<Arc<dyn Collector>>,
    scorer: CompositeScorer,
    attestor: Attestor,
    coordinator: SubmissionCoordinator,
    collector_timeout: Duration,
    collection_timeout: Duration,
}

impl TrustPipeline {
    pub fn new(
        collectors: Vec<Arc<dyn Collector>>,
        scorer: CompositeScorer,
        attestor: Attestor,
        coordinator: SubmissionCoordinator,
    ) -> Self {
        Self {
            collectors,
            scorer,
            attestor,
            coordinator,
            collector_timeout: DEFAULT_COLLECTOR_TIMEOUT,
            collection_timeout: DEFAULT_COLLECTION_TIMEOUT,
        }
    }

    pub fn with_collector_timeout(mut self, timeout: Duration) -> Self {
        self.collector_timeout = timeout;
        self
    }

    pub fn with_collection_timeout(mut self, timeout: Duration) -> Self {
        self.collection_timeout = timeout;
        self
    }

    pub fn coordinator(&self) -> &SubmissionCoordinator {
        &self.coordinator
    }

    pub fn scorer(&self) -> &CompositeScorer {
        &self.scorer
    }

    pub fn attestor(&self) -> &Attestor {
        &self.attestor
    }

    pub async fn run_analysis(&self, claim: Claim) -> Result<AnalysisResult, PipelineError> {
        self.run_analysis_with_cancel(claim, CancellationToken::new())
            .await
    }

    /// Cancelling before SUBMITTING ends the run with `Cancelled` and no
    /// ledger call. Once submission has started the token is ignored.
    pub async fn run_analysis_with_cancel(
        &self,
        claim: Claim,
        cancel: CancellationToken,
    ) -> Result<AnalysisResult, PipelineError> {
        self.run_with(claim, cancel, None).await
    }

    /// Run with a caller-chosen submission nonce
    pub async fn run_analysis_with_nonce(
        &self,
        claim: Claim,
        nonce: Nonce,
    ) -> Result<AnalysisResult, PipelineError> {
        self.run_with(claim, CancellationToken::new(), Some(nonce))
            .await
    }

    /// Full form of the entry points above. Without a nonce one is generated.
    pub async fn run_with(
        &self,
        claim: Claim,
        cancel: CancellationToken,
        nonce: Option<Nonce>,
    ) -> Result<AnalysisResult, PipelineError> {
        let span = info_span!("analysis", subject_id = %claim.subject_id);
        async move {
            let outcome = self.run_stages(claim, cancel, nonce).await;
            match &outcome {
                Ok(result) => info!(
                    score = result.score,
                    risk_tier = %result.risk_tier,
                    signing_mode = ?result.signing_mode,
                    submission = ?result.submission.status,
                    "Analysis finished"
                ),
                Err(e) => warn!(stage = %PipelineStage::Failed, error = %e, "Analysis failed"),
            }
            outcome
        }
        .instrument(span)
        .await
    }

    async fn run_stages(
        &self,
        claim: Claim,
        cancel: CancellationToken,
        nonce: Option<Nonce>,
    ) -> Result<AnalysisResult, PipelineError> {
        validate_claim(&claim)?;
        let mut stages = Vec::with_capacity(5);

        // COLLECTING
        stages.push(PipelineStage::Collecting);
        let signals = self.collect_all(&claim, &cancel).await?;

        // SCORING
        stages.push(PipelineStage::Scoring);
        let composite = self.scorer.score(&signals)?;
        debug!(value = composite.value(), "Composite scored");

        // ATTESTING
        stages.push(PipelineStage::Attesting);
        let attestation = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(cancelled(PipelineStage::Attesting)),
            attestation = self.attestor.attest(&claim.subject_id, &composite, &signals) => attestation,
        };

        if cancel.is_cancelled() {
            return Err(cancelled(PipelineStage::Attesting));
        }

        // SUBMITTING, not cancellable from here on
        stages.push(PipelineStage::Submitting);
        let scope = ReplayScope {
            repo_ref: claim.repo_ref.as_deref(),
            event_name: claim.event_name_trimmed(),
        };
        let record = match nonce {
            Some(nonce) => {
                self.coordinator
                    .submit_with_nonce(attestation.clone(), scope, nonce)
                    .await
            }
            None => self.coordinator.submit(attestation.clone(), scope).await,
        };

        stages.push(PipelineStage::Done);
        let authoritative = self.attestor.verify(&attestation).authoritative;
        Ok(AnalysisResult::assemble(
            &composite,
            signals,
            attestation,
            authoritative,
            &record,
            stages,
        ))
    }

    /// Run every collector on its own task. Anything not settled by the
    /// collection deadline is aborted and reported unavailable.
    async fn collect_all(
        &self,
        claim: &Claim,
        cancel: &CancellationToken,
    ) -> Result<Vec<SignalResult>, PipelineError> {
        let deadline = Instant::now() + self.collection_timeout;
        let claim = Arc::new(claim.clone());

        let tasks: Vec<(SignalCategory, JoinHandle<SignalResult>)> = self
            .collectors
            .iter()
            .map(|collector| {
                let category = collector.category();
                let collector = collector.clone();
                let claim = claim.clone();
                let timeout = self.collector_timeout;
                let task = tokio::spawn(
                    async move { collect_bounded(collector.as_ref(), &claim, timeout).await }
                        .in_current_span(),
                );
                (category, task)
            })
            .collect();
        let aborts: Vec<AbortHandle> = tasks.iter().map(|(_, t)| t.abort_handle()).collect();

        let mut signals = Vec::with_capacity(tasks.len());
        for (index, (category, mut task)) in tasks.into_iter().enumerate() {
            let settled = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    aborts.iter().for_each(AbortHandle::abort);
                    return Err(cancelled(PipelineStage::Collecting));
                }
                settled = tokio::time::timeout_at(deadline, &mut task) => settled,
            };

            let signal = match settled {
                Ok(Ok(signal)) => signal,
                Ok(Err(join_error)) => {
                    error!(category = %category, error = %join_error, "Collector task failed");
                    SignalResult::unavailable(category, "collector task failed")
                }
                Err(_) => {
                    aborts[index].abort();
                    warn!(
                        category = %category,
                        timeout_ms = self.collection_timeout.as_millis() as u64,
                        "Collector missed the collection deadline"
                    );
                    SignalResult::unavailable(
                        category,
                        format!(
                            "no answer within the {} ms collection deadline",
                            self.collection_timeout.as_millis()
                        ),
                    )
                }
            };
            signals.push(signal);
        }

        Ok(signals)
    }
}

fn cancelled(stage: PipelineStage) -> PipelineError {
    PipelineError::Cancelled {
        stage: stage.to_string(),
    }
}
