//! Trust analysis API
//!
//! Endpoints:
//!   POST /api/analyze               -> Run the pipeline for a claim
//!   GET  /api/analysis/{subject_id} -> Latest result for a subject
//!   GET  /api/submissions/{subject_id} -> Ledger attempts for a subject
//!   POST /api/attestations/verify   -> Check an attestation's seal
//!   POST /api/documents             -> Upload a supporting document (raw body)
//!   GET  /health                    -> Liveness and submission counters

use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::attestation::{Attestation, AttestationCheck};
use crate::error::{BlobStoreError, PipelineError};
use crate::pipeline::{
    AnalysisResult, OracleServices, SubmissionOutcome, TrustPipeline, validate_claim,
};
use crate::signals::{Claim, DocumentIntake, IntakeReceipt};
use crate::store::{InMemoryStore, KeyValueStore};
use crate::submission::{Nonce, SubmissionRecord, TrackerStats};

// ============================================================================
// State
// ============================================================================

#[derive(Clone)]
pub struct AnalysisApiState {
    pub pipeline: Arc<TrustPipeline>,
    pub intake: Arc<DocumentIntake>,
    /// Latest result per subject
    pub results: Arc<dyn KeyValueStore<AnalysisResult>>,
    pub signer_public_key: Option<String>,
    /// Cancelled on shutdown; runs that have not reached submission stop
    pub shutdown: CancellationToken,
}

impl AnalysisApiState {
    pub fn new(services: OracleServices, shutdown: CancellationToken) -> Self {
        Self {
            pipeline: services.pipeline,
            intake: services.intake,
            results: Arc::new(InMemoryStore::new()),
            signer_public_key: services.signer_public_key,
            shutdown,
        }
    }
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Claim submitted for analysis. Client-computed scores are not part of the
/// request; the server-side composite is the only score.
#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub subject_id: String,
    #[serde(default)]
    pub repo_ref: Option<String>,
    #[serde(default)]
    pub repo_credential: Option<String>,
    #[serde(default)]
    pub event_name: Option<String>,
    #[serde(default)]
    pub document_blob_ids: Vec<String>,
    #[serde(default)]
    pub onchain_ref: Option<String>,
    /// Explicit nonce (hex) for a deliberate resubmission
    #[serde(default)]
    pub nonce: Option<Nonce>,
}

impl From<AnalyzeRequest> for Claim {
    fn from(request: AnalyzeRequest) -> Self {
        Claim {
            subject_id: request.subject_id,
            repo_ref: request.repo_ref,
            repo_credential: request.repo_credential,
            event_name: request.event_name,
            document_blob_ids: request.document_blob_ids,
            onchain_ref: request.onchain_ref,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct VerifyAttestationResponse {
    #[serde(flatten)]
    pub check: AttestationCheck,
    /// Whether the SIGNED key is this oracle's trusted key. `None` for MOCK
    /// seals or when no signer is configured.
    pub signed_by_this_oracle: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct SubmissionSummary {
    pub id: uuid::Uuid,
    #[serde(flatten)]
    pub outcome: SubmissionOutcome,
    pub submitted_at: chrono::DateTime<Utc>,
    pub settled_at: Option<chrono::DateTime<Utc>>,
}

impl From<&SubmissionRecord> for SubmissionSummary {
    fn from(record: &SubmissionRecord) -> Self {
        Self {
            id: record.id,
            outcome: SubmissionOutcome::from(record),
            submitted_at: record.submitted_at,
            settled_at: record.settled_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SubmissionHistoryResponse {
    pub subject_id: String,
    /// Transaction id of the newest confirmed attempt
    pub latest_tx_id: Option<String>,
    /// Oldest first. Settled records are kept for the retention period only.
    pub submissions: Vec<SubmissionSummary>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub signer_public_key: Option<String>,
    pub submissions: TrackerStats,
    pub stored_results: usize,
    pub timestamp: String,
}

/// Error body: `{"error": kind, "message": ...}`
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub kind: &'static str,
    pub message: String,
}

impl ApiError {
    fn new(status: StatusCode, kind: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            kind,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(json!({ "error": self.kind, "message": self.message })),
        )
            .into_response()
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        let message = err.to_string();
        match err {
            PipelineError::MalformedInput(_) => {
                ApiError::new(StatusCode::BAD_REQUEST, "malformed_input", message)
            }
            PipelineError::InvalidWeights(_) => {
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "invalid_weights", message)
            }
            PipelineError::Cancelled { .. } => {
                ApiError::new(StatusCode::SERVICE_UNAVAILABLE, "cancelled", message)
            }
        }
    }
}

impl From<BlobStoreError> for ApiError {
    fn from(err: BlobStoreError) -> Self {
        let message = err.to_string();
        match err {
            BlobStoreError::Rejected(_) => {
                ApiError::new(StatusCode::BAD_REQUEST, "document_rejected", message)
            }
            BlobStoreError::NotFound(_) => ApiError::new(StatusCode::NOT_FOUND, "not_found", message),
            BlobStoreError::Unavailable(_) => {
                ApiError::new(StatusCode::SERVICE_UNAVAILABLE, "blob_store_unavailable", message)
            }
        }
    }
}

// ============================================================================
// API Handlers
// ============================================================================

/// Run the pipeline and remember the result for the subject
pub async fn analyze(
    State(state): State<AnalysisApiState>,
    Json(request): Json<AnalyzeRequest>,
) -> Result<Json<AnalysisResult>, ApiError> {
    let nonce = request.nonce;
    let claim = Claim::from(request);
    info!(subject_id = %claim.subject_id, "Analysis requested");

    let result = state
        .pipeline
        .run_with(claim, state.shutdown.child_token(), nonce)
        .await?;

    if let Err(e) = state.results.put(&result.subject_id, result.clone()).await {
        warn!(subject_id = %result.subject_id, error = %e, "Could not store analysis result");
    }

    Ok(Json(result))
}

pub async fn latest_analysis(
    State(state): State<AnalysisApiState>,
    Path(subject_id): Path<String>,
) -> Result<Json<AnalysisResult>, ApiError> {
    validate_claim(&Claim::new(subject_id.as_str()))?;

    match state.results.get(&subject_id).await {
        Ok(Some(result)) => Ok(Json(result)),
        Ok(None) => Err(ApiError::new(
            StatusCode::NOT_FOUND,
            "not_found",
            format!("no analysis for {}", subject_id),
        )),
        Err(e) => Err(ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "store_unavailable",
            e.to_string(),
        )),
    }
}

pub async fn submission_history(
    State(state): State<AnalysisApiState>,
    Path(subject_id): Path<String>,
) -> Result<Json<SubmissionHistoryResponse>, ApiError> {
    validate_claim(&Claim::new(subject_id.as_str()))?;

    let coordinator = state.pipeline.coordinator();
    let records = coordinator.history(&subject_id).await;
    if records.is_empty() {
        return Err(ApiError::new(
            StatusCode::NOT_FOUND,
            "not_found",
            format!("no submissions for {}", subject_id),
        ));
    }

    let latest_tx_id = coordinator
        .latest_confirmed(&subject_id)
        .await
        .and_then(|record| record.ledger_tx_id);
    Ok(Json(SubmissionHistoryResponse {
        subject_id,
        latest_tx_id,
        submissions: records.iter().map(SubmissionSummary::from).collect(),
    }))
}

pub async fn verify(
    State(state): State<AnalysisApiState>,
    Json(attestation): Json<Attestation>,
) -> Json<VerifyAttestationResponse> {
    let attestor = state.pipeline.attestor();
    let check = attestor.verify(&attestation);
    let signed_by_this_oracle = match (attestor.trusted_key(), attestation.signer_public_key()) {
        (Some(ours), Some(theirs)) => Some(ours == theirs),
        _ => None,
    };

    if !check.valid {
        warn!(
            subject_id = %attestation.subject_id,
            reason = ?check.reason,
            "Attestation failed verification"
        );
    }

    Json(VerifyAttestationResponse {
        check,
        signed_by_this_oracle,
    })
}

pub async fn upload_document(
    State(state): State<AnalysisApiState>,
    body: Bytes,
) -> Result<(StatusCode, Json<IntakeReceipt>), ApiError> {
    let receipt = state.intake.submit(body.to_vec()).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

pub async fn health(State(state): State<AnalysisApiState>) -> Json<HealthResponse> {
    let stored_results = state.results.keys().await.map(|k| k.len()).unwrap_or(0);
    Json(HealthResponse {
        status: "ok",
        signer_public_key: state.signer_public_key.clone(),
        submissions: state.pipeline.coordinator().stats().await,
        stored_results,
        timestamp: Utc::now().to_rfc3339(),
    })
}

// ============================================================================
// Router
// ============================================================================

pub fn create_router(state: AnalysisApiState) -> Router {
    let upload_limit = state.intake.max_bytes();

    Router::new()
        .route("/health", get(health))
        .route("/api/analyze", post(analyze))
        .route("/api/analysis/{subject_id}", get(latest_analysis))
        .route("/api/submissions/{subject_id}", get(submission_history))
        .route("/api/attestations/verify", post(verify))
        .route(
            "/api/documents",
            post(upload_document).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_error_status() {
        let status = |e: PipelineError| ApiError::from(e).status;
        assert_eq!(
            status(PipelineError::MalformedInput("x".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status(PipelineError::InvalidWeights("x".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status(PipelineError::Cancelled {
                stage: "COLLECTING".into()
            }),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_request_ignores_client_score() {
        let request: AnalyzeRequest = serde_json::from_value(json!({
            "subject_id": "acme",
            "event_name": "ETHGlobal",
            "score": 99
        }))
        .unwrap();
        let claim = Claim::from(request);
        assert_eq!(claim.subject_id, "acme");
        assert_eq!(claim.event_name.as_deref(), Some("ETHGlobal"));
    }

    #[test]
    fn test_request_nonce_is_hex() {
        let request: AnalyzeRequest = serde_json::from_value(json!({
            "subject_id": "acme",
            "nonce": "000000000000000000000000000000ff"
        }))
        .unwrap();
        assert_eq!(request.nonce, Some(Nonce::from_u128(255)));
    }
}
