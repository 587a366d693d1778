//! Integration tests for the trust oracle
//!
//! End-to-end runs of the pipeline with fake collaborators, attestation
//! verification, replay protection and the HTTP API.

use async_trait::async_trait;
use std::sync::Arc;
use trust_oracle::attestation::DEFAULT_SIGNER_TIMEOUT;
use trust_oracle::crypto::DisabledSigner;
use trust_oracle::error::CollectorError;
use trust_oracle::signals::{
    DocumentCollector, DocumentIntake, EventCollector, InMemoryBlobStore, OnchainCollector,
    RepoActivityCollector, RepoStats, RepoStatsSource,
};
use trust_oracle::submission::DEFAULT_LEDGER_TIMEOUT;
use trust_oracle::{
    Attestor, Claim, Collector, CompositeScorer, CryptoEngine, InMemoryLedger, LocalSigner,
    OracleServices, RiskTier, ScoreWeights, SignalCategory, SignalResult, SubmissionCoordinator,
    TrustPipeline,
};

// ============================================================================
// Test Helpers
// ============================================================================

/// Repository API answering with fixed stats for one repo
struct FakeRepoApi {
    repo: &'static str,
    stats: RepoStats,
}

#[async_trait]
impl RepoStatsSource for FakeRepoApi {
    async fn get_repo_stats(
        &self,
        repo_ref: &str,
        credential: &str,
    ) -> Result<RepoStats, CollectorError> {
        if credential != "test-token" {
            return Err(CollectorError::Unauthorized(repo_ref.to_string()));
        }
        if repo_ref != self.repo {
            return Err(CollectorError::NotFound(repo_ref.to_string()));
        }
        Ok(self.stats.clone())
    }
}

/// Event source that is always down
struct DownEventSource;

#[async_trait]
impl Collector for DownEventSource {
    fn category(&self) -> SignalCategory {
        SignalCategory::Event
    }

    async fn collect(&self, _claim: &Claim) -> Result<SignalResult, CollectorError> {
        Err(CollectorError::Unavailable("event registry down".into()))
    }
}

/// 100 total commits, 40 by the claimant, 10 in the last 30 days
fn sample_stats() -> RepoStats {
    RepoStats {
        total_commits: 100,
        user_commits: 40,
        stars: 12,
        forks: 3,
        recent_commits_30d: 10,
        controls_repository: true,
    }
}

struct Harness {
    pipeline: Arc<TrustPipeline>,
    intake: Arc<DocumentIntake>,
    ledger: Arc<InMemoryLedger>,
    public_key: String,
}

fn create_harness(event: Arc<dyn Collector>) -> Harness {
    let blobs = Arc::new(InMemoryBlobStore::new());
    let ledger = Arc::new(InMemoryLedger::new());
    let signer = LocalSigner::new(CryptoEngine::generate());
    let public_key = signer.public_key_hex();

    let collectors: Vec<Arc<dyn Collector>> = vec![
        Arc::new(RepoActivityCollector::new(Arc::new(FakeRepoApi {
            repo: "acme/core",
            stats: sample_stats(),
        }))),
        Arc::new(DocumentCollector::new(blobs.clone())),
        event,
        Arc::new(OnchainCollector::new()),
    ];

    let pipeline = TrustPipeline::new(
        collectors,
        CompositeScorer::new(ScoreWeights::default()).unwrap(),
        Attestor::new(Arc::new(signer), DEFAULT_SIGNER_TIMEOUT),
        SubmissionCoordinator::new(ledger.clone(), DEFAULT_LEDGER_TIMEOUT),
    );

    Harness {
        pipeline: Arc::new(pipeline),
        intake: Arc::new(DocumentIntake::new(blobs, 1024 * 1024)),
        ledger,
        public_key,
    }
}

async fn full_claim(harness: &Harness) -> Claim {
    let receipt = harness
        .intake
        .submit(b"incorporation certificate".to_vec())
        .await
        .unwrap();
    Claim::new("acme")
        .with_repo("acme/core", "test-token")
        .with_event("ETHGlobal Lisbon")
        .with_documents([receipt.blob_id])
}

// ============================================================================
// Scoring Properties
// ============================================================================

mod scoring {
    use super::*;

    fn repo_only(score: u32) -> Vec<SignalResult> {
        vec![SignalResult::verified(SignalCategory::RepoActivity, score, vec![])]
    }

    #[test]
    fn test_tier_boundaries() {
        let scorer =
            CompositeScorer::new(ScoreWeights::from_basis_points(10_000, 0, 0, 0).unwrap())
                .unwrap();

        let cases = [
            (0, RiskTier::Critical),
            (39, RiskTier::Critical),
            (40, RiskTier::High),
            (59, RiskTier::High),
            (60, RiskTier::Medium),
            (79, RiskTier::Medium),
            (80, RiskTier::Low),
            (100, RiskTier::Low),
        ];
        for (score, tier) in cases {
            let composite = scorer.score(&repo_only(score)).unwrap();
            assert_eq!(composite.value(), score as u8);
            assert_eq!(composite.risk_tier(), tier, "score {}", score);
        }
    }

    #[test]
    fn test_value_stays_in_range() {
        let weight_sets = [
            ScoreWeights::default(),
            ScoreWeights::from_basis_points(2500, 2500, 2500, 2500).unwrap(),
            ScoreWeights::from_fractions(0.05, 0.15, 0.55, 0.25).unwrap(),
        ];
        for weights in weight_sets {
            let scorer = CompositeScorer::new(weights).unwrap();
            for score in [0, 1, 49, 50, 99, 100] {
                let signals: Vec<SignalResult> = SignalCategory::ALL
                    .iter()
                    .map(|c| SignalResult::verified(*c, score, vec![]))
                    .collect();
                let composite = scorer.score(&signals).unwrap();
                assert!(composite.value() <= 100);
                assert_eq!(composite.value(), score as u8);
            }
        }
    }

    #[test]
    fn test_scoring_is_deterministic() {
        let scorer = CompositeScorer::new(ScoreWeights::default()).unwrap();
        let signals = vec![
            SignalResult::verified(SignalCategory::RepoActivity, 44, vec!["a".into()]),
            SignalResult::verified(SignalCategory::Document, 80, vec![]),
            SignalResult::presence_only(SignalCategory::Event, 70, vec!["e".into()]),
            SignalResult::placeholder(SignalCategory::Onchain, 75, vec![]),
        ];
        let first = scorer.score(&signals).unwrap();
        let second = scorer.score(&signals).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_weights_must_sum_to_one() {
        assert!(ScoreWeights::from_fractions(0.3, 0.1, 0.4, 0.1).is_err());
        assert!(ScoreWeights::from_basis_points(3000, 1000, 4000, 2001).is_err());
    }
}

// ============================================================================
// End-to-end Pipeline
// ============================================================================

mod pipeline_runs {
    use super::*;
    use trust_oracle::{SigningMode, SubmissionStatus};

    #[tokio::test]
    async fn test_worked_example() {
        let harness = create_harness(Arc::new(EventCollector::new()));
        let claim = full_claim(&harness).await;
        let result = harness.pipeline.run_analysis(claim).await.unwrap();

        // round(0.6*40 + 0.4*min(100, 10*5)) = 44
        assert_eq!(result.breakdown[&SignalCategory::RepoActivity], 44);
        assert_eq!(result.breakdown[&SignalCategory::Document], 80);
        assert_eq!(result.breakdown[&SignalCategory::Event], 70);
        assert_eq!(result.breakdown[&SignalCategory::Onchain], 75);

        // round(28 + 13.2 + 15 + 8) = 64
        assert_eq!(result.score, 64);
        assert_eq!(result.risk_tier, RiskTier::Medium);
        assert_eq!(result.signing_mode, SigningMode::Signed);
        assert!(result.authoritative);
        assert_eq!(result.submission.status, SubmissionStatus::Confirmed);
        assert!(result.ledger_tx_id().unwrap().starts_with("0x"));
        assert_eq!(harness.ledger.len().await, 1);
    }

    #[tokio::test]
    async fn test_event_outage_costs_exactly_28() {
        let healthy = create_harness(Arc::new(EventCollector::new()));
        let degraded = create_harness(Arc::new(DownEventSource));

        let baseline = healthy
            .pipeline
            .run_analysis(full_claim(&healthy).await)
            .await
            .unwrap();
        let outage = degraded
            .pipeline
            .run_analysis(full_claim(&degraded).await)
            .await
            .unwrap();

        assert_eq!(outage.breakdown[&SignalCategory::Event], 0);
        assert_eq!(outage.degraded_categories, vec![SignalCategory::Event]);
        assert_eq!(baseline.score - outage.score, 28);
        assert_eq!(outage.score, 36);
        assert_eq!(outage.risk_tier, RiskTier::Critical);
        // Degraded runs still complete and anchor
        assert_eq!(outage.submission.status, SubmissionStatus::Confirmed);
    }

    #[tokio::test]
    async fn test_presence_only_evidence_is_labelled() {
        let harness = create_harness(Arc::new(EventCollector::new()));
        let result = harness
            .pipeline
            .run_analysis(full_claim(&harness).await)
            .await
            .unwrap();

        let event = result
            .signals
            .iter()
            .find(|s| s.category() == SignalCategory::Event)
            .unwrap();
        assert!(event.is_presence_only());
        assert!(
            result.attestation.evidence[&SignalCategory::Event]
                .iter()
                .all(|line| line.starts_with("PresenceOnlyVerification"))
        );
    }

    #[tokio::test]
    async fn test_bad_credential_degrades_repo() {
        let harness = create_harness(Arc::new(EventCollector::new()));
        let claim = Claim::new("acme").with_repo("acme/core", "wrong-token");
        let result = harness.pipeline.run_analysis(claim).await.unwrap();
        assert_eq!(
            result.degraded_categories,
            vec![SignalCategory::RepoActivity]
        );
        assert_eq!(result.breakdown[&SignalCategory::RepoActivity], 0);
    }

    #[tokio::test]
    async fn test_signer_outage_gives_mock() {
        let ledger = Arc::new(InMemoryLedger::new());
        let pipeline = TrustPipeline::new(
            vec![Arc::new(EventCollector::new())],
            CompositeScorer::new(ScoreWeights::default()).unwrap(),
            Attestor::new(Arc::new(DisabledSigner), DEFAULT_SIGNER_TIMEOUT),
            SubmissionCoordinator::new(ledger, DEFAULT_LEDGER_TIMEOUT),
        );
        let result = pipeline.run_analysis(Claim::new("acme")).await.unwrap();
        assert_eq!(result.signing_mode, SigningMode::Mock);
        assert!(!result.authoritative);
        assert!(!result.attestation.is_authoritative(None));
    }
}

// ============================================================================
// Attestation Round-trip
// ============================================================================

mod attestations {
    use super::*;
    use serde_json::json;
    use trust_oracle::{Attestation, verify_attestation};

    /// A SIGNED attestation and the key it is trusted under
    async fn signed_attestation() -> (Attestation, Vec<u8>) {
        let harness = create_harness(Arc::new(EventCollector::new()));
        let claim = full_claim(&harness).await;
        let attestation = harness.pipeline.run_analysis(claim).await.unwrap().attestation;
        (attestation, hex::decode(&harness.public_key).unwrap())
    }

    fn mutated(attestation: &Attestation, edit: impl FnOnce(&mut serde_json::Value)) -> Attestation {
        let mut value = serde_json::to_value(attestation).unwrap();
        edit(&mut value);
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn test_signed_attestation_verifies() {
        let (attestation, key) = signed_attestation().await;
        let check = verify_attestation(&attestation, Some(&key));
        assert!(check.valid);
        assert!(check.authoritative);

        // Survives a JSON round trip
        let decoded: Attestation =
            serde_json::from_str(&serde_json::to_string(&attestation).unwrap()).unwrap();
        assert!(verify_attestation(&decoded, Some(&key)).authoritative);
    }

    #[tokio::test]
    async fn test_other_oracle_key_is_not_authoritative() {
        let (ours, our_key) = signed_attestation().await;
        let (theirs, their_key) = signed_attestation().await;
        assert_ne!(our_key, their_key);

        let check = verify_attestation(&theirs, Some(&our_key));
        assert!(check.valid);
        assert!(!check.authoritative);
        assert!(!theirs.is_authoritative(Some(&our_key)));
        assert!(ours.is_authoritative(Some(&our_key)));
    }

    #[tokio::test]
    async fn test_any_mutation_invalidates() {
        let (attestation, key) = signed_attestation().await;

        type Edit = Box<dyn FnOnce(&mut serde_json::Value)>;
        let edits: Vec<Edit> = vec![
            Box::new(|v: &mut serde_json::Value| v["subject_id"] = json!("someone-else")),
            Box::new(|v: &mut serde_json::Value| {
                let issued = v["issued_at_ms"].as_i64().unwrap();
                v["issued_at_ms"] = json!(issued + 1);
            }),
            Box::new(|v: &mut serde_json::Value| v["composite"]["value"] = json!(99)),
            Box::new(|v: &mut serde_json::Value| v["composite"]["risk_tier"] = json!("LOW")),
            Box::new(|v: &mut serde_json::Value| {
                v["composite"]["breakdown"]["event"] = json!(71)
            }),
        ];

        for edit in edits {
            let tampered = mutated(&attestation, edit);
            let check = verify_attestation(&tampered, Some(&key));
            assert!(!check.valid);
            assert!(!check.authoritative);
        }
    }

    #[tokio::test]
    async fn test_mock_cannot_pose_as_signed() {
        let (attestation, key) = signed_attestation().await;
        let forged = mutated(&attestation, |v| {
            v["seal"] = json!({
                "mode": "MOCK",
                "pseudo_signature": "00".repeat(32),
                "reason": "forged"
            });
        });
        assert!(!verify_attestation(&forged, Some(&key)).valid);
    }
}

// ============================================================================
// Replay Protection
// ============================================================================

mod replay {
    use super::*;
    use trust_oracle::{Nonce, SubmissionFailure, SubmissionStatus};

    #[tokio::test]
    async fn test_same_nonce_rejected_fresh_nonce_accepted() {
        let harness = create_harness(Arc::new(EventCollector::new()));
        let claim = full_claim(&harness).await;
        let nonce = Nonce::from_u128(0xfeed);

        let first = harness
            .pipeline
            .run_analysis_with_nonce(claim.clone(), nonce)
            .await
            .unwrap();
        assert_eq!(first.submission.status, SubmissionStatus::Confirmed);

        let replayed = harness
            .pipeline
            .run_analysis_with_nonce(claim.clone(), nonce)
            .await
            .unwrap();
        assert_eq!(replayed.submission.status, SubmissionStatus::Rejected);
        assert_eq!(
            replayed.submission.failure,
            Some(SubmissionFailure::DuplicateSubmission)
        );
        assert_eq!(replayed.submission.content_hash, first.submission.content_hash);

        let fresh = harness.pipeline.run_analysis(claim).await.unwrap();
        assert_eq!(fresh.submission.status, SubmissionStatus::Confirmed);
        assert_ne!(fresh.submission.nonce, nonce);
        assert_ne!(fresh.ledger_tx_id(), first.ledger_tx_id());

        assert_eq!(harness.ledger.len().await, 2);
    }

    #[tokio::test]
    async fn test_concurrent_runs_for_one_subject() {
        let harness = create_harness(Arc::new(EventCollector::new()));
        let claim = full_claim(&harness).await;

        let mut handles = Vec::new();
        for _ in 0..8 {
            let pipeline = harness.pipeline.clone();
            let claim = claim.clone();
            handles.push(tokio::spawn(
                async move { pipeline.run_analysis(claim).await },
            ));
        }
        for handle in handles {
            let result = handle.await.unwrap().unwrap();
            assert_eq!(result.submission.status, SubmissionStatus::Confirmed);
        }
        assert_eq!(harness.ledger.len().await, 8);
    }
}

// ============================================================================
// HTTP API
// ============================================================================

mod http_api {
    use super::*;
    use axum::Router;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use tokio_util::sync::CancellationToken;
    use tower::ServiceExt;
    use trust_oracle::api::{
        AnalysisApiState, SecurityMiddlewareConfig, SecurityState, build_app,
    };

    const API_KEY: &str = "0123456789abcdef0123456789abcdef";

    fn create_app() -> Router {
        let harness = create_harness(Arc::new(EventCollector::new()));
        let services = OracleServices {
            pipeline: harness.pipeline,
            intake: harness.intake,
            signer_public_key: Some(harness.public_key),
        };
        let state = AnalysisApiState::new(services, CancellationToken::new());
        let security = SecurityState::new(SecurityMiddlewareConfig {
            api_keys: vec![API_KEY.to_string()],
            log_requests: false,
            ..Default::default()
        });
        build_app(state, security)
    }

    fn request(method: &str, uri: &str, body: Body) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("x-api-key", API_KEY)
            .header("content-type", "application/json")
            .body(body)
            .unwrap()
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn test_health_is_public() {
        let app = create_app();
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-frame-options"], "DENY");
    }

    #[tokio::test]
    async fn test_api_requires_key() {
        let app = create_app();
        let response = app
            .oneshot(
                Request::post("/api/analyze")
                    .header("content-type", "application/json")
                    .body(Body::from(json!({"subject_id": "acme"}).to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_malformed_subject_is_400() {
        let app = create_app();
        let body = Body::from(json!({"subject_id": "not valid!"}).to_string());
        let (status, value) = send(&app, request("POST", "/api/analyze", body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(value["error"], "malformed_input");
    }

    #[tokio::test]
    async fn test_upload_analyze_fetch_verify() {
        let app = create_app();

        let upload = Request::post("/api/documents")
            .header("x-api-key", API_KEY)
            .body(Body::from("articles of incorporation"))
            .unwrap();
        let (status, receipt) = send(&app, upload).await;
        assert_eq!(status, StatusCode::CREATED);
        let blob_id = receipt["blob_id"].as_str().unwrap().to_string();

        let body = json!({
            "subject_id": "acme",
            "repo_ref": "acme/core",
            "repo_credential": "test-token",
            "event_name": "ETHGlobal",
            "document_blob_ids": [blob_id],
            "score": 100
        });
        let (status, result) = send(
            &app,
            request("POST", "/api/analyze", Body::from(body.to_string())),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(result["score"], 64);
        assert_eq!(result["risk_tier"], "MEDIUM");
        assert_eq!(result["signing_mode"], "SIGNED");
        assert_eq!(result["submission"]["status"], "CONFIRMED");

        let (status, stored) = send(&app, request("GET", "/api/analysis/acme", Body::empty())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(stored["issued_at_ms"], result["issued_at_ms"]);

        let attestation = result["attestation"].to_string();
        let (status, check) = send(
            &app,
            request("POST", "/api/attestations/verify", Body::from(attestation)),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(check["valid"], true);
        assert_eq!(check["authoritative"], true);
        assert_eq!(check["signed_by_this_oracle"], true);
    }

    #[tokio::test]
    async fn test_submission_history() {
        let app = create_app();

        let (status, _) = send(&app, request("GET", "/api/submissions/acme", Body::empty())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let body = json!({
            "subject_id": "acme",
            "repo_ref": "acme/core",
            "repo_credential": "test-token",
            "score": 100
        });
        let (status, result) = send(
            &app,
            request("POST", "/api/analyze", Body::from(body.to_string())),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, history) =
            send(&app, request("GET", "/api/submissions/acme", Body::empty())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(history["subject_id"], "acme");
        assert_eq!(history["submissions"].as_array().unwrap().len(), 1);
        assert_eq!(history["submissions"][0]["status"], "CONFIRMED");
        assert_eq!(history["submissions"][0]["nonce"], result["submission"]["nonce"]);
        assert_eq!(history["latest_tx_id"], result["submission"]["ledger_tx_id"]);
        assert!(history["latest_tx_id"].is_string());
    }

    #[tokio::test]
    async fn test_self_signed_attestation_is_not_authoritative() {
        let app = create_app();

        // Same subject, signed under a key this oracle does not hold
        let forger = create_harness(Arc::new(EventCollector::new()));
        let claim = full_claim(&forger).await;
        let forged = forger.pipeline.run_analysis(claim).await.unwrap().attestation;

        let (status, check) = send(
            &app,
            request(
                "POST",
                "/api/attestations/verify",
                Body::from(serde_json::to_string(&forged).unwrap()),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(check["signing_mode"], "SIGNED");
        assert_eq!(check["valid"], true);
        assert_eq!(check["authoritative"], false);
        assert_eq!(check["signed_by_this_oracle"], false);
    }

    #[tokio::test]
    async fn test_unknown_subject_is_404() {
        let app = create_app();
        let (status, _) = send(&app, request("GET", "/api/analysis/nobody", Body::empty())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_empty_document_rejected() {
        let app = create_app();
        let (status, value) = send(&app, request("POST", "/api/documents", Body::empty())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(value["error"], "document_rejected");
    }

    #[tokio::test]
    async fn test_shutdown_cancels_new_runs() {
        let harness = create_harness(Arc::new(EventCollector::new()));
        let shutdown = CancellationToken::new();
        let state = AnalysisApiState::new(
            OracleServices {
                pipeline: harness.pipeline,
                intake: harness.intake,
                signer_public_key: None,
            },
            shutdown.clone(),
        );
        let app = build_app(
            state,
            SecurityState::new(SecurityMiddlewareConfig {
                enable_auth: false,
                ..Default::default()
            }),
        );
        shutdown.cancel();

        let body = Body::from(json!({"subject_id": "acme"}).to_string());
        let (status, value) = send(&app, request("POST", "/api/analyze", body)).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(value["error"], "cancelled");
        assert!(harness.ledger.is_empty().await);
    }
}
