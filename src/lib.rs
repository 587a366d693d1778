//! Trust Oracle
//!
//! Collects independent trust signals about a startup, combines them into a
//! weighted composite score, seals the score in an attestation and anchors it
//! on a ledger with replay protection.
//!
//! ## Module Structure
//!
//! ```text
//! src/
//! ├── lib.rs         - Crate root with re-exports
//! ├── main.rs        - Server entrypoint
//! ├── config.rs      - Configuration from TRUST_ORACLE_* variables
//! ├── error.rs       - Error taxonomy
//! ├── store.rs       - Key-value store trait + in-memory store
//! ├── signals/       - Signal Collectors
//! │   ├── repo.rs      - Repository activity
//! │   ├── github.rs    - GitHub REST adapter
//! │   ├── document.rs  - Document authenticity
//! │   ├── blob.rs      - Blob stores (Walrus, in-memory) and intake
//! │   ├── event.rs     - Event participation (presence only)
//! │   └── onchain.rs   - On-chain history (placeholder)
//! ├── scoring/       - Composite Scorer and advisory risk report
//! ├── crypto/        - Ed25519 signing, canonical records, signers
//! ├── attestation/   - Attestor (SIGNED or MOCK seals)
//! ├── ledger/        - Ledger collaborator (HTTP gateway, in-memory)
//! ├── submission/    - Submission Coordinator, nonces, tracking
//! ├── pipeline/      - Pipeline Orchestrator and wiring
//! └── api/           - HTTP API and security middleware
//! ```

pub mod api;
pub mod attestation;
pub mod config;
pub mod crypto;
pub mod error;
pub mod ledger;
pub mod pipeline;
pub mod scoring;
pub mod signals;
pub mod store;
pub mod submission;

// Re-export main types for convenience
pub use attestation::{
    Attestation, AttestationCheck, AttestationSeal, Attestor, SigningMode, verify_attestation,
};
pub use config::OracleConfig;
pub use crypto::{AttestationSigner, CryptoEngine, CryptoSignature, LocalSigner};
pub use error::{
    CollectorError, LedgerError, PipelineError, ScoringError, SignerError, SubmissionFailure,
};
pub use ledger::{HttpLedgerClient, InMemoryLedger, LedgerClient};
pub use pipeline::{
    AnalysisResult, OracleServices, PipelineStage, SubmissionOutcome, TrustPipeline,
    build_services,
};
pub use scoring::{CompositeScore, CompositeScorer, RiskReport, RiskTier, ScoreWeights};
pub use signals::{Claim, Collector, SignalCategory, SignalResult, VerificationLevel};
pub use store::{InMemoryStore, KeyValueStore};
pub use submission::{
    ContentHash, Nonce, SubmissionCoordinator, SubmissionRecord, SubmissionStatus,
};
