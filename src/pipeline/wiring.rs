//! Builds the pipeline and its collaborators from [`OracleConfig`]

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};

use super::orchestrator::TrustPipeline;
use crate::api::http::{HttpSecurityConfig, SecureHttpClient};
use crate::attestation::Attestor;
use crate::config::{OracleConfig, SignerMode, sanitize_for_logging};
use crate::crypto::{
    AttestationSigner, CryptoEngine, DisabledSigner, LocalSigner, RemoteSigner,
};
use crate::ledger::{HttpLedgerClient, InMemoryLedger, LedgerClient};
use crate::scoring::CompositeScorer;
use crate::signals::{
    BlobStore, Collector, DocumentCollector, DocumentIntake, EventCollector, GithubRepoClient,
    InMemoryBlobStore, OnchainCollector, RepoActivityCollector, WalrusBlobStore,
};
use crate::submission::SubmissionCoordinator;

/// Everything the HTTP layer needs
pub struct OracleServices {
    pub pipeline: Arc<TrustPipeline>,
    pub intake: Arc<DocumentIntake>,
    /// Hex Ed25519 key authoritative attestations are signed with
    pub signer_public_key: Option<String>,
}

pub fn build_services(config: &OracleConfig) -> Result<OracleServices> {
    let pipeline_cfg = &config.pipeline;
    let timeout_secs = [
        pipeline_cfg.collector_timeout_secs,
        pipeline_cfg.signer_timeout_secs,
        pipeline_cfg.ledger_timeout_secs,
    ]
    .into_iter()
    .max()
    .unwrap_or(pipeline_cfg.collector_timeout_secs);

    let http = SecureHttpClient::new(HttpSecurityConfig {
        require_https: config.security.require_https,
        verify_certificates: config.security.verify_certificates,
        timeout_secs,
        max_response_size: HttpSecurityConfig::default()
            .max_response_size
            .max(config.blob_store.max_document_bytes),
        allowed_domains: config.collaborator_domains(),
    })?;

    let blob_store: Arc<dyn BlobStore> = match (
        &config.blob_store.publisher_url,
        &config.blob_store.aggregator_url,
    ) {
        (Some(publisher), Some(aggregator)) => {
            info!(publisher = %publisher, aggregator = %aggregator, "Using Walrus blob store");
            Arc::new(WalrusBlobStore::new(
                http.clone(),
                publisher.clone(),
                aggregator.clone(),
                config.blob_store.epochs,
            ))
        }
        _ => {
            warn!("No Walrus endpoints configured, documents are kept in memory");
            Arc::new(InMemoryBlobStore::new())
        }
    };

    let signer: Arc<dyn AttestationSigner> = match config.signer.mode {
        SignerMode::Local => {
            let engine = match &config.signer.secret_key_hex {
                Some(secret) => CryptoEngine::from_secret_hex(secret)
                    .context("Failed to load attestation signing key")?,
                None => CryptoEngine::generate(),
            };
            Arc::new(LocalSigner::new(engine))
        }
        SignerMode::Remote => {
            let url = config
                .signer
                .remote_url
                .clone()
                .context("Remote signer mode requires a signer URL")?;
            let public_key = config
                .signer
                .public_key_hex
                .as_deref()
                .context("Remote signer mode requires the signer's public key")
                .and_then(|key| {
                    hex::decode(key.trim()).context("Signer public key is not valid hex")
                })?;
            info!(url = %sanitize_for_logging(&url), "Using remote attestation signer");
            Arc::new(RemoteSigner::new(
                http.clone(),
                url,
                config.signer.remote_api_key.clone(),
                public_key,
            ))
        }
        SignerMode::Disabled => Arc::new(DisabledSigner),
    };
    let signer_public_key = signer.trusted_key().map(hex::encode);
    if let Some(public_key) = &signer_public_key {
        info!(public_key = %public_key, "Attestations are trusted under this key");
    }

    let ledger: Arc<dyn LedgerClient> = match &config.ledger.url {
        Some(url) => {
            info!(url = %sanitize_for_logging(url), "Using HTTP ledger gateway");
            Arc::new(HttpLedgerClient::new(
                http.clone(),
                url.clone(),
                config.ledger.api_key.clone(),
            ))
        }
        None => Arc::new(InMemoryLedger::new()),
    };

    let collectors: Vec<Arc<dyn Collector>> = vec![
        Arc::new(RepoActivityCollector::new(Arc::new(GithubRepoClient::new(
            http.clone(),
            config.github.api_base.clone(),
        )))),
        Arc::new(DocumentCollector::new(blob_store.clone())),
        Arc::new(EventCollector::new()),
        Arc::new(OnchainCollector::new()),
    ];

    let weights = config
        .score_weights()
        .context("Invalid score weights")?;
    let scorer = CompositeScorer::new(weights).context("Invalid score weights")?;

    let pipeline = TrustPipeline::new(
        collectors,
        scorer,
        Attestor::new(signer, config.signer_timeout()),
        SubmissionCoordinator::new(ledger, config.ledger_timeout()),
    )
    .with_collector_timeout(config.collector_timeout())
    .with_collection_timeout(config.collection_timeout());

    Ok(OracleServices {
        pipeline: Arc::new(pipeline),
        intake: Arc::new(DocumentIntake::new(
            blob_store,
            config.blob_store.max_document_bytes,
        )),
        signer_public_key,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::Claim;

    fn dev_config() -> OracleConfig {
        let mut config = OracleConfig::default();
        config.security.enable_auth = false;
        config
    }

    #[tokio::test]
    async fn test_dev_services_run_offline() {
        let services = build_services(&dev_config()).unwrap();
        assert!(services.signer_public_key.is_some());

        let receipt = services.intake.submit(b"pitch deck".to_vec()).await.unwrap();
        let claim = Claim::new("acme")
            .with_event("ETHGlobal")
            .with_documents([receipt.blob_id]);
        let result = services.pipeline.run_analysis(claim).await.unwrap();

        // 0.4*70 + 0.2*75 + 0.1*80, no repository claimed
        assert_eq!(result.score, 51);
        assert!(result.authoritative);
        assert!(result.ledger_tx_id().is_some());
    }

    #[test]
    fn test_fixed_signing_key() {
        let mut config = dev_config();
        config.signer.secret_key_hex = Some("11".repeat(32));
        let first = build_services(&config).unwrap().signer_public_key;
        let second = build_services(&config).unwrap().signer_public_key;
        assert_eq!(first, second);
    }

    #[test]
    fn test_remote_signer_pins_configured_key() {
        let mut config = dev_config();
        config.signer.mode = SignerMode::Remote;
        config.signer.remote_url = Some("https://signer.example.org".into());
        config.signer.public_key_hex = Some("ab".repeat(32));
        let services = build_services(&config).unwrap();
        assert_eq!(services.signer_public_key, Some("ab".repeat(32)));
        assert_eq!(
            services.pipeline.attestor().trusted_key(),
            Some(&[0xab_u8; 32][..])
        );
    }

    #[test]
    fn test_disabled_signer_has_no_key() {
        let mut config = dev_config();
        config.signer.mode = SignerMode::Disabled;
        assert!(build_services(&config).unwrap().signer_public_key.is_none());
    }
}
