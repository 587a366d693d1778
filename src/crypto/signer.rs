//! Signer collaborators
//!
//! `Sign(canonical_bytes) -> signature`. The attestor treats every error as
//! "signer unavailable" and falls back to a MOCK seal, and only accepts
//! signatures made with the signer's trusted key.

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use super::signing::{CryptoEngine, CryptoSignature};
use crate::api::http::{SecureHttpClient, join_url};
use crate::error::SignerError;

#[async_trait]
pub trait AttestationSigner: Send + Sync {
    async fn sign(&self, canonical: &[u8]) -> Result<CryptoSignature, SignerError>;

    /// Ed25519 public key a genuine signature from this signer carries.
    /// `None` means nothing it returns can be trusted.
    fn trusted_key(&self) -> Option<Vec<u8>>;
}

/// In-process Ed25519 signer
pub struct LocalSigner {
    engine: CryptoEngine,
}

impl LocalSigner {
    pub fn new(engine: CryptoEngine) -> Self {
        Self { engine }
    }

    pub fn public_key_hex(&self) -> String {
        self.engine.public_key_hex()
    }
}

#[async_trait]
impl AttestationSigner for LocalSigner {
    async fn sign(&self, canonical: &[u8]) -> Result<CryptoSignature, SignerError> {
        Ok(self.engine.sign(canonical))
    }

    fn trusted_key(&self) -> Option<Vec<u8>> {
        Some(self.engine.public_key().to_bytes().to_vec())
    }
}

#[derive(Debug, Serialize)]
struct RemoteSignRequest {
    payload_hex: String,
}

/// Signing service reached over HTTP: `POST {base}/sign`. Its key is pinned
/// from configuration, never taken from the reply.
pub struct RemoteSigner {
    http: SecureHttpClient,
    base_url: String,
    api_key: Option<String>,
    public_key: Vec<u8>,
}

impl RemoteSigner {
    pub fn new(
        http: SecureHttpClient,
        base_url: impl Into<String>,
        api_key: Option<String>,
        public_key: Vec<u8>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            api_key,
            public_key,
        }
    }
}

#[async_trait]
impl AttestationSigner for RemoteSigner {
    async fn sign(&self, canonical: &[u8]) -> Result<CryptoSignature, SignerError> {
        let url = join_url(&self.base_url, "sign");
        let request = RemoteSignRequest {
            payload_hex: hex::encode(canonical),
        };

        let reply = self
            .http
            .post_json(&url, &request, self.api_key.as_deref())
            .await
            .map_err(|e| SignerError::Unavailable(format!("{:#}", e)))?;

        if !reply.is_success() {
            return Err(SignerError::Unavailable(format!(
                "signer returned {}: {}",
                reply.status,
                reply.snippet()
            )));
        }

        let signature: CryptoSignature = reply
            .json()
            .map_err(|e| SignerError::InvalidSignature(format!("{:#}", e)))?;
        debug!(algorithm = %signature.algorithm, "Remote signer answered");
        Ok(signature)
    }

    fn trusted_key(&self) -> Option<Vec<u8>> {
        Some(self.public_key.clone())
    }
}

/// No signer configured. Every attestation is MOCK.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledSigner;

#[async_trait]
impl AttestationSigner for DisabledSigner {
    async fn sign(&self, _canonical: &[u8]) -> Result<CryptoSignature, SignerError> {
        Err(SignerError::Unavailable("no signer configured".to_string()))
    }

    fn trusted_key(&self) -> Option<Vec<u8>> {
        None
    }
}
