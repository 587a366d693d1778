//! Attestor
//!
//! Seals a composite score for one subject. The seal covers the canonical
//! record of subject_id, composite and issue time (see
//! [`crate::crypto::canonical`]).
//!
//! ```text
//! signer answers with its trusted key, signature verifies -> SIGNED
//! signer errors / times out / lies / uses another key     -> MOCK (HMAC pseudo-signature)
//! ```
//!
//! Attesting never fails. A MOCK attestation is marked as such and is never
//! authoritative. Neither is a SIGNED one whose key is not the oracle's
//! trusted key, however well its signature verifies.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::crypto::{
    AttestationSigner, CryptoEngine, CryptoSignature, attestation_bytes, mock_signature,
    verify_mock_signature,
};
use crate::error::SignerError;
use crate::scoring::CompositeScore;
use crate::signals::{SignalCategory, SignalResult};

pub const DEFAULT_SIGNER_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SigningMode {
    Signed,
    Mock,
}

/// Signing material. The variant decides the signing mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttestationSeal {
    Signed { signature: CryptoSignature },
    Mock {
        #[serde(with = "hex::serde")]
        pseudo_signature: Vec<u8>,
        /// Why the signer was not used
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attestation {
    pub subject_id: String,
    pub composite: CompositeScore,
    /// Evidence lines per category. Informational, not covered by the seal.
    #[serde(default)]
    pub evidence: BTreeMap<SignalCategory, Vec<String>>,
    pub issued_at_ms: i64,
    pub seal: AttestationSeal,
}

impl Attestation {
    pub fn signing_mode(&self) -> SigningMode {
        match self.seal {
            AttestationSeal::Signed { .. } => SigningMode::Signed,
            AttestationSeal::Mock { .. } => SigningMode::Mock,
        }
    }

    pub fn signature(&self) -> &[u8] {
        match &self.seal {
            AttestationSeal::Signed { signature } => &signature.signature,
            AttestationSeal::Mock {
                pseudo_signature, ..
            } => pseudo_signature,
        }
    }

    /// `None` for MOCK attestations
    pub fn signer_public_key(&self) -> Option<&[u8]> {
        match &self.seal {
            AttestationSeal::Signed { signature } => Some(&signature.public_key),
            AttestationSeal::Mock { .. } => None,
        }
    }

    pub fn canonical_bytes(&self) -> Vec<u8> {
        attestation_bytes(&self.subject_id, &self.composite, self.issued_at_ms)
    }

    /// True only for a SIGNED attestation whose signature checks out under
    /// `trusted_key`
    pub fn is_authoritative(&self, trusted_key: Option<&[u8]>) -> bool {
        verify_attestation(self, trusted_key).authoritative
    }
}

/// Outcome of [`verify_attestation`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttestationCheck {
    pub valid: bool,
    pub signing_mode: SigningMode,
    pub authoritative: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Verify a SIGNED seal with Ed25519, or recompute a MOCK pseudo-signature.
/// Any change to subject_id, composite or issued_at_ms invalidates it.
///
/// A seal that verifies is only authoritative when it was made with
/// `trusted_key`. The key embedded in the seal proves nothing on its own.
pub fn verify_attestation(
    attestation: &Attestation,
    trusted_key: Option<&[u8]>,
) -> AttestationCheck {
    let signing_mode = attestation.signing_mode();
    let invalid = |reason: String| AttestationCheck {
        valid: false,
        signing_mode,
        authoritative: false,
        reason: Some(reason),
    };

    if !attestation.composite.is_well_formed() {
        return invalid("composite score is not well formed".to_string());
    }

    let bytes = attestation.canonical_bytes();
    match &attestation.seal {
        AttestationSeal::Signed { signature } => match CryptoEngine::verify(signature, &bytes) {
            Ok(true) if trusted_key == Some(signature.public_key.as_slice()) => AttestationCheck {
                valid: true,
                signing_mode,
                authoritative: true,
                reason: None,
            },
            Ok(true) => AttestationCheck {
                valid: true,
                signing_mode,
                authoritative: false,
                reason: Some("signed with a key this oracle does not trust".to_string()),
            },
            Ok(false) => invalid("signature does not match the record".to_string()),
            Err(e) => invalid(format!("{:#}", e)),
        },
        AttestationSeal::Mock {
            pseudo_signature, ..
        } => {
            if verify_mock_signature(&bytes, pseudo_signature) {
                AttestationCheck {
                    valid: true,
                    signing_mode,
                    authoritative: false,
                    reason: Some("mock attestation, not signed by the oracle".to_string()),
                }
            } else {
                invalid("pseudo-signature does not match the record".to_string())
            }
        }
    }
}

pub struct Attestor {
    signer: Arc<dyn AttestationSigner>,
    trusted_key: Option<Vec<u8>>,
    timeout: Duration,
}

impl Attestor {
    pub fn new(signer: Arc<dyn AttestationSigner>, timeout: Duration) -> Self {
        let trusted_key = signer.trusted_key();
        Self {
            signer,
            trusted_key,
            timeout,
        }
    }

    /// Key SIGNED attestations from this attestor are made with
    pub fn trusted_key(&self) -> Option<&[u8]> {
        self.trusted_key.as_deref()
    }

    /// [`verify_attestation`] against this attestor's trusted key
    pub fn verify(&self, attestation: &Attestation) -> AttestationCheck {
        verify_attestation(attestation, self.trusted_key())
    }

    pub async fn attest(
        &self,
        subject_id: &str,
        composite: &CompositeScore,
        signals: &[SignalResult],
    ) -> Attestation {
        self.attest_at(subject_id, composite, signals, Utc::now().timestamp_millis())
            .await
    }

    /// Attest with an explicit issue time
    pub async fn attest_at(
        &self,
        subject_id: &str,
        composite: &CompositeScore,
        signals: &[SignalResult],
        issued_at_ms: i64,
    ) -> Attestation {
        let bytes = attestation_bytes(subject_id, composite, issued_at_ms);

        let seal = match self.request_signature(&bytes).await {
            Ok(signature) => {
                info!(subject_id = %subject_id, "Attestation signed");
                AttestationSeal::Signed { signature }
            }
            Err(e) => {
                warn!(
                    subject_id = %subject_id,
                    error = %e,
                    "Signer unavailable, issuing MOCK attestation"
                );
                AttestationSeal::Mock {
                    pseudo_signature: mock_signature(&bytes),
                    reason: e.to_string(),
                }
            }
        };

        let mut evidence: BTreeMap<SignalCategory, Vec<String>> = BTreeMap::new();
        for signal in signals {
            evidence
                .entry(signal.category())
                .or_default()
                .extend(signal.evidence().iter().cloned());
        }

        Attestation {
            subject_id: subject_id.to_string(),
            composite: composite.clone(),
            evidence,
            issued_at_ms,
            seal,
        }
    }

    /// Ask the signer, then check what it returned against the bytes sent
    /// and the trusted key
    async fn request_signature(&self, bytes: &[u8]) -> Result<CryptoSignature, SignerError> {
        let Some(trusted_key) = self.trusted_key() else {
            return Err(SignerError::Unavailable(
                "signer has no trusted key".to_string(),
            ));
        };

        let signature = tokio::time::timeout(self.timeout, self.signer.sign(bytes))
            .await
            .map_err(|_| SignerError::Timeout(self.timeout.as_millis() as u64))??;

        if signature.public_key != trusted_key {
            return Err(SignerError::InvalidSignature(format!(
                "signed with untrusted key {}",
                hex::encode(&signature.public_key)
            )));
        }

        match CryptoEngine::verify(&signature, bytes) {
            Ok(true) => Ok(signature),
            Ok(false) => Err(SignerError::InvalidSignature(
                "signature does not verify under the returned key".to_string(),
            )),
            Err(e) => Err(SignerError::InvalidSignature(format!("{:#}", e))),
        }
    }
}
