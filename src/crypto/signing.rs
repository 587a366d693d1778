use anyhow::{Context, Result};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub const ED25519: &str = "Ed25519";

/// Detached signature with the key that made it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CryptoSignature {
    #[serde(with = "hex::serde")]
    pub signature: Vec<u8>,
    #[serde(with = "hex::serde")]
    pub public_key: Vec<u8>,
    pub algorithm: String,
}

#[derive(Debug, Clone)]
pub struct KeyPair {
    pub public_key: VerifyingKey,
    pub secret_key: SigningKey,
}

/// Ed25519 engine holding the oracle's signing key
pub struct CryptoEngine {
    key_pair: KeyPair,
}

impl CryptoEngine {
    /// Fresh key from the OS RNG
    pub fn generate() -> Self {
        let mut csprng = OsRng;
        let mut secret_bytes: [u8; 32] = [0u8; 32];
        csprng.fill_bytes(&mut secret_bytes);
        Self::from_secret_bytes(&secret_bytes)
    }

    pub fn from_secret_bytes(secret_bytes: &[u8; 32]) -> Self {
        let secret_key = SigningKey::from_bytes(secret_bytes);
        let public_key = secret_key.verifying_key();
        Self {
            key_pair: KeyPair {
                public_key,
                secret_key,
            },
        }
    }

    /// Key from a 64-char hex secret
    pub fn from_secret_hex(secret_hex: &str) -> Result<Self> {
        let bytes = hex::decode(secret_hex.trim()).context("Signing key is not valid hex")?;
        let secret_bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| anyhow::anyhow!("Signing key must be 32 bytes"))?;
        Ok(Self::from_secret_bytes(&secret_bytes))
    }

    pub fn sign(&self, data: &[u8]) -> CryptoSignature {
        let signature = self.key_pair.secret_key.sign(data);

        CryptoSignature {
            signature: signature.to_bytes().to_vec(),
            public_key: self.key_pair.public_key.to_bytes().to_vec(),
            algorithm: ED25519.to_string(),
        }
    }

    /// Verify a signature against the public key it carries
    pub fn verify(signature: &CryptoSignature, data: &[u8]) -> Result<bool> {
        if signature.algorithm != ED25519 {
            return Err(anyhow::anyhow!(
                "Unsupported signature algorithm: {}",
                signature.algorithm
            ));
        }

        let public_key_bytes: [u8; 32] = signature
            .public_key
            .clone()
            .try_into()
            .map_err(|_| anyhow::anyhow!("Invalid public key length"))?;
        let public_key = VerifyingKey::from_bytes(&public_key_bytes)
            .map_err(|e| anyhow::anyhow!("Invalid public key: {}", e))?;

        let signature_bytes: [u8; 64] = signature
            .signature
            .clone()
            .try_into()
            .map_err(|_| anyhow::anyhow!("Invalid signature length"))?;
        let sig = Signature::from_bytes(&signature_bytes);

        Ok(public_key.verify(data, &sig).is_ok())
    }

    /// Hash data using SHA-256
    pub fn hash(data: &[u8]) -> [u8; 32] {
        Sha256::digest(data).into()
    }

    pub fn public_key(&self) -> VerifyingKey {
        self.key_pair.public_key
    }

    pub fn public_key_hex(&self) -> String {
        hex::encode(self.key_pair.public_key.to_bytes())
    }
}
