//! Cryptographic utilities for the trust oracle
//!
//! - Canonical byte records for attestations and content hashes
//! - Ed25519 signing and verification
//! - Development pseudo-signatures for MOCK attestations
//! - Signer collaborators (local, remote, disabled)

pub mod canonical;
pub mod mock;
pub mod signer;
pub mod signing;

pub use canonical::{CanonicalWriter, attestation_bytes};
pub use mock::{mock_signature, verify_mock_signature};
pub use signer::{AttestationSigner, DisabledSigner, LocalSigner, RemoteSigner};
pub use signing::{CryptoEngine, CryptoSignature, KeyPair};
