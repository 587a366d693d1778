//! Pseudo-signatures for MOCK attestations
//!
//! HMAC-SHA256 under a key that is public by construction. Anyone can forge
//! one, so a MOCK seal only proves the record was not garbled in transit.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Well-known development key. Not a secret.
pub const DEV_MOCK_KEY: &[u8] = b"trust-oracle-development-mock-key";

pub const MOCK_ALGORITHM: &str = "HMAC-SHA256-DEV";

fn keyed_mac() -> HmacSha256 {
    HmacSha256::new_from_slice(DEV_MOCK_KEY).expect("HMAC-SHA256 accepts any key size")
}

pub fn mock_signature(data: &[u8]) -> Vec<u8> {
    let mut mac = keyed_mac();
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// Constant-time check of a pseudo-signature
pub fn verify_mock_signature(data: &[u8], signature: &[u8]) -> bool {
    let mut mac = keyed_mac();
    mac.update(data);
    mac.verify_slice(signature).is_ok()
}
