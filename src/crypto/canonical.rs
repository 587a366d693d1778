//! Canonical byte encoding for signed and hashed records
//!
//! Every variable-length field is written as a big-endian `u32` length
//! followed by its bytes, so no two distinct field sequences share an
//! encoding. Fixed-width integers are written big-endian without a prefix.
//!
//! Attestation record layout:
//!
//! ```text
//! "trust-oracle/attestation/v1"      domain tag (length-prefixed)
//! subject_id                         UTF-8
//! value                              decimal ASCII
//! risk_tier                          "LOW" | "MEDIUM" | "HIGH" | "CRITICAL"
//! repo_activity, document, event, onchain
//!                                    category name, then decimal score
//! issued_at_ms                       i64 BE
//! ```

use crate::scoring::CompositeScore;
use crate::signals::SignalCategory;

pub const ATTESTATION_DOMAIN: &str = "trust-oracle/attestation/v1";
pub const CONTENT_HASH_DOMAIN: &str = "trust-oracle/submission/v1";

#[derive(Debug, Default)]
pub struct CanonicalWriter {
    buf: Vec<u8>,
}

impl CanonicalWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        // Fields are bounded by input validation far below u32::MAX
        let len = u32::try_from(bytes.len()).unwrap_or(u32::MAX);
        self.buf.extend_from_slice(&len.to_be_bytes());
        self.buf.extend_from_slice(bytes);
        self
    }

    pub fn put_str(&mut self, value: &str) -> &mut Self {
        self.put_bytes(value.as_bytes())
    }

    /// Absent optional fields encode as the empty string
    pub fn put_opt_str(&mut self, value: Option<&str>) -> &mut Self {
        self.put_str(value.unwrap_or(""))
    }

    pub fn put_i64(&mut self, value: i64) -> &mut Self {
        self.buf.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub fn put_u128(&mut self, value: u128) -> &mut Self {
        self.buf.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}

/// The exact bytes an attestation signature covers
pub fn attestation_bytes(subject_id: &str, composite: &CompositeScore, issued_at_ms: i64) -> Vec<u8> {
    let mut writer = CanonicalWriter::new();
    writer
        .put_str(ATTESTATION_DOMAIN)
        .put_str(subject_id)
        .put_str(&composite.value().to_string())
        .put_str(composite.risk_tier().as_str());
    for category in SignalCategory::ALL {
        writer
            .put_str(category.as_str())
            .put_str(&composite.category_score(category).to_string());
    }
    writer.put_i64(issued_at_ms);
    writer.finish()
}
