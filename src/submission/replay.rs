//! Replay guard fields
//!
//! A nonce is `(monotonic micros << 64) | random u64`. The content hash binds
//! it to the claim, so the ledger can refuse a content hash it has already
//! anchored while a fresh nonce always produces a fresh hash.

use chrono::Utc;
use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::crypto::CanonicalWriter;
use crate::crypto::canonical::CONTENT_HASH_DOMAIN;

/// 128-bit submission nonce. Serialized as 32 hex chars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Nonce(u128);

impl Nonce {
    pub fn from_u128(value: u128) -> Self {
        Self(value)
    }

    pub fn as_u128(&self) -> u128 {
        self.0
    }

    /// Time-derived high half
    pub fn time_part(&self) -> u64 {
        (self.0 >> 64) as u64
    }

    pub fn to_hex(&self) -> String {
        format!("{:032x}", self.0)
    }

    pub fn from_hex(text: &str) -> Option<Self> {
        if text.len() != 32 {
            return None;
        }
        u128::from_str_radix(text, 16).ok().map(Self)
    }
}

impl fmt::Display for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for Nonce {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Nonce {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Nonce::from_hex(&text)
            .ok_or_else(|| serde::de::Error::custom("nonce must be 32 hex characters"))
    }
}

/// Issues nonces whose high halves strictly increase within the process,
/// even if the wall clock stalls or steps back.
#[derive(Debug, Default)]
pub struct NonceGenerator {
    last_time_part: AtomicU64,
}

impl NonceGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self) -> Nonce {
        let now = Utc::now().timestamp_micros().max(0) as u64;
        let previous = self
            .last_time_part
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |prev| {
                Some(now.max(prev.saturating_add(1)))
            })
            .unwrap_or_else(|prev| prev);
        let time_part = now.max(previous.saturating_add(1));

        let random_part = OsRng.next_u64();
        Nonce(((time_part as u128) << 64) | random_part as u128)
    }
}

/// SHA-256 over the length-prefixed claim fields and the nonce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    pub fn compute(
        subject_id: &str,
        repo_ref: Option<&str>,
        event_name: Option<&str>,
        nonce: Nonce,
    ) -> Self {
        let mut writer = CanonicalWriter::new();
        writer
            .put_str(CONTENT_HASH_DOMAIN)
            .put_str(subject_id)
            .put_opt_str(repo_ref)
            .put_opt_str(event_name)
            .put_u128(nonce.as_u128());
        Self(Sha256::digest(writer.finish()).into())
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for ContentHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ContentHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        let bytes: [u8; 32] = hex::decode(&text)
            .ok()
            .and_then(|b| b.try_into().ok())
            .ok_or_else(|| serde::de::Error::custom("content hash must be 64 hex characters"))?;
        Ok(Self(bytes))
    }
}
