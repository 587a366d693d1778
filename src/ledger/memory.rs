//! In-memory ledger
//!
//! Append-only log with a content-hash index. Used when no ledger gateway is
//! configured (dev mode) and by tests.

use async_trait::async_trait;
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::{LedgerClient, LedgerPayload, LedgerReceipt};
use crate::error::LedgerError;
use crate::submission::ContentHash;

#[derive(Debug, Clone)]
pub struct LedgerEntry {
    pub sequence: u64,
    pub tx_id: String,
    pub payload: LedgerPayload,
    pub receipt: LedgerReceipt,
}

#[derive(Debug, Default)]
struct LedgerState {
    log: Vec<LedgerEntry>,
    by_content_hash: HashMap<ContentHash, usize>,
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryLedger {
    state: Arc<RwLock<LedgerState>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        info!("Initializing in-memory ledger (dev mode)");
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.log.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.log.is_empty()
    }

    pub async fn get(&self, content_hash: &ContentHash) -> Option<LedgerEntry> {
        let state = self.state.read().await;
        state
            .by_content_hash
            .get(content_hash)
            .and_then(|index| state.log.get(*index))
            .cloned()
    }

    pub async fn entries(&self) -> Vec<LedgerEntry> {
        self.state.read().await.log.clone()
    }
}

#[async_trait]
impl LedgerClient for InMemoryLedger {
    async fn submit(&self, payload: &LedgerPayload) -> Result<LedgerReceipt, LedgerError> {
        let mut state = self.state.write().await;

        if state.by_content_hash.contains_key(&payload.content_hash) {
            debug!(
                content_hash = %payload.content_hash,
                "Rejecting duplicate content hash"
            );
            return Err(LedgerError::DuplicateContentHash);
        }

        let sequence = state.log.len() as u64;
        let tx_id = compute_tx_id(&payload.content_hash, sequence);
        let receipt = LedgerReceipt {
            tx_id: tx_id.clone(),
            recorded_at: Utc::now(),
        };

        let index = state.log.len();
        state.log.push(LedgerEntry {
            sequence,
            tx_id: tx_id.clone(),
            payload: payload.clone(),
            receipt: receipt.clone(),
        });
        state.by_content_hash.insert(payload.content_hash, index);

        info!(
            subject_id = %payload.subject_id,
            tx_id = %tx_id,
            sequence,
            "Anchored submission (in-memory)"
        );

        Ok(receipt)
    }
}

fn compute_tx_id(content_hash: &ContentHash, sequence: u64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content_hash.as_bytes());
    hasher.update(sequence.to_be_bytes());
    let hash = hasher.finalize();
    format!("0x{}", hex::encode(&hash[..16]))
}
