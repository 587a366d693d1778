//! Document authenticity collector
//!
//! Scores 80 when at least one claimed blob can be fetched with non-empty
//! content, 0 otherwise. Blobs the store does not know are excluded; only a
//! store that could not be reached for any blob makes the signal unavailable.

use async_trait::async_trait;
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, info};

use super::blob::BlobStore;
use super::{Claim, Collector, SignalCategory, SignalResult};
use crate::error::{BlobStoreError, CollectorError};

pub const DOCUMENT_ACCEPTED_SCORE: u32 = 80;

pub struct DocumentCollector {
    store: Arc<dyn BlobStore>,
}

impl DocumentCollector {
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Collector for DocumentCollector {
    fn category(&self) -> SignalCategory {
        SignalCategory::Document
    }

    async fn collect(&self, claim: &Claim) -> Result<SignalResult, CollectorError> {
        if claim.document_blob_ids.is_empty() {
            return Ok(SignalResult::verified(
                SignalCategory::Document,
                0,
                vec!["no documents supplied".to_string()],
            ));
        }

        let lookups = claim
            .document_blob_ids
            .iter()
            .map(|blob_id| async move { (blob_id, self.store.get_blob(blob_id).await) });
        let outcomes = join_all(lookups).await;

        let mut accepted = 0usize;
        let mut unreachable = 0usize;
        let mut last_unreachable = String::new();
        let mut evidence = Vec::with_capacity(outcomes.len());

        for (blob_id, outcome) in outcomes {
            match outcome {
                Ok(bytes) if !bytes.is_empty() => {
                    accepted += 1;
                    evidence.push(format!("blob {} accepted ({} bytes)", blob_id, bytes.len()));
                }
                Ok(_) => evidence.push(format!("blob {} excluded: empty content", blob_id)),
                Err(BlobStoreError::NotFound(_)) => {
                    evidence.push(format!("blob {} excluded: not found", blob_id))
                }
                Err(BlobStoreError::Rejected(reason)) => {
                    evidence.push(format!("blob {} excluded: {}", blob_id, reason))
                }
                Err(BlobStoreError::Unavailable(reason)) => {
                    debug!(blob_id = %blob_id, reason = %reason, "Blob store unreachable");
                    unreachable += 1;
                    last_unreachable = reason;
                    evidence.push(format!("blob {} could not be checked", blob_id));
                }
            }
        }

        if unreachable == claim.document_blob_ids.len() {
            return Err(CollectorError::Unavailable(format!(
                "blob store unreachable: {}",
                last_unreachable
            )));
        }

        let score = if accepted > 0 {
            DOCUMENT_ACCEPTED_SCORE
        } else {
            0
        };

        info!(
            accepted,
            claimed = claim.document_blob_ids.len(),
            score,
            "Documents checked"
        );

        Ok(SignalResult::verified(
            SignalCategory::Document,
            score,
            evidence,
        ))
    }
}
