//! Content-addressable blob storage for supporting documents
//!
//! `PutBlob(bytes) -> blob_id` and `GetBlob(blob_id) -> bytes`, plus the intake
//! checks documents pass before they are stored.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::api::http::{SecureHttpClient, join_url};
use crate::error::BlobStoreError;

/// Largest document accepted by intake
pub const DEFAULT_MAX_DOCUMENT_BYTES: usize = 10 * 1024 * 1024;

/// Storage epochs requested from the Walrus publisher
pub const DEFAULT_WALRUS_EPOCHS: u32 = 5;

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put_blob(&self, bytes: Vec<u8>) -> Result<String, BlobStoreError>;

    async fn get_blob(&self, blob_id: &str) -> Result<Vec<u8>, BlobStoreError>;
}

/// Blob store held in process memory. Ids are the hex SHA-256 of the content.
#[derive(Default)]
pub struct InMemoryBlobStore {
    blobs: DashMap<String, Vec<u8>>,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn put_blob(&self, bytes: Vec<u8>) -> Result<String, BlobStoreError> {
        let blob_id = hex::encode(Sha256::digest(&bytes));
        self.blobs.entry(blob_id.clone()).or_insert(bytes);
        Ok(blob_id)
    }

    async fn get_blob(&self, blob_id: &str) -> Result<Vec<u8>, BlobStoreError> {
        self.blobs
            .get(blob_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| BlobStoreError::NotFound(blob_id.to_string()))
    }
}

// ============================================================================
// Walrus
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WalrusStoreResponse {
    newly_created: Option<WalrusNewlyCreated>,
    already_certified: Option<WalrusAlreadyCertified>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WalrusNewlyCreated {
    blob_object: WalrusBlobObject,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WalrusBlobObject {
    blob_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WalrusAlreadyCertified {
    blob_id: String,
}

impl WalrusStoreResponse {
    fn into_blob_id(self) -> Option<String> {
        self.newly_created
            .map(|created| created.blob_object.blob_id)
            .or(self.already_certified.map(|certified| certified.blob_id))
    }
}

/// Walrus over HTTP: the publisher stores, the aggregator serves reads
pub struct WalrusBlobStore {
    http: SecureHttpClient,
    publisher_url: String,
    aggregator_url: String,
    epochs: u32,
}

impl WalrusBlobStore {
    pub fn new(
        http: SecureHttpClient,
        publisher_url: impl Into<String>,
        aggregator_url: impl Into<String>,
        epochs: u32,
    ) -> Self {
        Self {
            http,
            publisher_url: publisher_url.into(),
            aggregator_url: aggregator_url.into(),
            epochs,
        }
    }
}

#[async_trait]
impl BlobStore for WalrusBlobStore {
    async fn put_blob(&self, bytes: Vec<u8>) -> Result<String, BlobStoreError> {
        let url = join_url(
            &self.publisher_url,
            &format!("v1/blobs?epochs={}", self.epochs),
        );
        let reply = self
            .http
            .put_bytes(&url, bytes)
            .await
            .map_err(|e| BlobStoreError::Unavailable(format!("{:#}", e)))?;

        if !reply.is_success() {
            return Err(match reply.status {
                400..=499 => BlobStoreError::Rejected(format!(
                    "publisher returned {}: {}",
                    reply.status,
                    reply.snippet()
                )),
                status => BlobStoreError::Unavailable(format!("publisher returned {}", status)),
            });
        }

        let parsed: WalrusStoreResponse = reply
            .json()
            .map_err(|e| BlobStoreError::Unavailable(format!("{:#}", e)))?;
        let blob_id = parsed.into_blob_id().ok_or_else(|| {
            BlobStoreError::Unavailable("publisher response carried no blob id".to_string())
        })?;

        debug!(blob_id = %blob_id, "Stored blob on Walrus");
        Ok(blob_id)
    }

    async fn get_blob(&self, blob_id: &str) -> Result<Vec<u8>, BlobStoreError> {
        let url = join_url(&self.aggregator_url, &format!("v1/blobs/{}", blob_id));
        let reply = self
            .http
            .get(&url, None)
            .await
            .map_err(|e| BlobStoreError::Unavailable(format!("{:#}", e)))?;

        match reply.status {
            200..=299 => Ok(reply.body),
            404 => Err(BlobStoreError::NotFound(blob_id.to_string())),
            status => Err(BlobStoreError::Unavailable(format!(
                "aggregator returned {} for {}",
                status, blob_id
            ))),
        }
    }
}

// ============================================================================
// Intake
// ============================================================================

/// Proof that a document passed intake and was stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntakeReceipt {
    pub blob_id: String,
    /// Hex SHA-256 of the uploaded bytes
    pub sha256: String,
    pub size_bytes: usize,
    pub accepted_at: DateTime<Utc>,
}

/// Uploads documents after integrity checks
pub struct DocumentIntake {
    store: Arc<dyn BlobStore>,
    max_bytes: usize,
}

impl DocumentIntake {
    pub fn new(store: Arc<dyn BlobStore>, max_bytes: usize) -> Self {
        Self { store, max_bytes }
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    pub async fn submit(&self, bytes: Vec<u8>) -> Result<IntakeReceipt, BlobStoreError> {
        if bytes.is_empty() {
            return Err(BlobStoreError::Rejected("document is empty".to_string()));
        }
        if bytes.len() > self.max_bytes {
            warn!(
                size = bytes.len(),
                max = self.max_bytes,
                "Rejected oversized document"
            );
            return Err(BlobStoreError::Rejected(format!(
                "document is {} bytes, limit is {}",
                bytes.len(),
                self.max_bytes
            )));
        }

        let sha256 = hex::encode(Sha256::digest(&bytes));
        let size_bytes = bytes.len();
        let blob_id = self.store.put_blob(bytes).await?;

        info!(blob_id = %blob_id, size = size_bytes, sha256 = %sha256, "Document accepted");

        Ok(IntakeReceipt {
            blob_id,
            sha256,
            size_bytes,
            accepted_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_round_trip() {
        let store = InMemoryBlobStore::new();
        let id = store.put_blob(b"pitch deck".to_vec()).await.unwrap();
        assert_eq!(id.len(), 64);
        assert_eq!(store.get_blob(&id).await.unwrap(), b"pitch deck");

        // Same content, same id
        let again = store.put_blob(b"pitch deck".to_vec()).await.unwrap();
        assert_eq!(id, again);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_blob() {
        let store = InMemoryBlobStore::new();
        assert!(matches!(
            store.get_blob("does-not-exist").await,
            Err(BlobStoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_intake_checks() {
        let store = Arc::new(InMemoryBlobStore::new());
        let intake = DocumentIntake::new(store.clone(), 8);

        assert!(matches!(
            intake.submit(Vec::new()).await,
            Err(BlobStoreError::Rejected(_))
        ));
        assert!(matches!(
            intake.submit(vec![0u8; 9]).await,
            Err(BlobStoreError::Rejected(_))
        ));
        assert!(store.is_empty());

        let receipt = intake.submit(b"deck".to_vec()).await.unwrap();
        assert_eq!(receipt.size_bytes, 4);
        assert_eq!(receipt.sha256, receipt.blob_id);
    }

    #[test]
    fn test_walrus_response_shapes() {
        let created = r#"{"newlyCreated":{"blobObject":{"blobId":"abcDEF123_-xyz","size":4}}}"#;
        let parsed: WalrusStoreResponse = serde_json::from_str(created).unwrap();
        assert_eq!(parsed.into_blob_id().as_deref(), Some("abcDEF123_-xyz"));

        let certified = r#"{"alreadyCertified":{"blobId":"certified_blob_1","endEpoch":9}}"#;
        let parsed: WalrusStoreResponse = serde_json::from_str(certified).unwrap();
        assert_eq!(parsed.into_blob_id().as_deref(), Some("certified_blob_1"));
    }
}
