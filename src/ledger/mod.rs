//! Append-only ledger collaborator
//!
//! `Submit(payload, nonce, content_hash) -> tx_id | rejection`. Timeouts are
//! applied by the caller, not by the client.
//!
//! ```text
//! ledger/
//! ├── memory.rs - in-process append-only ledger (dev mode, tests)
//! └── http.rs   - HTTP ledger gateway
//! ```

pub mod http;
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;
use crate::submission::{ContentHash, Nonce};

pub use http::HttpLedgerClient;
pub use memory::InMemoryLedger;

/// What gets anchored. The body is opaque to the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerPayload {
    pub subject_id: String,
    pub nonce: Nonce,
    pub content_hash: ContentHash,
    #[serde(with = "hex::serde")]
    pub body: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerReceipt {
    pub tx_id: String,
    #[serde(default = "Utc::now")]
    pub recorded_at: DateTime<Utc>,
}

#[async_trait]
pub trait LedgerClient: Send + Sync {
    async fn submit(&self, payload: &LedgerPayload) -> Result<LedgerReceipt, LedgerError>;
}
