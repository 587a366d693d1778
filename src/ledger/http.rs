use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::{LedgerClient, LedgerPayload, LedgerReceipt};
use crate::api::http::{HttpReply, SecureHttpClient, join_url};
use crate::error::LedgerError;

#[derive(Debug, Deserialize)]
struct GatewayRejection {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    reason: Option<String>,
}

const DUPLICATE_CODE: &str = "duplicate_content_hash";

/// Ledger gateway over HTTP: `POST {base}/submissions`
pub struct HttpLedgerClient {
    http: SecureHttpClient,
    base_url: String,
    api_key: Option<String>,
}

impl HttpLedgerClient {
    pub fn new(http: SecureHttpClient, base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            api_key,
        }
    }
}

#[async_trait]
impl LedgerClient for HttpLedgerClient {
    async fn submit(&self, payload: &LedgerPayload) -> Result<LedgerReceipt, LedgerError> {
        let url = join_url(&self.base_url, "submissions");
        self.http
            .validate_url(&url)
            .map_err(|e| LedgerError::Unavailable(format!("{:#}", e)))?;

        let reply = self
            .http
            .post_json(&url, payload, self.api_key.as_deref())
            .await
            .map_err(map_transport_error)?;

        debug!(
            subject_id = %payload.subject_id,
            status = reply.status,
            "Ledger gateway answered"
        );
        map_reply(reply)
    }
}

/// Connect and request-building failures never reach the gateway. Anything
/// later (timeouts, broken or oversized bodies) may have been applied.
fn map_transport_error(err: anyhow::Error) -> LedgerError {
    let never_sent = err
        .chain()
        .find_map(|cause| cause.downcast_ref::<reqwest::Error>())
        .is_some_and(|e| e.is_connect() || e.is_builder());
    if never_sent {
        LedgerError::Unavailable(format!("{:#}", err))
    } else {
        LedgerError::OutcomeUnknown(format!("{:#}", err))
    }
}

fn map_reply(reply: HttpReply) -> Result<LedgerReceipt, LedgerError> {
    if reply.is_success() {
        return reply
            .json()
            .map_err(|e| LedgerError::OutcomeUnknown(format!("unreadable receipt: {:#}", e)));
    }

    let rejection: Option<GatewayRejection> = reply.json().ok();
    let is_duplicate = reply.status == 409
        || rejection
            .as_ref()
            .and_then(|r| r.code.as_deref())
            .is_some_and(|code| code == DUPLICATE_CODE);
    if is_duplicate {
        return Err(LedgerError::DuplicateContentHash);
    }

    let reason = rejection
        .and_then(|r| r.reason)
        .unwrap_or_else(|| reply.snippet());
    match reply.status {
        400..=499 => Err(LedgerError::Rejected(reason)),
        // the gateway gave up waiting on the ledger, which may still apply it
        504 => Err(LedgerError::OutcomeUnknown(format!("gateway timed out: {}", reason))),
        status => Err(LedgerError::Unavailable(format!(
            "gateway returned {}: {}",
            status, reason
        ))),
    }
}
