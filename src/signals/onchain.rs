use async_trait::async_trait;

use super::{Claim, Collector, SignalCategory, SignalResult};
use crate::error::CollectorError;

/// Fixed on-chain score until a chain indexer is wired in
pub const ONCHAIN_PLACEHOLDER_SCORE: u32 = 75;

#[derive(Debug, Default, Clone, Copy)]
pub struct OnchainCollector;

impl OnchainCollector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Collector for OnchainCollector {
    fn category(&self) -> SignalCategory {
        SignalCategory::Onchain
    }

    async fn collect(&self, claim: &Claim) -> Result<SignalResult, CollectorError> {
        let mut evidence = vec!["placeholder score, on-chain history not yet indexed".to_string()];
        if let Some(reference) = claim.onchain_ref.as_deref() {
            evidence.push(format!("reference supplied: {}", reference));
        }
        Ok(SignalResult::placeholder(
            SignalCategory::Onchain,
            ONCHAIN_PLACEHOLDER_SCORE,
            evidence,
        ))
    }
}
