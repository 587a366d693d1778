//! Hackathon / event participation
//!
//! Nothing is checked against an event registry: a named event earns the score
//! on presence alone and every evidence line says so.

use async_trait::async_trait;

use super::{Claim, Collector, SignalCategory, SignalResult};
use crate::error::CollectorError;

pub const EVENT_PRESENT_SCORE: u32 = 70;

#[derive(Debug, Default, Clone, Copy)]
pub struct EventCollector;

impl EventCollector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Collector for EventCollector {
    fn category(&self) -> SignalCategory {
        SignalCategory::Event
    }

    async fn collect(&self, claim: &Claim) -> Result<SignalResult, CollectorError> {
        Ok(match claim.event_name_trimmed() {
            Some(name) => SignalResult::presence_only(
                SignalCategory::Event,
                EVENT_PRESENT_SCORE,
                vec![format!("participation claimed in {}", name)],
            ),
            None => SignalResult::verified(
                SignalCategory::Event,
                0,
                vec!["no event claimed".to_string()],
            ),
        })
    }
}
