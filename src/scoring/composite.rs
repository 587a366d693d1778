//! Composite trust score and risk tier

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::weights::{ScoreWeights, WEIGHT_SCALE};
use crate::error::ScoringError;
use crate::signals::{SignalCategory, SignalResult};

/// Risk classification, a pure function of the composite value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskTier {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskTier {
    /// `>= 80` LOW, `>= 60` MEDIUM, `>= 40` HIGH, else CRITICAL
    pub fn from_value(value: u8) -> Self {
        match value {
            80.. => RiskTier::Low,
            60..=79 => RiskTier::Medium,
            40..=59 => RiskTier::High,
            _ => RiskTier::Critical,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskTier::Low => "LOW",
            RiskTier::Medium => "MEDIUM",
            RiskTier::High => "HIGH",
            RiskTier::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Weighted score over all four categories
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositeScore {
    value: u8,
    breakdown: BTreeMap<SignalCategory, u8>,
    risk_tier: RiskTier,
    #[serde(default)]
    degraded: Vec<SignalCategory>,
}

impl CompositeScore {
    pub fn value(&self) -> u8 {
        self.value
    }

    /// Always holds all four categories
    pub fn breakdown(&self) -> &BTreeMap<SignalCategory, u8> {
        &self.breakdown
    }

    pub fn category_score(&self, category: SignalCategory) -> u8 {
        self.breakdown.get(&category).copied().unwrap_or(0)
    }

    pub fn risk_tier(&self) -> RiskTier {
        self.risk_tier
    }

    /// Categories whose source was unavailable or missing
    pub fn degraded(&self) -> &[SignalCategory] {
        &self.degraded
    }

    /// Structural checks a deserialized score must pass: every category
    /// present, every score in range, the tier matching the value.
    pub fn is_well_formed(&self) -> bool {
        self.value <= 100
            && SignalCategory::ALL
                .iter()
                .all(|c| self.breakdown.get(c).is_some_and(|s| *s <= 100))
            && self.breakdown.len() == SignalCategory::ALL.len()
            && self.risk_tier == RiskTier::from_value(self.value)
    }
}

/// Pure scorer over one set of signals
#[derive(Debug, Clone)]
pub struct CompositeScorer {
    weights: ScoreWeights,
}

impl CompositeScorer {
    pub fn new(weights: ScoreWeights) -> Result<Self, ScoringError> {
        weights.validate()?;
        Ok(Self { weights })
    }

    pub fn weights(&self) -> &ScoreWeights {
        &self.weights
    }

    /// `value = round(sum(weight[c] * breakdown[c]))`, half rounding up.
    /// Unavailable or missing categories count as 0 and are listed as
    /// degraded. Two signals for one category is an error.
    pub fn score(&self, signals: &[SignalResult]) -> Result<CompositeScore, ScoringError> {
        let mut seen: BTreeMap<SignalCategory, &SignalResult> = BTreeMap::new();
        for signal in signals {
            if seen.insert(signal.category(), signal).is_some() {
                return Err(ScoringError::DuplicateCategory(
                    signal.category().to_string(),
                ));
            }
        }

        let mut breakdown = BTreeMap::new();
        let mut degraded = Vec::new();
        let mut weighted: u64 = 0;

        for category in SignalCategory::ALL {
            let score = match seen.get(&category) {
                Some(signal) if signal.source_available() => signal.score().min(100),
                _ => {
                    degraded.push(category);
                    0
                }
            };
            breakdown.insert(category, score);
            weighted += self.weights.get(category) as u64 * score as u64;
        }

        let scale = WEIGHT_SCALE as u64;
        let value = ((weighted + scale / 2) / scale).min(100) as u8;

        Ok(CompositeScore {
            value,
            breakdown,
            risk_tier: RiskTier::from_value(value),
            degraded,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signals(repo: u32, doc: u32, event: u32, onchain: u32) -> Vec<SignalResult> {
        vec![
            SignalResult::verified(SignalCategory::RepoActivity, repo, vec![]),
            SignalResult::verified(SignalCategory::Document, doc, vec![]),
            SignalResult::presence_only(SignalCategory::Event, event, vec![]),
            SignalResult::placeholder(SignalCategory::Onchain, onchain, vec![]),
        ]
    }

    fn scorer() -> CompositeScorer {
        CompositeScorer::new(ScoreWeights::default()).unwrap()
    }

    #[test]
    fn test_tier_boundaries() {
        assert_eq!(RiskTier::from_value(100), RiskTier::Low);
        assert_eq!(RiskTier::from_value(80), RiskTier::Low);
        assert_eq!(RiskTier::from_value(79), RiskTier::Medium);
        assert_eq!(RiskTier::from_value(60), RiskTier::Medium);
        assert_eq!(RiskTier::from_value(59), RiskTier::High);
        assert_eq!(RiskTier::from_value(40), RiskTier::High);
        assert_eq!(RiskTier::from_value(39), RiskTier::Critical);
        assert_eq!(RiskTier::from_value(0), RiskTier::Critical);
    }

    #[test]
    fn test_worked_example() {
        // 0.3*44 + 0.1*0 + 0.4*70 + 0.2*75 = 56.2
        let composite = scorer().score(&signals(44, 0, 70, 75)).unwrap();
        assert_eq!(composite.value(), 56);
        assert_eq!(composite.risk_tier(), RiskTier::High);

        // With a document: +8 -> 64.2
        let composite = scorer().score(&signals(44, 80, 70, 75)).unwrap();
        assert_eq!(composite.value(), 64);
        assert_eq!(composite.risk_tier(), RiskTier::Medium);
        assert!(composite.degraded().is_empty());
    }

    #[test]
    fn test_half_rounds_up() {
        // 0.3*5 = 1.5 -> 2
        let composite = scorer().score(&signals(5, 0, 0, 0)).unwrap();
        assert_eq!(composite.value(), 2);
    }

    #[test]
    fn test_bounds() {
        assert_eq!(scorer().score(&signals(100, 100, 100, 100)).unwrap().value(), 100);
        assert_eq!(scorer().score(&signals(0, 0, 0, 0)).unwrap().value(), 0);
    }

    #[test]
    fn test_missing_and_unavailable_are_degraded() {
        let input = vec![
            SignalResult::verified(SignalCategory::RepoActivity, 90, vec![]),
            SignalResult::unavailable(SignalCategory::Event, "down"),
        ];
        let composite = scorer().score(&input).unwrap();
        assert_eq!(composite.breakdown().len(), 4);
        assert_eq!(composite.category_score(SignalCategory::Event), 0);
        assert_eq!(
            composite.degraded(),
            &[
                SignalCategory::Document,
                SignalCategory::Event,
                SignalCategory::Onchain
            ]
        );
        assert_eq!(composite.value(), 27);
    }

    #[test]
    fn test_duplicate_category() {
        let mut input = signals(10, 10, 10, 10);
        input.push(SignalResult::verified(SignalCategory::Document, 90, vec![]));
        assert!(matches!(
            scorer().score(&input),
            Err(ScoringError::DuplicateCategory(_))
        ));
    }

    #[test]
    fn test_deterministic() {
        let input = signals(44, 80, 70, 75);
        let first = scorer().score(&input).unwrap();
        for _ in 0..10 {
            assert_eq!(scorer().score(&input).unwrap(), first);
        }
    }

    #[test]
    fn test_well_formed_check() {
        let composite = scorer().score(&signals(44, 80, 70, 75)).unwrap();
        assert!(composite.is_well_formed());

        let mut json = serde_json::to_value(&composite).unwrap();
        json["risk_tier"] = serde_json::json!("LOW");
        let tampered: CompositeScore = serde_json::from_value(json).unwrap();
        assert!(!tampered.is_well_formed());
    }
}
