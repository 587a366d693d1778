//! Advisory risk report
//!
//! Derived from a finished [`CompositeScore`] and the signals behind it. Never
//! feeds back into the score.

use serde::{Deserialize, Serialize};

use super::composite::CompositeScore;
use crate::signals::{SignalCategory, SignalResult};

/// Category scores below this are risk factors
const RISK_FACTOR_BELOW: u8 = 50;
/// Category scores at or above this are positive factors
const POSITIVE_FACTOR_FROM: u8 = 80;
/// Largest acceptable gap between best and worst category
const CONSISTENCY_SPREAD: u8 = 40;
/// Fraud likelihood above which the report carries a critical factor
const FRAUD_ALERT_ABOVE: u8 = 70;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfidenceLevel {
    High,
    Medium,
    Low,
}

impl ConfidenceLevel {
    /// From the population variance of the category scores around the
    /// composite value
    fn from_variance(variance: f64) -> Self {
        if variance < 100.0 {
            ConfidenceLevel::High
        } else if variance < 400.0 {
            ConfidenceLevel::Medium
        } else {
            ConfidenceLevel::Low
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvestmentReadiness {
    Ready,
    NearlyReady,
    NotReady,
    NotSuitable,
}

impl InvestmentReadiness {
    pub fn from_value(value: u8) -> Self {
        match value {
            75.. => InvestmentReadiness::Ready,
            60..=74 => InvestmentReadiness::NearlyReady,
            40..=59 => InvestmentReadiness::NotReady,
            _ => InvestmentReadiness::NotSuitable,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskFactor {
    pub area: String,
    pub severity: Severity,
    pub description: String,
    pub recommendation: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositiveFactor {
    pub area: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecommendedAction {
    pub priority: Severity,
    pub action: String,
    pub expected_impact: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskReport {
    pub confidence: ConfidenceLevel,
    pub investment_readiness: InvestmentReadiness,
    /// 0-100, higher is worse
    pub fraud_likelihood: u8,
    pub score_spread: u8,
    pub risk_factors: Vec<RiskFactor>,
    pub positive_factors: Vec<PositiveFactor>,
    pub recommended_actions: Vec<RecommendedAction>,
}

impl RiskReport {
    pub fn build(composite: &CompositeScore, signals: &[SignalResult]) -> Self {
        let value = composite.value();
        let scores: Vec<u8> = SignalCategory::ALL
            .iter()
            .map(|c| composite.category_score(*c))
            .collect();

        let variance = scores
            .iter()
            .map(|s| (*s as f64 - value as f64).powi(2))
            .sum::<f64>()
            / scores.len() as f64;
        let confidence = ConfidenceLevel::from_variance(variance);

        let max = scores.iter().copied().max().unwrap_or(0);
        let min = scores.iter().copied().min().unwrap_or(0);
        let score_spread = max - min;

        let mut risk_factors = Vec::new();
        let mut positive_factors = Vec::new();

        for category in SignalCategory::ALL {
            let score = composite.category_score(category);
            let (area, weak, strong, fix, severity) = category_text(category);
            if composite.degraded().contains(&category) {
                risk_factors.push(RiskFactor {
                    area: area.to_string(),
                    severity: Severity::High,
                    description: format!("{} source was unavailable, scored as 0", area),
                    recommendation: "Re-run the analysis once the source is reachable".to_string(),
                });
            } else if score < RISK_FACTOR_BELOW {
                risk_factors.push(RiskFactor {
                    area: area.to_string(),
                    severity,
                    description: weak.to_string(),
                    recommendation: fix.to_string(),
                });
            } else if score >= POSITIVE_FACTOR_FROM {
                positive_factors.push(PositiveFactor {
                    area: area.to_string(),
                    description: strong.to_string(),
                });
            }
        }

        if signals.iter().any(SignalResult::is_presence_only) {
            risk_factors.push(RiskFactor {
                area: "Verification".to_string(),
                severity: Severity::Medium,
                description: "Some evidence was accepted on presence alone".to_string(),
                recommendation: "Confirm event participation with the organiser".to_string(),
            });
        }

        if score_spread > CONSISTENCY_SPREAD {
            risk_factors.push(RiskFactor {
                area: "Score Consistency".to_string(),
                severity: Severity::Medium,
                description: "Significant variance between evaluation categories".to_string(),
                recommendation: "Investigate discrepancies in performance across areas"
                    .to_string(),
            });
        }

        let fraud_likelihood = fraud_likelihood(composite);
        if fraud_likelihood > FRAUD_ALERT_ABOVE {
            risk_factors.push(RiskFactor {
                area: "Fraud Detection".to_string(),
                severity: Severity::Critical,
                description: "High likelihood of fraudulent activity".to_string(),
                recommendation: "Do not invest before a thorough investigation".to_string(),
            });
        }

        let recommended_actions = recommendations(value, confidence, &risk_factors);

        Self {
            confidence,
            investment_readiness: InvestmentReadiness::from_value(value),
            fraud_likelihood,
            score_spread,
            risk_factors,
            positive_factors,
            recommended_actions,
        }
    }
}

/// (area, weak, strong, recommendation, severity when weak)
fn category_text(
    category: SignalCategory,
) -> (&'static str, &'static str, &'static str, &'static str, Severity) {
    match category {
        SignalCategory::RepoActivity => (
            "Code Activity",
            "Limited development activity or low ownership of the repository",
            "Active development by the claimant",
            "Review the repository and request a code audit",
            Severity::Medium,
        ),
        SignalCategory::Document => (
            "Documentation",
            "Incomplete or missing supporting documents",
            "Supporting documents on record",
            "Request an updated pitch deck and whitepaper",
            Severity::High,
        ),
        SignalCategory::Event => (
            "Event Participation",
            "No event participation claimed",
            "Event participation claimed",
            "Provide proof of hackathon or accelerator participation",
            Severity::Medium,
        ),
        SignalCategory::Onchain => (
            "On-chain Activity",
            "Limited on-chain activity",
            "Healthy on-chain presence",
            "Verify team wallets and transaction history",
            Severity::High,
        ),
    }
}

fn fraud_likelihood(composite: &CompositeScore) -> u8 {
    let mut likelihood = 0u8;
    if composite.category_score(SignalCategory::Document) < 30 {
        likelihood += 30;
    }
    if composite.category_score(SignalCategory::Onchain) < 20 {
        likelihood += 40;
    }
    if composite.category_score(SignalCategory::RepoActivity) < 20 {
        likelihood += 30;
    }
    likelihood.min(100)
}

fn recommendations(
    value: u8,
    confidence: ConfidenceLevel,
    risk_factors: &[RiskFactor],
) -> Vec<RecommendedAction> {
    let has_factor = |area: &str| risk_factors.iter().any(|f| f.area == area);
    let mut actions = Vec::new();

    if value < 80 {
        actions.push(RecommendedAction {
            priority: Severity::High,
            action: "Improve overall documentation and transparency".to_string(),
            expected_impact: "Increase trust score by 10-15 points".to_string(),
        });
    }
    if has_factor("On-chain Activity") {
        actions.push(RecommendedAction {
            priority: Severity::High,
            action: "Increase on-chain activity and provide transaction transparency".to_string(),
            expected_impact: "Reduce fraud risk and improve credibility".to_string(),
        });
    }
    if has_factor("Code Activity") {
        actions.push(RecommendedAction {
            priority: Severity::Medium,
            action: "Improve code quality, testing and documentation".to_string(),
            expected_impact: "Increase technical credibility".to_string(),
        });
    }
    if confidence == ConfidenceLevel::Low {
        actions.push(RecommendedAction {
            priority: Severity::Medium,
            action: "Balance performance across all evaluation areas".to_string(),
            expected_impact: "Increase investor confidence".to_string(),
        });
    }
    actions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::{CompositeScorer, ScoreWeights};

    fn report_for(signals: Vec<SignalResult>) -> RiskReport {
        let composite = CompositeScorer::new(ScoreWeights::default())
            .unwrap()
            .score(&signals)
            .unwrap();
        RiskReport::build(&composite, &signals)
    }

    #[test]
    fn test_readiness_thresholds() {
        assert_eq!(InvestmentReadiness::from_value(75), InvestmentReadiness::Ready);
        assert_eq!(InvestmentReadiness::from_value(74), InvestmentReadiness::NearlyReady);
        assert_eq!(InvestmentReadiness::from_value(40), InvestmentReadiness::NotReady);
        assert_eq!(InvestmentReadiness::from_value(39), InvestmentReadiness::NotSuitable);
    }

    #[test]
    fn test_strong_profile() {
        let report = report_for(vec![
            SignalResult::verified(SignalCategory::RepoActivity, 90, vec![]),
            SignalResult::verified(SignalCategory::Document, 80, vec![]),
            SignalResult::verified(SignalCategory::Event, 85, vec![]),
            SignalResult::verified(SignalCategory::Onchain, 90, vec![]),
        ]);
        assert_eq!(report.confidence, ConfidenceLevel::High);
        assert_eq!(report.investment_readiness, InvestmentReadiness::Ready);
        assert!(report.risk_factors.is_empty());
        assert_eq!(report.positive_factors.len(), 4);
        assert_eq!(report.fraud_likelihood, 0);
    }

    #[test]
    fn test_weak_profile_flags_everything() {
        let report = report_for(vec![
            SignalResult::verified(SignalCategory::RepoActivity, 10, vec![]),
            SignalResult::verified(SignalCategory::Document, 0, vec![]),
            SignalResult::presence_only(SignalCategory::Event, 70, vec!["x".into()]),
            SignalResult::unavailable(SignalCategory::Onchain, "down"),
        ]);
        assert_eq!(report.fraud_likelihood, 100);
        assert!(report.risk_factors.iter().any(|f| f.area == "Fraud Detection"));
        assert!(report.risk_factors.iter().any(|f| f.area == "Verification"));
        assert!(report.risk_factors.iter().any(|f| f.area == "Score Consistency"));
        assert!(
            report
                .risk_factors
                .iter()
                .any(|f| f.description.contains("unavailable"))
        );
        assert!(!report.recommended_actions.is_empty());
    }
}
