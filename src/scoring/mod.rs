//! Composite Scorer
//!
//! Pure and deterministic: the same four signals and weights always give the
//! same score, tier and report.

pub mod composite;
pub mod report;
pub mod weights;

pub use composite::{CompositeScore, CompositeScorer, RiskTier};
pub use report::{ConfidenceLevel, InvestmentReadiness, RiskReport};
pub use weights::{ScoreWeights, WEIGHT_SCALE};
