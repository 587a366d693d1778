//! Category weighting policy
//!
//! Weights are stored as basis points (1/10 000) so that "sums to exactly 1.0"
//! and the weighted average are integer arithmetic with no float drift.

use serde::Serialize;

use crate::error::ScoringError;
use crate::signals::SignalCategory;

/// Basis points in a whole
pub const WEIGHT_SCALE: u32 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScoreWeights {
    repo_activity: u32,
    document: u32,
    event: u32,
    onchain: u32,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            repo_activity: 3_000,
            document: 1_000,
            event: 4_000,
            onchain: 2_000,
        }
    }
}

impl ScoreWeights {
    /// Weights in basis points. Must sum to [`WEIGHT_SCALE`].
    pub fn from_basis_points(
        repo_activity: u32,
        document: u32,
        event: u32,
        onchain: u32,
    ) -> Result<Self, ScoringError> {
        let weights = Self {
            repo_activity,
            document,
            event,
            onchain,
        };
        weights.validate()?;
        Ok(weights)
    }

    /// Weights as fractions of 1.0. Each must be a whole number of basis
    /// points and together they must sum to exactly 1.0.
    pub fn from_fractions(
        repo_activity: f64,
        document: f64,
        event: f64,
        onchain: f64,
    ) -> Result<Self, ScoringError> {
        Self::from_basis_points(
            to_basis_points(SignalCategory::RepoActivity, repo_activity)?,
            to_basis_points(SignalCategory::Document, document)?,
            to_basis_points(SignalCategory::Event, event)?,
            to_basis_points(SignalCategory::Onchain, onchain)?,
        )
    }

    pub fn validate(&self) -> Result<(), ScoringError> {
        let total: u64 = SignalCategory::ALL
            .iter()
            .map(|c| self.get(*c) as u64)
            .sum();
        if total != WEIGHT_SCALE as u64 {
            return Err(ScoringError::InvalidWeights(format!(
                "weights sum to {:.4}, expected 1.0",
                total as f64 / WEIGHT_SCALE as f64
            )));
        }
        Ok(())
    }

    /// Weight of `category` in basis points
    pub fn get(&self, category: SignalCategory) -> u32 {
        match category {
            SignalCategory::RepoActivity => self.repo_activity,
            SignalCategory::Document => self.document,
            SignalCategory::Event => self.event,
            SignalCategory::Onchain => self.onchain,
        }
    }

    pub fn fraction(&self, category: SignalCategory) -> f64 {
        self.get(category) as f64 / WEIGHT_SCALE as f64
    }
}

fn to_basis_points(category: SignalCategory, fraction: f64) -> Result<u32, ScoringError> {
    if !fraction.is_finite() || !(0.0..=1.0).contains(&fraction) {
        return Err(ScoringError::InvalidWeights(format!(
            "{} weight {} is outside [0, 1]",
            category, fraction
        )));
    }
    let scaled = fraction * WEIGHT_SCALE as f64;
    let points = scaled.round();
    if (scaled - points).abs() > 1e-6 {
        return Err(ScoringError::InvalidWeights(format!(
            "{} weight {} is finer than one basis point",
            category, fraction
        )));
    }
    Ok(points as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_weights_valid() {
        let weights = ScoreWeights::default();
        assert!(weights.validate().is_ok());
        assert_eq!(weights.get(SignalCategory::Event), 4_000);
        assert!((weights.fraction(SignalCategory::Document) - 0.1).abs() < f64::EPSILON);
    }

    #[test]
    fn test_fractions_match_defaults() {
        let weights = ScoreWeights::from_fractions(0.3, 0.1, 0.4, 0.2).unwrap();
        assert_eq!(weights, ScoreWeights::default());
    }

    #[test]
    fn test_sum_must_be_one() {
        assert!(matches!(
            ScoreWeights::from_fractions(0.3, 0.1, 0.4, 0.1),
            Err(ScoringError::InvalidWeights(_))
        ));
        assert!(ScoreWeights::from_basis_points(3_000, 1_000, 4_000, 2_001).is_err());
    }

    #[test]
    fn test_rejects_bad_fractions() {
        assert!(ScoreWeights::from_fractions(-0.1, 0.2, 0.5, 0.4).is_err());
        assert!(ScoreWeights::from_fractions(f64::NAN, 0.1, 0.4, 0.2).is_err());
        assert!(ScoreWeights::from_fractions(0.30005, 0.09995, 0.4, 0.2).is_err());
    }
}
