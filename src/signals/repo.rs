//! Repository activity collector
//!
//! Scores how much of a repository the claimant actually wrote and how active
//! it has been recently:
//!
//! `score = round(0.6 * ownership_pct + 0.4 * min(100, recent_commits * 5))`

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use super::{Claim, Collector, SignalCategory, SignalResult};
use crate::error::CollectorError;

/// Points per commit in the last 30 days, before the cap at 100
const RECENT_COMMIT_POINTS: u64 = 5;

/// Stats returned by the repository-hosting API
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoStats {
    pub total_commits: u64,
    pub user_commits: u64,
    pub stars: u64,
    pub forks: u64,
    pub recent_commits_30d: u64,
    /// The credential's user owns or administers the repository. Recorded
    /// as evidence; the score only counts the user's own commits.
    #[serde(default)]
    pub controls_repository: bool,
}

impl RepoStats {
    /// Caller's share of all commits, 0-100. Zero when the repo has no commits.
    pub fn ownership_pct(&self) -> f64 {
        if self.total_commits == 0 {
            return 0.0;
        }
        let user = self.user_commits.min(self.total_commits);
        user as f64 / self.total_commits as f64 * 100.0
    }

    pub fn activity_points(&self) -> u64 {
        self.recent_commits_30d
            .saturating_mul(RECENT_COMMIT_POINTS)
            .min(100)
    }
}

/// Repository sub-score for the given stats
pub fn repo_score(stats: &RepoStats) -> u32 {
    let raw = 0.6 * stats.ownership_pct() + 0.4 * stats.activity_points() as f64;
    raw.round().clamp(0.0, 100.0) as u32
}

/// `GetRepoStats(repo_ref, credential)`. Fails with `NotFound` or
/// `Unauthorized`; anything else is `Unavailable`.
#[async_trait]
pub trait RepoStatsSource: Send + Sync {
    async fn get_repo_stats(
        &self,
        repo_ref: &str,
        credential: &str,
    ) -> Result<RepoStats, CollectorError>;
}

pub struct RepoActivityCollector {
    source: Arc<dyn RepoStatsSource>,
}

impl RepoActivityCollector {
    pub fn new(source: Arc<dyn RepoStatsSource>) -> Self {
        Self { source }
    }
}

#[async_trait]
impl Collector for RepoActivityCollector {
    fn category(&self) -> SignalCategory {
        SignalCategory::RepoActivity
    }

    async fn collect(&self, claim: &Claim) -> Result<SignalResult, CollectorError> {
        let Some(repo_ref) = claim.repo_ref.as_deref() else {
            return Ok(SignalResult::verified(
                SignalCategory::RepoActivity,
                0,
                vec!["no repository claimed".to_string()],
            ));
        };

        let credential = claim
            .repo_credential
            .as_deref()
            .filter(|c| !c.is_empty())
            .ok_or_else(|| {
                CollectorError::Unauthorized(format!("no credential supplied for {}", repo_ref))
            })?;

        let stats = self.source.get_repo_stats(repo_ref, credential).await?;
        let score = repo_score(&stats);

        if !stats.controls_repository {
            warn!(repo = %repo_ref, "Claimant neither owns nor administers the repository");
        }

        info!(
            repo = %repo_ref,
            controls_repository = stats.controls_repository,
            total_commits = stats.total_commits,
            user_commits = stats.user_commits,
            recent_commits = stats.recent_commits_30d,
            score,
            "Repository activity scored"
        );

        let evidence = vec![
            format!("repository: {}", repo_ref),
            if stats.controls_repository {
                "repository control: owner or admin".to_string()
            } else {
                "repository control: contributor only (not owner or admin)".to_string()
            },
            format!(
                "ownership: {}/{} commits ({:.1}%)",
                stats.user_commits.min(stats.total_commits),
                stats.total_commits,
                stats.ownership_pct()
            ),
            format!("recent commits (30d): {}", stats.recent_commits_30d),
            format!("stars: {}, forks: {}", stats.stars, stats.forks),
        ];

        Ok(SignalResult::verified(
            SignalCategory::RepoActivity,
            score,
            evidence,
        ))
    }
}
