//! GitHub REST adapter for [`RepoStatsSource`]

use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::Deserialize;
use tracing::debug;

use super::repo::{RepoStats, RepoStatsSource};
use crate::api::http::{HttpReply, SecureHttpClient, join_url};
use crate::error::CollectorError;

pub const DEFAULT_GITHUB_API: &str = "https://api.github.com";

/// GitHub pages hold at most 100 items
const PAGE_SIZE: usize = 100;

/// Upper bound on pages fetched per listing
const MAX_PAGES: usize = 10;

#[derive(Debug, Deserialize)]
struct GithubUser {
    login: String,
}

#[derive(Debug, Deserialize)]
struct GithubRepo {
    #[serde(default)]
    stargazers_count: u64,
    #[serde(default)]
    forks_count: u64,
    #[serde(default)]
    owner: Option<GithubUser>,
    /// Only present when the request is authenticated
    #[serde(default)]
    permissions: Option<GithubPermissions>,
}

#[derive(Debug, Default, Deserialize)]
struct GithubPermissions {
    #[serde(default)]
    admin: bool,
}

impl GithubRepo {
    /// Owned by `login`, or administered by it
    fn controlled_by(&self, login: &str) -> bool {
        let owns = self
            .owner
            .as_ref()
            .is_some_and(|owner| owner.login.eq_ignore_ascii_case(login));
        owns || self.permissions.as_ref().is_some_and(|p| p.admin)
    }
}

#[derive(Debug, Deserialize)]
struct GithubContributor {
    #[serde(default)]
    login: Option<String>,
    contributions: u64,
}

pub struct GithubRepoClient {
    http: SecureHttpClient,
    api_base: String,
}

impl GithubRepoClient {
    pub fn new(http: SecureHttpClient, api_base: impl Into<String>) -> Self {
        Self {
            http,
            api_base: api_base.into(),
        }
    }

    async fn fetch(&self, path: &str, credential: &str) -> Result<HttpReply, CollectorError> {
        let url = join_url(&self.api_base, path);
        let reply = self
            .http
            .get(&url, Some(credential))
            .await
            .map_err(|e| CollectorError::Unavailable(format!("{:#}", e)))?;
        check_status(&reply, path)?;
        Ok(reply)
    }

    async fn fetch_json<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        credential: &str,
    ) -> Result<T, CollectorError> {
        let reply = self.fetch(path, credential).await?;
        reply
            .json()
            .map_err(|e| CollectorError::Unavailable(format!("{}: {:#}", path, e)))
    }

    async fn contributors(
        &self,
        repo_ref: &str,
        credential: &str,
    ) -> Result<Vec<GithubContributor>, CollectorError> {
        let mut all = Vec::new();
        for page in 1..=MAX_PAGES {
            let path = format!(
                "repos/{}/contributors?per_page={}&page={}&anon=1",
                repo_ref, PAGE_SIZE, page
            );
            // An empty repository answers 204 with no body
            let reply = self.fetch(&path, credential).await?;
            if reply.status == 204 || reply.body.is_empty() {
                break;
            }
            let batch: Vec<GithubContributor> = reply
                .json()
                .map_err(|e| CollectorError::Unavailable(format!("{}: {:#}", path, e)))?;
            let done = batch.len() < PAGE_SIZE;
            all.extend(batch);
            if done {
                break;
            }
        }
        Ok(all)
    }

    async fn recent_commits(
        &self,
        repo_ref: &str,
        login: &str,
        credential: &str,
    ) -> Result<u64, CollectorError> {
        let since = Utc::now() - Duration::days(30);
        let mut count = 0u64;
        for page in 1..=MAX_PAGES {
            let path = commits_path(repo_ref, login, since, page);
            let batch: Vec<serde_json::Value> = self.fetch_json(&path, credential).await?;
            count += batch.len() as u64;
            if batch.len() < PAGE_SIZE {
                break;
            }
        }
        Ok(count)
    }
}

#[async_trait]
impl RepoStatsSource for GithubRepoClient {
    async fn get_repo_stats(
        &self,
        repo_ref: &str,
        credential: &str,
    ) -> Result<RepoStats, CollectorError> {
        let user: GithubUser = self.fetch_json("user", credential).await?;
        let repo: GithubRepo = self
            .fetch_json(&format!("repos/{}", repo_ref), credential)
            .await?;
        let contributors = self.contributors(repo_ref, credential).await?;

        let total_commits = contributors.iter().map(|c| c.contributions).sum();
        let user_commits = contributors
            .iter()
            .filter(|c| {
                c.login
                    .as_deref()
                    .is_some_and(|login| login.eq_ignore_ascii_case(&user.login))
            })
            .map(|c| c.contributions)
            .sum();
        let recent_commits_30d = self.recent_commits(repo_ref, &user.login, credential).await?;
        let controls_repository = repo.controlled_by(&user.login);

        debug!(
            repo = %repo_ref,
            login = %user.login,
            controls_repository,
            total_commits,
            user_commits,
            recent_commits_30d,
            "Fetched GitHub repository stats"
        );

        Ok(RepoStats {
            total_commits,
            user_commits,
            stars: repo.stargazers_count,
            forks: repo.forks_count,
            recent_commits_30d,
            controls_repository,
        })
    }
}

/// Commit listing for one author since a point in time. GitHub wants
/// `YYYY-MM-DDTHH:MM:SSZ`; an offset like `+00:00` would decode as a space.
fn commits_path(repo_ref: &str, login: &str, since: DateTime<Utc>, page: usize) -> String {
    format!(
        "repos/{}/commits?author={}&since={}&per_page={}&page={}",
        repo_ref,
        login,
        since.to_rfc3339_opts(SecondsFormat::Secs, true),
        PAGE_SIZE,
        page
    )
}

fn check_status(reply: &HttpReply, path: &str) -> Result<(), CollectorError> {
    match reply.status {
        200..=299 => Ok(()),
        404 => Err(CollectorError::NotFound(path.to_string())),
        401 | 403 => Err(CollectorError::Unauthorized(format!(
            "GitHub returned {} for {}",
            reply.status, path
        ))),
        status => Err(CollectorError::Unavailable(format!(
            "GitHub returned {} for {}: {}",
            status,
            path,
            reply.snippet()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply(status: u16) -> HttpReply {
        HttpReply {
            status,
            body: Vec::new(),
        }
    }

    #[test]
    fn test_status_mapping() {
        assert!(check_status(&reply(200), "user").is_ok());
        assert!(matches!(
            check_status(&reply(404), "repos/a/b"),
            Err(CollectorError::NotFound(_))
        ));
        assert!(matches!(
            check_status(&reply(401), "user"),
            Err(CollectorError::Unauthorized(_))
        ));
        assert!(matches!(
            check_status(&reply(403), "user"),
            Err(CollectorError::Unauthorized(_))
        ));
        assert!(matches!(
            check_status(&reply(502), "user"),
            Err(CollectorError::Unavailable(_))
        ));
    }

    #[test]
    fn test_commits_since_survives_query_decoding() {
        let since = DateTime::parse_from_rfc3339("2026-09-19T01:56:09.726722384+00:00")
            .unwrap()
            .with_timezone(&Utc);
        let path = commits_path("acme/core", "alice", since, 2);
        let url = url::Url::parse(&join_url(DEFAULT_GITHUB_API, &path)).unwrap();

        let decoded = url
            .query_pairs()
            .find(|(key, _)| key == "since")
            .map(|(_, value)| value.into_owned())
            .unwrap();
        assert_eq!(decoded, "2026-09-19T01:56:09Z");
        assert!(url.query_pairs().any(|(k, v)| k == "author" && v == "alice"));
        assert!(url.query_pairs().any(|(k, v)| k == "page" && v == "2"));
    }

    #[test]
    fn test_repository_control() {
        let owned: GithubRepo = serde_json::from_str(
            r#"{"stargazers_count":5,"forks_count":1,"owner":{"login":"Alice"}}"#,
        )
        .unwrap();
        assert!(owned.controlled_by("alice"));
        assert!(!owned.controlled_by("mallory"));

        let administered: GithubRepo = serde_json::from_str(
            r#"{"owner":{"login":"acme-org"},"permissions":{"admin":true,"push":true}}"#,
        )
        .unwrap();
        assert!(administered.controlled_by("alice"));

        let contributor: GithubRepo = serde_json::from_str(
            r#"{"owner":{"login":"acme-org"},"permissions":{"admin":false,"push":true}}"#,
        )
        .unwrap();
        assert!(!contributor.controlled_by("alice"));

        let bare: GithubRepo = serde_json::from_str("{}").unwrap();
        assert!(!bare.controlled_by("alice"));
    }

    #[test]
    fn test_contributor_decoding() {
        let body = r#"[{"login":"alice","contributions":40},{"contributions":3,"type":"Anonymous"}]"#;
        let parsed: Vec<GithubContributor> = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[1].login, None);
        assert_eq!(parsed.iter().map(|c| c.contributions).sum::<u64>(), 43);
    }
}
