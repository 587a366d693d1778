use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

use crate::scoring::ScoreWeights;

/// Configuration for the trust oracle service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    /// Server configuration
    pub server: ServerConfig,
    /// Security configuration
    pub security: SecurityConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Stage timeouts and weighting policy
    pub pipeline: PipelineConfig,
    /// Repository-hosting API
    pub github: GithubConfig,
    /// Blob store for supporting documents
    pub blob_store: BlobStoreConfig,
    /// Attestation signer
    pub signer: SignerConfig,
    /// Ledger gateway
    pub ledger: LedgerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server host to bind to
    pub host: String,
    /// Server port to bind to
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Require HTTPS for all collaborator calls
    pub require_https: bool,
    /// Verify TLS certificates
    pub verify_certificates: bool,
    /// Enable API key authentication
    pub enable_auth: bool,
    /// Accepted API keys (never logged)
    #[serde(skip_serializing)]
    pub api_keys: Vec<String>,
    /// Rate limit per minute per IP
    pub rate_limit_per_minute: u32,
    /// Maximum JSON request body size in bytes
    pub max_request_size: usize,
    /// Extra collaborator hosts allowed besides the configured endpoints
    pub allowed_domains: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    pub level: String,
    /// Enable log sanitization to prevent sensitive data exposure
    pub sanitize_logs: bool,
    /// Enable request/response logging
    pub log_requests: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub collector_timeout_secs: u64,
    /// Bound on the whole collection stage
    pub collection_timeout_secs: u64,
    pub signer_timeout_secs: u64,
    pub ledger_timeout_secs: u64,
    /// How long settled submission records are kept in memory
    pub record_retention_secs: u64,
    pub weights: WeightsConfig,
}

/// Category weights as fractions of 1.0
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WeightsConfig {
    pub repo_activity: f64,
    pub document: f64,
    pub event: f64,
    pub onchain: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubConfig {
    pub api_base: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlobStoreConfig {
    /// Walrus publisher URL. `None` keeps documents in memory.
    pub publisher_url: Option<String>,
    /// Walrus aggregator URL
    pub aggregator_url: Option<String>,
    pub epochs: u32,
    pub max_document_bytes: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignerMode {
    /// In-process Ed25519 key
    Local,
    /// HTTP signing service
    Remote,
    /// No signer, every attestation is MOCK
    Disabled,
}

impl FromStr for SignerMode {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(SignerMode::Local),
            "remote" => Ok(SignerMode::Remote),
            "disabled" | "none" => Ok(SignerMode::Disabled),
            other => Err(anyhow::anyhow!("Unknown signer mode: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignerConfig {
    pub mode: SignerMode,
    /// Hex Ed25519 secret for local mode. Generated at startup when absent.
    #[serde(skip_serializing)]
    pub secret_key_hex: Option<String>,
    pub remote_url: Option<String>,
    #[serde(skip_serializing)]
    pub remote_api_key: Option<String>,
    /// Hex Ed25519 public key the remote signer must sign with
    pub public_key_hex: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Ledger gateway URL. `None` uses the in-memory ledger (dev mode).
    pub url: Option<String>,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8787,
            },
            security: SecurityConfig {
                require_https: true,
                verify_certificates: true,
                enable_auth: true,
                api_keys: Vec::new(), // MUST be configured when auth is enabled
                rate_limit_per_minute: 60,
                max_request_size: 1024 * 1024, // 1MB
                allowed_domains: Vec::new(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                sanitize_logs: true,
                log_requests: false, // Disabled by default for security
            },
            pipeline: PipelineConfig {
                collector_timeout_secs: 10,
                collection_timeout_secs: 15,
                signer_timeout_secs: 5,
                ledger_timeout_secs: 30,
                record_retention_secs: 24 * 60 * 60,
                weights: WeightsConfig {
                    repo_activity: 0.3,
                    document: 0.1,
                    event: 0.4,
                    onchain: 0.2,
                },
            },
            github: GithubConfig {
                api_base: "https://api.github.com".to_string(),
            },
            blob_store: BlobStoreConfig {
                publisher_url: None,
                aggregator_url: None,
                epochs: 5,
                max_document_bytes: 10 * 1024 * 1024,
            },
            signer: SignerConfig {
                mode: SignerMode::Local,
                secret_key_hex: None,
                remote_url: None,
                remote_api_key: None,
                public_key_hex: None,
            },
            ledger: LedgerConfig {
                url: None,
                api_key: None,
            },
        }
    }
}

fn parse_var<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("Invalid {} value: {}", name, e)),
        Err(_) => Ok(None),
    }
}

fn string_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn is_key_hex(key: &str) -> bool {
    key.len() == 64 && key.chars().all(|c| c.is_ascii_hexdigit())
}

fn list_var(name: &str) -> Option<Vec<String>> {
    string_var(name).map(|raw| {
        raw.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    })
}

impl OracleConfig {
    /// Load configuration from `TRUST_ORACLE_*` environment variables over the
    /// defaults, then validate it
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        // Server configuration
        if let Some(host) = string_var("TRUST_ORACLE_HOST") {
            config.server.host = host;
        }
        if let Some(port) = parse_var("TRUST_ORACLE_PORT")? {
            config.server.port = port;
        }

        // Security configuration
        if let Some(require_https) = parse_var("TRUST_ORACLE_REQUIRE_HTTPS")? {
            config.security.require_https = require_https;
        }
        if let Some(verify) = parse_var("TRUST_ORACLE_VERIFY_CERTIFICATES")? {
            config.security.verify_certificates = verify;
        }
        if let Some(enable_auth) = parse_var("TRUST_ORACLE_ENABLE_AUTH")? {
            config.security.enable_auth = enable_auth;
        }
        if let Some(keys) = list_var("TRUST_ORACLE_API_KEYS") {
            config.security.api_keys = keys;
        }
        if let Some(rate_limit) = parse_var("TRUST_ORACLE_RATE_LIMIT_PER_MINUTE")? {
            config.security.rate_limit_per_minute = rate_limit;
        }
        if let Some(size) = parse_var("TRUST_ORACLE_MAX_REQUEST_SIZE")? {
            config.security.max_request_size = size;
        }
        if let Some(domains) = list_var("TRUST_ORACLE_ALLOWED_DOMAINS") {
            config.security.allowed_domains = domains;
        }

        // Logging configuration
        if let Some(level) = string_var("TRUST_ORACLE_LOG_LEVEL") {
            config.logging.level = level;
        }
        if let Some(sanitize) = parse_var("TRUST_ORACLE_SANITIZE_LOGS")? {
            config.logging.sanitize_logs = sanitize;
        }
        if let Some(log_requests) = parse_var("TRUST_ORACLE_LOG_REQUESTS")? {
            config.logging.log_requests = log_requests;
        }

        // Pipeline configuration
        let pipeline = &mut config.pipeline;
        if let Some(secs) = parse_var("TRUST_ORACLE_COLLECTOR_TIMEOUT_SECS")? {
            pipeline.collector_timeout_secs = secs;
        }
        if let Some(secs) = parse_var("TRUST_ORACLE_COLLECTION_TIMEOUT_SECS")? {
            pipeline.collection_timeout_secs = secs;
        }
        if let Some(secs) = parse_var("TRUST_ORACLE_SIGNER_TIMEOUT_SECS")? {
            pipeline.signer_timeout_secs = secs;
        }
        if let Some(secs) = parse_var("TRUST_ORACLE_LEDGER_TIMEOUT_SECS")? {
            pipeline.ledger_timeout_secs = secs;
        }
        if let Some(secs) = parse_var("TRUST_ORACLE_RECORD_RETENTION_SECS")? {
            pipeline.record_retention_secs = secs;
        }
        if let Some(w) = parse_var("TRUST_ORACLE_WEIGHT_REPO")? {
            pipeline.weights.repo_activity = w;
        }
        if let Some(w) = parse_var("TRUST_ORACLE_WEIGHT_DOCUMENT")? {
            pipeline.weights.document = w;
        }
        if let Some(w) = parse_var("TRUST_ORACLE_WEIGHT_EVENT")? {
            pipeline.weights.event = w;
        }
        if let Some(w) = parse_var("TRUST_ORACLE_WEIGHT_ONCHAIN")? {
            pipeline.weights.onchain = w;
        }

        // Collaborators
        if let Some(api_base) = string_var("TRUST_ORACLE_GITHUB_API") {
            config.github.api_base = api_base;
        }
        config.blob_store.publisher_url = string_var("TRUST_ORACLE_WALRUS_PUBLISHER");
        config.blob_store.aggregator_url = string_var("TRUST_ORACLE_WALRUS_AGGREGATOR");
        if let Some(epochs) = parse_var("TRUST_ORACLE_WALRUS_EPOCHS")? {
            config.blob_store.epochs = epochs;
        }
        if let Some(max) = parse_var("TRUST_ORACLE_MAX_DOCUMENT_BYTES")? {
            config.blob_store.max_document_bytes = max;
        }

        if let Some(mode) = parse_var::<SignerMode>("TRUST_ORACLE_SIGNER_MODE")? {
            config.signer.mode = mode;
        }
        config.signer.secret_key_hex = string_var("TRUST_ORACLE_SIGNING_KEY");
        config.signer.remote_url = string_var("TRUST_ORACLE_SIGNER_URL");
        config.signer.remote_api_key = string_var("TRUST_ORACLE_SIGNER_API_KEY");
        config.signer.public_key_hex = string_var("TRUST_ORACLE_SIGNER_PUBLIC_KEY");

        config.ledger.url = string_var("TRUST_ORACLE_LEDGER_URL");
        config.ledger.api_key = string_var("TRUST_ORACLE_LEDGER_API_KEY");

        if config.ledger.url.is_none() {
            warn!("TRUST_ORACLE_LEDGER_URL not set, using in-memory ledger (not for production)");
        }
        if config.signer.mode == SignerMode::Local && config.signer.secret_key_hex.is_none() {
            warn!("TRUST_ORACLE_SIGNING_KEY not set, generating an ephemeral signing key");
        }

        config
            .validate()
            .context("Invalid trust oracle configuration")?;

        info!(
            host = %config.server.host,
            port = config.server.port,
            signer = ?config.signer.mode,
            "Configuration loaded"
        );

        Ok(config)
    }

    /// Validate configuration for security and consistency
    pub fn validate(&self) -> Result<()> {
        if self.server.host.is_empty() {
            return Err(anyhow::anyhow!("Server host cannot be empty"));
        }
        if self.server.port == 0 {
            return Err(anyhow::anyhow!("Server port must be non-zero"));
        }

        if self.security.enable_auth {
            if self.security.api_keys.is_empty() {
                return Err(anyhow::anyhow!(
                    "Authentication is enabled but TRUST_ORACLE_API_KEYS is empty"
                ));
            }
            if let Some(short) = self.security.api_keys.iter().find(|k| k.len() < 32) {
                return Err(anyhow::anyhow!(
                    "API key {} is too short (minimum 32 characters)",
                    mask_secret(short)
                ));
            }
        }

        let pipeline = &self.pipeline;
        for (name, secs) in [
            ("collector", pipeline.collector_timeout_secs),
            ("collection", pipeline.collection_timeout_secs),
            ("signer", pipeline.signer_timeout_secs),
            ("ledger", pipeline.ledger_timeout_secs),
        ] {
            if secs == 0 {
                return Err(anyhow::anyhow!("{} timeout must be non-zero", name));
            }
        }
        self.score_weights()
            .map_err(|e| anyhow::anyhow!("Invalid weights: {}", e))?;

        let mut urls: Vec<(&str, &str)> = vec![("GitHub API", self.github.api_base.as_str())];
        match (&self.blob_store.publisher_url, &self.blob_store.aggregator_url) {
            (Some(publisher), Some(aggregator)) => {
                urls.push(("Walrus publisher", publisher.as_str()));
                urls.push(("Walrus aggregator", aggregator.as_str()));
            }
            (None, None) => {}
            _ => {
                return Err(anyhow::anyhow!(
                    "Walrus publisher and aggregator URLs must be set together"
                ));
            }
        }
        if let Some(url) = &self.ledger.url {
            urls.push(("ledger", url.as_str()));
        }

        match self.signer.mode {
            SignerMode::Remote => {
                let url = self.signer.remote_url.as_deref().ok_or_else(|| {
                    anyhow::anyhow!("Remote signer mode requires TRUST_ORACLE_SIGNER_URL")
                })?;
                urls.push(("signer", url));
                let key = self.signer.public_key_hex.as_deref().ok_or_else(|| {
                    anyhow::anyhow!("Remote signer mode requires TRUST_ORACLE_SIGNER_PUBLIC_KEY")
                })?;
                if !is_key_hex(key) {
                    return Err(anyhow::anyhow!(
                        "Signer public key must be 64 hex characters (32 bytes)"
                    ));
                }
            }
            SignerMode::Local => {
                if let Some(key) = &self.signer.secret_key_hex
                    && !is_key_hex(key)
                {
                    return Err(anyhow::anyhow!(
                        "Signing key must be 64 hex characters (32 bytes)"
                    ));
                }
            }
            SignerMode::Disabled => {
                warn!("Signer disabled, every attestation will be MOCK");
            }
        }

        if self.security.require_https {
            for (name, url) in urls {
                if !url.starts_with("https://") {
                    return Err(anyhow::anyhow!(
                        "HTTPS is required but {} URL is not HTTPS: {}",
                        name,
                        url
                    ));
                }
            }
        }

        Ok(())
    }

    pub fn score_weights(&self) -> Result<ScoreWeights, crate::error::ScoringError> {
        let w = &self.pipeline.weights;
        ScoreWeights::from_fractions(w.repo_activity, w.document, w.event, w.onchain)
    }

    /// Hosts collaborator calls may reach: the configured endpoints plus any
    /// extra allowed domains
    pub fn collaborator_domains(&self) -> Vec<String> {
        let mut urls = vec![Some(self.github.api_base.as_str())];
        urls.push(self.blob_store.publisher_url.as_deref());
        urls.push(self.blob_store.aggregator_url.as_deref());
        urls.push(self.signer.remote_url.as_deref());
        urls.push(self.ledger.url.as_deref());

        let mut domains: Vec<String> = urls
            .into_iter()
            .flatten()
            .filter_map(|u| url::Url::parse(u).ok())
            .filter_map(|u| u.host_str().map(str::to_string))
            .chain(self.security.allowed_domains.iter().cloned())
            .collect();
        domains.sort();
        domains.dedup();
        domains
    }

    pub fn collector_timeout(&self) -> Duration {
        Duration::from_secs(self.pipeline.collector_timeout_secs)
    }

    pub fn collection_timeout(&self) -> Duration {
        Duration::from_secs(self.pipeline.collection_timeout_secs)
    }

    pub fn signer_timeout(&self) -> Duration {
        Duration::from_secs(self.pipeline.signer_timeout_secs)
    }

    pub fn ledger_timeout(&self) -> Duration {
        Duration::from_secs(self.pipeline.ledger_timeout_secs)
    }

    pub fn record_retention(&self) -> Duration {
        Duration::from_secs(self.pipeline.record_retention_secs)
    }
}

/// Sanitize sensitive data for logging
pub fn sanitize_for_logging(data: &str) -> String {
    // Common patterns for sensitive data
    let sensitive_patterns = [
        "auth",
        "key",
        "token",
        "password",
        "secret",
        "credential",
        "bearer",
        "ghp_",
        "github_pat_",
    ];

    let data_lower = data.to_lowercase();
    if sensitive_patterns.iter().any(|p| data_lower.contains(p)) {
        return mask_secret(data);
    }

    data.to_string()
}

/// Keep a few characters at each end, hide the rest
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    let keep = if chars.len() > 20 { 6 } else { 2.min(chars.len() / 2) };
    let head: String = chars[..keep].iter().collect();
    let tail: String = chars[chars.len() - keep..].iter().collect();
    format!("{}***{}", head, tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> OracleConfig {
        let mut config = OracleConfig::default();
        config.security.api_keys = vec!["k".repeat(40)];
        config
    }

    #[test]
    fn test_sanitize_for_logging() {
        // For strings <= 20 chars with sensitive pattern, show first 2 and last 2
        assert_eq!(sanitize_for_logging("api_key_secret"), "ap***et");
        assert_eq!(sanitize_for_logging("normal_data"), "normal_data");
        assert_eq!(
            sanitize_for_logging("ghp_abcdefghijklmnopqrstuvwxyz"),
            "ghp_ab***uvwxyz"
        );
    }

    #[test]
    fn test_mask_secret_is_char_safe() {
        assert_eq!(mask_secret("ü"), "***");
        assert_eq!(mask_secret("äöüß"), "äö***üß");
    }

    #[test]
    fn test_default_config_validation() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_auth_requires_keys() {
        let mut config = valid_config();
        config.security.api_keys.clear();
        assert!(config.validate().is_err());

        config.security.api_keys = vec!["short".into()];
        assert!(config.validate().is_err());

        config.security.enable_auth = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_bad_weights_rejected() {
        let mut config = valid_config();
        config.pipeline.weights.onchain = 0.25;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_https_required_for_collaborators() {
        let mut config = valid_config();
        config.ledger.url = Some("http://ledger.internal".into());
        assert!(config.validate().is_err());

        config.security.require_https = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_walrus_urls_set_together() {
        let mut config = valid_config();
        config.blob_store.publisher_url = Some("https://publisher.walrus.space".into());
        assert!(config.validate().is_err());
        config.blob_store.aggregator_url = Some("https://aggregator.walrus.space".into());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_remote_signer_needs_url_and_key() {
        let mut config = valid_config();
        config.signer.mode = SignerMode::Remote;
        assert!(config.validate().is_err());
        config.signer.remote_url = Some("https://signer.example.org".into());
        assert!(config.validate().is_err());
        config.signer.public_key_hex = Some("zz".repeat(32));
        assert!(config.validate().is_err());
        config.signer.public_key_hex = Some("ab".repeat(32));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_collaborator_domains() {
        let mut config = valid_config();
        config.ledger.url = Some("https://ledger.example.org/v1".into());
        config.security.allowed_domains = vec!["extra.example.org".into()];
        let domains = config.collaborator_domains();
        assert!(domains.contains(&"api.github.com".to_string()));
        assert!(domains.contains(&"ledger.example.org".to_string()));
        assert!(domains.contains(&"extra.example.org".to_string()));
    }

    #[test]
    fn test_signer_mode_parse() {
        assert_eq!("LOCAL".parse::<SignerMode>().unwrap(), SignerMode::Local);
        assert_eq!("none".parse::<SignerMode>().unwrap(), SignerMode::Disabled);
        assert!("hsm".parse::<SignerMode>().is_err());
    }
}
