use anyhow::{Context, Result};
use reqwest::{Client, RequestBuilder};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Security requirements for outbound calls to collaborators
#[derive(Debug, Clone)]
pub struct HttpSecurityConfig {
    /// Require HTTPS for all external communications
    pub require_https: bool,
    /// Verify TLS certificates
    pub verify_certificates: bool,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Maximum response size in bytes
    pub max_response_size: usize,
    /// Allowed collaborator domains (empty = any host)
    pub allowed_domains: Vec<String>,
}

impl Default for HttpSecurityConfig {
    fn default() -> Self {
        Self {
            require_https: true,
            verify_certificates: true,
            timeout_secs: 10,
            max_response_size: 10 * 1024 * 1024, // 10MB max
            allowed_domains: vec![
                "api.github.com".to_string(),
                "walrus.space".to_string(),
            ],
        }
    }
}

/// Raw reply from a collaborator. Non-2xx statuses are returned, not turned
/// into errors, so adapters can map them onto their own taxonomy.
#[derive(Debug, Clone)]
pub struct HttpReply {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).context("Failed to decode JSON response")
    }

    /// Body as lossy UTF-8, truncated for log and error messages
    pub fn snippet(&self) -> String {
        let text = String::from_utf8_lossy(&self.body);
        text.chars().take(200).collect()
    }
}

/// Secure HTTP client shared by the collaborator adapters
#[derive(Clone)]
pub struct SecureHttpClient {
    client: Client,
    config: HttpSecurityConfig,
}

impl SecureHttpClient {
    /// Create a new secure HTTP client with validation
    pub fn new(config: HttpSecurityConfig) -> Result<Self> {
        let mut client_builder = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent("TrustOracle/0.1");

        if config.require_https {
            client_builder = client_builder.https_only(true);
            info!("HTTPS enforcement enabled for all collaborator calls");
        }

        if config.verify_certificates {
            client_builder = client_builder.tls_built_in_root_certs(true);
        } else {
            warn!("TLS certificate verification disabled - this is insecure!");
            client_builder = client_builder.danger_accept_invalid_certs(true);
        }

        let client = client_builder
            .build()
            .context("Failed to create secure HTTP client")?;

        Ok(Self { client, config })
    }

    /// Validate URL for security requirements
    pub fn validate_url(&self, url: &str) -> Result<Url> {
        let parsed_url = Url::parse(url).context("Invalid URL format")?;

        if self.config.require_https && parsed_url.scheme() != "https" {
            return Err(anyhow::anyhow!(
                "HTTPS is required but URL uses {}: {}",
                parsed_url.scheme(),
                url
            ));
        }

        let host = parsed_url
            .host_str()
            .ok_or_else(|| anyhow::anyhow!("URL must have a valid host: {}", url))?;

        if !self.config.allowed_domains.is_empty()
            && !self
                .config
                .allowed_domains
                .iter()
                .any(|domain| host == domain || host.ends_with(&format!(".{}", domain)))
        {
            return Err(anyhow::anyhow!(
                "Domain '{}' is not in the allowed list: {:?}",
                host,
                self.config.allowed_domains
            ));
        }

        if host == "localhost" || host == "127.0.0.1" {
            warn!("Allowing localhost URL: {} (should be disabled in production)", url);
        }

        Ok(parsed_url)
    }

    pub async fn get(&self, url: &str, bearer: Option<&str>) -> Result<HttpReply> {
        let validated_url = self.validate_url(url)?;
        debug!("GET {}", validated_url);

        let request = self
            .client
            .get(validated_url.as_str())
            .header("Accept", "application/json, application/octet-stream");
        self.send(with_bearer(request, bearer)).await
    }

    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &T,
        bearer: Option<&str>,
    ) -> Result<HttpReply> {
        let validated_url = self.validate_url(url)?;
        debug!("POST {}", validated_url);

        let request = self.client.post(validated_url.as_str()).json(body);
        self.send(with_bearer(request, bearer)).await
    }

    pub async fn put_bytes(&self, url: &str, bytes: Vec<u8>) -> Result<HttpReply> {
        let validated_url = self.validate_url(url)?;

        if bytes.len() > self.config.max_response_size {
            return Err(anyhow::anyhow!(
                "Upload too large: {} bytes (max: {})",
                bytes.len(),
                self.config.max_response_size
            ));
        }

        debug!("PUT {} ({} bytes)", validated_url, bytes.len());
        let request = self
            .client
            .put(validated_url.as_str())
            .header("Content-Type", "application/octet-stream")
            .body(bytes);
        self.send(request).await
    }

    async fn send(&self, request: RequestBuilder) -> Result<HttpReply> {
        let response = request
            .send()
            .await
            .context("Failed to send HTTP request")?;

        let status = response.status().as_u16();

        let content_length = response.content_length().unwrap_or(0);
        if content_length > self.config.max_response_size as u64 {
            return Err(anyhow::anyhow!(
                "Response too large: {} bytes (max: {})",
                content_length,
                self.config.max_response_size
            ));
        }

        let body = response
            .bytes()
            .await
            .context("Failed to read response body")?;

        if body.len() > self.config.max_response_size {
            return Err(anyhow::anyhow!(
                "Response body too large: {} bytes (max: {})",
                body.len(),
                self.config.max_response_size
            ));
        }

        Ok(HttpReply {
            status,
            body: body.to_vec(),
        })
    }

    pub fn config(&self) -> &HttpSecurityConfig {
        &self.config
    }
}

fn with_bearer(request: RequestBuilder, bearer: Option<&str>) -> RequestBuilder {
    match bearer {
        Some(token) => request.bearer_auth(token),
        None => request,
    }
}

/// Join a base URL and a path without doubling slashes
pub fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
