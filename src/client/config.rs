//! Configuration management for GitHub client

use std::{path::PathBuf, time::Duration};

use compact_str::{CompactString, ToCompactString};
use tracing::warn;
use url::Url;

use super::error::{ClientError, Result};

/// Public GitHub API root
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Main configuration for GitHub client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Alternate API base URL (GitHub Enterprise Server); `None` means github.com
    pub api_url: Option<CompactString>,
    /// Static access token
    pub token: Option<CompactString>,
    /// GitHub App installation credentials
    pub app: AppCredentials,
    /// Upper bound of the response cache in bytes; 0 disables caching
    pub cache_size_bytes: usize,
    /// Request configuration
    pub request: RequestConfig,
}

/// GitHub App installation credentials, all three are required for app mode
#[derive(Debug, Clone, Default)]
pub struct AppCredentials {
    pub app_id: Option<u64>,
    pub installation_id: Option<u64>,
    pub private_key_path: Option<PathBuf>,
}

/// HTTP request configuration
#[derive(Debug, Clone)]
pub struct RequestConfig {
    /// Request timeout
    pub timeout: Duration,
    /// Value of the User-Agent header
    pub user_agent: CompactString,
}

/// Resolved authentication strategy
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    Token(CompactString),
    App {
        app_id: u64,
        installation_id: u64,
        private_key_path: PathBuf,
    },
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: concat!("actions-exporter/", env!("CARGO_PKG_VERSION")).into(),
        }
    }
}

impl AppCredentials {
    fn is_empty(&self) -> bool {
        self.app_id.is_none() && self.installation_id.is_none() && self.private_key_path.is_none()
    }
}

impl ClientConfig {
    /// Create a configuration using a static token against github.com
    pub fn with_token(token: impl Into<CompactString>) -> Self {
        Self {
            token: Some(token.into()),
            ..Self::empty()
        }
    }

    /// Create a configuration using GitHub App credentials against github.com
    pub fn with_app(app_id: u64, installation_id: u64, private_key_path: impl Into<PathBuf>) -> Self {
        Self {
            app: AppCredentials {
                app_id: Some(app_id),
                installation_id: Some(installation_id),
                private_key_path: Some(private_key_path.into()),
            },
            ..Self::empty()
        }
    }

    fn empty() -> Self {
        Self {
            api_url: None,
            token: None,
            app: AppCredentials::default(),
            cache_size_bytes: 64 * 1024 * 1024,
            request: RequestConfig::default(),
        }
    }

    /// Resolve which credential mode is used.
    ///
    /// A non-empty static token always takes precedence over app credentials.
    /// App mode requires the app id, installation id and key path together.
    pub fn credentials(&self) -> Result<Credentials> {
        if let Some(token) = self.token.as_ref().filter(|t| !t.trim().is_empty()) {
            if !self.app.is_empty() {
                warn!("both a token and GitHub App credentials are configured, using the token");
            }
            return Ok(Credentials::Token(token.trim().to_compact_string()));
        }

        match (&self.app.app_id, &self.app.installation_id, &self.app.private_key_path) {
            (Some(app_id), Some(installation_id), Some(path)) => Ok(Credentials::App {
                app_id: *app_id,
                installation_id: *installation_id,
                private_key_path: path.clone(),
            }),
            _ if self.app.is_empty() => Err(ClientError::config_validation(
                "credentials",
                "either a token or GitHub App credentials must be configured",
            )),
            _ => Err(ClientError::config_validation(
                "credentials",
                "GitHub App mode needs app id, installation id and private key path",
            )),
        }
    }

    /// API root that every endpoint path is appended to, without trailing slash
    pub fn api_root(&self) -> Result<CompactString> {
        match self.api_url.as_deref().map(str::trim) {
            None | Some("") | Some("api.github.com") => Ok(DEFAULT_API_URL.into()),
            Some(url) if url.trim_end_matches('/') == DEFAULT_API_URL => Ok(DEFAULT_API_URL.into()),
            Some(url) => enterprise_api_url(url),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.credentials()?;
        self.api_root()?;

        if self.request.timeout.is_zero() {
            return Err(ClientError::config_validation(
                "timeout",
                "Timeout must be greater than zero",
            ));
        }

        Ok(())
    }

    pub fn with_api_url(mut self, api_url: Option<CompactString>) -> Self {
        self.api_url = api_url;
        self
    }
}

/// Derive the REST API root of a GitHub Enterprise Server from its base URL.
///
/// `api/v3` is appended unless the path already ends in it or the host is an
/// API host (`api.` prefix or `.api.` infix). The result has no trailing slash.
pub fn enterprise_api_url(base_url: &str) -> Result<CompactString> {
    let mut url = Url::parse(base_url).map_err(|_| ClientError::invalid_url(base_url))?;
    if url.cannot_be_a_base() || url.host_str().is_none() {
        return Err(ClientError::invalid_url(base_url));
    }

    let mut path = url.path().to_string();
    if !path.ends_with('/') {
        path.push('/');
    }

    let host = url.host_str().unwrap_or_default();
    if !path.ends_with("/api/v3/") && !host.starts_with("api.") && !host.contains(".api.") {
        path.push_str("api/v3/");
    }

    url.set_path(&path);
    url.set_query(None);
    url.set_fragment(None);

    Ok(url.as_str().trim_end_matches('/').to_compact_string())
}
