//! Error types for the GitHub client

use chrono::{DateTime, Utc};
use compact_str::CompactString;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Failed to parse response from {endpoint}: {message}")]
    JsonParse {
        endpoint: CompactString,
        message: CompactString,
        #[source]
        source: serde_json::Error,
    },

    #[error("GitHub API error: {message}")]
    GithubApi { message: CompactString },

    #[error("Invalid {field}: {message}")]
    ConfigValidation {
        field: CompactString,
        message: CompactString,
    },

    #[error("Authentication failed")]
    Authentication,

    #[error("Forbidden: {message}")]
    Forbidden { message: CompactString },

    #[error("Invalid URL: {url}")]
    InvalidUrl { url: CompactString },

    #[error("Not found: {resource}")]
    NotFound { resource: CompactString },

    #[error("Rate limit exceeded, resets at {reset}")]
    RateLimit { reset: DateTime<Utc> },

    #[error("Failed to load credentials: {message}")]
    Credentials {
        message: CompactString,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl ClientError {
    pub fn json_parse(
        endpoint: impl Into<CompactString>,
        message: impl Into<CompactString>,
        source: serde_json::Error,
    ) -> Self {
        Self::JsonParse {
            endpoint: endpoint.into(),
            message: message.into(),
            source,
        }
    }

    pub fn github_api(message: impl Into<CompactString>) -> Self {
        Self::GithubApi { message: message.into() }
    }

    pub fn config_validation(
        field: impl Into<CompactString>,
        message: impl Into<CompactString>,
    ) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn forbidden(message: impl Into<CompactString>) -> Self {
        Self::Forbidden { message: message.into() }
    }

    pub fn invalid_url(url: impl Into<CompactString>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    pub fn not_found(resource: impl Into<CompactString>) -> Self {
        Self::NotFound { resource: resource.into() }
    }

    pub fn rate_limit(reset: DateTime<Utc>) -> Self {
        Self::RateLimit { reset }
    }

    pub fn credentials(
        message: impl Into<CompactString>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Credentials {
            message: message.into(),
            source: Box::new(source),
        }
    }

    pub fn is_rate_limit(&self) -> bool {
        matches!(self, Self::RateLimit { .. })
    }
}
