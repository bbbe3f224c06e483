use std::{net::SocketAddr, path::PathBuf};

use thiserror::Error;

use crate::client::ClientError;

pub type Result<T> = std::result::Result<T, ExporterError>;

#[derive(Debug, Error)]
pub enum ExporterError {
    #[error("Configuration file not found: {path}")]
    ConfigFileNotFound { path: PathBuf },

    #[error("Failed to load configuration from {path}: {message}")]
    ConfigLoadError { path: PathBuf, message: String },

    #[error("Invalid configuration: {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("GitHub client: {0}")]
    Client(#[from] ClientError),

    #[error("Metrics registry: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("Failed to initialize logging: {message}")]
    LoggingInit { message: String },

    #[error("Metrics server on {address}: {source}")]
    Server {
        address: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

impl ExporterError {
    /// Create a configuration file not found error
    pub fn config_file_not_found(path: PathBuf) -> Self {
        Self::ConfigFileNotFound { path }
    }

    /// Create a configuration load error
    pub fn config_load_error(path: PathBuf, source: impl std::fmt::Display) -> Self {
        Self::ConfigLoadError { path, message: source.to_string() }
    }

    /// Create a configuration validation error
    pub fn config_validation_error(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidationError { field: field.into(), message: message.into() }
    }

    pub fn logging_init(source: impl std::fmt::Display) -> Self {
        Self::LoggingInit { message: source.to_string() }
    }

    pub fn server(address: SocketAddr, source: std::io::Error) -> Self {
        Self::Server { address, source }
    }
}
