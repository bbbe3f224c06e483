//! Exporter configuration.
//!
//! Settings come from an optional TOML file (`--config`), then from CLI flags
//! or their environment variables, which override the file value by value.

use std::{net::SocketAddr, path::PathBuf, time::Duration};

use clap::Parser;
use compact_str::CompactString;
use serde::{Deserialize, Serialize};

use crate::{
    client::{AppCredentials, ClientConfig, RequestConfig},
    id::RepoName,
    logging::LogFormat,
    poller::{WorkflowField, workflow_runs::DEFAULT_WORKFLOW_FIELDS},
    result::{ExporterError, Result},
};

pub const DEFAULT_LISTEN_ADDRESS: &str = "0.0.0.0:9999";

/// GitHub keeps workflow run history for at most 400 days
pub const MAX_RUN_LOOKBACK_HOURS: u64 = 400 * 24;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExporterConfig {
    pub github_token: Option<String>,
    pub github_app_id: Option<u64>,
    pub github_app_installation_id: Option<u64>,
    pub github_app_private_key_path: Option<PathBuf>,
    /// GitHub Enterprise Server base URL; unset means github.com
    pub github_api_url: Option<String>,
    pub organizations: Vec<String>,
    /// `owner/repo` names; when empty, every repository of `organizations` is tracked
    pub repositories: Vec<String>,
    /// Interval of the runner and workflow run pollers
    pub refresh_interval_secs: u64,
    pub workflow_refresh_interval_secs: u64,
    pub run_lookback_hours: u64,
    pub collect_jobs: bool,
    /// Comma separated label schema of the workflow run gauges
    pub workflow_fields: String,
    pub listen_address: String,
    pub cache_size_bytes: usize,
    pub log_format: LogFormat,
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            github_token: None,
            github_app_id: None,
            github_app_installation_id: None,
            github_app_private_key_path: None,
            github_api_url: None,
            organizations: Vec::new(),
            repositories: Vec::new(),
            refresh_interval_secs: 60,
            workflow_refresh_interval_secs: 600,
            run_lookback_hours: 12,
            collect_jobs: false,
            workflow_fields: DEFAULT_WORKFLOW_FIELDS.to_string(),
            listen_address: DEFAULT_LISTEN_ADDRESS.to_string(),
            cache_size_bytes: 64 * 1024 * 1024,
            log_format: LogFormat::default(),
        }
    }
}

/// Command line, every flag doubling as an environment variable
#[derive(Debug, Default, Parser)]
#[command(name = "actions-exporter", version, about)]
pub struct Cli {
    /// TOML configuration file
    #[arg(long, env = "EXPORTER_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub github_token: Option<String>,

    #[arg(long, env = "GITHUB_APP_ID")]
    pub github_app_id: Option<u64>,

    #[arg(long, env = "GITHUB_APP_INSTALLATION_ID")]
    pub github_app_installation_id: Option<u64>,

    /// PEM encoded private key of the GitHub App
    #[arg(long, env = "GITHUB_APP_PRIVATE_KEY_PATH", value_name = "FILE")]
    pub github_app_private_key_path: Option<PathBuf>,

    /// GitHub Enterprise Server base URL
    #[arg(long, env = "GITHUB_API_URL")]
    pub github_api_url: Option<String>,

    #[arg(long = "orgs", env = "GITHUB_ORGS", value_delimiter = ',')]
    pub organizations: Vec<String>,

    #[arg(long = "repos", env = "GITHUB_REPOS", value_delimiter = ',')]
    pub repositories: Vec<String>,

    #[arg(long = "refresh-interval", env = "REFRESH_INTERVAL", value_name = "SECS")]
    pub refresh_interval_secs: Option<u64>,

    #[arg(
        long = "workflow-refresh-interval",
        env = "WORKFLOW_REFRESH_INTERVAL",
        value_name = "SECS"
    )]
    pub workflow_refresh_interval_secs: Option<u64>,

    #[arg(long = "run-lookback", env = "RUN_LOOKBACK_HOURS", value_name = "HOURS")]
    pub run_lookback_hours: Option<u64>,

    #[arg(long, env = "COLLECT_JOBS")]
    pub collect_jobs: Option<bool>,

    #[arg(long, env = "WORKFLOW_FIELDS")]
    pub workflow_fields: Option<String>,

    #[arg(long, env = "LISTEN_ADDRESS")]
    pub listen_address: Option<String>,

    #[arg(long, env = "CACHE_SIZE_BYTES")]
    pub cache_size_bytes: Option<usize>,

    #[arg(long, env = "LOG_FORMAT", value_enum)]
    pub log_format: Option<LogFormat>,
}

impl Cli {
    /// Load the configuration file, if any, and apply flag overrides on top
    pub fn load(self) -> Result<ExporterConfig> {
        let base = match &self.config {
            Some(path) => load_config(path)?,
            None => ExporterConfig::default(),
        };
        Ok(self.apply(base))
    }

    fn apply(self, mut config: ExporterConfig) -> ExporterConfig {
        fn set<T>(target: &mut T, value: Option<T>) {
            if let Some(value) = value {
                *target = value;
            }
        }

        config.github_token = self.github_token.or(config.github_token);
        config.github_app_id = self.github_app_id.or(config.github_app_id);
        config.github_app_installation_id = self
            .github_app_installation_id
            .or(config.github_app_installation_id);
        config.github_app_private_key_path = self
            .github_app_private_key_path
            .or(config.github_app_private_key_path);
        config.github_api_url = self.github_api_url.or(config.github_api_url);
        if !self.organizations.is_empty() {
            config.organizations = self.organizations;
        }
        if !self.repositories.is_empty() {
            config.repositories = self.repositories;
        }

        set(&mut config.refresh_interval_secs, self.refresh_interval_secs);
        set(&mut config.workflow_refresh_interval_secs, self.workflow_refresh_interval_secs);
        set(&mut config.run_lookback_hours, self.run_lookback_hours);
        set(&mut config.collect_jobs, self.collect_jobs);
        set(&mut config.workflow_fields, self.workflow_fields);
        set(&mut config.listen_address, self.listen_address);
        set(&mut config.cache_size_bytes, self.cache_size_bytes);
        set(&mut config.log_format, self.log_format);
        config
    }
}

pub fn load_config(path: &PathBuf) -> Result<ExporterConfig> {
    if !path.exists() {
        return Err(ExporterError::config_file_not_found(path.clone()));
    }

    confy::load_path(path).map_err(|e| ExporterError::config_load_error(path.clone(), e))
}

impl ExporterConfig {
    /// Check everything that can be checked without talking to GitHub
    pub fn validate(&self) -> Result<()> {
        if self.refresh_interval_secs < 1 {
            return Err(ExporterError::config_validation_error(
                "refresh_interval_secs",
                "must be at least 1 second",
            ));
        }
        if self.workflow_refresh_interval_secs < 1 {
            return Err(ExporterError::config_validation_error(
                "workflow_refresh_interval_secs",
                "must be at least 1 second",
            ));
        }
        if self.run_lookback_hours > MAX_RUN_LOOKBACK_HOURS {
            return Err(ExporterError::config_validation_error(
                "run_lookback_hours",
                format!("must be at most {MAX_RUN_LOOKBACK_HOURS} hours"),
            ));
        }

        self.client_config().validate()?;
        self.workflow_fields()?;
        self.listen_address()?;

        if let Some(repo) = self.repositories.iter().find(|r| !r.contains('/')) {
            return Err(ExporterError::config_validation_error(
                "repositories",
                format!("`{repo}` is not of the form owner/repo"),
            ));
        }

        Ok(())
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            api_url: self.github_api_url.as_deref().map(CompactString::from),
            token: self.github_token.as_deref().map(CompactString::from),
            app: AppCredentials {
                app_id: self.github_app_id,
                installation_id: self.github_app_installation_id,
                private_key_path: self.github_app_private_key_path.clone(),
            },
            cache_size_bytes: self.cache_size_bytes,
            request: RequestConfig::default(),
        }
    }

    pub fn workflow_fields(&self) -> Result<Vec<WorkflowField>> {
        let fields = WorkflowField::parse_list(&self.workflow_fields)
            .map_err(|e| ExporterError::config_validation_error("workflow_fields", e.to_string()))?;
        if fields.is_empty() {
            return Err(ExporterError::config_validation_error(
                "workflow_fields",
                "at least one field is required",
            ));
        }
        Ok(fields)
    }

    pub fn listen_address(&self) -> Result<SocketAddr> {
        self.listen_address.trim().parse().map_err(|e| {
            ExporterError::config_validation_error(
                "listen_address",
                format!("`{}`: {e}", self.listen_address),
            )
        })
    }

    pub fn organizations(&self) -> Vec<CompactString> {
        self.organizations
            .iter()
            .map(|o| o.as_str().trim())
            .filter(|o| !o.is_empty())
            .map(CompactString::from)
            .collect()
    }

    pub fn repositories(&self) -> Vec<RepoName> {
        self.repositories
            .iter()
            .map(|r| r.as_str().trim())
            .filter(|r| !r.is_empty())
            .map(RepoName::from)
            .collect()
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn workflow_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.workflow_refresh_interval_secs)
    }

    pub fn run_lookback(&self) -> Duration {
        Duration::from_secs(self.run_lookback_hours.saturating_mul(3600))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::client::Credentials;

    fn with_token() -> ExporterConfig {
        ExporterConfig {
            github_token: Some("ghp_test".into()),
            organizations: vec!["acme".into()],
            ..ExporterConfig::default()
        }
    }

    #[test]
    fn defaults_are_valid_once_credentials_are_set() {
        let config = with_token();
        config.validate().unwrap();

        assert_eq!(config.listen_address().unwrap(), "0.0.0.0:9999".parse().unwrap());
        assert_eq!(config.workflow_fields().unwrap(), WorkflowField::ALL.to_vec());
        assert_eq!(config.run_lookback(), Duration::from_secs(12 * 3600));
    }

    #[test]
    fn missing_credentials_are_rejected() {
        let err = ExporterConfig::default().validate().unwrap_err();
        assert!(matches!(err, ExporterError::Client(_)));
    }

    #[test]
    fn sub_second_refresh_interval_is_rejected() {
        let config = ExporterConfig { refresh_interval_secs: 0, ..with_token() };
        assert!(matches!(
            config.validate(),
            Err(ExporterError::ConfigValidationError { field, .. }) if field == "refresh_interval_secs"
        ));
    }

    #[test]
    fn lookback_beyond_run_retention_is_rejected() {
        let config = ExporterConfig {
            run_lookback_hours: 10_000_000_000,
            ..with_token()
        };
        assert!(matches!(
            config.validate(),
            Err(ExporterError::ConfigValidationError { field, .. }) if field == "run_lookback_hours"
        ));

        let config = ExporterConfig {
            run_lookback_hours: MAX_RUN_LOOKBACK_HOURS,
            ..with_token()
        };
        config.validate().unwrap();
    }

    #[test]
    fn unknown_workflow_field_is_rejected() {
        let config = ExporterConfig {
            workflow_fields: "repo,id,branch".into(),
            ..with_token()
        };
        assert!(matches!(
            config.validate(),
            Err(ExporterError::ConfigValidationError { field, message })
                if field == "workflow_fields" && message.contains("branch")
        ));
    }

    #[test]
    fn repeated_workflow_field_is_a_validation_error() {
        let config = ExporterConfig {
            workflow_fields: "repo,repo".into(),
            ..with_token()
        };
        assert!(matches!(
            config.validate(),
            Err(ExporterError::ConfigValidationError { field, message })
                if field == "workflow_fields" && message.contains("more than once")
        ));
    }

    #[test]
    fn unparsable_listen_address_is_rejected() {
        let config = ExporterConfig {
            listen_address: "localhost".into(),
            ..with_token()
        };
        assert!(matches!(
            config.validate(),
            Err(ExporterError::ConfigValidationError { field, .. }) if field == "listen_address"
        ));
    }

    #[test]
    fn client_config_prefers_the_token() {
        let config = ExporterConfig {
            github_app_id: Some(1),
            github_app_installation_id: Some(2),
            github_app_private_key_path: Some("key.pem".into()),
            ..with_token()
        };
        assert_eq!(
            config.client_config().credentials().unwrap(),
            Credentials::Token("ghp_test".into())
        );
    }

    #[test]
    fn flags_override_file_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
github_api_url = "https://github.example.com"
organizations = ["acme", "initech"]
refresh_interval_secs = 30
collect_jobs = true
"#
        )
        .unwrap();

        let cli = Cli::try_parse_from([
            "actions-exporter",
            "--config",
            file.path().to_str().unwrap(),
            "--orgs",
            "globex",
            "--listen-address",
            "127.0.0.1:9100",
        ])
        .unwrap();
        let config = cli.load().unwrap();

        assert_eq!(config.github_api_url.as_deref(), Some("https://github.example.com"));
        assert_eq!(config.organizations, vec!["globex".to_string()]);
        assert_eq!(config.refresh_interval_secs, 30);
        assert!(config.collect_jobs);
        assert_eq!(config.listen_address, "127.0.0.1:9100");
        assert_eq!(config.workflow_refresh_interval_secs, 600);
    }

    #[test]
    fn missing_config_file_is_reported() {
        let err = load_config(&PathBuf::from("/nonexistent/actions-exporter.toml")).unwrap_err();
        assert!(matches!(err, ExporterError::ConfigFileNotFound { .. }));
    }

    #[test]
    fn blank_targets_are_dropped() {
        let config = ExporterConfig {
            organizations: vec!["acme".into(), " ".into()],
            repositories: vec![" acme/widgets ".into()],
            ..ExporterConfig::default()
        };
        assert_eq!(config.organizations(), vec![CompactString::from("acme")]);
        assert_eq!(config.repositories(), vec![RepoName::from("acme/widgets")]);
    }
}
