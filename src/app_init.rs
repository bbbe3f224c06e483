use std::{net::SocketAddr, sync::Arc};

use prometheus::Registry;
use tokio::task::JoinHandle;
use tracing::info;

use crate::{
    client::{ActionsSource, GithubApi},
    config::ExporterConfig,
    fetch::{Clock, Fetcher, SystemClock},
    poller::{self, RunnersPoller, WorkflowCatalog, WorkflowRunsPoller, WorkflowSinks},
    result::Result,
    sink::ExporterMetrics,
};

pub struct ExporterComponents {
    pub metrics: ExporterMetrics,
    pub listen_address: SocketAddr,
    pub pollers: Vec<JoinHandle<()>>,
}

/// Build the client and metrics, then spawn every poller.
///
/// Any construction failure is returned before a single task is spawned.
pub fn initialize_exporter(config: &ExporterConfig) -> Result<ExporterComponents> {
    config.validate()?;
    let listen_address = config.listen_address()?;
    let fields = config.workflow_fields()?;

    let api: Arc<dyn ActionsSource> = Arc::new(GithubApi::new(config.client_config())?);

    let field_names: Vec<&str> = fields.iter().map(|f| f.as_str()).collect();
    let metrics = ExporterMetrics::new_with_registry(Arc::new(Registry::new()), &field_names)?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let fetcher = Fetcher::new(clock.clone());
    let organizations = config.organizations();

    let catalog = Arc::new(WorkflowCatalog::new(
        api.clone(),
        fetcher.clone(),
        organizations.clone(),
        config.repositories(),
        config.workflow_refresh_interval(),
    ));
    let runners = Arc::new(RunnersPoller::new(
        api.clone(),
        fetcher.clone(),
        organizations,
        Arc::new(metrics.runner_status.clone()),
        config.refresh_interval(),
    ));
    let runs = Arc::new(WorkflowRunsPoller::new(
        api,
        fetcher,
        catalog.clone(),
        fields,
        config.run_lookback(),
        config.collect_jobs,
        WorkflowSinks::from_metrics(&metrics),
        config.refresh_interval(),
    ));

    let pollers = vec![
        poller::spawn(catalog, clock.clone()),
        poller::spawn(runners, clock.clone()),
        poller::spawn(runs, clock),
    ];

    info!(
        organizations = config.organizations.len(),
        repositories = config.repositories.len(),
        collect_jobs = config.collect_jobs,
        "Exporter initialized"
    );

    Ok(ExporterComponents {
        metrics,
        listen_address,
        pollers,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::ExporterError;

    #[tokio::test]
    async fn pollers_are_spawned_for_a_valid_config() {
        let config = ExporterConfig {
            github_token: Some("ghp_test".into()),
            listen_address: "127.0.0.1:0".into(),
            workflow_fields: "repo,id,status".into(),
            ..ExporterConfig::default()
        };

        let components = initialize_exporter(&config).unwrap();
        assert_eq!(components.pollers.len(), 3);
        assert_eq!(components.listen_address.port(), 0);

        for handle in components.pollers {
            handle.abort();
        }
    }

    #[tokio::test]
    async fn invalid_config_spawns_nothing() {
        let err = initialize_exporter(&ExporterConfig::default());
        assert!(matches!(err, Err(ExporterError::Client(_))));
    }
}
