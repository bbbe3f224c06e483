//! Shared catalog of repositories and their workflows.
//!
//! Workflow runs only carry a `workflow_id`; the run poller joins it against
//! this catalog to label runs with the workflow name. The catalog refreshes on
//! its own interval and signals readiness once, after the first refresh.

use std::{
    collections::HashMap,
    sync::{Arc, PoisonError, RwLock},
    time::Duration,
};

use async_trait::async_trait;
use compact_str::CompactString;
use itertools::Itertools;
use tokio::sync::watch;
use tracing::{debug, info};

use super::Poller;
use crate::{
    client::ActionsSource,
    domain::WorkflowDto,
    fetch::Fetcher,
    id::{RepoName, WorkflowId},
};

#[derive(Debug, Default)]
struct CatalogState {
    repositories: Vec<RepoName>,
    workflows: HashMap<RepoName, HashMap<WorkflowId, WorkflowDto>>,
}

pub struct WorkflowCatalog {
    source: Arc<dyn ActionsSource>,
    fetcher: Fetcher,
    organizations: Vec<CompactString>,
    /// Explicitly configured repositories; when empty, organization repositories are discovered
    configured_repositories: Vec<RepoName>,
    interval: Duration,
    state: RwLock<CatalogState>,
    ready: watch::Sender<bool>,
}

impl WorkflowCatalog {
    pub fn new(
        source: Arc<dyn ActionsSource>,
        fetcher: Fetcher,
        organizations: Vec<CompactString>,
        configured_repositories: Vec<RepoName>,
        interval: Duration,
    ) -> Self {
        let (ready, _) = watch::channel(false);
        Self {
            source,
            fetcher,
            organizations,
            configured_repositories,
            interval,
            state: RwLock::new(CatalogState::default()),
            ready,
        }
    }

    /// Rebuild the catalog and replace the previous one wholesale
    pub async fn refresh_once(&self) {
        let repositories = self.resolve_repositories().await;
        let mut workflows: HashMap<RepoName, HashMap<WorkflowId, WorkflowDto>> =
            HashMap::with_capacity(repositories.len());

        for repo in &repositories {
            let source = self.source.as_ref();
            let records = self
                .fetcher
                .fetch_all(&format!("workflows of {repo}"), move |page| {
                    source.list_repo_workflows(repo, page)
                })
                .await;

            debug!(repo = %repo, workflow_count = records.len(), "Catalogued workflows");
            workflows.insert(
                repo.clone(),
                records.into_iter().map(|w| (w.id, w)).collect(),
            );
        }

        let workflow_count: usize = workflows.values().map(HashMap::len).sum();
        {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            state.repositories = repositories;
            state.workflows = workflows;
        }

        info!(
            repositories = self.repositories().len(),
            workflows = workflow_count,
            "Refreshed workflow catalog"
        );
        self.ready.send_replace(true);
    }

    async fn resolve_repositories(&self) -> Vec<RepoName> {
        if !self.configured_repositories.is_empty() {
            return self.configured_repositories.clone();
        }

        let mut repositories = Vec::new();
        for org in &self.organizations {
            let source = self.source.as_ref();
            let org_name = org.as_str();
            let repos = self
                .fetcher
                .fetch_all(&format!("repositories of {org}"), move |page| {
                    source.list_org_repos(org_name, page)
                })
                .await;

            repositories.extend(
                repos
                    .into_iter()
                    .filter(|r| !r.archived)
                    .map(|r| r.full_name),
            );
        }

        repositories.into_iter().sorted().dedup().collect()
    }

    /// Repositories of the latest refresh
    pub fn repositories(&self) -> Vec<RepoName> {
        self.read_state().repositories.clone()
    }

    pub fn workflow_name(&self, repo: &RepoName, id: WorkflowId) -> Option<CompactString> {
        self.read_state()
            .workflows
            .get(repo)
            .and_then(|workflows| workflows.get(&id))
            .map(|w| w.name.clone())
    }

    pub fn is_ready(&self) -> bool {
        *self.ready.borrow()
    }

    /// Resolves once the first refresh has completed
    pub async fn wait_ready(&self) {
        let mut ready = self.ready.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = ready.wait_for(|ready| *ready).await;
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, CatalogState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Poller for WorkflowCatalog {
    fn name(&self) -> &'static str {
        "workflows"
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    async fn poll_once(&self) {
        self.refresh_once().await;
    }
}
