//! Read-only view of the Actions API consumed by the pollers

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{
    error::Result,
    page::{Page, PageRequest},
};
use crate::{
    domain::{JobDto, RepositoryDto, RunnerDto, WorkflowDto, WorkflowRunDto},
    id::{RepoName, RunId},
};

/// Paginated list operations the exporter polls.
///
/// Implemented by [`GithubApi`](super::GithubApi); pollers only see this
/// trait so they can be driven by in-memory fakes in tests.
#[async_trait]
pub trait ActionsSource: Send + Sync {
    async fn list_org_runners(&self, org: &str, page: PageRequest) -> Result<Page<RunnerDto>>;

    async fn list_org_repos(&self, org: &str, page: PageRequest) -> Result<Page<RepositoryDto>>;

    async fn list_repo_workflows(
        &self,
        repo: &RepoName,
        page: PageRequest,
    ) -> Result<Page<WorkflowDto>>;

    async fn list_workflow_runs(
        &self,
        repo: &RepoName,
        created_after: DateTime<Utc>,
        page: PageRequest,
    ) -> Result<Page<WorkflowRunDto>>;

    async fn list_run_jobs(
        &self,
        repo: &RepoName,
        run_id: RunId,
        page: PageRequest,
    ) -> Result<Page<JobDto>>;
}
