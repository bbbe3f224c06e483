//! Workflow runs and jobs of the catalogued repositories

use std::{fmt, str::FromStr, sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use compact_str::CompactString;
use thiserror::Error;
use tracing::{info, warn};

use super::{Poller, WorkflowCatalog};
use crate::{
    client::ActionsSource,
    domain::{JobDto, WorkflowRunDto},
    fetch::Fetcher,
    id::RepoName,
    sink::{ExporterMetrics, GaugeSink, Snapshot},
};

pub const RUN_COMPLETED: f64 = 1.0;
pub const RUN_IN_PROGRESS: f64 = 2.0;
pub const RUN_QUEUED: f64 = 3.0;
pub const RUN_PENDING: f64 = 4.0;
pub const RUN_UNKNOWN: f64 = -1.0;

pub const JOB_FAILURE: f64 = 0.0;
pub const JOB_SUCCESS: f64 = 1.0;
pub const JOB_CANCELLED: f64 = 2.0;
pub const JOB_SKIPPED: f64 = 3.0;
pub const JOB_UNKNOWN: f64 = -1.0;

pub const DEFAULT_WORKFLOW_FIELDS: &str =
    "repo,id,node_id,head_branch,head_sha,run_number,workflow_id,workflow,event,status";

/// A workflow run attribute usable as a label of the run gauges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkflowField {
    Repo,
    Id,
    NodeId,
    HeadBranch,
    HeadSha,
    RunNumber,
    WorkflowId,
    Workflow,
    Event,
    Status,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkflowFieldError {
    #[error("unknown workflow field `{0}`")]
    Unknown(CompactString),
    #[error("workflow field `{0}` is listed more than once")]
    Duplicate(WorkflowField),
}

impl WorkflowField {
    pub const ALL: [WorkflowField; 10] = [
        Self::Repo,
        Self::Id,
        Self::NodeId,
        Self::HeadBranch,
        Self::HeadSha,
        Self::RunNumber,
        Self::WorkflowId,
        Self::Workflow,
        Self::Event,
        Self::Status,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Repo => "repo",
            Self::Id => "id",
            Self::NodeId => "node_id",
            Self::HeadBranch => "head_branch",
            Self::HeadSha => "head_sha",
            Self::RunNumber => "run_number",
            Self::WorkflowId => "workflow_id",
            Self::Workflow => "workflow",
            Self::Event => "event",
            Self::Status => "status",
        }
    }

    /// Parse a comma separated field list, ignoring blanks around entries.
    ///
    /// Each field may appear once; label names of a gauge must be unique.
    pub fn parse_list(fields: &str) -> Result<Vec<Self>, WorkflowFieldError> {
        let mut parsed: Vec<Self> = Vec::new();
        for name in fields.split(',').map(str::trim).filter(|f| !f.is_empty()) {
            let field: Self = name.parse()?;
            if parsed.contains(&field) {
                return Err(WorkflowFieldError::Duplicate(field));
            }
            parsed.push(field);
        }
        Ok(parsed)
    }

    /// Label value of this field for one run
    pub fn value(self, repo: &RepoName, run: &WorkflowRunDto, workflow_name: &str) -> String {
        match self {
            Self::Repo => repo.to_string(),
            Self::Id => run.id.to_string(),
            Self::NodeId => run.node_id.to_string(),
            Self::HeadBranch => run.head_branch.as_deref().unwrap_or_default().to_string(),
            Self::HeadSha => run.head_sha.to_string(),
            Self::RunNumber => run.run_number.to_string(),
            Self::WorkflowId => run.workflow_id.to_string(),
            Self::Workflow => workflow_name.to_string(),
            Self::Event => run.event.to_string(),
            Self::Status => run.status_str().to_string(),
        }
    }
}

impl FromStr for WorkflowField {
    type Err = WorkflowFieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|field| field.as_str() == s)
            .ok_or_else(|| WorkflowFieldError::Unknown(s.into()))
    }
}

impl fmt::Display for WorkflowField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Gauges written by [`WorkflowRunsPoller`]
#[derive(Clone)]
pub struct WorkflowSinks {
    pub run_status: Arc<dyn GaugeSink>,
    pub run_duration: Arc<dyn GaugeSink>,
    pub job_total: Arc<dyn GaugeSink>,
    pub job_completed: Arc<dyn GaugeSink>,
}

impl WorkflowSinks {
    pub fn from_metrics(metrics: &ExporterMetrics) -> Self {
        Self {
            run_status: Arc::new(metrics.workflow_run_status.clone()),
            run_duration: Arc::new(metrics.workflow_run_duration.clone()),
            job_total: Arc::new(metrics.job_total.clone()),
            job_completed: Arc::new(metrics.job_completed.clone()),
        }
    }
}

/// One cycle's worth of run and job series
#[derive(Debug, Default)]
pub struct WorkflowSnapshots {
    pub run_status: Snapshot,
    pub run_duration: Snapshot,
    pub job_total: Snapshot,
    pub job_completed: Snapshot,
}

impl WorkflowSnapshots {
    fn publish(&self, sinks: &WorkflowSinks) {
        self.run_status.publish(sinks.run_status.as_ref());
        self.run_duration.publish(sinks.run_duration.as_ref());
        self.job_total.publish(sinks.job_total.as_ref());
        self.job_completed.publish(sinks.job_completed.as_ref());
    }
}

pub struct WorkflowRunsPoller {
    source: Arc<dyn ActionsSource>,
    fetcher: Fetcher,
    catalog: Arc<WorkflowCatalog>,
    fields: Vec<WorkflowField>,
    /// Only runs created within this window are reported
    lookback: Duration,
    collect_jobs: bool,
    sinks: WorkflowSinks,
    interval: Duration,
}

impl WorkflowRunsPoller {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        source: Arc<dyn ActionsSource>,
        fetcher: Fetcher,
        catalog: Arc<WorkflowCatalog>,
        fields: Vec<WorkflowField>,
        lookback: Duration,
        collect_jobs: bool,
        sinks: WorkflowSinks,
        interval: Duration,
    ) -> Self {
        Self {
            source,
            fetcher,
            catalog,
            fields,
            lookback,
            collect_jobs,
            sinks,
            interval,
        }
    }

    pub async fn collect(&self) -> WorkflowSnapshots {
        let mut snapshots = WorkflowSnapshots::default();
        let now = self.fetcher.clock().now();
        let created_after = chrono::Duration::from_std(self.lookback)
            .ok()
            .and_then(|lookback| now.checked_sub_signed(lookback))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        for repo in &self.catalog.repositories() {
            let source = self.source.as_ref();
            let runs = self
                .fetcher
                .fetch_all(&format!("workflow runs of {repo}"), move |page| {
                    source.list_workflow_runs(repo, created_after, page)
                })
                .await;

            for run in &runs {
                let workflow_name = self
                    .catalog
                    .workflow_name(repo, run.workflow_id)
                    .unwrap_or_default();
                let labels = self.run_labels(repo, run, &workflow_name);

                if let Some(duration) = run.duration_ms() {
                    snapshots.run_duration.push(labels.clone(), duration as f64);
                }
                snapshots.run_status.push(labels, run_status_code(run));

                if self.collect_jobs {
                    self.collect_jobs_of(repo, run, &mut snapshots).await;
                }
            }
        }

        snapshots
    }

    async fn collect_jobs_of(
        &self,
        repo: &RepoName,
        run: &WorkflowRunDto,
        snapshots: &mut WorkflowSnapshots,
    ) {
        let source = self.source.as_ref();
        let run_id = run.id;
        let jobs = self
            .fetcher
            .fetch_all(&format!("jobs of {repo} run {run_id}"), move |page| {
                source.list_run_jobs(repo, run_id, page)
            })
            .await;

        for job in &jobs {
            snapshots.job_total.push(job_total_labels(job), 1.0);
            if job.status.as_deref() == Some("completed") {
                snapshots
                    .job_completed
                    .push(job_completed_labels(job), job_conclusion_code(job));
            }
        }
    }

    /// Label tuple following the configured field order
    pub fn run_labels(
        &self,
        repo: &RepoName,
        run: &WorkflowRunDto,
        workflow_name: &str,
    ) -> Vec<String> {
        self.fields
            .iter()
            .map(|field| field.value(repo, run, workflow_name))
            .collect()
    }
}

#[async_trait]
impl Poller for WorkflowRunsPoller {
    fn name(&self) -> &'static str {
        "workflow_runs"
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    async fn ready(&self) {
        self.catalog.wait_ready().await;
    }

    async fn poll_once(&self) {
        let snapshots = self.collect().await;
        snapshots.publish(&self.sinks);
        info!(
            runs = snapshots.run_status.len(),
            jobs = snapshots.job_total.len(),
            "Published workflow run status"
        );
    }
}

pub fn run_status_code(run: &WorkflowRunDto) -> f64 {
    match run.status_str() {
        "completed" => RUN_COMPLETED,
        "in_progress" => RUN_IN_PROGRESS,
        "queued" => RUN_QUEUED,
        "pending" | "waiting" | "requested" => RUN_PENDING,
        other => {
            warn!(run_id = %run.id, status = other, "Unknown workflow run status, reporting -1");
            RUN_UNKNOWN
        },
    }
}

pub fn job_conclusion_code(job: &JobDto) -> f64 {
    match job.conclusion.as_deref().unwrap_or_default() {
        "failure" => JOB_FAILURE,
        "success" => JOB_SUCCESS,
        "cancelled" => JOB_CANCELLED,
        "skipped" => JOB_SKIPPED,
        other => {
            warn!(job_id = %job.id, conclusion = other, "Unknown job conclusion, reporting -1");
            JOB_UNKNOWN
        },
    }
}

/// `(id, name, labels_str, runner_id, runner_name, status, conclusion)`
pub fn job_total_labels(job: &JobDto) -> Vec<String> {
    vec![
        job.id.to_string(),
        job.name.to_string(),
        job.labels_joined(),
        job.runner_id.map(|id| id.to_string()).unwrap_or_default(),
        job.runner_name.as_deref().unwrap_or_default().to_string(),
        job.status.as_deref().unwrap_or_default().to_string(),
        job.conclusion.as_deref().unwrap_or_default().to_string(),
    ]
}

/// `(id, name, labels_str, runner_name)`
pub fn job_completed_labels(job: &JobDto) -> Vec<String> {
    vec![
        job.id.to_string(),
        job.name.to_string(),
        job.labels_joined(),
        job.runner_name.as_deref().unwrap_or_default().to_string(),
    ]
}
