//! Records returned by the GitHub Actions REST API.
//!
//! Only the fields the exporter turns into labels or values are modelled;
//! everything else in the payloads is ignored by serde.

use chrono::{DateTime, Utc};
use compact_str::CompactString;
use itertools::Itertools;
use serde::Deserialize;

use crate::id::{JobId, RepoName, RunId, RunnerId, WorkflowId};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RunnerLabelDto {
    pub name: CompactString,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RunnerDto {
    pub id: RunnerId,
    pub name: CompactString,
    #[serde(default)]
    pub os: CompactString,
    /// `online` or `offline`; anything else is reported as unknown
    pub status: CompactString,
    #[serde(default)]
    pub busy: bool,
    #[serde(default)]
    pub labels: Vec<RunnerLabelDto>,
}

impl RunnerDto {
    /// Label names joined with `,` in the order the API returned them.
    pub fn labels_joined(&self) -> String {
        self.labels.iter().map(|l| l.name.as_str()).join(",")
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RunnersResponse {
    #[serde(default)]
    pub total_count: u64,
    pub runners: Vec<RunnerDto>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RepositoryDto {
    pub full_name: RepoName,
    #[serde(default)]
    pub archived: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorkflowDto {
    pub id: WorkflowId,
    pub name: CompactString,
    #[serde(default)]
    pub path: CompactString,
    #[serde(default)]
    pub state: CompactString,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorkflowsResponse {
    #[serde(default)]
    pub total_count: u64,
    pub workflows: Vec<WorkflowDto>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorkflowRunDto {
    pub id: RunId,
    #[serde(default)]
    pub node_id: CompactString,
    pub head_branch: Option<CompactString>,
    #[serde(default)]
    pub head_sha: CompactString,
    #[serde(default)]
    pub run_number: u64,
    pub workflow_id: WorkflowId,
    #[serde(default)]
    pub event: CompactString,
    pub status: Option<CompactString>,
    pub conclusion: Option<CompactString>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub run_started_at: Option<DateTime<Utc>>,
}

impl WorkflowRunDto {
    pub fn status_str(&self) -> &str {
        self.status.as_deref().unwrap_or("")
    }

    /// Wall time of a completed run in milliseconds.
    pub fn duration_ms(&self) -> Option<i64> {
        if self.status_str() != "completed" {
            return None;
        }
        let started = self.run_started_at.unwrap_or(self.created_at);
        Some((self.updated_at - started).num_milliseconds().max(0))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorkflowRunsResponse {
    #[serde(default)]
    pub total_count: u64,
    pub workflow_runs: Vec<WorkflowRunDto>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobDto {
    pub id: JobId,
    pub run_id: RunId,
    pub name: CompactString,
    pub status: Option<CompactString>,
    pub conclusion: Option<CompactString>,
    #[serde(default)]
    pub labels: Vec<CompactString>,
    pub runner_id: Option<RunnerId>,
    pub runner_name: Option<CompactString>,
}

impl JobDto {
    pub fn labels_joined(&self) -> String {
        self.labels.iter().join(",")
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobsResponse {
    #[serde(default)]
    pub total_count: u64,
    pub jobs: Vec<JobDto>,
}

/// Installation access token issued to a GitHub App.
#[derive(Debug, Clone, Deserialize)]
pub struct InstallationTokenDto {
    pub token: CompactString,
    pub expires_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runner_payload_deserializes_with_labels() {
        let json = r#"{
            "total_count": 1,
            "runners": [{
                "id": 23,
                "name": "mac-runner",
                "os": "macos",
                "status": "online",
                "busy": true,
                "labels": [{"id": 5, "name": "self-hosted", "type": "read-only"},
                           {"id": 7, "name": "arm64", "type": "custom"}]
            }]
        }"#;

        let response: RunnersResponse = serde_json::from_str(json).unwrap();
        let runner = &response.runners[0];
        assert_eq!(runner.id, RunnerId::new(23));
        assert!(runner.busy);
        assert_eq!(runner.labels_joined(), "self-hosted,arm64");
    }

    #[test]
    fn duration_only_reported_for_completed_runs() {
        let json = r#"{
            "id": 1, "workflow_id": 9, "status": "completed", "conclusion": "success",
            "head_branch": "main", "head_sha": "abc", "run_number": 4, "event": "push",
            "created_at": "2024-01-01T00:00:00Z",
            "run_started_at": "2024-01-01T00:00:10Z",
            "updated_at": "2024-01-01T00:01:10Z"
        }"#;
        let mut run: WorkflowRunDto = serde_json::from_str(json).unwrap();
        assert_eq!(run.duration_ms(), Some(60_000));

        run.status = Some("in_progress".into());
        assert_eq!(run.duration_ms(), None);
    }
}
