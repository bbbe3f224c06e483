//! Organization runner status

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use compact_str::CompactString;
use tracing::{info, warn};

use super::Poller;
use crate::{
    client::ActionsSource,
    domain::RunnerDto,
    fetch::Fetcher,
    sink::{GaugeSink, Snapshot},
};

pub const RUNNER_OFFLINE: f64 = 0.0;
pub const RUNNER_IDLE: f64 = 1.0;
pub const RUNNER_ACTIVE: f64 = 2.0;
pub const RUNNER_UNKNOWN: f64 = -1.0;

/// Publishes `github_tr_runner_organization_current_status` for every runner
/// of every configured organization
pub struct RunnersPoller {
    source: Arc<dyn ActionsSource>,
    fetcher: Fetcher,
    organizations: Vec<CompactString>,
    sink: Arc<dyn GaugeSink>,
    interval: Duration,
}

impl RunnersPoller {
    pub fn new(
        source: Arc<dyn ActionsSource>,
        fetcher: Fetcher,
        organizations: Vec<CompactString>,
        sink: Arc<dyn GaugeSink>,
        interval: Duration,
    ) -> Self {
        Self {
            source,
            fetcher,
            organizations,
            sink,
            interval,
        }
    }

    /// Fetch every runner of every organization into one snapshot
    pub async fn collect(&self) -> Snapshot {
        let mut snapshot = Snapshot::new();

        for org in &self.organizations {
            let source = self.source.as_ref();
            let org_name = org.as_str();
            let runners = self
                .fetcher
                .fetch_all(&format!("runners of {org}"), move |page| {
                    source.list_org_runners(org_name, page)
                })
                .await;

            for runner in &runners {
                snapshot.push(runner_labels(org, runner), runner_status_code(runner));
            }
        }

        snapshot
    }
}

#[async_trait]
impl Poller for RunnersPoller {
    fn name(&self) -> &'static str {
        "runners"
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    async fn poll_once(&self) {
        let snapshot = self.collect().await;
        snapshot.publish(self.sink.as_ref());
        info!(
            organizations = self.organizations.len(),
            runners = snapshot.len(),
            "Published runner status"
        );
    }
}

/// Label tuple `(organization, os, name, id, all_labels)`
pub fn runner_labels(org: &str, runner: &RunnerDto) -> Vec<String> {
    vec![
        org.to_string(),
        runner.os.to_string(),
        runner.name.to_string(),
        runner.id.to_string(),
        runner.labels_joined(),
    ]
}

/// Map runner status onto offline / idle / active, or the unknown sentinel
pub fn runner_status_code(runner: &RunnerDto) -> f64 {
    match runner.status.as_str() {
        "offline" => RUNNER_OFFLINE,
        "online" if runner.busy => RUNNER_ACTIVE,
        "online" => RUNNER_IDLE,
        other => {
            warn!(runner = %runner.name, status = other, "Unknown runner status, reporting -1");
            RUNNER_UNKNOWN
        },
    }
}
