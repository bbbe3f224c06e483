//! Snapshot gauges published to the Prometheus registry.
//!
//! Every poll cycle builds a [`Snapshot`] off to the side and publishes it in
//! one burst: the gauge is reset and immediately repopulated, so a series
//! disappears as soon as its resource is gone upstream.
//!
//! ## Metrics
//! - `github_tr_runner_organization_current_status{organization, os, name, id, all_labels}`
//! - `github_workflow_run_status_v2{<workflow fields>}`
//! - `github_workflow_run_duration_ms{<workflow fields>}`
//! - `github_workflow_job_total{id, name, labels_str, runner_id, runner_name, status, conclusion}`
//! - `github_workflow_job_completed_v1{id, name, labels_str, runner_name}`
//!
//! Names and label order are consumed by dashboards and alerts; changing them
//! is a breaking change.

use std::sync::Arc;

use prometheus::{GaugeVec, Opts, Registry, proto::MetricFamily};

pub const RUNNER_STATUS: &str = "github_tr_runner_organization_current_status";
pub const RUNNER_LABELS: [&str; 5] = ["organization", "os", "name", "id", "all_labels"];

pub const WORKFLOW_RUN_STATUS: &str = "github_workflow_run_status_v2";
pub const WORKFLOW_RUN_DURATION: &str = "github_workflow_run_duration_ms";

pub const JOB_TOTAL: &str = "github_workflow_job_total";
pub const JOB_TOTAL_LABELS: [&str; 7] = [
    "id",
    "name",
    "labels_str",
    "runner_id",
    "runner_name",
    "status",
    "conclusion",
];

pub const JOB_COMPLETED: &str = "github_workflow_job_completed_v1";
pub const JOB_COMPLETED_LABELS: [&str; 4] = ["id", "name", "labels_str", "runner_name"];

/// Label-keyed gauge written by exactly one poller
pub trait GaugeSink: Send + Sync {
    /// Upsert the value of one series
    fn set(&self, labels: &[&str], value: f64);

    /// Drop every series of this gauge, leaving other gauges untouched
    fn reset_all(&self);
}

impl GaugeSink for GaugeVec {
    fn set(&self, labels: &[&str], value: f64) {
        match self.get_metric_with_label_values(labels) {
            Ok(gauge) => gauge.set(value),
            Err(e) => tracing::error!(error = %e, ?labels, "Label tuple does not match gauge schema"),
        }
    }

    fn reset_all(&self) {
        self.reset();
    }
}

/// Complete label tuple → value mapping produced by one poll cycle
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    entries: Vec<(Vec<String>, f64)>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, labels: Vec<String>, value: f64) {
        self.entries.push((labels, value));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Replace everything the sink holds with this snapshot.
    ///
    /// An empty snapshot still resets the sink.
    pub fn publish(&self, sink: &dyn GaugeSink) {
        sink.reset_all();
        for (labels, value) in &self.entries {
            let labels: Vec<&str> = labels.iter().map(String::as_str).collect();
            sink.set(&labels, *value);
        }
    }
}

/// Every gauge the exporter publishes, registered on one registry
#[derive(Clone)]
pub struct ExporterMetrics {
    pub runner_status: GaugeVec,
    pub workflow_run_status: GaugeVec,
    pub workflow_run_duration: GaugeVec,
    pub job_total: GaugeVec,
    pub job_completed: GaugeVec,
    registry: Arc<Registry>,
}

impl ExporterMetrics {
    /// Register all gauges on `registry`; `workflow_fields` is the label schema of the run gauges.
    pub fn new_with_registry(
        registry: Arc<Registry>,
        workflow_fields: &[&str],
    ) -> Result<Self, prometheus::Error> {
        let runner_status = GaugeVec::new(
            Opts::new(
                RUNNER_STATUS,
                "runner status: 0: offline; 1: idle; 2: active; -1: unknown",
            ),
            &RUNNER_LABELS,
        )?;
        registry.register(Box::new(runner_status.clone()))?;

        let workflow_run_status = GaugeVec::new(
            Opts::new(
                WORKFLOW_RUN_STATUS,
                "Current workflow run status: 1-4: completed, in_progress, queued, pending; -1: unknown",
            ),
            workflow_fields,
        )?;
        registry.register(Box::new(workflow_run_status.clone()))?;

        let workflow_run_duration = GaugeVec::new(
            Opts::new(
                WORKFLOW_RUN_DURATION,
                "Workflow run duration (in milliseconds) of completed workflow runs created within the lookback window",
            ),
            workflow_fields,
        )?;
        registry.register(Box::new(workflow_run_duration.clone()))?;

        let job_total = GaugeVec::new(
            Opts::new(JOB_TOTAL, "Total number of workflow jobs for all workflow runs scanned"),
            &JOB_TOTAL_LABELS,
        )?;
        registry.register(Box::new(job_total.clone()))?;

        let job_completed = GaugeVec::new(
            Opts::new(
                JOB_COMPLETED,
                "Completed workflow job status; 0: failed; 1: success; 2: cancelled; 3: skipped; -1: unknown",
            ),
            &JOB_COMPLETED_LABELS,
        )?;
        registry.register(Box::new(job_completed.clone()))?;

        Ok(Self {
            runner_status,
            workflow_run_status,
            workflow_run_duration,
            job_total,
            job_completed,
            registry,
        })
    }

    /// Gather all metric families for the `/metrics` endpoint.
    pub fn gather(&self) -> Vec<MetricFamily> {
        self.registry.gather()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runner_gauge() -> GaugeVec {
        GaugeVec::new(Opts::new("test_runner_status", "test"), &RUNNER_LABELS).unwrap()
    }

    fn observed(gauge: &GaugeVec) -> Vec<(Vec<String>, f64)> {
        let registry = Registry::new();
        registry.register(Box::new(gauge.clone())).unwrap();
        let mut series: Vec<(Vec<String>, f64)> = registry
            .gather()
            .iter()
            .flat_map(|family| family.get_metric().to_vec())
            .map(|metric| {
                let labels = metric
                    .get_label()
                    .iter()
                    .map(|l| format!("{}={}", l.name(), l.value()))
                    .collect();
                (labels, metric.get_gauge().value())
            })
            .collect();
        series.sort_by(|a, b| a.0.cmp(&b.0));
        series
    }

    fn labels(values: [&str; 5]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn publish_replaces_previous_snapshot() {
        let gauge = runner_gauge();

        let mut first = Snapshot::new();
        first.push(labels(["acme", "linux", "r1", "1", ""]), 1.0);
        first.push(labels(["acme", "linux", "r2", "2", ""]), 2.0);
        first.publish(&gauge);
        assert_eq!(observed(&gauge).len(), 2);

        let mut second = Snapshot::new();
        second.push(labels(["acme", "linux", "r2", "2", ""]), 0.0);
        second.publish(&gauge);

        let series = observed(&gauge);
        assert_eq!(series.len(), 1);
        assert!(series[0].0.contains(&"name=r2".to_string()));
        assert_eq!(series[0].1, 0.0);
    }

    #[test]
    fn empty_snapshot_clears_the_gauge() {
        let gauge = runner_gauge();
        gauge.set(&["acme", "linux", "gone", "9", ""], 1.0);

        Snapshot::new().publish(&gauge);
        assert!(observed(&gauge).is_empty());
    }

    #[test]
    fn publishing_the_same_snapshot_twice_is_idempotent() {
        let gauge = runner_gauge();
        let mut snapshot = Snapshot::new();
        snapshot.push(labels(["acme", "linux", "r1", "1", "self-hosted"]), 1.0);
        snapshot.push(labels(["acme", "windows", "r3", "3", ""]), -1.0);

        snapshot.publish(&gauge);
        let once = observed(&gauge);
        snapshot.publish(&gauge);
        snapshot.publish(&gauge);

        assert_eq!(observed(&gauge), once);
    }

    #[test]
    fn reset_only_touches_its_own_gauge() {
        let registry = Arc::new(Registry::new());
        let metrics = ExporterMetrics::new_with_registry(registry, &["repo", "id"]).unwrap();

        metrics.runner_status.set(&["acme", "linux", "r1", "1", ""], 1.0);
        metrics.job_total.set(&["1", "build", "", "1", "r1", "completed", "success"], 1.0);
        metrics.runner_status.reset_all();

        let families = metrics.gather();
        let jobs = families.iter().find(|f| f.name() == JOB_TOTAL).unwrap();
        assert_eq!(jobs.get_metric().len(), 1);
        assert!(families.iter().all(|f| f.name() != RUNNER_STATUS));
    }

    #[test]
    fn mismatched_label_count_is_ignored() {
        let gauge = runner_gauge();
        gauge.set(&["too", "few"], 1.0);
        assert!(observed(&gauge).is_empty());
    }
}
