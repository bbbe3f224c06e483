//! Background polling for GitHub Actions resources
//!
//! Each tracked resource kind has its own [`Poller`], spawned as an
//! independent tokio task that runs for the lifetime of the process. A poller
//! owns the gauges it writes; the only things shared between pollers are the
//! API client and the registry those gauges live in.

pub mod runners;
pub mod workflow_runs;
pub mod workflows;

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument};

pub use runners::RunnersPoller;
pub use workflow_runs::{WorkflowField, WorkflowRunsPoller, WorkflowSinks};
pub use workflows::WorkflowCatalog;

use crate::fetch::Clock;

/// One resource kind polled on a fixed interval
#[async_trait]
pub trait Poller: Send + Sync {
    fn name(&self) -> &'static str;

    fn interval(&self) -> Duration;

    /// Resolves once prerequisites of the first cycle are available
    async fn ready(&self) {}

    /// Fetch, map and publish one complete snapshot
    async fn poll_once(&self);
}

/// Poll forever: one cycle, then sleep for the poller's interval.
#[instrument(skip_all, fields(poller = poller.name()))]
pub async fn run_forever(poller: Arc<dyn Poller>, clock: Arc<dyn Clock>) {
    debug!("Waiting for poller prerequisites");
    poller.ready().await;
    info!(interval = ?poller.interval(), "Starting polling loop");

    loop {
        poller.poll_once().await;
        clock.sleep(poller.interval()).await;
    }
}

/// Spawn a poller as a background task
pub fn spawn(poller: Arc<dyn Poller>, clock: Arc<dyn Clock>) -> JoinHandle<()> {
    tokio::spawn(run_forever(poller, clock))
}
