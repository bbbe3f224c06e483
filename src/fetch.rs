//! Rate-limit aware pagination shared by every poller.
//!
//! [`Fetcher::fetch_all`] walks a list endpoint page by page. Rate limits are
//! waited out and retried without limit; any other error ends the walk and the
//! records gathered so far are returned, so a poller reports a subset rather
//! than nothing.

use std::{future::Future, sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, error, warn};

use crate::client::{ClientError, MAX_PER_PAGE, Page, PageRequest};

/// Source of wall-clock time and sleeps, injectable so tests never really wait
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    async fn sleep(&self, duration: Duration);
}

/// Clock backed by the system time and the tokio timer
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Wait-until-reset policy applied to rate-limit rejections
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitBackoff {
    /// Floor applied when the reported reset instant is already in the past
    pub min_wait: Duration,
}

impl Default for RateLimitBackoff {
    fn default() -> Self {
        Self {
            min_wait: Duration::from_secs(1),
        }
    }
}

impl RateLimitBackoff {
    pub fn wait_for(&self, now: DateTime<Utc>, reset: DateTime<Utc>) -> Duration {
        (reset - now)
            .to_std()
            .unwrap_or(Duration::ZERO)
            .max(self.min_wait)
    }
}

/// Paginating fetcher shared by the pollers
#[derive(Clone)]
pub struct Fetcher {
    clock: Arc<dyn Clock>,
    backoff: RateLimitBackoff,
    per_page: u32,
}

impl Fetcher {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            backoff: RateLimitBackoff::default(),
            per_page: MAX_PER_PAGE,
        }
    }

    pub fn with_page_size(mut self, per_page: u32) -> Self {
        self.per_page = per_page;
        self
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Concatenate every page of a list operation.
    ///
    /// `what` names the target (e.g. `runners of acme`) in log lines.
    pub async fn fetch_all<T, F, Fut>(&self, what: &str, mut fetch_page: F) -> Vec<T>
    where
        F: FnMut(PageRequest) -> Fut,
        Fut: Future<Output = Result<Page<T>, ClientError>>,
    {
        let mut records = Vec::new();
        let mut request = PageRequest::first_with_size(self.per_page);

        loop {
            match fetch_page(request).await {
                Ok(page) => {
                    records.extend(page.items);
                    match page.next_page {
                        None => break,
                        Some(next) if next > request.page => request = request.at(next),
                        Some(next) => {
                            warn!(
                                what,
                                page = request.page,
                                next,
                                "Pagination cursor did not advance, stopping"
                            );
                            break;
                        },
                    }
                },
                Err(ClientError::RateLimit { reset }) => {
                    let wait = self.backoff.wait_for(self.clock.now(), reset);
                    warn!(
                        what,
                        page = request.page,
                        reset = %reset,
                        wait_secs = wait.as_secs(),
                        "Rate limited, pausing until reset"
                    );
                    self.clock.sleep(wait).await;
                },
                Err(e) => {
                    error!(
                        what,
                        page = request.page,
                        fetched = records.len(),
                        error = %e,
                        "Fetch failed, keeping partial results"
                    );
                    break;
                },
            }
        }

        debug!(what, record_count = records.len(), "Fetch complete");
        records
    }
}
