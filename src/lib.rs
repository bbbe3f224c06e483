//! Prometheus exporter for GitHub Actions.
//!
//! Pollers fetch organization runners and recent workflow runs from the REST
//! API and publish them as snapshot gauges served on `/metrics`.

pub mod app_init;
pub mod client;
pub mod config;
pub mod domain;
pub mod fetch;
pub mod id;
pub mod logging;
pub mod poller;
pub mod result;
pub mod server;
pub mod sink;
