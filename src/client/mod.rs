//! GitHub client modules
//!
//! The exporter talks to GitHub through one long-lived [`GithubApi`], built
//! once from a [`ClientConfig`] and shared by every poller. Pollers depend on
//! the [`ActionsSource`] trait rather than on the concrete client.

pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod page;
pub mod source;

// Re-export main types for convenience
pub use api::GithubApi;
pub use config::{AppCredentials, ClientConfig, Credentials, RequestConfig, enterprise_api_url};
pub use error::ClientError;
pub use page::{MAX_PER_PAGE, Page, PageRequest};
pub use source::ActionsSource;

pub type Result<T> = std::result::Result<T, ClientError>;
