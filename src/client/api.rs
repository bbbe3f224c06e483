//! Core HTTP client for GitHub API

use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use compact_str::{CompactString, ToCompactString, format_compact};
use reqwest::{
    Client, StatusCode,
    header::{
        ACCEPT, AUTHORIZATION, ETAG, HeaderMap, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED,
        LINK,
    },
};
use serde::{Deserialize, de::DeserializeOwned};
use tracing::{debug, info, instrument};
use url::Url;

use super::{
    auth::{AppAuthenticator, Authenticator, InstallationToken},
    cache::{CachedResponse, ResponseCache},
    config::ClientConfig,
    error::{ClientError, Result},
    page::{Page, PageRequest, next_page_from_link},
    source::ActionsSource,
};
use crate::{
    domain::{
        InstallationTokenDto, JobDto, JobsResponse, RepositoryDto, RunnerDto, RunnersResponse,
        WorkflowDto, WorkflowRunDto, WorkflowRunsResponse, WorkflowsResponse,
    },
    id::{RepoName, RunId},
};

const GITHUB_ACCEPT: &str = "application/vnd.github+json";
const GITHUB_API_VERSION: &str = "2022-11-28";

/// Wait applied when GitHub rejects a request without saying when to retry
const DEFAULT_RATE_LIMIT_WAIT_SECS: i64 = 60;
/// GitHub's primary rate limit window; no advertised wait is honoured beyond it
const MAX_RATE_LIMIT_WAIT_SECS: i64 = 60 * 60;

/// Authenticated HTTP client for the GitHub REST API.
///
/// One instance is built at startup and shared by every poller; the response
/// cache and installation token are synchronized internally.
pub struct GithubApi {
    client: Client,
    api_root: CompactString,
    auth: Authenticator,
    cache: Mutex<ResponseCache>,
}

/// GitHub API error response format
#[derive(Debug, Deserialize)]
struct GithubApiError {
    message: CompactString,
}

impl std::fmt::Debug for GithubApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GithubApi")
            .field("api_root", &self.api_root)
            .field("auth", &self.auth)
            .finish_non_exhaustive()
    }
}

impl GithubApi {
    /// Build the client, failing before any request if credentials or the base URL are unusable
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;

        let credentials = config.credentials()?;
        let api_root = config.api_root()?;
        let auth = Authenticator::from_credentials(&credentials)?;

        match &auth {
            Authenticator::Token(_) => info!(api_root = %api_root, "authenticating with GitHub token"),
            Authenticator::App(app) => info!(
                api_root = %api_root,
                installation_id = app.installation_id(),
                "authenticating as GitHub App installation"
            ),
        }

        let client = Client::builder()
            .timeout(config.request.timeout)
            .user_agent(config.request.user_agent.as_str())
            .build()
            .map_err(ClientError::Http)?;

        Ok(Self {
            client,
            api_root,
            auth,
            cache: Mutex::new(ResponseCache::new(config.cache_size_bytes)),
        })
    }

    pub fn api_root(&self) -> &str {
        &self.api_root
    }

    /// List self-hosted runners registered to an organization
    #[instrument(skip(self), fields(org = %org, page = page.page))]
    pub async fn list_org_runners(&self, org: &str, page: PageRequest) -> Result<Page<RunnerDto>> {
        let url = self.endpoint(&format!("/orgs/{org}/actions/runners"), page, &[])?;
        let (response, next_page) = self.get_page::<RunnersResponse>(url).await?;
        debug!(runner_count = response.runners.len(), "Successfully fetched runners");
        Ok(Page::new(response.runners, next_page))
    }

    /// List repositories of an organization
    #[instrument(skip(self), fields(org = %org, page = page.page))]
    pub async fn list_org_repos(&self, org: &str, page: PageRequest) -> Result<Page<RepositoryDto>> {
        let url = self.endpoint(&format!("/orgs/{org}/repos"), page, &[("type", "all")])?;
        let (repos, next_page) = self.get_page::<Vec<RepositoryDto>>(url).await?;
        debug!(repo_count = repos.len(), "Successfully fetched repositories");
        Ok(Page::new(repos, next_page))
    }

    /// List workflows defined in a repository
    #[instrument(skip(self), fields(repo = %repo, page = page.page))]
    pub async fn list_repo_workflows(
        &self,
        repo: &RepoName,
        page: PageRequest,
    ) -> Result<Page<WorkflowDto>> {
        let url = self.endpoint(&format!("/repos/{repo}/actions/workflows"), page, &[])?;
        let (response, next_page) = self.get_page::<WorkflowsResponse>(url).await?;
        debug!(workflow_count = response.workflows.len(), "Successfully fetched workflows");
        Ok(Page::new(response.workflows, next_page))
    }

    /// List workflow runs of a repository created at or after `created_after`
    #[instrument(skip(self), fields(repo = %repo, page = page.page))]
    pub async fn list_workflow_runs(
        &self,
        repo: &RepoName,
        created_after: DateTime<Utc>,
        page: PageRequest,
    ) -> Result<Page<WorkflowRunDto>> {
        let created = format!(">={}", created_after.format("%Y-%m-%dT%H:%M:%SZ"));
        let url = self.endpoint(
            &format!("/repos/{repo}/actions/runs"),
            page,
            &[("created", created.as_str())],
        )?;
        let (response, next_page) = self.get_page::<WorkflowRunsResponse>(url).await?;
        debug!(run_count = response.workflow_runs.len(), "Successfully fetched workflow runs");
        Ok(Page::new(response.workflow_runs, next_page))
    }

    /// List jobs of a workflow run
    #[instrument(skip(self), fields(repo = %repo, run_id = %run_id, page = page.page))]
    pub async fn list_run_jobs(
        &self,
        repo: &RepoName,
        run_id: RunId,
        page: PageRequest,
    ) -> Result<Page<JobDto>> {
        let url = self.endpoint(&format!("/repos/{repo}/actions/runs/{run_id}/jobs"), page, &[])?;
        let (response, next_page) = self.get_page::<JobsResponse>(url).await?;
        debug!(job_count = response.jobs.len(), "Successfully fetched jobs");
        Ok(Page::new(response.jobs, next_page))
    }

    fn endpoint(&self, path: &str, page: PageRequest, query: &[(&str, &str)]) -> Result<Url> {
        let raw = format!("{}{}", self.api_root, path);
        let mut url = Url::parse(&raw).map_err(|_| ClientError::invalid_url(raw.as_str()))?;
        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
            pairs.append_pair("per_page", &page.per_page.to_string());
            pairs.append_pair("page", &page.page.to_string());
        }
        Ok(url)
    }

    /// Perform a cached GET and deserialize the body, returning the next page cursor
    async fn get_page<T>(&self, url: Url) -> Result<(T, Option<u32>)>
    where
        T: DeserializeOwned,
    {
        let fetched = self.get_cached(&url).await?;
        let value = serde_json::from_str(&fetched.body)
            .map_err(|e| ClientError::json_parse(url.path(), "Failed to parse response", e))?;
        let next_page = fetched.link.as_deref().and_then(next_page_from_link);
        Ok((value, next_page))
    }

    /// GET revalidated against the response cache.
    ///
    /// A cached body is only returned on `304 Not Modified`.
    async fn get_cached(&self, url: &Url) -> Result<CachedResponse> {
        let authorization = self.authorization().await?;
        let cached = self.lock_cache().get(url.as_str()).cloned();

        let mut request = self
            .client
            .get(url.clone())
            .header(AUTHORIZATION, authorization.as_str())
            .header(ACCEPT, GITHUB_ACCEPT)
            .header("X-GitHub-Api-Version", GITHUB_API_VERSION);

        if let Some(cached) = &cached {
            if let Some(etag) = &cached.etag {
                request = request.header(IF_NONE_MATCH, etag.as_str());
            }
            if let Some(last_modified) = &cached.last_modified {
                request = request.header(IF_MODIFIED_SINCE, last_modified.as_str());
            }
        }

        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::NOT_MODIFIED
            && let Some(cached) = cached
        {
            debug!(url = %url, "Response not modified, using cached body");
            return Ok(cached);
        }

        let headers = response.headers().clone();
        let body = response.text().await?;

        if status.is_success() {
            let fetched = CachedResponse {
                etag: header_value(&headers, ETAG.as_str()),
                last_modified: header_value(&headers, LAST_MODIFIED.as_str()),
                link: header_value(&headers, LINK.as_str()),
                body,
            };
            if fetched.has_validator() {
                self.lock_cache().insert(url.as_str(), fetched.clone());
            }
            return Ok(fetched);
        }

        if status == StatusCode::UNAUTHORIZED
            && let Authenticator::App(app) = &self.auth
        {
            app.invalidate().await;
        }

        Err(classify_error(status, &headers, &body, url.path(), Utc::now()))
    }

    /// Value of the `Authorization` header, exchanging the app JWT for an
    /// installation token when the cached one is missing or about to expire
    async fn authorization(&self) -> Result<CompactString> {
        match &self.auth {
            Authenticator::Token(token) => Ok(format_compact!("Bearer {token}")),
            Authenticator::App(app) => {
                let now = Utc::now();
                let mut slot = app.token_slot().await;
                if let Some(token) = slot.as_ref().filter(|t| t.is_fresh(now)) {
                    return Ok(format_compact!("Bearer {}", token.token));
                }

                let token = self.request_installation_token(app, now).await?;
                let header = format_compact!("Bearer {}", token.token);
                *slot = Some(token);
                Ok(header)
            },
        }
    }

    #[instrument(skip(self, app, now), fields(installation_id = app.installation_id()))]
    async fn request_installation_token(
        &self,
        app: &AppAuthenticator,
        now: DateTime<Utc>,
    ) -> Result<InstallationToken> {
        let jwt = app.app_jwt(now)?;
        let raw = format!(
            "{}/app/installations/{}/access_tokens",
            self.api_root,
            app.installation_id()
        );
        let url = Url::parse(&raw).map_err(|_| ClientError::invalid_url(raw.as_str()))?;

        let response = self
            .client
            .post(url.clone())
            .bearer_auth(jwt)
            .header(ACCEPT, GITHUB_ACCEPT)
            .header("X-GitHub-Api-Version", GITHUB_API_VERSION)
            .send()
            .await?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(classify_error(status, &headers, &body, url.path(), Utc::now()));
        }

        let dto: InstallationTokenDto = serde_json::from_str(&body).map_err(|e| {
            ClientError::json_parse(url.path(), "Failed to parse installation token", e)
        })?;

        info!(expires_at = %dto.expires_at, "Obtained installation token");
        Ok(InstallationToken {
            token: dto.token,
            expires_at: dto.expires_at,
        })
    }

    fn lock_cache(&self) -> MutexGuard<'_, ResponseCache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl ActionsSource for GithubApi {
    async fn list_org_runners(&self, org: &str, page: PageRequest) -> Result<Page<RunnerDto>> {
        GithubApi::list_org_runners(self, org, page).await
    }

    async fn list_org_repos(&self, org: &str, page: PageRequest) -> Result<Page<RepositoryDto>> {
        GithubApi::list_org_repos(self, org, page).await
    }

    async fn list_repo_workflows(
        &self,
        repo: &RepoName,
        page: PageRequest,
    ) -> Result<Page<WorkflowDto>> {
        GithubApi::list_repo_workflows(self, repo, page).await
    }

    async fn list_workflow_runs(
        &self,
        repo: &RepoName,
        created_after: DateTime<Utc>,
        page: PageRequest,
    ) -> Result<Page<WorkflowRunDto>> {
        GithubApi::list_workflow_runs(self, repo, created_after, page).await
    }

    async fn list_run_jobs(
        &self,
        repo: &RepoName,
        run_id: RunId,
        page: PageRequest,
    ) -> Result<Page<JobDto>> {
        GithubApi::list_run_jobs(self, repo, run_id, page).await
    }
}

/// Map a non-success response onto the client error taxonomy.
fn classify_error(
    status: StatusCode,
    headers: &HeaderMap,
    body: &str,
    resource: &str,
    now: DateTime<Utc>,
) -> ClientError {
    if let Some(reset) = rate_limit_reset(status, headers, now) {
        return ClientError::rate_limit(reset);
    }

    let message = serde_json::from_str::<GithubApiError>(body)
        .map(|e| e.message)
        .unwrap_or_else(|_| body.to_compact_string());

    match status {
        StatusCode::UNAUTHORIZED => ClientError::Authentication,
        StatusCode::FORBIDDEN => ClientError::forbidden(message),
        StatusCode::NOT_FOUND => ClientError::not_found(resource),
        _ => ClientError::github_api(format_compact!("HTTP {}: {}", status.as_u16(), message)),
    }
}

/// Instant after which a rate-limited request may be retried, if the response is a rate limit.
///
/// Primary limits report `x-ratelimit-remaining: 0` with an epoch `x-ratelimit-reset`;
/// secondary limits report `retry-after` in seconds. The result never lies more than
/// `MAX_RATE_LIMIT_WAIT_SECS` after `now`.
pub fn rate_limit_reset(
    status: StatusCode,
    headers: &HeaderMap,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    if status != StatusCode::FORBIDDEN && status != StatusCode::TOO_MANY_REQUESTS {
        return None;
    }

    let after = |secs: i64| {
        chrono::Duration::try_seconds(secs)
            .and_then(|wait| now.checked_add_signed(wait))
            .unwrap_or(now)
    };
    let fallback = after(DEFAULT_RATE_LIMIT_WAIT_SECS);
    let ceiling = after(MAX_RATE_LIMIT_WAIT_SECS);

    if let Some(seconds) = header_u64(headers, "retry-after") {
        let seconds = i64::try_from(seconds).unwrap_or(MAX_RATE_LIMIT_WAIT_SECS);
        return Some(after(seconds.min(MAX_RATE_LIMIT_WAIT_SECS)));
    }

    if header_u64(headers, "x-ratelimit-remaining") == Some(0) {
        let reset = header_u64(headers, "x-ratelimit-reset")
            .and_then(|epoch| i64::try_from(epoch).ok())
            .and_then(|epoch| DateTime::from_timestamp(epoch, 0))
            .unwrap_or(fallback);
        return Some(reset.min(ceiling));
    }

    (status == StatusCode::TOO_MANY_REQUESTS).then_some(fallback)
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<CompactString> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_compact_string())
}

fn header_u64(headers: &HeaderMap, name: &str) -> Option<u64> {
    headers.get(name)?.to_str().ok()?.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use reqwest::header::HeaderValue;
    use serde_json::json;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{header, method, path, query_param},
    };

    use super::*;

    fn runner_json(id: u64, name: &str, status: &str, busy: bool) -> serde_json::Value {
        json!({
            "id": id,
            "name": name,
            "os": "linux",
            "status": status,
            "busy": busy,
            "labels": [{"id": 1, "name": "self-hosted", "type": "read-only"}]
        })
    }

    async fn api_for(server: &MockServer) -> GithubApi {
        let config = ClientConfig::with_token("ghp_test").with_api_url(Some(server.uri().into()));
        GithubApi::new(config).unwrap()
    }

    /// App-authenticated client; the key file must outlive the test
    fn api_for_app(server: &MockServer) -> (GithubApi, tempfile::NamedTempFile) {
        let mut key = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut key, include_bytes!("testdata/app_key.pem")).unwrap();

        let config =
            ClientConfig::with_app(1, 42, key.path()).with_api_url(Some(server.uri().into()));
        (GithubApi::new(config).unwrap(), key)
    }

    async fn mount_token_exchange(
        server: &MockServer,
        token: &str,
        valid_for: chrono::Duration,
        times: u64,
    ) {
        Mock::given(method("POST"))
            .and(path("/api/v3/app/installations/42/access_tokens"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "token": token,
                "expires_at": (Utc::now() + valid_for).to_rfc3339(),
            })))
            .expect(times)
            .mount(server)
            .await;
    }

    async fn mount_runners_for(server: &MockServer, token: &str) {
        Mock::given(method("GET"))
            .and(path("/api/v3/orgs/acme/actions/runners"))
            .and(header("authorization", format!("Bearer {token}").as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "total_count": 1,
                "runners": [runner_json(1, "r1", "online", false)]
            })))
            .mount(server)
            .await;
    }

    #[test]
    fn malformed_base_url_fails_construction() {
        let config = ClientConfig::with_token("ghp_test").with_api_url(Some("::nope::".into()));
        let err = GithubApi::new(config).unwrap_err();
        assert!(matches!(err, ClientError::InvalidUrl { .. }));
    }

    #[test]
    fn missing_credentials_fail_construction() {
        let mut config = ClientConfig::with_token("");
        config.token = None;
        assert!(GithubApi::new(config).is_err());
    }

    #[tokio::test]
    async fn runners_page_is_parsed_with_next_cursor() {
        let server = MockServer::start().await;
        let next = format!(
            r#"<{}/api/v3/orgs/acme/actions/runners?per_page=100&page=2>; rel="next""#,
            server.uri()
        );

        Mock::given(method("GET"))
            .and(path("/api/v3/orgs/acme/actions/runners"))
            .and(query_param("page", "1"))
            .and(query_param("per_page", "100"))
            .and(header("authorization", "Bearer ghp_test"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({
                        "total_count": 2,
                        "runners": [runner_json(1, "r1", "online", false)]
                    }))
                    .insert_header("link", next.as_str()),
            )
            .expect(1)
            .mount(&server)
            .await;

        let api = api_for(&server).await;
        let page = api
            .list_org_runners("acme", PageRequest::first())
            .await
            .unwrap();

        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].name, "r1");
        assert_eq!(page.next_page, Some(2));
    }

    #[tokio::test]
    async fn exhausted_rate_limit_is_reported_with_reset() {
        let server = MockServer::start().await;
        let reset_at = Utc::now().timestamp() + 120;

        Mock::given(method("GET"))
            .and(path("/api/v3/orgs/acme/actions/runners"))
            .respond_with(
                ResponseTemplate::new(403)
                    .set_body_json(json!({"message": "API rate limit exceeded"}))
                    .insert_header("x-ratelimit-remaining", "0")
                    .insert_header("x-ratelimit-reset", reset_at.to_string().as_str()),
            )
            .mount(&server)
            .await;

        let api = api_for(&server).await;
        let err = api
            .list_org_runners("acme", PageRequest::first())
            .await
            .unwrap_err();

        match err {
            ClientError::RateLimit { reset } => assert_eq!(reset.timestamp(), reset_at),
            other => panic!("expected rate limit, got {other}"),
        }
    }

    #[tokio::test]
    async fn installation_token_is_exchanged_once_and_reused() {
        let server = MockServer::start().await;
        mount_token_exchange(&server, "ghs_one", chrono::Duration::hours(1), 1).await;
        mount_runners_for(&server, "ghs_one").await;

        let (api, _key) = api_for_app(&server);
        for _ in 0..2 {
            let page = api
                .list_org_runners("acme", PageRequest::first())
                .await
                .unwrap();
            assert_eq!(page.items.len(), 1);
        }

        server.verify().await;
    }

    #[tokio::test]
    async fn unauthorized_response_forces_a_new_token_exchange() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/orgs/acme/actions/runners"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({"message": "Bad credentials"})),
            )
            .up_to_n_times(1)
            .mount(&server)
            .await;
        mount_token_exchange(&server, "ghs_one", chrono::Duration::hours(1), 2).await;
        mount_runners_for(&server, "ghs_one").await;

        let (api, _key) = api_for_app(&server);
        let err = api
            .list_org_runners("acme", PageRequest::first())
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Authentication));

        let page = api
            .list_org_runners("acme", PageRequest::first())
            .await
            .unwrap();
        assert_eq!(page.items.len(), 1);

        server.verify().await;
    }

    #[tokio::test]
    async fn token_near_expiry_is_exchanged_again() {
        let server = MockServer::start().await;
        mount_token_exchange(&server, "ghs_short", chrono::Duration::seconds(30), 2).await;
        mount_runners_for(&server, "ghs_short").await;

        let (api, _key) = api_for_app(&server);
        for _ in 0..2 {
            api.list_org_runners("acme", PageRequest::first())
                .await
                .unwrap();
        }

        server.verify().await;
    }

    #[tokio::test]
    async fn concurrent_requests_share_one_token_exchange() {
        let server = MockServer::start().await;
        mount_token_exchange(&server, "ghs_one", chrono::Duration::hours(1), 1).await;
        mount_runners_for(&server, "ghs_one").await;

        let (api, _key) = api_for_app(&server);
        let (first, second) = tokio::join!(
            api.list_org_runners("acme", PageRequest::first()),
            api.list_org_runners("acme", PageRequest::first()),
        );
        assert!(first.is_ok());
        assert!(second.is_ok());

        server.verify().await;
    }

    #[tokio::test]
    async fn server_errors_are_not_rate_limits() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/v3/orgs/acme/actions/runners"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let api = api_for(&server).await;
        let err = api
            .list_org_runners("acme", PageRequest::first())
            .await
            .unwrap_err();

        assert!(!err.is_rate_limit());
        assert!(err.to_string().contains("502"));
    }

    #[tokio::test]
    async fn unchanged_responses_are_revalidated_from_cache() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/v3/orgs/acme/actions/runners"))
            .and(header("if-none-match", "\"v1\""))
            .respond_with(ResponseTemplate::new(304))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/api/v3/orgs/acme/actions/runners"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({
                        "total_count": 1,
                        "runners": [runner_json(7, "cached", "offline", false)]
                    }))
                    .insert_header("etag", "\"v1\""),
            )
            .expect(1)
            .mount(&server)
            .await;

        let api = api_for(&server).await;
        let first = api
            .list_org_runners("acme", PageRequest::first())
            .await
            .unwrap();
        let second = api
            .list_org_runners("acme", PageRequest::first())
            .await
            .unwrap();

        assert_eq!(first.items[0].name, "cached");
        assert_eq!(second.items[0].name, "cached");
        assert_eq!(second.next_page, None);
    }

    #[tokio::test]
    async fn workflow_runs_are_filtered_by_creation_time() {
        let server = MockServer::start().await;
        let since = DateTime::from_timestamp(1_700_000_000, 0).unwrap();

        Mock::given(method("GET"))
            .and(path("/api/v3/repos/acme/widgets/actions/runs"))
            .and(query_param("created", ">=2023-11-14T22:13:20Z"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"total_count": 0, "workflow_runs": []})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let api = api_for(&server).await;
        let page = api
            .list_workflow_runs(&RepoName::from("acme/widgets"), since, PageRequest::first())
            .await
            .unwrap();

        assert!(page.items.is_empty());
    }

    #[test]
    fn secondary_rate_limit_uses_retry_after() {
        let now = Utc::now();
        let mut headers = HeaderMap::new();
        headers.insert("retry-after", HeaderValue::from_static("30"));

        let reset = rate_limit_reset(StatusCode::FORBIDDEN, &headers, now).unwrap();
        assert_eq!((reset - now).num_seconds(), 30);
    }

    #[test]
    fn absurd_rate_limit_headers_are_capped_at_one_hour() {
        let now = Utc::now();
        let mut retry_after = HeaderMap::new();
        retry_after.insert("retry-after", HeaderValue::from_static("99999999999999999"));

        let reset = rate_limit_reset(StatusCode::TOO_MANY_REQUESTS, &retry_after, now).unwrap();
        assert_eq!((reset - now).num_seconds(), MAX_RATE_LIMIT_WAIT_SECS);

        let mut far_reset = HeaderMap::new();
        far_reset.insert("x-ratelimit-remaining", HeaderValue::from_static("0"));
        far_reset.insert("x-ratelimit-reset", HeaderValue::from_static("18446744073709551615"));

        let reset = rate_limit_reset(StatusCode::FORBIDDEN, &far_reset, now).unwrap();
        assert!(reset - now <= chrono::Duration::seconds(MAX_RATE_LIMIT_WAIT_SECS));
    }

    #[test]
    fn plain_forbidden_is_not_a_rate_limit() {
        let mut headers = HeaderMap::new();
        headers.insert("x-ratelimit-remaining", HeaderValue::from_static("4999"));

        assert!(rate_limit_reset(StatusCode::FORBIDDEN, &headers, Utc::now()).is_none());
        assert!(rate_limit_reset(StatusCode::OK, &HeaderMap::new(), Utc::now()).is_none());
        assert!(rate_limit_reset(StatusCode::TOO_MANY_REQUESTS, &HeaderMap::new(), Utc::now()).is_some());
    }
}
