use std::sync::Arc;

use reqwest::header::{ACCEPT, USER_AGENT};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::{DocdexError, Result};
use crate::github::rate_limit::RateLimiter;

const GITHUB_API_ROOT: &str = "https://api.github.com";
const GITHUB_JSON: &str = "application/vnd.github+json";
const API_VERSION: &str = "2022-11-28";
const AGENT: &str = concat!("docdex/", env!("CARGO_PKG_VERSION"));

/// Thin typed client for the handful of GitHub REST endpoints the bot
/// uses. Every request goes through the [`RateLimiter`] and carries the
/// standard GitHub headers; bearer auth is attached when a token is
/// configured.
pub struct GitHubClient {
    http: reqwest::Client,
    limiter: Arc<RateLimiter>,
    token: Option<String>,
    api_root: String,
}

impl GitHubClient {
    pub fn new(http: reqwest::Client, limiter: Arc<RateLimiter>, token: Option<String>) -> Self {
        Self {
            http,
            limiter,
            token: token.filter(|t| !t.trim().is_empty()),
            api_root: GITHUB_API_ROOT.to_string(),
        }
    }

    /// Overrides the API root. Intended for tests against a local mock.
    pub fn with_api_root(mut self, root: impl Into<String>) -> Self {
        self.api_root = root.into();
        self
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    async fn get(&self, url: String, query: &[(&str, &str)]) -> Result<reqwest::Response> {
        let mut builder = self
            .http
            .get(&url)
            .header(ACCEPT, GITHUB_JSON)
            .header(USER_AGENT, AGENT)
            .header("X-GitHub-Api-Version", API_VERSION);
        if !query.is_empty() {
            builder = builder.query(query);
        }
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }
        let request = builder.build()?;
        self.limiter.execute(&self.http, request).await
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: String,
        query: &[(&str, &str)],
    ) -> Result<Option<T>> {
        let response = self.get(url, query).await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(DocdexError::GitHub {
                status: Some(status.as_u16()),
                message,
            });
        }
        Ok(Some(response.json().await?))
    }

    /// Releases for a repository, newest first.
    pub async fn releases(&self, slug: &str) -> Result<Vec<Release>> {
        let url = format!("{}/repos/{}/releases", self.api_root, slug);
        Ok(self.get_json(url, &[]).await?.unwrap_or_default())
    }

    /// Commit sha a tag points at, or `None` when the tag does not exist.
    pub async fn tag_commit(&self, slug: &str, tag: &str) -> Result<Option<String>> {
        let url = format!("{}/repos/{}/git/refs/tags/{}", self.api_root, slug, tag);
        let reference: Option<GitRef> = self.get_json(url, &[]).await?;
        Ok(reference.map(|r| r.object.sha))
    }

    /// Code-search hits for a raw query string.
    pub async fn search_code(&self, query: &str) -> Result<Vec<CodeSearchHit>> {
        let url = format!("{}/search/code", self.api_root);
        let results: Option<CodeSearchResults> =
            self.get_json(url, &[("q", query)]).await?;
        Ok(results.map(|r| r.items).unwrap_or_default())
    }

    pub async fn issue(&self, slug: &str, number: u64) -> Result<Option<Issue>> {
        let url = format!("{}/repos/{}/issues/{}", self.api_root, slug, number);
        self.get_json(url, &[]).await
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Release {
    pub tag_name: String,
}

#[derive(Debug, Deserialize)]
struct GitRef {
    object: GitRefObject,
}

#[derive(Debug, Deserialize)]
struct GitRefObject {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct CodeSearchResults {
    #[serde(default)]
    items: Vec<CodeSearchHit>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CodeSearchHit {
    pub name: String,
    pub html_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Issue {
    pub number: u64,
    pub title: String,
    pub html_url: String,
    #[serde(default)]
    pub user: Option<IssueUser>,
    /// Present when the issue is actually a pull request.
    #[serde(default)]
    pub pull_request: Option<serde_json::Value>,
}

impl Issue {
    pub fn is_pull_request(&self) -> bool {
        self.pull_request.is_some()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct IssueUser {
    pub login: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer, token: Option<&str>) -> GitHubClient {
        GitHubClient::new(
            reqwest::Client::new(),
            Arc::new(RateLimiter::github()),
            token.map(str::to_string),
        )
        .with_api_root(server.uri())
    }

    #[tokio::test]
    async fn releases_parse_and_carry_standard_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/gadget/releases"))
            .and(header("accept", "application/vnd.github+json"))
            .and(header("x-github-api-version", "2022-11-28"))
            .and(header("authorization", "Bearer sekrit"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"tag_name": "v1.2.3"},
                {"tag_name": "v1.2.2"}
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, Some("sekrit"));
        let releases = client.releases("acme/gadget").await.unwrap();
        assert_eq!(releases.len(), 2);
        assert_eq!(releases[0].tag_name, "v1.2.3");
    }

    #[tokio::test]
    async fn missing_tag_is_none_not_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/gadget/git/refs/tags/v9.9.9"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = client_for(&server, None);
        let sha = client.tag_commit("acme/gadget", "v9.9.9").await.unwrap();
        assert_eq!(sha, None);
    }

    #[tokio::test]
    async fn tag_commit_reads_object_sha() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/gadget/git/refs/tags/v1.2.3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ref": "refs/tags/v1.2.3",
                "object": {"sha": "abc123", "type": "commit"}
            })))
            .mount(&server)
            .await;

        let client = client_for(&server, None);
        let sha = client.tag_commit("acme/gadget", "v1.2.3").await.unwrap();
        assert_eq!(sha.as_deref(), Some("abc123"));
    }

    #[tokio::test]
    async fn search_code_sends_query_and_parses_items() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search/code"))
            .and(query_param("q", "Widget repo:acme/gadget language:rust"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "total_count": 1,
                "items": [{"name": "widget.rs", "html_url": "https://github.com/acme/gadget/blob/main/src/widget.rs"}]
            })))
            .mount(&server)
            .await;

        let client = client_for(&server, Some("t"));
        let hits = client
            .search_code("Widget repo:acme/gadget language:rust")
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "widget.rs");
    }

    #[tokio::test]
    async fn server_errors_surface_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/gadget/releases"))
            .respond_with(
                ResponseTemplate::new(422).set_body_string("validation failed"),
            )
            .mount(&server)
            .await;

        let client = client_for(&server, None);
        let err = client.releases("acme/gadget").await.unwrap_err();
        match err {
            DocdexError::GitHub { status, message } => {
                assert_eq!(status, Some(422));
                assert!(message.contains("validation failed"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn issue_lookup_parses_author() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/gadget/issues/17"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "number": 17,
                "title": "Widget resize glitch",
                "html_url": "https://github.com/acme/gadget/issues/17",
                "user": {"login": "octocat"}
            })))
            .mount(&server)
            .await;

        let client = client_for(&server, None);
        let issue = client.issue("acme/gadget", 17).await.unwrap().unwrap();
        assert_eq!(issue.title, "Widget resize glitch");
        assert_eq!(issue.user.unwrap().login, "octocat");
    }
}
