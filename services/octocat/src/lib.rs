//! Simple client for reading commit details from the Github REST API.

use api_client::response::ApiResponse;
use api_client::{ApiClient, BearerAuth, ClientService, Secret};

use http::header;
use http::{HeaderName, HeaderValue, Uri};
use hyperdriver::Client;
use thiserror::Error;
use tower_http::set_header::SetRequestHeaderLayer;

mod config;
pub mod models;

pub use crate::config::GithubConfig;
use crate::models::Commit;

const CONNECT_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);
const TIMEOUT: std::time::Duration = std::time::Duration::from_secs(60);
const GITHUB_ACCEPT: &str = "application/vnd.github+json";
const GITHUB_API_VERSION: &str = "2022-11-28";
const GITHUB_API_VERSION_HEADER: &str = "x-github-api-version";
const GITHUB_BASE: &str = "https://api.github.com/";
const USER_AGENT: &str = "commit-export-octocat/0.1.0";

/// Errors that can occur when using the Github client.
#[derive(Debug, Error)]
pub enum Error {
    /// An error that occurs when sending a request.
    #[error("Sending request: {0}")]
    Request(#[from] api_client::Error),

    /// An error that occurs when serializing or deserializing a model.
    #[error("Model: {0}")]
    Serde(#[from] serde_json::Error),

    /// A response not in the 200-299 range.
    #[error("Response: {0}")]
    Response(#[from] ResponseError),
}

/// An error that occurs when a response is not successful.
#[derive(Debug, Clone, Error)]
#[error("Response error: {status:?} {body}")]
pub struct ResponseError {
    status: http::StatusCode,
    body: String,
}

impl ResponseError {
    async fn from_response(response: ApiResponse) -> Self {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Self { status, body }
    }

    /// The HTTP status Github returned.
    pub fn status(&self) -> http::StatusCode {
        self.status
    }
}

/// A Github client authenticated with a bearer token, e.g. the workflow's `GITHUB_TOKEN`.
#[derive(Debug, Clone)]
pub struct GithubClient {
    client: ApiClient,
}

impl GithubClient {
    /// Create a client for github.com.
    pub fn new(token: Secret) -> Self {
        Self::with_base(Uri::from_static(GITHUB_BASE), token)
    }

    /// Create a client for the REST API rooted at `base`.
    pub fn with_base(base: Uri, token: Secret) -> Self {
        let mut builder = Client::build_tcp_http();
        builder.transport().config_mut().connect_timeout = Some(CONNECT_TIMEOUT);

        let service = builder
            .with_default_tls()
            .with_user_agent(USER_AGENT.to_owned())
            .with_timeout(TIMEOUT)
            .build_service();

        Self::from_service(base, token, service)
    }

    /// Create a client which sends requests through an existing service.
    pub fn from_service(
        base: Uri,
        token: Secret,
        service: ClientService,
    ) -> Self {
        let service = tower::ServiceBuilder::new()
            .layer(SetRequestHeaderLayer::if_not_present(
                header::ACCEPT,
                HeaderValue::from_static(GITHUB_ACCEPT),
            ))
            .layer(SetRequestHeaderLayer::if_not_present(
                HeaderName::from_static(GITHUB_API_VERSION_HEADER),
                HeaderValue::from_static(GITHUB_API_VERSION),
            ))
            .service(service);

        Self {
            client: ApiClient::new_with_inner_service(base, BearerAuth::new(token), service),
        }
    }

    /// Build a GET request against a Github endpoint.
    pub fn get(&self, endpoint: &str) -> api_client::RequestBuilder {
        self.client.get(endpoint)
    }

    /// Fetch a single commit, including the list of files it touched.
    #[tracing::instrument(skip(self))]
    pub async fn commit(&self, owner: &str, repo: &str, sha: &str) -> Result<Commit, Error> {
        let resp = self
            .get(&format!("repos/{owner}/{repo}/commits/{sha}"))
            .timeout(TIMEOUT)
            .send()
            .await?;

        if !resp.status().is_success() {
            let error = ResponseError::from_response(resp).await;
            return Err(Error::Response(error));
        }

        let body = resp.text().await?;
        let commit: Commit = serde_json::from_str(&body)?;
        tracing::debug!(files = commit.files.len(), "Got commit details");

        Ok(commit)
    }
}
