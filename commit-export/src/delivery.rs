//! Signed, retried delivery of a [`Batch`] to the ingestion endpoint.

use std::time::Duration;

use api_client::{retry, ApiClient, Attempts, Backoff, ClientService, Exhausted, Secret};
use bytes::Bytes;
use http::{header, HeaderValue, StatusCode, Uri};
use hyperdriver::Client;
use thiserror::Error;
use tokio::time::Instant;

use crate::commit::{job_minutes, Batch};
use crate::signature::{sign, SIGNATURE_HEADER};

/// Where batches are sent unless `api-url` says otherwise.
pub const DEFAULT_INGEST_URL: &str = "https://buildinpublic.so/api/github-actions/ingest";

/// User agent identifying this action to the ingestion endpoint.
pub const USER_AGENT: &str = "buildinpublic.so-Action/1.0.0";

/// Per-attempt timeout when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const SNIPPET_CHARS: usize = 200;

/// One failed attempt to deliver a batch.
#[derive(Debug, Error)]
pub enum AttemptError {
    /// The batch could not be encoded.
    #[error("Could not encode batch: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The exchange failed, or did not finish within the timeout.
    #[error(transparent)]
    Transport(#[from] api_client::Error),

    /// The endpoint answered with a non-2xx status.
    #[error("API request failed: {status} - {body}")]
    Status {
        /// Response status.
        status: StatusCode,
        /// Response body, as text.
        body: String,
    },

    /// The endpoint answered 2xx, but not with JSON.
    #[error("Invalid JSON response from API: {snippet}")]
    NonJson {
        /// The first characters of the body.
        snippet: String,
    },
}

/// Every attempt to deliver the batch failed.
#[derive(Debug, Error)]
#[error("Failed after {attempts} attempts. Last error: {last}")]
pub struct DeliveryError {
    /// Attempts made.
    pub attempts: u32,
    /// Error from the final attempt.
    pub last: AttemptError,
}

impl From<Exhausted<AttemptError>> for DeliveryError {
    fn from(exhausted: Exhausted<AttemptError>) -> Self {
        Self {
            attempts: exhausted.attempts,
            last: exhausted.last,
        }
    }
}

/// Receipt for a delivered batch.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    /// The JSON document the endpoint returned.
    pub response: serde_json::Value,
    /// Attempt that succeeded, counting from one.
    pub attempts: u32,
    /// Job minutes reported in the successful submission.
    pub job_minutes: u64,
}

/// How to reach the ingestion endpoint.
#[derive(Debug, Clone)]
pub struct DeliveryConfig {
    /// Absolute URL batches are posted to.
    pub endpoint: Uri,
    /// Total attempts, including the first.
    pub attempts: Attempts,
    /// Delay schedule between attempts.
    pub backoff: Backoff,
    /// Limit on each individual attempt, from sending the request to reading
    /// the last byte of the response.
    pub timeout: Duration,
}

impl DeliveryConfig {
    /// Three attempts, one and two seconds apart, with the default timeout.
    pub fn new(endpoint: Uri) -> Self {
        Self {
            endpoint,
            attempts: Attempts::default(),
            backoff: Backoff::default(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Limit each attempt to `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Posts batches to the ingestion endpoint.
#[derive(Debug, Clone)]
pub struct DeliveryClient {
    client: ApiClient,
    config: DeliveryConfig,
}

impl DeliveryClient {
    /// Create a client which talks to the network.
    pub fn new(config: DeliveryConfig) -> Self {
        let mut builder = Client::build_tcp_http();
        builder.transport().config_mut().connect_timeout = Some(CONNECT_TIMEOUT);

        let service = builder
            .with_default_tls()
            .with_user_agent(USER_AGENT.to_owned())
            .with_timeout(config.timeout)
            .build_service();

        Self::from_service(config, service)
    }

    /// Create a client which sends requests through an existing service.
    pub fn from_service(
        config: DeliveryConfig,
        service: ClientService,
    ) -> Self {
        Self {
            client: ApiClient::new_with_inner_service(config.endpoint.clone(), (), service),
            config,
        }
    }

    /// The endpoint batches are posted to.
    pub fn endpoint(&self) -> &Uri {
        &self.config.endpoint
    }

    /// Deliver `batch`, retrying with backoff until it succeeds or attempts run out.
    ///
    /// `started` marks the beginning of the job. Every attempt measures job
    /// minutes afresh, so a submission sent after retries reports the time
    /// spent waiting as well.
    #[tracing::instrument(skip_all, fields(commits = batch.commits().len()))]
    pub async fn deliver(
        &self,
        batch: &Batch,
        secret: &Secret,
        started: Instant,
    ) -> Result<Delivery, DeliveryError> {
        let delivery = retry(self.config.attempts, self.config.backoff, |attempt| {
            self.attempt(batch, secret, started, attempt)
        })
        .await?;

        Ok(delivery)
    }

    async fn attempt(
        &self,
        batch: &Batch,
        secret: &Secret,
        started: Instant,
        attempt: u32,
    ) -> Result<Delivery, AttemptError> {
        let job_minutes = job_minutes(started.elapsed());
        let payload = serde_json::to_vec(&batch.submission(job_minutes))?;
        let signature = sign(&payload, secret);

        tracing::debug!("Sending payload: {}", String::from_utf8_lossy(&payload));
        tracing::info!(
            "Sending {} commits to {} (attempt {}/{})",
            batch.commits().len(),
            self.config.endpoint,
            attempt,
            self.config.attempts.get()
        );

        let response = self
            .client
            .post_to(self.config.endpoint.clone())
            .header(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .header(header::USER_AGENT, HeaderValue::from_static(USER_AGENT))
            .header(SIGNATURE_HEADER, signature)
            .timeout(self.config.timeout)
            .body(Bytes::from(payload))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(AttemptError::Status { status, body });
        }

        match serde_json::from_str(&body) {
            Ok(response) => {
                tracing::info!("Successfully sent commits to API");
                Ok(Delivery {
                    response,
                    attempts: attempt,
                    job_minutes,
                })
            }
            Err(error) => {
                tracing::debug!("Response is not JSON: {error}");
                Err(AttemptError::NonJson {
                    snippet: body.chars().take(SNIPPET_CHARS).collect(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use api_client::mock::{MockResponse, MockService};
    use serde_json::json;

    use super::*;
    use crate::commit::{Author, Commit, FileChanges};
    use crate::signature::verify_signature;

    const INGEST: &str = "https://ingest.example.com/api/github-actions/ingest";
    const PATH: &str = "/api/github-actions/ingest";

    fn batch() -> Batch {
        let commit = Commit {
            id: "abc123".to_owned(),
            message: "fix".to_owned(),
            author: Author {
                name: "A".to_owned(),
                email: "a@x.com".to_owned(),
            },
            timestamp: "2024-01-01T00:00:00.000Z".to_owned(),
            url: "https://github.com/octo/hello/commit/abc123".to_owned(),
            files: FileChanges::new(vec!["f.ts".into()], vec![], vec![]),
        };
        Batch::new("octo", "hello", Some("main".into()), vec![commit]).unwrap()
    }

    fn client(mock: &MockService) -> DeliveryClient {
        DeliveryClient::from_service(
            DeliveryConfig::new(Uri::from_static(INGEST)),
            mock.clone().into_client_service(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn first_attempt_succeeds() {
        let mut mock = MockService::new();
        mock.respond(PATH, MockResponse::json(StatusCode::OK, &json!({"ok": true})));

        let secret = Secret::from("tok");
        let delivery = client(&mock)
            .deliver(&batch(), &secret, Instant::now())
            .await
            .unwrap();

        assert_eq!(delivery.attempts, 1);
        assert_eq!(delivery.job_minutes, 1);
        assert_eq!(delivery.response, json!({"ok": true}));

        let requests = mock.requests();
        assert_eq!(requests.len(), 1);

        let request = &requests[0];
        assert_eq!(request.method, http::Method::POST);
        assert_eq!(request.uri.to_string(), INGEST);
        assert_eq!(request.header("content-type"), Some("application/json"));
        assert_eq!(request.header("user-agent"), Some(USER_AGENT));

        let signature = request.header(SIGNATURE_HEADER).unwrap();
        assert!(verify_signature(&request.body, signature, b"tok"));

        let body: serde_json::Value = serde_json::from_slice(&request.body).unwrap();
        assert_eq!(body["repo"], "hello");
        assert_eq!(body["owner"], "octo");
        assert_eq!(body["branch"], "main");
        assert_eq!(body["job_minutes"], 1);
        assert_eq!(body["commits"][0]["files"]["total_changes"], 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_with_backoff() {
        let mut mock = MockService::new();
        mock.respond(PATH, MockResponse::text(StatusCode::BAD_GATEWAY, "upstream"));
        mock.fail(PATH);
        mock.respond(PATH, MockResponse::json(StatusCode::OK, &json!({"ok": true})));

        let delivery = client(&mock)
            .deliver(&batch(), &Secret::from("tok"), Instant::now())
            .await
            .unwrap();

        assert_eq!(delivery.attempts, 3);

        let requests = mock.requests();
        assert_eq!(requests.len(), 3);
        let first_gap = requests[1].at - requests[0].at;
        let second_gap = requests[2].at - requests[1].at;
        assert!(first_gap >= Duration::from_secs(1) && first_gap < Duration::from_millis(1_050));
        assert!(second_gap >= Duration::from_secs(2) && second_gap < Duration::from_millis(2_050));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_attempts_report_last_error() {
        let mut mock = MockService::new();
        mock.respond(
            PATH,
            MockResponse::text(StatusCode::INTERNAL_SERVER_ERROR, "boom"),
        );

        let error = client(&mock)
            .deliver(&batch(), &Secret::from("tok"), Instant::now())
            .await
            .unwrap_err();

        assert_eq!(error.attempts, 3);
        assert!(matches!(
            error.last,
            AttemptError::Status { status, ref body }
                if status == StatusCode::INTERNAL_SERVER_ERROR && body == "boom"
        ));
        assert_eq!(
            error.to_string(),
            "Failed after 3 attempts. Last error: API request failed: 500 Internal Server Error - boom"
        );
        assert_eq!(mock.requests().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn non_json_success_is_an_error() {
        let mut mock = MockService::new();
        let page = "x".repeat(500);
        mock.respond(PATH, MockResponse::text(StatusCode::OK, &page));

        let error = client(&mock)
            .deliver(&batch(), &Secret::from("tok"), Instant::now())
            .await
            .unwrap_err();

        match error.last {
            AttemptError::NonJson { snippet } => assert_eq!(snippet.len(), 200),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn job_minutes_grow_between_attempts() {
        let mut mock = MockService::new();
        mock.respond(PATH, MockResponse::text(StatusCode::SERVICE_UNAVAILABLE, ""));
        mock.respond(PATH, MockResponse::json(StatusCode::OK, &json!({})));

        // The job has been running for 59.5 seconds; the one second backoff
        // pushes the second attempt over a minute.
        let started = Instant::now();
        tokio::time::advance(Duration::from_millis(59_500)).await;

        let delivery = client(&mock)
            .deliver(&batch(), &Secret::from("tok"), started)
            .await
            .unwrap();

        assert_eq!(delivery.attempts, 2);
        assert_eq!(delivery.job_minutes, 2);

        let requests = mock.requests();
        let first: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        let second: serde_json::Value = serde_json::from_slice(&requests[1].body).unwrap();
        assert_eq!(first["job_minutes"], 1);
        assert_eq!(second["job_minutes"], 2);
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_endpoint_times_out_every_attempt() {
        let mut mock = MockService::new();
        mock.stall(PATH);

        let client = DeliveryClient::from_service(
            DeliveryConfig::new(Uri::from_static(INGEST)).with_timeout(Duration::from_secs(5)),
            mock.clone().into_client_service(),
        );

        let started = Instant::now();
        let error = client
            .deliver(&batch(), &Secret::from("tok"), started)
            .await
            .unwrap_err();

        assert_eq!(error.attempts, 3);
        assert!(matches!(
            error.last,
            AttemptError::Transport(api_client::Error::Timeout(limit)) if limit == Duration::from_secs(5)
        ));
        assert_eq!(
            error.to_string(),
            "Failed after 3 attempts. Last error: Request timed out after 5000ms"
        );
        assert_eq!(mock.requests().len(), 3);

        // Three five second attempts plus the one and two second backoffs.
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(18), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(18_200), "{elapsed:?}");
    }
}
