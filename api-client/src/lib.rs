//! HTTP API client plumbing shared by the service clients in this workspace.

use std::sync::Arc;

use http::Method;
use http::Uri;
use hyperdriver::service::SharedService;
use hyperdriver::Body;
pub use secret::Secret;
use tower::{Layer as _, ServiceExt};

mod authentication;
pub mod error;
pub mod mock;
pub mod request;
pub mod response;
pub mod retry;
pub mod uri;

pub use self::authentication::{
    Authentication, AuthenticationLayer, AuthenticationService, BearerAuth,
};
pub use self::error::Error;
pub use self::request::RequestBuilder;
use self::response::ApiResponse;
pub use self::retry::{retry, Attempts, Backoff, Exhausted};

/// Request type accepted by the transport.
pub type Request = http::Request<Body>;

/// Response type produced by the transport.
pub type Response = http::Response<Body>;

/// A cloneable, type-erased transport service.
pub type ClientService = hyperdriver::client::SharedClientService<Body, Body>;

/// A client for accessing APIs over HTTP / HTTPS
///
/// Useful inner object to wrap for individual API clients. Authentication is
/// fixed when the client is built and applied to every request it sends.
#[derive(Debug, Clone)]
pub struct ApiClient {
    base: Arc<Uri>,
    inner: ClientService,
}

impl ApiClient {
    /// Create a new API Client from a base URL and an authentication method
    pub fn new<A>(base: Uri, authentication: A) -> Self
    where
        A: Authentication + Send + Sync + 'static,
    {
        let inner = hyperdriver::Client::build_tcp_http()
            .with_default_tls()
            .layer(AuthenticationLayer::new(authentication))
            .build_service();

        ApiClient {
            base: Arc::new(base),
            inner,
        }
    }

    /// Create a new API Client which sends requests through `inner`.
    ///
    /// Used to supply a pre-configured transport, or a [`mock::MockService`] in tests.
    pub fn new_with_inner_service<A, S>(base: Uri, authentication: A, inner: S) -> Self
    where
        A: Authentication + Send + Sync + 'static,
        S: tower::Service<Request, Response = Response, Error = hyperdriver::client::Error>
            + Clone
            + Send
            + Sync
            + 'static,
        S::Future: Send + 'static,
    {
        let service = AuthenticationLayer::new(authentication).layer(inner);

        ApiClient {
            base: Arc::new(base),
            inner: SharedService::new(service),
        }
    }

    /// The base URL for relative endpoints.
    pub fn base(&self) -> &Uri {
        &self.base
    }

    /// Build a GET request for an endpoint relative to the base URL.
    pub fn get(&self, endpoint: &str) -> RequestBuilder {
        let url = uri::join(self.base(), endpoint);
        RequestBuilder::new(self.clone(), url, Method::GET)
    }

    /// Build a POST request to an absolute URL, ignoring the base URL.
    pub fn post_to(&self, url: Uri) -> RequestBuilder {
        RequestBuilder::new(self.clone(), url, Method::POST)
    }

    /// Send a fully-built request, returning once the response head arrives.
    pub async fn execute(&self, req: Request) -> Result<ApiResponse, hyperdriver::client::Error> {
        let response = self.inner.clone().oneshot(req).await?;
        Ok(ApiResponse::new(response))
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use super::*;
    use crate::mock::{MockResponse, MockService};

    #[test]
    fn extensions_produce_send_futures() {
        let client = ApiClient::new(
            "http://httpbin.org/get/".parse().unwrap(),
            BearerAuth::new(Secret::from("secret garden")),
        );
        let builder = client.get("frobulator");

        fn assert_send<T: Send>(_t: T) {}

        let fut = builder.send();
        assert_send(fut);
    }

    #[tokio::test]
    async fn mock_client_works() {
        let mut mock = MockService::new();
        mock.respond(
            "/get/",
            MockResponse::text(http::StatusCode::OK, "frobulator"),
        );

        let client = ApiClient::new_with_inner_service(
            "http://httpbin.org/get/".parse().unwrap(),
            BearerAuth::new(Secret::from("secret garden")),
            mock.clone(),
        );

        let response = client.get("").send().await.unwrap();
        assert_eq!(response.status(), http::StatusCode::OK);
        assert_eq!(response.text().await.unwrap(), "frobulator");

        let requests = mock.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].header("authorization"), Some("Bearer secret garden"));
    }

    #[tokio::test]
    async fn mock_replays_script_in_order() {
        let mut mock = MockService::new();
        mock.fail("/ingest");
        mock.respond(
            "/ingest",
            MockResponse::text(http::StatusCode::BAD_GATEWAY, "down"),
        );
        mock.respond(
            "/ingest",
            MockResponse::json(http::StatusCode::OK, &serde_json::json!({"ok": true})),
        );

        let client =
            ApiClient::new_with_inner_service("https://example.com/".parse().unwrap(), (), mock.clone());
        let ingest: Uri = "https://example.com/ingest".parse().unwrap();

        let first = client
            .post_to(ingest.clone())
            .body(bytes::Bytes::from_static(b"1"))
            .send()
            .await;
        assert!(matches!(first, Err(Error::Request(_))));

        let second = client.post_to(ingest.clone()).send().await.unwrap();
        assert_eq!(second.status(), http::StatusCode::BAD_GATEWAY);

        for _ in 0..2 {
            let ok = client.post_to(ingest.clone()).send().await.unwrap();
            assert_eq!(ok.status(), http::StatusCode::OK);
        }

        let requests = mock.requests_to("/ingest");
        assert_eq!(requests.len(), 4);
        assert_eq!(requests[0].body.as_ref(), b"1");
        assert_eq!(requests[0].method, http::Method::POST);
    }

    #[tokio::test(start_paused = true)]
    async fn request_timeout_is_reported() {
        let mut mock = MockService::new();
        mock.stall("/slow");

        let client =
            ApiClient::new_with_inner_service("https://example.com/".parse().unwrap(), (), mock);

        let started = tokio::time::Instant::now();
        let result = client
            .get("slow")
            .timeout(Duration::from_secs(5))
            .send()
            .await;

        assert!(matches!(result, Err(Error::Timeout(limit)) if limit == Duration::from_secs(5)));
        assert!(started.elapsed() >= Duration::from_secs(5));
        assert!(started.elapsed() < Duration::from_millis(5_050));
    }
}
