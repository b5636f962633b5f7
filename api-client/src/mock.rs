//! A scripted in-memory HTTP service for tests.
//!
//! Responses are queued per request path and handed out in order. The last
//! queued reply for a path is sticky, so a single `respond` answers every request.
//! Every request is recorded, body included, along with the (tokio) time it
//! arrived.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use bytes::Bytes;
use http::response;
use http_body_util::BodyExt as _;
use hyperdriver::service::SharedService;
use parking_lot::Mutex;

use crate::{ClientService, Request, Response};

type BoxFuture<T> = std::pin::Pin<Box<dyn std::future::Future<Output = T> + Send + 'static>>;

/// A canned response.
#[derive(Debug, Clone)]
pub struct MockResponse {
    status: http::StatusCode,
    headers: http::HeaderMap,
    body: Vec<u8>,
}

impl MockResponse {
    /// Create a canned response.
    pub fn new(status: http::StatusCode, headers: http::HeaderMap, body: Vec<u8>) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// A response with a JSON body.
    pub fn json(status: http::StatusCode, body: &serde_json::Value) -> Self {
        let mut headers = http::HeaderMap::new();
        headers.insert(
            http::header::CONTENT_TYPE,
            http::HeaderValue::from_static("application/json"),
        );
        Self::new(status, headers, body.to_string().into_bytes())
    }

    /// A response with a plain text body.
    pub fn text(status: http::StatusCode, body: &str) -> Self {
        Self::new(status, http::HeaderMap::new(), body.as_bytes().to_vec())
    }
}

#[derive(Debug, Clone)]
enum MockReply {
    Respond(MockResponse),
    Fail,
    Stall,
}

/// A request received by the [`MockService`].
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// Request method.
    pub method: http::Method,
    /// Full request URI.
    pub uri: http::Uri,
    /// Request headers, after any layers have run.
    pub headers: http::HeaderMap,
    /// Collected request body.
    pub body: Bytes,
    /// When the request reached the service.
    pub at: tokio::time::Instant,
}

impl RecordedRequest {
    /// The value of a header as a string, if present and valid.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }
}

#[derive(Debug, Default)]
struct MockState {
    replies: HashMap<String, VecDeque<MockReply>>,
    requests: Vec<RecordedRequest>,
}

/// An HTTP service that answers from a script instead of the network.
///
/// Clones share the same script and request log.
#[derive(Debug, Default, Clone)]
pub struct MockService {
    state: Arc<Mutex<MockState>>,
}

impl MockService {
    /// Create an empty mock. Requests to unscripted paths panic.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a prepared response for `path`.
    pub fn respond(&mut self, path: &str, response: MockResponse) {
        self.push(path, MockReply::Respond(response));
    }

    /// Queue a transport failure for `path`.
    pub fn fail(&mut self, path: &str) {
        self.push(path, MockReply::Fail);
    }

    /// Queue a reply for `path` which never arrives.
    pub fn stall(&mut self, path: &str) {
        self.push(path, MockReply::Stall);
    }

    fn push(&mut self, path: &str, reply: MockReply) {
        self.state
            .lock()
            .replies
            .entry(path.to_owned())
            .or_default()
            .push_back(reply);
    }

    /// All requests received so far, in arrival order.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.lock().requests.clone()
    }

    /// Requests received for a single path.
    pub fn requests_to(&self, path: &str) -> Vec<RecordedRequest> {
        self.state
            .lock()
            .requests
            .iter()
            .filter(|request| request.uri.path() == path)
            .cloned()
            .collect()
    }

    /// Wrap the mock so it can stand in for a real client service.
    pub fn into_client_service(self) -> ClientService {
        SharedService::new(self)
    }

    fn next_reply(&self, path: &str) -> MockReply {
        let mut state = self.state.lock();
        let queue = state
            .replies
            .get_mut(path)
            .unwrap_or_else(|| panic!("No response configured for path: {path}"));

        if queue.len() > 1 {
            queue.pop_front().expect("queue is not empty")
        } else {
            queue
                .front()
                .cloned()
                .unwrap_or_else(|| panic!("No response configured for path: {path}"))
        }
    }
}

impl tower::Service<Request> for MockService {
    type Response = Response;
    type Error = hyperdriver::client::Error;
    type Future = BoxFuture<Result<Self::Response, Self::Error>>;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let this = self.clone();
        Box::pin(async move {
            let at = tokio::time::Instant::now();
            let (parts, body) = req.into_parts();
            let body = body
                .collect()
                .await
                .expect("mock request body is readable")
                .to_bytes();

            let path = parts.uri.path().to_owned();
            this.state.lock().requests.push(RecordedRequest {
                method: parts.method,
                uri: parts.uri,
                headers: parts.headers,
                body,
                at,
            });

            let response = match this.next_reply(&path) {
                MockReply::Respond(response) => response,
                MockReply::Fail => return Err(hyperdriver::client::Error::RequestTimeout),
                MockReply::Stall => return std::future::pending().await,
            };

            let mut builder = response::Builder::new()
                .status(response.status)
                .version(http::Version::HTTP_11);

            for (key, value) in response.headers.iter() {
                builder = builder.header(key, value);
            }

            Ok(builder
                .body(hyperdriver::Body::from(Bytes::from(response.body)))
                .expect("mock response is valid"))
        })
    }
}
