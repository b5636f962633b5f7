use std::time::Duration;

use http::{header::HeaderValue, HeaderName, Uri};
use hyperdriver::Body;

use crate::error::Error;
use crate::response::{ApiResponse, Deadline};
use crate::ApiClient;

/// A request under construction against an [`ApiClient`].
#[derive(Debug)]
pub struct RequestBuilder {
    req: http::request::Builder,
    client: ApiClient,
    body: Option<Body>,
    timeout: Option<Duration>,
}

impl RequestBuilder {
    /// Start a request with the given method and URI.
    pub fn new(client: ApiClient, uri: Uri, method: http::Method) -> Self {
        Self {
            req: http::Request::builder().method(method).uri(uri),
            client,
            body: None,
            timeout: None,
        }
    }

    /// Add a header to the request.
    pub fn header<K, V>(mut self, key: K, value: V) -> Self
    where
        HeaderName: TryFrom<K>,
        <HeaderName as TryFrom<K>>::Error: Into<http::Error>,
        HeaderValue: TryFrom<V>,
        <HeaderValue as TryFrom<V>>::Error: Into<http::Error>,
    {
        self.req = self.req.header(key, value);
        self
    }

    /// Limit the whole exchange to `timeout`.
    ///
    /// The clock covers waiting for the response head and reading the body
    /// through [`ApiResponse::text`] or [`ApiResponse::bytes`].
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the request body.
    pub fn body<B: Into<Body>>(self, body: B) -> Self {
        Self {
            body: Some(body.into()),
            ..self
        }
    }

    /// Send the request, waiting for the response head.
    pub async fn send(self) -> Result<ApiResponse, Error> {
        let req = self.req.body(self.body.unwrap_or_else(Body::empty))?;

        let Some(limit) = self.timeout else {
            return Ok(self.client.execute(req).await?);
        };

        let deadline = Deadline::after(limit);
        let response = tokio::time::timeout_at(deadline.at, self.client.execute(req))
            .await
            .map_err(|_| Error::Timeout(limit))??;

        Ok(response.with_deadline(deadline))
    }
}
