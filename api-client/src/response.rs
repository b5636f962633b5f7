//! Responses whose bodies have not been read yet.

use std::time::Duration;

use bytes::Bytes;
use http_body_util::BodyExt as _;
use tokio::time::Instant;

use crate::error::Error;

/// When a timed request must be finished, body included.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Deadline {
    pub(crate) at: Instant,
    pub(crate) limit: Duration,
}

impl Deadline {
    pub(crate) fn after(limit: Duration) -> Self {
        Self {
            at: Instant::now() + limit,
            limit,
        }
    }
}

/// A response head, with the body still on the wire.
///
/// If the request carried a timeout, reading the body is bounded by what is
/// left of it.
#[derive(Debug)]
pub struct ApiResponse<B = hyperdriver::Body> {
    head: http::response::Parts,
    body: B,
    deadline: Option<Deadline>,
}

impl<B> ApiResponse<B> {
    /// Wrap a response with no deadline on its body.
    pub fn new(response: http::Response<B>) -> Self {
        let (head, body) = response.into_parts();
        Self {
            head,
            body,
            deadline: None,
        }
    }

    pub(crate) fn with_deadline(mut self, deadline: Deadline) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Response status.
    pub fn status(&self) -> http::StatusCode {
        self.head.status
    }

    /// Response headers.
    pub fn headers(&self) -> &http::HeaderMap {
        &self.head.headers
    }
}

impl<B> ApiResponse<B>
where
    B: http_body::Body,
    B::Error: Into<tower::BoxError>,
{
    /// Read the whole body.
    pub async fn bytes(self) -> Result<Bytes, Error> {
        let collect = self.body.collect();

        let collected = match self.deadline {
            Some(deadline) => tokio::time::timeout_at(deadline.at, collect)
                .await
                .map_err(|_| Error::Timeout(deadline.limit))?,
            None => collect.await,
        };

        collected
            .map(|body| body.to_bytes())
            .map_err(|error| Error::ResponseBody(error.into()))
    }

    /// Read the whole body as UTF-8 text.
    pub async fn text(self) -> Result<String, Error> {
        let bytes = self.bytes().await?;
        String::from_utf8(bytes.into()).map_err(|error| Error::ResponseBody(error.into()))
    }
}
