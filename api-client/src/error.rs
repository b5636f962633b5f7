//! Error types for API Clients
use std::time::Duration;

use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// An error occured while sending or recieving an HTTP request
#[derive(Debug, Error)]
pub enum Error {
    /// An error occured while recieving the response body
    #[error("Error reading response body: {0}")]
    ResponseBody(#[source] BoxError),

    /// An error occured while sending the request
    #[error(transparent)]
    Request(#[from] hyperdriver::client::Error),

    /// The request could not be assembled
    #[error("Invalid request: {0}")]
    Build(#[from] http::Error),

    /// The exchange did not finish within the request timeout
    #[error("Request timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
}
