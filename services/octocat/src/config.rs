use api_client::uri::{parse_absolute, ParseUriError};
use api_client::Secret;
use http::Uri;
use serde::Deserialize;

use super::{GithubClient, GITHUB_BASE};

/// Configuration for talking to the Github REST API
#[derive(Debug, Clone, Deserialize)]
pub struct GithubConfig {
    /// Token sent as a bearer credential
    pub token: Secret,

    /// Base URL of the REST API, for Github Enterprise Server installs
    #[serde(default)]
    pub api_url: Option<String>,
}

impl GithubConfig {
    /// Configuration for github.com with the given token.
    pub fn new(token: Secret) -> Self {
        Self {
            token,
            api_url: None,
        }
    }

    /// The API base URL, always ending in a `/` so endpoints join beneath it.
    pub fn base(&self) -> Result<Uri, ParseUriError> {
        match self.api_url.as_deref() {
            None => Ok(Uri::from_static(GITHUB_BASE)),
            Some(url) if url.ends_with('/') => parse_absolute(url),
            Some(url) => parse_absolute(&format!("{url}/")),
        }
    }
}

impl TryFrom<GithubConfig> for GithubClient {
    type Error = ParseUriError;

    fn try_from(config: GithubConfig) -> Result<Self, Self::Error> {
        let base = config.base()?;
        Ok(GithubClient::with_base(base, config.token))
    }
}
