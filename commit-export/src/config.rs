//! Action inputs, read from the environment the runner prepares.
//!
//! Github Actions exposes each `with:` input as `INPUT_<NAME>`, upper-cased
//! with spaces replaced by underscores.

use std::collections::HashMap;
use std::time::Duration;

use api_client::uri::{parse_absolute, ParseUriError};
use api_client::Secret;
use http::Uri;
use thiserror::Error;

use crate::delivery::{DEFAULT_INGEST_URL, DEFAULT_TIMEOUT};

/// Source of environment variables.
pub trait Environment {
    /// The value of `key`, if set.
    fn var(&self, key: &str) -> Option<String>;

    /// The value of action input `name`, trimmed. Blank inputs count as unset.
    fn input(&self, name: &str) -> Option<String> {
        let key = format!("INPUT_{}", name.replace(' ', "_").to_uppercase());
        self.var(&key)
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty())
    }
}

/// The real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnvironment;

impl Environment for ProcessEnvironment {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl Environment for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

impl Environment for HashMap<&str, &str> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).map(|value| (*value).to_owned())
    }
}

/// Invalid or missing inputs.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required input was not provided.
    #[error("Input required and not supplied: {0}")]
    MissingInput(&'static str),

    /// An input that must be a URL is not one.
    #[error("Input {input} is not a valid URL: {source}")]
    InvalidUrl {
        /// Input name.
        input: &'static str,
        /// Why it failed to parse.
        #[source]
        source: ParseUriError,
    },

    /// A URL input uses a scheme other than http or https.
    #[error("Input {input} must be an http(s) URL, got {url}")]
    UnsupportedScheme {
        /// Input name.
        input: &'static str,
        /// The rejected URL.
        url: String,
    },

    /// An input that must be a positive whole number is not one.
    #[error("Input {input} must be a positive number of seconds, got {value:?}")]
    InvalidTimeout {
        /// Input name.
        input: &'static str,
        /// The rejected value.
        value: String,
    },
}

/// Everything the exporter needs to know before it starts.
#[derive(Debug, Clone)]
pub struct ExportConfig {
    /// Token used to sign submissions.
    pub api_token: Secret,
    /// Token used to look up commit files. Lookups are skipped without one.
    pub github_token: Option<Secret>,
    /// Base of the Github REST API, for Enterprise Server runners.
    pub github_api_url: Option<String>,
    /// Where batches are posted.
    pub ingest_url: Uri,
    /// Limit on each delivery attempt.
    pub timeout: Duration,
}

impl ExportConfig {
    /// Read configuration from action inputs.
    ///
    /// `api-token` is required. `github-token` falls back to `GITHUB_TOKEN`.
    pub fn from_env<E: Environment + ?Sized>(env: &E) -> Result<Self, ConfigError> {
        let api_token = env
            .input("api-token")
            .and_then(|token| Secret::from_input(&token))
            .ok_or(ConfigError::MissingInput("api-token"))?;

        let github_token = env
            .input("github-token")
            .or_else(|| env.var("GITHUB_TOKEN"))
            .and_then(|token| Secret::from_input(&token));

        let ingest_url = match env.input("api-url") {
            Some(url) => parse_http_url("api-url", &url)?,
            None => Uri::from_static(DEFAULT_INGEST_URL),
        };

        let timeout = match env.input("timeout-seconds") {
            Some(value) => match value.parse::<u64>() {
                Ok(seconds) if seconds > 0 => Duration::from_secs(seconds),
                _ => {
                    return Err(ConfigError::InvalidTimeout {
                        input: "timeout-seconds",
                        value,
                    })
                }
            },
            None => DEFAULT_TIMEOUT,
        };

        Ok(Self {
            api_token,
            github_token,
            github_api_url: env.var("GITHUB_API_URL").filter(|url| !url.is_empty()),
            ingest_url,
            timeout,
        })
    }
}

fn parse_http_url(input: &'static str, url: &str) -> Result<Uri, ConfigError> {
    let uri = parse_absolute(url).map_err(|source| ConfigError::InvalidUrl { input, source })?;

    match uri.scheme_str() {
        Some("http" | "https") => Ok(uri),
        _ => Err(ConfigError::UnsupportedScheme {
            input,
            url: url.to_owned(),
        }),
    }
}
