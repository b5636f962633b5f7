//! The workflow run this action executes in.

use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::io::AsyncWriteExt as _;

use crate::config::Environment;
use crate::event::{InvalidRepository, PushEvent, Repository};

const PUSH_EVENT: &str = "push";
const BRANCH_PREFIX: &str = "refs/heads/";
const DEFAULT_SERVER_URL: &str = "https://github.com";

/// The runtime context is missing or unreadable.
#[derive(Debug, Error)]
pub enum ContextError {
    /// A variable the runner always sets is missing.
    #[error("{0} is not set, is this running inside Github Actions?")]
    MissingVariable(&'static str),

    /// `GITHUB_REPOSITORY` is not `owner/repo`.
    #[error(transparent)]
    Repository(#[from] InvalidRepository),

    /// The event payload file could not be read.
    #[error("Could not read event payload {path}: {source}")]
    ReadEvent {
        /// Path from `GITHUB_EVENT_PATH`.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The event payload is not valid JSON.
    #[error("Could not parse event payload {path}: {source}")]
    ParseEvent {
        /// Path from `GITHUB_EVENT_PATH`.
        path: PathBuf,
        /// Underlying parse error.
        #[source]
        source: serde_json::Error,
    },
}

/// What triggered the workflow, and where.
#[derive(Debug, Clone)]
pub struct ActionContext {
    /// Event name, e.g. `push` or `pull_request`.
    pub event_name: String,
    /// Full ref that triggered the run. May be empty.
    pub git_ref: String,
    /// Repository the workflow runs in.
    pub repository: Repository,
    /// Github server, e.g. `https://github.com`.
    pub server_url: String,
    /// JSON file holding the full event payload.
    pub event_path: Option<PathBuf>,
}

impl ActionContext {
    /// Read the context from the variables the runner sets.
    pub fn from_env<E: Environment + ?Sized>(env: &E) -> Result<Self, ContextError> {
        let event_name = env
            .var("GITHUB_EVENT_NAME")
            .ok_or(ContextError::MissingVariable("GITHUB_EVENT_NAME"))?;
        let repository = env
            .var("GITHUB_REPOSITORY")
            .ok_or(ContextError::MissingVariable("GITHUB_REPOSITORY"))?
            .parse()?;

        Ok(Self {
            event_name,
            git_ref: env.var("GITHUB_REF").unwrap_or_default(),
            repository,
            server_url: env
                .var("GITHUB_SERVER_URL")
                .filter(|url| !url.is_empty())
                .unwrap_or_else(|| DEFAULT_SERVER_URL.to_owned()),
            event_path: env
                .var("GITHUB_EVENT_PATH")
                .filter(|path| !path.is_empty())
                .map(PathBuf::from),
        })
    }

    /// Whether the run was triggered by a push.
    pub fn is_push(&self) -> bool {
        self.event_name == PUSH_EVENT
    }

    /// Branch name for `refs/heads/*` refs. Other refs are returned unchanged.
    pub fn branch(&self) -> Option<String> {
        branch_from_ref(&self.git_ref)
    }

    /// Read and decode the push event payload.
    ///
    /// A run without an event file is treated as a push with no commits.
    pub async fn load_event(&self) -> Result<PushEvent, ContextError> {
        let Some(path) = &self.event_path else {
            tracing::debug!("GITHUB_EVENT_PATH is not set, assuming an empty push");
            return Ok(PushEvent::default());
        };

        let json = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ContextError::ReadEvent {
                path: path.clone(),
                source,
            })?;

        tracing::debug!("Event payload: {json}");

        PushEvent::from_json(&json).map_err(|source| ContextError::ParseEvent {
            path: path.clone(),
            source,
        })
    }
}

pub(crate) fn branch_from_ref(git_ref: &str) -> Option<String> {
    if git_ref.is_empty() {
        return None;
    }

    Some(git_ref.strip_prefix(BRANCH_PREFIX).unwrap_or(git_ref).to_owned())
}

/// Step outputs, written to the file named by `GITHUB_OUTPUT`.
#[derive(Debug, Clone, Default)]
pub struct Outputs {
    path: Option<PathBuf>,
}

impl Outputs {
    /// Outputs written to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    /// Outputs for the current runner. Without `GITHUB_OUTPUT` they are only logged.
    pub fn from_env<E: Environment + ?Sized>(env: &E) -> Self {
        Self {
            path: env
                .var("GITHUB_OUTPUT")
                .filter(|path| !path.is_empty())
                .map(PathBuf::from),
        }
    }

    /// The output file, if there is one.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Set output `name` to `value`.
    pub async fn set(&self, name: &str, value: impl fmt::Display) -> std::io::Result<()> {
        let value = value.to_string();
        tracing::debug!("Setting output {name}={value}");

        let Some(path) = &self.path else {
            return Ok(());
        };

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;

        let line = if value.contains('\n') {
            let delimiter = format!("ghadelimiter_{}", uuid::Uuid::new_v4());
            format!("{name}<<{delimiter}\n{value}\n{delimiter}\n")
        } else {
            format!("{name}={value}\n")
        };

        file.write_all(line.as_bytes()).await?;
        file.flush().await
    }
}
