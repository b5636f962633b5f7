//! The push event payload, as Github Actions writes it to `GITHUB_EVENT_PATH`.
//!
//! Commits are decoded leniently. A field with the wrong type is treated as
//! absent so that validation, not decoding, decides whether a commit is kept.

use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// The repository a workflow runs in.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Repository {
    /// User or organization that owns the repository.
    pub owner: String,
    /// Repository name.
    pub name: String,
}

impl Repository {
    /// Create a repository reference.
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for Repository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// A repository slug that is not of the form `owner/repo`.
#[derive(Debug, Clone, Error)]
#[error("Invalid repository {0:?}, expected owner/repo")]
pub struct InvalidRepository(String);

impl FromStr for Repository {
    type Err = InvalidRepository;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/') => {
                Ok(Self::new(owner, name))
            }
            _ => Err(InvalidRepository(s.to_owned())),
        }
    }
}

/// The subset of a push event this action reads.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PushEvent {
    /// The full git ref that was pushed, e.g. `refs/heads/main`.
    #[serde(rename = "ref", default, deserialize_with = "lenient")]
    pub git_ref: Option<String>,

    /// Commits in the push, oldest first.
    #[serde(default, deserialize_with = "commit_list")]
    pub commits: Vec<RawCommit>,
}

impl PushEvent {
    /// Decode a push event from the JSON written by the runner.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// A commit exactly as the event payload describes it. Nothing is guaranteed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawCommit {
    /// Commit SHA.
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Commit message.
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Commit author.
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub author: Option<RawAuthor>,

    /// When the commit was authored.
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<RawTimestamp>,

    /// Link to the commit.
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Paths added by the commit.
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub added: Option<Vec<String>>,

    /// Paths modified by the commit.
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub modified: Option<Vec<String>>,

    /// Paths removed by the commit.
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub removed: Option<Vec<String>>,
}

impl RawCommit {
    /// The abbreviated SHA for log lines, or `unknown` when the commit has no id.
    pub fn short_id(&self) -> &str {
        self.id
            .as_deref()
            .map(crate::commit::short_sha)
            .unwrap_or("unknown")
    }
}

/// Commit author as the event reports it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawAuthor {
    /// Display name.
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Email address.
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Github login, when the email maps to an account.
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

/// Timestamps arrive as RFC 3339 text from Github, but epoch milliseconds are accepted too.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawTimestamp {
    /// Epoch milliseconds.
    Millis(i64),
    /// A date string.
    Text(String),
}

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

fn commit_list<'de, D>(deserializer: D) -> Result<Vec<RawCommit>, D::Error>
where
    D: Deserializer<'de>,
{
    let values: Option<Vec<serde_json::Value>> = lenient(deserializer)?;
    Ok(values
        .unwrap_or_default()
        .into_iter()
        .map(|value| serde_json::from_value(value).unwrap_or_default())
        .collect())
}
