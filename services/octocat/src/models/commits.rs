//! Commit data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A commit object, as returned by `GET /repos/{owner}/{repo}/commits/{ref}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Commit {
    /// The SHA of the commit.
    pub sha: String,

    /// The commit details.
    pub commit: CommitDetails,

    /// Files touched by the commit.
    ///
    /// GitHub omits this list on some listing endpoints.
    #[serde(default)]
    pub files: Vec<CommitFile>,
}

/// The author and message for a commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitDetails {
    /// The author of the commit.
    pub author: Option<AuthorCommitDetails>,
    /// The commit message.
    pub message: String,
}

/// The author and date for a commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorCommitDetails {
    /// Author name
    pub name: String,
    /// Author email
    pub email: String,
    /// The date of the commit.
    pub date: DateTime<Utc>,
}

/// A single file changed by a commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitFile {
    /// Path of the file, relative to the repository root.
    pub filename: String,

    /// What happened to the file.
    pub status: FileStatus,

    /// Lines added.
    #[serde(default)]
    pub additions: u64,

    /// Lines removed.
    #[serde(default)]
    pub deletions: u64,

    /// Path before a rename.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_filename: Option<String>,
}

/// File status values reported by GitHub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    /// The file was created.
    Added,
    /// The file contents changed.
    Modified,
    /// The file was deleted.
    Removed,
    /// The file moved.
    Renamed,
    /// The file was copied from another path.
    Copied,
    /// The file mode or metadata changed.
    Changed,
    /// The file is listed without changes.
    Unchanged,
    /// A status this client does not know about.
    #[serde(other)]
    Other,
}
