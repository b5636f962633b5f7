//! Validated commits and the batch sent to the ingestion endpoint.

use std::time::Duration;

use octocat::models::{CommitFile, FileStatus};
use serde::Serialize;

/// Longest commit message, in characters, the ingestion endpoint accepts.
pub const MAX_MESSAGE_CHARS: usize = 10_000;

/// A commit that passed validation, ready to be exported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Commit {
    /// Commit SHA.
    pub id: String,
    /// Commit message, at most [`MAX_MESSAGE_CHARS`] characters.
    pub message: String,
    /// Commit author.
    pub author: Author,
    /// UTC timestamp in RFC 3339 form with millisecond precision.
    pub timestamp: String,
    /// `https://` link to the commit.
    pub url: String,
    /// Paths touched by the commit.
    pub files: FileChanges,
}

impl Commit {
    /// The abbreviated SHA used in log lines.
    pub fn short_id(&self) -> &str {
        short_sha(&self.id)
    }
}

/// First seven characters of a SHA, or the whole thing if shorter.
pub(crate) fn short_sha(id: &str) -> &str {
    match id.char_indices().nth(7) {
        Some((index, _)) => &id[..index],
        None => id,
    }
}

/// The author of a commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Author {
    /// Display name.
    pub name: String,
    /// Email address.
    pub email: String,
}

/// Files added, modified and removed by a commit.
///
/// `total_changes` is derived from the three lists and cannot drift from them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FileChanges {
    added: Vec<String>,
    modified: Vec<String>,
    removed: Vec<String>,
    total_changes: usize,
}

impl FileChanges {
    /// Build a change set from the three path lists.
    pub fn new(added: Vec<String>, modified: Vec<String>, removed: Vec<String>) -> Self {
        let total_changes = added.len() + modified.len() + removed.len();
        Self {
            added,
            modified,
            removed,
            total_changes,
        }
    }

    /// Partition files reported by the Github API by status.
    ///
    /// Statuses other than added, modified and removed are ignored.
    pub fn from_files<'a, I>(files: I) -> Self
    where
        I: IntoIterator<Item = &'a CommitFile>,
    {
        let mut added = Vec::new();
        let mut modified = Vec::new();
        let mut removed = Vec::new();

        for file in files {
            match file.status {
                FileStatus::Added => added.push(file.filename.clone()),
                FileStatus::Modified => modified.push(file.filename.clone()),
                FileStatus::Removed => removed.push(file.filename.clone()),
                status => {
                    tracing::trace!(file = %file.filename, ?status, "Ignoring file status")
                }
            }
        }

        Self::new(added, modified, removed)
    }

    /// Paths created by the commit.
    pub fn added(&self) -> &[String] {
        &self.added
    }

    /// Paths whose contents changed.
    pub fn modified(&self) -> &[String] {
        &self.modified
    }

    /// Paths deleted by the commit.
    pub fn removed(&self) -> &[String] {
        &self.removed
    }

    /// Number of paths across all three lists.
    pub fn total_changes(&self) -> usize {
        self.total_changes
    }

    /// Whether the commit touched no files at all.
    pub fn is_empty(&self) -> bool {
        self.total_changes == 0
    }
}

/// Commits from one push, plus the repository they belong to.
///
/// A batch always holds at least one commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Batch {
    repo: String,
    owner: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    branch: Option<String>,
    commits: Vec<Commit>,
}

impl Batch {
    /// Assemble a batch, or `None` when there are no commits to send.
    pub fn new(
        owner: impl Into<String>,
        repo: impl Into<String>,
        branch: Option<String>,
        commits: Vec<Commit>,
    ) -> Option<Self> {
        if commits.is_empty() {
            return None;
        }

        Some(Self {
            repo: repo.into(),
            owner: owner.into(),
            branch,
            commits,
        })
    }

    /// Repository owner.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Repository name.
    pub fn repo(&self) -> &str {
        &self.repo
    }

    /// Branch the commits were pushed to.
    pub fn branch(&self) -> Option<&str> {
        self.branch.as_deref()
    }

    /// The commits, in push order.
    pub fn commits(&self) -> &[Commit] {
        &self.commits
    }

    /// Pair the batch with the job duration measured for one send attempt.
    pub fn submission(&self, job_minutes: u64) -> Submission<'_> {
        Submission {
            batch: self,
            job_minutes,
        }
    }
}

/// The exact document posted to the ingestion endpoint.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Submission<'a> {
    #[serde(flatten)]
    batch: &'a Batch,
    job_minutes: u64,
}

impl Submission<'_> {
    /// Whole minutes billed for the job.
    pub fn job_minutes(&self) -> u64 {
        self.job_minutes
    }
}

/// Wall-clock minutes elapsed, rounded up, never less than one.
pub fn job_minutes(elapsed: Duration) -> u64 {
    let minutes = elapsed.as_millis().div_ceil(60_000).max(1);
    u64::try_from(minutes).unwrap_or(u64::MAX)
}
