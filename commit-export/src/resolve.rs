//! Fill in file changes for commits whose push payload listed none.
//!
//! Push events truncate file lists for large pushes, and some runners omit them
//! entirely. When a Github token is available, the commit endpoint is asked for
//! the files instead. Lookups run concurrently, and a lookup that fails leaves
//! its commit untouched.

use async_trait::async_trait;
use futures::future::join_all;
use octocat::models::CommitFile;
use octocat::GithubClient;

use crate::commit::{Commit, FileChanges};
use crate::event::Repository;

/// Somewhere to look up the files touched by a commit.
#[async_trait]
pub trait CommitFiles: Send + Sync {
    /// Files changed by commit `sha` in `repository`.
    async fn changed_files(
        &self,
        repository: &Repository,
        sha: &str,
    ) -> Result<Vec<CommitFile>, octocat::Error>;
}

#[async_trait]
impl CommitFiles for GithubClient {
    async fn changed_files(
        &self,
        repository: &Repository,
        sha: &str,
    ) -> Result<Vec<CommitFile>, octocat::Error> {
        let commit = self.commit(&repository.owner, &repository.name, sha).await?;
        Ok(commit.files)
    }
}

/// What happened to each commit during resolution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Resolution {
    /// Commits whose files were fetched from the API.
    pub resolved: usize,
    /// Commits whose lookup failed.
    pub failed: usize,
    /// Commits left alone, either because the event already listed files or
    /// because lookups are disabled.
    pub skipped: usize,
}

/// Looks up file changes for commits that arrived without any.
#[derive(Debug, Clone)]
pub struct FileChangeResolver<C = GithubClient> {
    source: Option<C>,
}

impl<C> FileChangeResolver<C> {
    /// A resolver which never performs lookups.
    pub fn disabled() -> Self {
        Self { source: None }
    }

    /// A resolver backed by `source`.
    pub fn new(source: C) -> Self {
        Self {
            source: Some(source),
        }
    }

    /// Whether lookups will be made.
    pub fn is_enabled(&self) -> bool {
        self.source.is_some()
    }
}

impl<C: CommitFiles> FileChangeResolver<C> {
    /// Resolve file changes for every commit in `commits` that has none.
    ///
    /// Commits keep their positions. Only commits with empty file lists are
    /// looked up, and a failed lookup is logged and otherwise ignored.
    pub async fn resolve(&self, repository: &Repository, commits: &mut [Commit]) -> Resolution {
        let pending: Vec<usize> = commits
            .iter()
            .enumerate()
            .filter(|(_, commit)| commit.files.is_empty())
            .map(|(index, _)| index)
            .collect();

        let mut resolution = Resolution {
            skipped: commits.len() - pending.len(),
            ..Default::default()
        };

        if pending.is_empty() {
            return resolution;
        }

        let Some(source) = &self.source else {
            tracing::debug!(
                "No Github token configured, {} commits keep empty file lists",
                pending.len()
            );
            resolution.skipped += pending.len();
            return resolution;
        };

        let lookups = pending.into_iter().map(|index| {
            let sha = commits[index].id.clone();
            async move { (index, source.changed_files(repository, &sha).await) }
        });

        for (index, result) in join_all(lookups).await {
            let commit = &mut commits[index];
            match result {
                Ok(files) => {
                    commit.files = FileChanges::from_files(&files);
                    tracing::debug!(
                        "Found {} file changes via API for commit {}",
                        commit.files.total_changes(),
                        commit.short_id()
                    );
                    resolution.resolved += 1;
                }
                Err(error) => {
                    tracing::warn!(
                        "Failed to fetch file changes for commit {}: {}",
                        commit.short_id(),
                        error
                    );
                    resolution.failed += 1;
                }
            }
        }

        resolution
    }
}
