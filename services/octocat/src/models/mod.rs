//! Github API object models.

pub mod commits;

pub use commits::{Commit, CommitFile, FileStatus};
