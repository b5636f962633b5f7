//! Export the commits of a push to the buildinpublic.so ingestion API.
//!
//! Runs as a Github Action step. The push event written by the runner is read,
//! invalid commits are dropped, missing file lists are looked up through the
//! Github API, and the resulting batch is posted with an HMAC-SHA256 signature,
//! retrying with exponential backoff.

pub mod action;
pub mod commit;
pub mod config;
pub mod delivery;
pub mod event;
mod export;
pub mod logging;
pub mod normalize;
pub mod resolve;
pub mod signature;

pub use self::action::{ActionContext, ContextError, Outputs};
pub use self::commit::{job_minutes, Author, Batch, Commit, FileChanges, Submission};
pub use self::config::{ConfigError, Environment, ExportConfig, ProcessEnvironment};
pub use self::delivery::{AttemptError, Delivery, DeliveryClient, DeliveryConfig, DeliveryError};
pub use self::event::{PushEvent, RawCommit, Repository};
pub use self::export::{exit_code, run_action, ExportError, ExportReport, Exporter, COMMITS_OUTPUT};
pub use self::normalize::{Normalized, Normalizer};
pub use self::resolve::{CommitFiles, FileChangeResolver, Resolution};
