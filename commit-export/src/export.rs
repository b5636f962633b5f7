//! Exporting a push: read, normalize, resolve, deliver.

use std::process::ExitCode;

use api_client::uri::ParseUriError;
use api_client::Secret;
use octocat::{GithubClient, GithubConfig};
use thiserror::Error;
use tokio::time::Instant;

use crate::action::{branch_from_ref, ActionContext, ContextError, Outputs};
use crate::commit::Batch;
use crate::config::{ConfigError, Environment, ExportConfig};
use crate::delivery::{Delivery, DeliveryClient, DeliveryConfig, DeliveryError};
use crate::event::PushEvent;
use crate::normalize::Normalizer;
use crate::resolve::{CommitFiles, FileChangeResolver, Resolution};

/// Step output holding the number of commits sent.
pub const COMMITS_OUTPUT: &str = "commits";

/// Anything that stops an export.
#[derive(Debug, Error)]
pub enum ExportError {
    /// Inputs are missing or invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The workflow context could not be read.
    #[error(transparent)]
    Context(#[from] ContextError),

    /// `GITHUB_API_URL` is not usable.
    #[error("Invalid Github API URL: {0}")]
    GithubUrl(#[source] ParseUriError),

    /// The batch could not be delivered.
    #[error(transparent)]
    Delivery(#[from] DeliveryError),

    /// Step outputs could not be written.
    #[error("Could not write step output: {0}")]
    Output(#[source] std::io::Error),
}

/// What an export did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExportReport {
    /// Commits delivered. Zero when nothing was sent.
    pub commits: usize,
    /// Commits rejected by validation.
    pub dropped: usize,
    /// File change lookups.
    pub resolution: Resolution,
    /// Delivery receipt, when a batch was sent.
    pub delivery: Option<Delivery>,
}

/// Runs one export with a fixed set of collaborators.
#[derive(Debug)]
pub struct Exporter<C = GithubClient> {
    secret: Secret,
    resolver: FileChangeResolver<C>,
    delivery: DeliveryClient,
    started: Instant,
}

impl Exporter<GithubClient> {
    /// Build an exporter which talks to Github and the ingestion endpoint.
    pub fn from_config(config: &ExportConfig) -> Result<Self, ExportError> {
        let resolver = match &config.github_token {
            Some(token) => {
                let github = GithubConfig {
                    token: token.clone(),
                    api_url: config.github_api_url.clone(),
                };
                FileChangeResolver::new(
                    GithubClient::try_from(github).map_err(ExportError::GithubUrl)?,
                )
            }
            None => FileChangeResolver::disabled(),
        };

        let delivery = DeliveryClient::new(
            DeliveryConfig::new(config.ingest_url.clone()).with_timeout(config.timeout),
        );

        Ok(Self::new(config.api_token.clone(), resolver, delivery))
    }
}

impl<C: CommitFiles> Exporter<C> {
    /// Assemble an exporter. The job clock starts now.
    pub fn new(secret: Secret, resolver: FileChangeResolver<C>, delivery: DeliveryClient) -> Self {
        Self {
            secret,
            resolver,
            delivery,
            started: Instant::now(),
        }
    }

    /// Measure job minutes from `started` instead of from construction.
    pub fn started_at(mut self, started: Instant) -> Self {
        self.started = started;
        self
    }

    /// Export the event that triggered `context`.
    ///
    /// Anything other than a push is skipped without reading the payload.
    pub async fn run(&self, context: &ActionContext) -> Result<ExportReport, ExportError> {
        if !context.is_push() {
            tracing::warn!(
                "This action only works with push events, got {}",
                context.event_name
            );
            return Ok(ExportReport::default());
        }

        let event = context.load_event().await?;
        self.export(context, &event).await
    }

    /// Export the commits of a push event.
    #[tracing::instrument(skip_all, fields(repository = %context.repository))]
    pub async fn export(
        &self,
        context: &ActionContext,
        event: &PushEvent,
    ) -> Result<ExportReport, ExportError> {
        if event.commits.is_empty() {
            tracing::info!("No commits found in push event");
            return Ok(ExportReport::default());
        }

        tracing::debug!("Push event contains {} commits", event.commits.len());

        let normalized = Normalizer::new(&context.repository)
            .with_server_url(&context.server_url)
            .normalize(&event.commits);

        if normalized.dropped > 0 {
            tracing::warn!("Filtered out {} invalid commits", normalized.dropped);
        }

        let mut commits = normalized.commits;
        if commits.is_empty() {
            tracing::warn!("No valid commits found after filtering");
            return Ok(ExportReport {
                dropped: normalized.dropped,
                ..Default::default()
            });
        }

        let resolution = self.resolver.resolve(&context.repository, &mut commits).await;

        for commit in commits.iter().filter(|commit| commit.files.is_empty()) {
            tracing::warn!("No file changes found for commit {}", commit.short_id());
        }

        let branch = context
            .branch()
            .or_else(|| event.git_ref.as_deref().and_then(branch_from_ref));

        let Some(batch) = Batch::new(
            &context.repository.owner,
            &context.repository.name,
            branch,
            commits,
        ) else {
            return Ok(ExportReport::default());
        };

        tracing::info!(
            "Sending {} commits from {}/{}",
            batch.commits().len(),
            batch.owner(),
            batch.repo()
        );

        let delivery = self
            .delivery
            .deliver(&batch, &self.secret, self.started)
            .await?;

        tracing::info!(
            "Exported {} commits, job time {} minutes ({}ms)",
            batch.commits().len(),
            delivery.job_minutes,
            self.started.elapsed().as_millis()
        );

        Ok(ExportReport {
            commits: batch.commits().len(),
            dropped: normalized.dropped,
            resolution,
            delivery: Some(delivery),
        })
    }
}

/// Run the action end to end against `env`.
///
/// Configuration is validated before anything touches the network. The
/// `commits` output is only written when the export succeeds.
pub async fn run_action<E: Environment + ?Sized>(env: &E) -> Result<ExportReport, ExportError> {
    let config = ExportConfig::from_env(env)?;
    let context = ActionContext::from_env(env)?;
    let exporter = Exporter::from_config(&config)?;

    let report = exporter.run(&context).await?;

    Outputs::from_env(env)
        .set(COMMITS_OUTPUT, report.commits)
        .await
        .map_err(ExportError::Output)?;

    Ok(report)
}

/// Log how a run ended and pick the process exit status.
///
/// A failure is logged exactly once, at ERROR, which the runner shows as the
/// step's `::error::` annotation.
pub fn exit_code(outcome: Result<ExportReport, ExportError>) -> ExitCode {
    match outcome {
        Ok(report) => {
            tracing::info!("Action finished, {} commits exported", report.commits);
            ExitCode::SUCCESS
        }
        Err(error) => {
            tracing::error!("Action failed: {error}");
            ExitCode::FAILURE
        }
    }
}
