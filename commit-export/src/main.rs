//! Github Action entry point for exporting pushed commits.

use std::process::ExitCode;

use commit_export::{run_action, ProcessEnvironment};
use eyre::WrapErr as _;

#[tokio::main]
async fn main() -> eyre::Result<ExitCode> {
    commit_export::logging::init().wrap_err("installing the log subscriber")?;

    // Failures are reported once, through the `::error::` annotation.
    Ok(commit_export::exit_code(run_action(&ProcessEnvironment).await))
}
