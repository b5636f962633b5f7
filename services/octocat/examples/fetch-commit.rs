//! Fetch a single commit from a repository using the Github API.
//!
//! Usage: `GITHUB_TOKEN=... cargo run --example fetch-commit -- owner repo sha`

use eyre::{eyre, WrapErr as _};

use octocat::{GithubClient, GithubConfig};

#[tokio::main]
async fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt::init();

    let mut args = std::env::args().skip(1);
    let (Some(owner), Some(repo), Some(sha)) = (args.next(), args.next(), args.next()) else {
        return Err(eyre!("usage: fetch-commit <owner> <repo> <sha>"));
    };

    let token = api_client::Secret::from_env("GITHUB_TOKEN")
        .ok_or_else(|| eyre!("GITHUB_TOKEN is not set"))?;
    let config = GithubConfig {
        token,
        api_url: std::env::var("GITHUB_API_URL").ok(),
    };

    let client = GithubClient::try_from(config).wrap_err("Github API URL")?;
    let commit = client
        .commit(&owner, &repo, &sha)
        .await
        .wrap_err_with(|| format!("fetching {owner}/{repo}@{sha}"))?;

    println!("{}", serde_json::to_string_pretty(&commit)?);

    Ok(())
}
