use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use log::debug;

use prsweep::client::GitHub;
use prsweep::config::{self, Config};
use prsweep::context::Context;
use prsweep::sweep;

#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Personal access token
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// TOML file with `concurrency`, `api-url`, `rate-limit-retries` and `rate-limit-wait`
    #[arg(long)]
    config: Option<PathBuf>,

    /// Repositories, and pull requests per repository, handled at once
    #[arg(long)]
    concurrency: Option<usize>,

    /// Base URL of the GitHub API
    #[arg(long)]
    api_url: Option<String>,

    /// Log debug output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_module("prsweep", level)
        .parse_default_env()
        .init();

    let token = config::require_token(args.token)?;
    let config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    }
    .with_overrides(args.concurrency, args.api_url)?;
    debug!("{:?}", config);

    let client =
        GitHub::new(&token, config.api_url.as_deref())?.with_rate_limit(config.rate_limit());
    let ctx = Context::new(Arc::new(client)).with_concurrency(config.concurrency);

    sweep::run(&ctx).await;

    Ok(())
}
