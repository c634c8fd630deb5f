use anyhow::Result;
use log::{error, info};

use crate::bounded::map_bounded;
use crate::client::{HostingClient, RepoRef};
use crate::context::Context;
use crate::pr::{self, Resolution};

/// What changed on a repository's feature toggles.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FeatureChange {
    Disabled,
    Unchanged,
}

/// Turn off issues, projects and wiki when all three are on.
///
/// Any other combination is left alone, so a repository with only one of
/// them switched off keeps the other two.
pub async fn disable_features(
    client: &dyn HostingClient,
    repo: &RepoRef,
) -> Result<FeatureChange> {
    let flags = client.get_features(repo).await?;

    if !flags.all_enabled() {
        return Ok(FeatureChange::Unchanged);
    }

    client.disable_features(repo).await?;
    Ok(FeatureChange::Disabled)
}

/// Disable features, then resolve every open pull request of `repo`.
///
/// A feature update failure is logged and skipped; failing to list pull
/// requests ends processing of this repository with an error.
pub async fn process_repo(ctx: &Context, repo: &RepoRef) -> Result<Vec<Resolution>> {
    let client = ctx.client.as_ref();

    match disable_features(client, repo).await {
        Ok(FeatureChange::Disabled) => {
            info!("Disabled issues, projects and wiki in repository '{}'", repo)
        }
        Ok(FeatureChange::Unchanged) => {
            info!("Features already disabled in repository '{}'", repo)
        }
        Err(e) => error!("Error disabling features in repository '{}': {:#}", repo, e),
    }

    let pulls = client.list_open_pulls(repo).await?;
    info!("Found {} open PRs in repository '{}'", pulls.len(), repo);

    let resolutions =
        map_bounded(&pulls, ctx.concurrency, |pull| pr::resolve(client, repo, pull)).await;

    Ok(resolutions)
}
