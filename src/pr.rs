use log::{error, info};

use crate::client::{HostingClient, OpenPull, RateLimited, RepoRef};

/// How an open pull request was finally dealt with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Resolution {
    Merged,
    ForceMerged,
    Closed,
    Unresolved,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Stage {
    Merge,
    ForceMerge,
    Close,
}

impl Stage {
    const fn next(self) -> Option<Self> {
        match self {
            Self::Merge => Some(Self::ForceMerge),
            Self::ForceMerge => Some(Self::Close),
            Self::Close => None,
        }
    }

    const fn resolution(self) -> Resolution {
        match self {
            Self::Merge => Resolution::Merged,
            Self::ForceMerge => Resolution::ForceMerged,
            Self::Close => Resolution::Closed,
        }
    }

    /// Log wording: announcement, gerund for errors, past tense.
    const fn labels(self) -> (&'static str, &'static str, &'static str) {
        match self {
            Self::Merge => ("Merging", "merging", "Merged"),
            Self::ForceMerge => ("Attempting to force-merge", "force-merging", "Force-merged"),
            Self::Close => ("Closing", "closing", "Closed"),
        }
    }
}

pub fn force_merge_message(number: u64) -> String {
    format!("Force-merge PR #{number}")
}

async fn attempt(
    client: &dyn HostingClient,
    repo: &RepoRef,
    pr: &OpenPull,
    stage: Stage,
) -> anyhow::Result<()> {
    match stage {
        Stage::Merge => client.squash_merge(repo, pr.number).await,
        Stage::ForceMerge => {
            client
                .merge_branch(
                    repo,
                    &pr.base_ref,
                    &pr.head_sha,
                    &force_merge_message(pr.number),
                )
                .await
        }
        Stage::Close => client.close_pull(repo, pr.number).await,
    }
}

/// Squash-merge `pr`, falling back to a direct branch merge and then to
/// closing it. Failures are logged and never escape.
///
/// Running out of request quota is not a failure of the stage, so it ends the
/// cascade instead of escalating to the next fallback.
pub async fn resolve(client: &dyn HostingClient, repo: &RepoRef, pr: &OpenPull) -> Resolution {
    let mut stage = Stage::Merge;

    loop {
        let (announce, doing, done) = stage.labels();
        info!("{} PR #{} in repository '{}'", announce, pr.number, repo);

        match attempt(client, repo, pr, stage).await {
            Ok(()) => {
                info!("{} PR #{} in repository '{}'", done, pr.number, repo);
                return stage.resolution();
            }
            Err(e) => {
                error!(
                    "Error {} PR #{} in repository '{}': {:#}",
                    doing, pr.number, repo, e
                );
                if e.downcast_ref::<RateLimited>().is_some() {
                    break;
                }
            }
        }

        match stage.next() {
            Some(next) => stage = next,
            None => break,
        }
    }

    error!(
        "Giving up on PR #{} in repository '{}', it stays open",
        pr.number, repo
    );
    Resolution::Unresolved
}
