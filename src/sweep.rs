use log::{error, info};

use crate::bounded::map_bounded;
use crate::context::Context;
use crate::pr::Resolution;
use crate::repo;

/// Tally of one run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub repos_processed: usize,
    pub repos_failed: usize,
    pub merged: usize,
    pub force_merged: usize,
    pub closed: usize,
    pub unresolved: usize,
}

impl SweepReport {
    pub fn record(&mut self, resolution: Resolution) {
        match resolution {
            Resolution::Merged => self.merged += 1,
            Resolution::ForceMerged => self.force_merged += 1,
            Resolution::Closed => self.closed += 1,
            Resolution::Unresolved => self.unresolved += 1,
        }
    }

    pub const fn pulls_seen(&self) -> usize {
        self.merged + self.force_merged + self.closed + self.unresolved
    }
}

/// Process every repository owned by the authenticated user.
///
/// Never fails: a listing error is logged and yields an empty report.
pub async fn run(ctx: &Context) -> SweepReport {
    let mut report = SweepReport::default();

    let repos = match ctx.client.list_owned_repos().await {
        Ok(repos) => repos,
        Err(e) => {
            error!("An error occurred: {:#}", e);
            return report;
        }
    };
    info!("Found {} repositories", repos.len());

    let outcomes = map_bounded(&repos, ctx.concurrency, move |r| async move {
        let outcome = repo::process_repo(ctx, r).await;
        if let Err(e) = &outcome {
            error!("Error processing repository '{}': {:#}", r, e);
        }
        outcome
    })
    .await;

    for outcome in outcomes {
        match outcome {
            Ok(resolutions) => {
                report.repos_processed += 1;
                for resolution in resolutions {
                    report.record(resolution);
                }
            }
            Err(_) => report.repos_failed += 1,
        }
    }

    info!("All open pull requests processed.");
    info!(
        "{} repositories processed, {} failed; PRs: {} merged, {} force-merged, {} closed, {} unresolved",
        report.repos_processed,
        report.repos_failed,
        report.merged,
        report.force_merged,
        report.closed,
        report.unresolved,
    );

    report
}
