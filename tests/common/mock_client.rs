//! Recording [`HostingClient`] for driving the sweep without a network.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use anyhow::{Result, bail};
use async_trait::async_trait;
use prsweep::client::{FeatureFlags, HostingClient, OpenPull, RateLimited, RepoRef};

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Call {
    ListRepos,
    GetFeatures(RepoRef),
    DisableFeatures(RepoRef),
    ListPulls(RepoRef),
    SquashMerge(RepoRef, u64),
    MergeBranch {
        repo: RepoRef,
        base: String,
        head: String,
        message: String,
    },
    ClosePull(RepoRef, u64),
}

/// Counts how many calls of one kind overlap.
#[derive(Default)]
pub struct Gauge {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl Gauge {
    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
pub struct MockClient {
    repos: Mutex<Vec<RepoRef>>,
    features: Mutex<HashMap<RepoRef, FeatureFlags>>,
    pulls: Mutex<HashMap<RepoRef, Vec<OpenPull>>>,
    calls: Mutex<Vec<Call>>,
    // Error injection
    fail_list_repos: AtomicBool,
    fail_get_features: Mutex<HashSet<RepoRef>>,
    fail_disable: Mutex<HashSet<RepoRef>>,
    fail_list_pulls: Mutex<HashSet<RepoRef>>,
    fail_squash: Mutex<HashSet<(RepoRef, u64)>>,
    rate_limit_squash: Mutex<HashSet<(RepoRef, u64)>>,
    fail_merge_branch: Mutex<HashSet<(RepoRef, String)>>,
    fail_close: Mutex<HashSet<(RepoRef, u64)>>,
    // Overlap tracking
    pub pull_listings: Gauge,
    pub squash_merges: Gauge,
}

pub fn repo(name: &str) -> RepoRef {
    RepoRef::new("octo", name)
}

/// PR `number` targeting `main`, with head commit `sha{number}`.
pub fn pull(number: u64) -> OpenPull {
    OpenPull {
        number,
        base_ref: "main".to_string(),
        head_sha: format!("sha{number}"),
    }
}

pub const ALL_ON: FeatureFlags = FeatureFlags {
    has_issues: true,
    has_projects: true,
    has_wiki: true,
};

impl MockClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_repo(&self, repo: &RepoRef, flags: FeatureFlags, pulls: Vec<OpenPull>) {
        self.repos.lock().unwrap().push(repo.clone());
        self.features.lock().unwrap().insert(repo.clone(), flags);
        self.pulls.lock().unwrap().insert(repo.clone(), pulls);
    }

    pub fn fail_list_repos(&self) {
        self.fail_list_repos.store(true, Ordering::SeqCst);
    }

    pub fn fail_get_features(&self, repo: &RepoRef) {
        self.fail_get_features.lock().unwrap().insert(repo.clone());
    }

    pub fn fail_disable(&self, repo: &RepoRef) {
        self.fail_disable.lock().unwrap().insert(repo.clone());
    }

    pub fn fail_list_pulls(&self, repo: &RepoRef) {
        self.fail_list_pulls.lock().unwrap().insert(repo.clone());
    }

    pub fn fail_squash(&self, repo: &RepoRef, number: u64) {
        self.fail_squash
            .lock()
            .unwrap()
            .insert((repo.clone(), number));
    }

    /// Makes the squash-merge of `number` report an exhausted request quota.
    pub fn rate_limit_squash(&self, repo: &RepoRef, number: u64) {
        self.rate_limit_squash
            .lock()
            .unwrap()
            .insert((repo.clone(), number));
    }

    /// Fails the direct merge of `pull(number)`'s head commit.
    pub fn fail_merge_branch(&self, repo: &RepoRef, number: u64) {
        self.fail_merge_branch
            .lock()
            .unwrap()
            .insert((repo.clone(), pull(number).head_sha));
    }

    pub fn fail_close(&self, repo: &RepoRef, number: u64) {
        self.fail_close.lock().unwrap().insert((repo.clone(), number));
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, matches: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|c| matches(c)).count()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl HostingClient for MockClient {
    async fn list_owned_repos(&self) -> Result<Vec<RepoRef>> {
        self.record(Call::ListRepos);
        if self.fail_list_repos.load(Ordering::SeqCst) {
            bail!("page 2 returned 502");
        }
        Ok(self.repos.lock().unwrap().clone())
    }

    async fn get_features(&self, repo: &RepoRef) -> Result<FeatureFlags> {
        self.record(Call::GetFeatures(repo.clone()));
        if self.fail_get_features.lock().unwrap().contains(repo) {
            bail!("Not Found (404)");
        }
        Ok(self
            .features
            .lock()
            .unwrap()
            .get(repo)
            .copied()
            .unwrap_or_default())
    }

    async fn disable_features(&self, repo: &RepoRef) -> Result<()> {
        self.record(Call::DisableFeatures(repo.clone()));
        if self.fail_disable.lock().unwrap().contains(repo) {
            bail!("Must have admin rights to Repository. (403)");
        }
        self.features
            .lock()
            .unwrap()
            .insert(repo.clone(), FeatureFlags::default());
        Ok(())
    }

    async fn list_open_pulls(&self, repo: &RepoRef) -> Result<Vec<OpenPull>> {
        self.record(Call::ListPulls(repo.clone()));
        self.pull_listings.enter();
        tokio::task::yield_now().await;
        self.pull_listings.exit();

        if self.fail_list_pulls.lock().unwrap().contains(repo) {
            bail!("Server Error (500)");
        }
        Ok(self
            .pulls
            .lock()
            .unwrap()
            .get(repo)
            .cloned()
            .unwrap_or_default())
    }

    async fn squash_merge(&self, repo: &RepoRef, number: u64) -> Result<()> {
        self.record(Call::SquashMerge(repo.clone(), number));
        self.squash_merges.enter();
        tokio::task::yield_now().await;
        self.squash_merges.exit();

        if self
            .rate_limit_squash
            .lock()
            .unwrap()
            .contains(&(repo.clone(), number))
        {
            return Err(RateLimited {
                operation: format!("squash-merge PR #{number}"),
                retries: 3,
                message: "API rate limit exceeded".to_string(),
            }
            .into());
        }
        if self
            .fail_squash
            .lock()
            .unwrap()
            .contains(&(repo.clone(), number))
        {
            bail!("Pull Request is not mergeable (405)");
        }
        Ok(())
    }

    async fn merge_branch(
        &self,
        repo: &RepoRef,
        base: &str,
        head: &str,
        message: &str,
    ) -> Result<()> {
        self.record(Call::MergeBranch {
            repo: repo.clone(),
            base: base.to_string(),
            head: head.to_string(),
            message: message.to_string(),
        });
        if self
            .fail_merge_branch
            .lock()
            .unwrap()
            .contains(&(repo.clone(), head.to_string()))
        {
            bail!("Merge conflict (409)");
        }
        Ok(())
    }

    async fn close_pull(&self, repo: &RepoRef, number: u64) -> Result<()> {
        self.record(Call::ClosePull(repo.clone(), number));
        if self
            .fail_close
            .lock()
            .unwrap()
            .contains(&(repo.clone(), number))
        {
            bail!("Validation Failed (422)");
        }
        Ok(())
    }
}
