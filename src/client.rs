//! Hosting platform collaborator.
//!
//! Everything the sweep needs from the remote platform goes through
//! [`HostingClient`], so the orchestration can be driven against a recording
//! mock in tests and against [`GitHub`] for real runs.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use http::StatusCode;
use log::warn;
use octocrab::{GitHubError, Octocrab, Page};
use serde::Deserialize;
use serde_json::json;

/// A repository, addressed by its owner login and name.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl RepoRef {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Feature toggles on a repository's settings page.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct FeatureFlags {
    #[serde(default)]
    pub has_issues: bool,
    #[serde(default)]
    pub has_projects: bool,
    #[serde(default)]
    pub has_wiki: bool,
}

impl FeatureFlags {
    pub const fn all_enabled(&self) -> bool {
        self.has_issues && self.has_projects && self.has_wiki
    }
}

/// An open pull request: its number, target branch and source commit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OpenPull {
    pub number: u64,
    pub base_ref: String,
    pub head_sha: String,
}

#[async_trait]
pub trait HostingClient: Send + Sync {
    /// Every repository owned by the authenticated user, all pages.
    async fn list_owned_repos(&self) -> Result<Vec<RepoRef>>;

    async fn get_features(&self, repo: &RepoRef) -> Result<FeatureFlags>;

    /// Turn off issues, projects and wiki in one update.
    async fn disable_features(&self, repo: &RepoRef) -> Result<()>;

    /// Every open pull request of `repo`, all pages.
    async fn list_open_pulls(&self, repo: &RepoRef) -> Result<Vec<OpenPull>>;

    async fn squash_merge(&self, repo: &RepoRef, number: u64) -> Result<()>;

    /// Merge `head` straight into `base`, bypassing the pull request gate.
    async fn merge_branch(&self, repo: &RepoRef, base: &str, head: &str, message: &str)
    -> Result<()>;

    async fn close_pull(&self, repo: &RepoRef, number: u64) -> Result<()>;
}

#[derive(Deserialize)]
struct RepoPayload {
    name: String,
    owner: OwnerPayload,
}

#[derive(Deserialize)]
struct OwnerPayload {
    login: String,
}

#[derive(Deserialize)]
struct PullPayload {
    number: u64,
    base: BasePayload,
    head: HeadPayload,
}

#[derive(Deserialize)]
struct BasePayload {
    #[serde(rename = "ref")]
    ref_field: String,
}

#[derive(Deserialize)]
struct HeadPayload {
    sha: String,
}

impl From<RepoPayload> for RepoRef {
    fn from(repo: RepoPayload) -> Self {
        Self::new(repo.owner.login, repo.name)
    }
}

impl From<PullPayload> for OpenPull {
    fn from(pr: PullPayload) -> Self {
        Self {
            number: pr.number,
            base_ref: pr.base.ref_field,
            head_sha: pr.head.sha,
        }
    }
}

/// Pull the platform's own message out of an API error, falling back to the
/// error's display text for transport failures.
pub fn describe(err: &octocrab::Error) -> String {
    match err {
        octocrab::Error::GitHub { source, .. } => {
            format!("{} ({})", source.message, source.status_code)
        }
        other => other.to_string(),
    }
}

/// A 403 or 429 whose message or documentation link talks about rate limits.
pub fn is_rate_limit_error(source: &GitHubError) -> bool {
    let is_rate_limit_status = matches!(
        source.status_code,
        StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS
    );

    let message_indicates_rate_limit = source.message.to_lowercase().contains("rate limit")
        || source
            .documentation_url
            .as_deref()
            .is_some_and(|url| url.contains("rate-limit"));

    is_rate_limit_status && message_indicates_rate_limit
}

/// The request quota stayed exhausted through every retry.
///
/// Callers must not treat this as a verdict on the request itself.
#[derive(Debug, thiserror::Error)]
#[error("Rate limit still exceeded after {retries} retries, could not {operation}: {message}")]
pub struct RateLimited {
    pub operation: String,
    pub retries: u32,
    pub message: String,
}

/// How long to back off when the request quota is exhausted, and how often.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub retries: u32,
    pub wait: Duration,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            retries: 3,
            wait: Duration::from_secs(60),
        }
    }
}

/// [`HostingClient`] backed by the GitHub REST API.
pub struct GitHub {
    octocrab: Octocrab,
    rate_limit: RateLimitPolicy,
}

impl GitHub {
    pub fn new(token: &str, api_url: Option<&str>) -> Result<Self> {
        let mut builder = Octocrab::builder().personal_token(token.to_string());

        if let Some(url) = api_url {
            builder = builder
                .base_uri(url)
                .with_context(|| format!("Invalid API url: {url}"))?;
        }

        let octocrab = builder.build().context("Failed to build GitHub client")?;

        Ok(Self {
            octocrab,
            rate_limit: RateLimitPolicy::default(),
        })
    }

    pub fn with_rate_limit(mut self, rate_limit: RateLimitPolicy) -> Self {
        self.rate_limit = rate_limit;
        self
    }

    /// Run `call`, sleeping and repeating it while GitHub reports the rate
    /// limit as exceeded. Any other error is returned with `operation` as
    /// context.
    async fn throttled<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = octocrab::Result<T>>,
    {
        let mut retries = 0;

        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(octocrab::Error::GitHub { source, .. }) if is_rate_limit_error(&source) => {
                    if retries >= self.rate_limit.retries {
                        return Err(RateLimited {
                            operation: operation.to_string(),
                            retries,
                            message: source.message.clone(),
                        }
                        .into());
                    }
                    retries += 1;
                    warn!("Request quota exhausted for request: {}", operation);
                    warn!("Retrying after {} seconds!", self.rate_limit.wait.as_secs_f32());
                    tokio::time::sleep(self.rate_limit.wait).await;
                }
                Err(e) => {
                    let detail = describe(&e);
                    let context = format!("Failed to {operation}: {detail}");
                    return Err(anyhow::Error::new(e).context(context));
                }
            }
        }
    }
}

#[async_trait]
impl HostingClient for GitHub {
    async fn list_owned_repos(&self) -> Result<Vec<RepoRef>> {
        let repos = self
            .throttled("list repositories", || async move {
                let first: Page<RepoPayload> = self
                    .octocrab
                    .get(
                        "/user/repos",
                        Some(&[("affiliation", "owner"), ("per_page", "100")]),
                    )
                    .await?;
                self.octocrab.all_pages(first).await
            })
            .await?;

        Ok(repos.into_iter().map(RepoRef::from).collect())
    }

    async fn get_features(&self, repo: &RepoRef) -> Result<FeatureFlags> {
        let route = format!("/repos/{}/{}", repo.owner, repo.name);
        let route = route.as_str();

        self.throttled("read settings", || async move {
            self.octocrab.get(route, None::<&()>).await
        })
        .await
    }

    async fn disable_features(&self, repo: &RepoRef) -> Result<()> {
        let route = format!("/repos/{}/{}", repo.owner, repo.name);
        let body = json!({
            "has_issues": false,
            "has_projects": false,
            "has_wiki": false,
        });
        let (route, body) = (route.as_str(), &body);

        let _: serde_json::Value = self
            .throttled("update settings", || async move {
                self.octocrab.patch(route, Some(body)).await
            })
            .await?;

        Ok(())
    }

    async fn list_open_pulls(&self, repo: &RepoRef) -> Result<Vec<OpenPull>> {
        let route = format!("/repos/{}/{}/pulls", repo.owner, repo.name);
        let route = route.as_str();

        let pulls = self
            .throttled("list pull requests", || async move {
                let first: Page<PullPayload> = self
                    .octocrab
                    .get(route, Some(&[("state", "open"), ("per_page", "100")]))
                    .await?;
                self.octocrab.all_pages(first).await
            })
            .await?;

        Ok(pulls.into_iter().map(OpenPull::from).collect())
    }

    async fn squash_merge(&self, repo: &RepoRef, number: u64) -> Result<()> {
        let operation = format!("squash-merge PR #{number}");

        let merge = self
            .throttled(&operation, || async move {
                self.octocrab
                    .pulls(&repo.owner, &repo.name)
                    .merge(number)
                    .method(octocrab::params::pulls::MergeMethod::Squash)
                    .send()
                    .await
            })
            .await?;

        if !merge.merged {
            bail!(
                "Failed to {}: {}",
                operation,
                merge
                    .message
                    .unwrap_or_else(|| "merge was not performed".to_string())
            );
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
        let route = format!("/repos/{}/{}/merges", repo.owner, repo.name);
        let body = json!({
            "base": base,
            "head": head,
            "commit_message": message,
        });
        let (route, body) = (route.as_str(), &body);

        // 201 is a new merge commit, 204 means base already contains head.
        self.throttled(&format!("merge {head} into {base}"), || async move {
            let response = self.octocrab._post(route, Some(body)).await?;
            octocrab::map_github_error(response).await
        })
        .await?;

        Ok(())
    }

    async fn close_pull(&self, repo: &RepoRef, number: u64) -> Result<()> {
        let route = format!("/repos/{}/{}/pulls/{}", repo.owner, repo.name, number);
        let route = route.as_str();
        let body = json!({ "state": "closed" });
        let body = &body;

        let _: serde_json::Value = self
            .throttled(&format!("close PR #{number}"), || async move {
                self.octocrab.patch(route, Some(body)).await
            })
            .await?;

        Ok(())
    }
}
