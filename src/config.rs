use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use crate::client::RateLimitPolicy;
use crate::context::DEFAULT_CONCURRENCY;

#[derive(Debug, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct Config {
    pub concurrency: usize,
    pub api_url: Option<String>,
    /// Times a rate-limited request is repeated before giving up.
    pub rate_limit_retries: u32,
    /// Seconds to wait before repeating a rate-limited request.
    pub rate_limit_wait: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            api_url: None,
            rate_limit_retries: RateLimitPolicy::default().retries,
            rate_limit_wait: RateLimitPolicy::default().wait.as_secs(),
        }
    }
}

impl Config {
    pub fn parse(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).context("Failed to parse config file")?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&text).with_context(|| format!("Invalid config file: {}", path.display()))
    }

    pub const fn rate_limit(&self) -> RateLimitPolicy {
        RateLimitPolicy {
            retries: self.rate_limit_retries,
            wait: Duration::from_secs(self.rate_limit_wait),
        }
    }

    /// Apply command line values on top of the file.
    pub fn with_overrides(
        mut self,
        concurrency: Option<usize>,
        api_url: Option<String>,
    ) -> Result<Self> {
        if let Some(concurrency) = concurrency {
            self.concurrency = concurrency;
        }
        if api_url.is_some() {
            self.api_url = api_url;
        }
        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            bail!("concurrency must be at least 1");
        }
        Ok(())
    }
}

/// The access token has no default; a missing or blank one stops the run
/// before any request is made.
pub fn require_token(token: Option<String>) -> Result<String> {
    match token {
        Some(token) if !token.trim().is_empty() => Ok(token.trim().to_string()),
        _ => bail!("No GitHub token given: pass --token or set GITHUB_TOKEN"),
    }
}
