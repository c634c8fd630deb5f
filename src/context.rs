use std::sync::Arc;

use crate::client::HostingClient;

/// Default number of repositories, or pull requests within one repository,
/// handled at the same time.
pub const DEFAULT_CONCURRENCY: usize = 3;

pub struct Context {
    pub client: Arc<dyn HostingClient>,
    pub concurrency: usize,
}

impl Context {
    pub fn new(client: Arc<dyn HostingClient>) -> Self {
        Self {
            client,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }
}
