use std::path::Path;

use async_trait::async_trait;

use crate::Result;

#[async_trait]
pub trait ModelFetcher: Send + Sync {
    /// Download `url` into `dest`, replacing any existing file. Returns the number of bytes written.
    async fn fetch(&self, url: &str, dest: &Path) -> Result<u64>;
}
