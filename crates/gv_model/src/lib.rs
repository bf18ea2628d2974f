use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use gv_core::{Error, ModelFetcher, ModelHandle, ModelLoader, Result};
use tokio::sync::OnceCell;
use tracing::{info, warn};

pub mod backends;
pub mod fetchers;

pub use backends::create_loader;
pub use fetchers::http::HttpFetcher;

pub const DEFAULT_MODEL_URL: &str =
    "https://drive.google.com/uc?id=1aDpkyck8huroIcRJ5bRCaHl9N8sqrOfp";
pub const DEFAULT_MODEL_PATH: &str = "modelo_quantizado16bits.tflite";
pub const DEFAULT_BACKEND: &str = "tflite";

#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub url: String,
    pub path: PathBuf,
    pub backend: String,
    /// Per-attempt limit for the artifact download. `None` waits forever.
    pub fetch_timeout: Option<Duration>,
    /// Extra attempts after a failed download.
    pub fetch_retries: u32,
    pub retry_delay: Duration,
    /// Skip the download when the artifact is already on disk.
    pub reuse_existing: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_MODEL_URL.to_string(),
            path: PathBuf::from(DEFAULT_MODEL_PATH),
            backend: DEFAULT_BACKEND.to_string(),
            fetch_timeout: None,
            fetch_retries: 0,
            retry_delay: Duration::from_secs(2),
            reuse_existing: false,
        }
    }
}

/// Fetches the model artifact and builds the inference handle on first use,
/// then hands out the same handle for the rest of the process.
pub struct ModelProvider {
    config: ModelConfig,
    fetcher: Arc<dyn ModelFetcher>,
    loader: Arc<dyn ModelLoader>,
    handle: OnceCell<Arc<dyn ModelHandle>>,
}

impl std::fmt::Debug for ModelProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelProvider")
            .field("config", &self.config)
            .field("loader", &self.loader.name())
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

impl ModelProvider {
    pub fn new(config: ModelConfig) -> Result<Self> {
        let fetcher = Arc::new(HttpFetcher::new()?);
        let loader = create_loader(&config.backend)?;
        Ok(Self::with_parts(config, fetcher, loader))
    }

    pub fn with_parts(
        config: ModelConfig,
        fetcher: Arc<dyn ModelFetcher>,
        loader: Arc<dyn ModelLoader>,
    ) -> Self {
        Self {
            config,
            fetcher,
            loader,
            handle: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn is_loaded(&self) -> bool {
        self.handle.initialized()
    }

    /// The handle if a previous call already loaded it. Never fetches.
    pub fn loaded(&self) -> Option<&Arc<dyn ModelHandle>> {
        self.handle.get()
    }

    /// Returns the process-wide handle, fetching and loading the model if this is the first call.
    pub async fn handle(&self) -> Result<Arc<dyn ModelHandle>> {
        let handle = self
            .handle
            .get_or_try_init(|| self.initialize())
            .await?;
        Ok(handle.clone())
    }

    /// Make sure the artifact exists locally, downloading it unless reuse is enabled and it's present.
    pub async fn ensure_artifact(&self) -> Result<()> {
        if self.config.reuse_existing && tokio::fs::try_exists(&self.config.path).await? {
            info!("📦 Reusing model artifact at {}", self.config.path.display());
            return Ok(());
        }

        info!("⬇️ Downloading model from {}", self.config.url);
        let bytes = self.fetch_with_retry().await?;
        info!(
            "📦 Model saved to {} ({} bytes)",
            self.config.path.display(),
            bytes
        );
        Ok(())
    }

    async fn initialize(&self) -> Result<Arc<dyn ModelHandle>> {
        if self.loader.requires_artifact() {
            self.ensure_artifact().await?;
        }
        let handle = self.loader.load(&self.config.path).await?;
        info!(
            "🧠 Model initialized successfully (using {})",
            handle.name()
        );
        Ok(handle)
    }

    async fn fetch_once(&self) -> Result<u64> {
        let fetch = self.fetcher.fetch(&self.config.url, &self.config.path);
        match self.config.fetch_timeout {
            Some(limit) => tokio::time::timeout(limit, fetch).await.map_err(|_| {
                Error::Fetch(format!(
                    "Download of {} timed out after {:?}",
                    self.config.url, limit
                ))
            })?,
            None => fetch.await,
        }
    }

    async fn fetch_with_retry(&self) -> Result<u64> {
        let attempts = self.config.fetch_retries + 1;
        let mut attempt = 1;
        loop {
            match self.fetch_once().await {
                Ok(bytes) => return Ok(bytes),
                Err(e) if attempt < attempts => {
                    warn!(
                        "Model download failed ({}), retrying {}/{}...",
                        e, attempt, self.config.fetch_retries
                    );
                    attempt += 1;
                    tokio::time::sleep(self.config.retry_delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

pub mod prelude {
    pub use super::{create_loader, HttpFetcher, ModelConfig, ModelProvider};
    pub use gv_core::{Error, ModelFetcher, ModelHandle, ModelLoader, Result};
}
