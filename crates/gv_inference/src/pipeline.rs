use std::num::NonZeroUsize;
use std::sync::Arc;

use gv_core::{Error, ModelHandle, Prediction, Result};
use gv_model::ModelProvider;
use lru::LruCache;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::preprocess::load_image;
use crate::runner;

type UploadKey = [u8; 32];

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Finished classifications remembered by upload hash. 0 disables the cache.
    pub cache_size: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self { cache_size: 32 }
    }
}

/// Everything produced for one upload.
#[derive(Debug, Clone)]
pub struct Classification {
    pub preview_png: Vec<u8>,
    pub preview_size: (u32, u32),
    pub tensor_shape: Vec<usize>,
    pub prediction: Prediction,
}

/// Upload in, labeled scores out. Recomputes only when the upload bytes change.
pub struct Pipeline {
    provider: Arc<ModelProvider>,
    cache: Option<Mutex<LruCache<UploadKey, Arc<Classification>>>>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("provider", &self.provider)
            .field("cached", &self.cache.is_some())
            .finish()
    }
}

impl Pipeline {
    pub fn new(provider: Arc<ModelProvider>, config: PipelineConfig) -> Self {
        let cache = NonZeroUsize::new(config.cache_size).map(|size| Mutex::new(LruCache::new(size)));
        Self { provider, cache }
    }

    pub fn provider(&self) -> &Arc<ModelProvider> {
        &self.provider
    }

    /// `None` when nothing was uploaded.
    pub async fn classify_opt(&self, bytes: Option<Vec<u8>>) -> Result<Option<Arc<Classification>>> {
        match bytes {
            Some(bytes) if !bytes.is_empty() => self.classify(bytes).await.map(Some),
            _ => Ok(None),
        }
    }

    pub async fn classify(&self, bytes: Vec<u8>) -> Result<Arc<Classification>> {
        let key: UploadKey = Sha256::digest(&bytes).into();
        let short = hex::encode(&key[..6]);

        if let Some(cache) = &self.cache {
            if let Some(hit) = cache.lock().await.get(&key) {
                debug!("Reusing classification for upload {}", short);
                return Ok(hit.clone());
            }
        }

        let handle = self.provider.handle().await?;
        let classification = tokio::task::spawn_blocking(move || classify_bytes(handle.as_ref(), &bytes))
            .await
            .map_err(|e| Error::Inference(format!("classification task failed: {}", e)))??;
        let classification = Arc::new(classification);

        if let Some(top) = classification.prediction.top() {
            info!("🍇 Upload {} classified as {} ({:.2}%)", short, top.label, top.percentage);
        }

        if let Some(cache) = &self.cache {
            cache.lock().await.put(key, classification.clone());
        }
        Ok(classification)
    }
}

/// Decode, preprocess and run one upload. Blocking.
pub fn classify_bytes(handle: &dyn ModelHandle, bytes: &[u8]) -> Result<Classification> {
    let loaded = load_image(bytes)?;
    let prediction = runner::predict(handle, &loaded.tensor)?;

    Ok(Classification {
        preview_png: loaded.preview_png()?,
        preview_size: loaded.preview.dimensions(),
        tensor_shape: loaded.tensor.shape().to_vec(),
        prediction,
    })
}
