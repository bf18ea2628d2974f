use std::fmt;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::types::{InputTensor, OutputScores};
use crate::Result;

/// A loaded model with its tensors allocated, ready to be invoked.
pub trait ModelHandle: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    /// The concrete input shape the handle was allocated for, when the model declares one.
    fn input_shape(&self) -> Option<&[usize]>;

    /// Bind `input` to the sole input slot, run the model and read back the sole output slot.
    fn invoke(&self, input: &InputTensor) -> Result<OutputScores>;
}

#[async_trait]
pub trait ModelLoader: Send + Sync {
    fn name(&self) -> &str;

    /// Whether the loader reads the downloaded artifact. Loaders that don't skip the fetch.
    fn requires_artifact(&self) -> bool {
        true
    }

    async fn load(&self, path: &Path) -> Result<Arc<dyn ModelHandle>>;
}
