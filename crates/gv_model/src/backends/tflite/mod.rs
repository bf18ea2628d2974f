use std::fmt;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use gv_core::{Error, InputTensor, ModelHandle, ModelLoader, OutputScores, Result, INPUT_SHAPE};
use tract_core::prelude::*;
use tracing::debug;

mod dequantize;
#[cfg(test)]
pub(crate) mod fixtures;

pub use dequantize::fold_fp16_dequantize;

/// TensorFlow Lite model compiled into a tract execution plan.
pub struct TfliteModel {
    plan: TypedRunnableModel<TypedModel>,
}

impl fmt::Debug for TfliteModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TfliteModel")
            .field("input_shape", &INPUT_SHAPE)
            .field("plan", &"<tract plan>")
            .finish()
    }
}

impl TfliteModel {
    /// Read, optimize and allocate the model at `path`. Blocking.
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .map_err(|e| Error::ModelLoad(format!("{}: {}", path.display(), e)))?;
        Self::from_bytes(&bytes).map_err(|e| match e {
            Error::ModelLoad(msg) => Error::ModelLoad(format!("{}: {}", path.display(), msg)),
            other => other,
        })
    }

    /// Builds the plan from a `.tflite` flatbuffer, folding float16 weights first.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let folded = fold_fp16_dequantize(bytes)?;
        let mut reader = folded.as_deref().unwrap_or(bytes);
        let model = tract_tflite::tflite()
            .model_for_read(&mut reader)
            .map_err(|e| Error::ModelLoad(format!("{:#}", e)))?;

        let input_fact = model
            .input_fact(0)
            .map_err(|e| Error::ModelLoad(format!("model declares no input: {:#}", e)))?;
        if input_fact.datum_type != f32::datum_type() {
            return Err(Error::ModelLoad(format!(
                "model input is {:?}, expected f32",
                input_fact.datum_type
            )));
        }
        if input_fact.shape.as_concrete() != Some(&INPUT_SHAPE[..]) {
            return Err(Error::ModelLoad(format!(
                "model input shape is {:?}, expected {:?}",
                input_fact.shape, INPUT_SHAPE
            )));
        }
        debug!("Model input: f32 {:?}", INPUT_SHAPE);

        let plan = model
            .into_optimized()
            .and_then(|model| model.into_runnable())
            .map_err(|e| Error::ModelLoad(format!("failed to allocate model: {:#}", e)))?;

        Ok(Self { plan })
    }
}

impl ModelHandle for TfliteModel {
    fn name(&self) -> &str {
        "TFLite"
    }

    fn input_shape(&self) -> Option<&[usize]> {
        Some(&INPUT_SHAPE)
    }

    fn invoke(&self, input: &InputTensor) -> Result<OutputScores> {
        let data = input
            .as_slice()
            .ok_or_else(|| Error::Inference("input tensor is not contiguous".to_string()))?;
        let tensor = Tensor::from_shape(input.shape(), data)
            .map_err(|e| Error::Inference(format!("{:#}", e)))?;

        let outputs = self
            .plan
            .run(tvec!(tensor.into()))
            .map_err(|e| Error::Inference(format!("{:#}", e)))?;
        let output = outputs
            .first()
            .ok_or_else(|| Error::Inference("model produced no output".to_string()))?;

        let output = output
            .cast_to::<f32>()
            .map_err(|e| Error::Inference(format!("{:#}", e)))?;
        let view = output
            .to_array_view::<f32>()
            .map_err(|e| Error::Inference(format!("{:#}", e)))?;

        Ok(OutputScores {
            shape: view.shape().to_vec(),
            values: view.iter().copied().collect(),
        })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TfliteLoader;

#[async_trait]
impl ModelLoader for TfliteLoader {
    fn name(&self) -> &str {
        "tflite"
    }

    async fn load(&self, path: &Path) -> Result<Arc<dyn ModelHandle>> {
        let path = path.to_path_buf();
        let model = tokio::task::spawn_blocking(move || TfliteModel::load(&path))
            .await
            .map_err(|e| Error::ModelLoad(format!("model loading task failed: {}", e)))??;
        Ok(Arc::new(model))
    }
}
