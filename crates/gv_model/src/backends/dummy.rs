use std::fmt;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use gv_core::{DiseaseClass, InputTensor, ModelHandle, ModelLoader, OutputScores, Result};

/// Stand-in model that always answers with the same probabilities.
pub struct DummyModel {
    scores: Vec<f32>,
}

impl fmt::Debug for DummyModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DummyModel")
            .field("scores", &self.scores)
            .finish()
    }
}

impl DummyModel {
    pub fn new(scores: Vec<f32>) -> Self {
        Self { scores }
    }
}

impl Default for DummyModel {
    fn default() -> Self {
        Self::new(vec![0.1, 0.2, 0.6, 0.1])
    }
}

impl ModelHandle for DummyModel {
    fn name(&self) -> &str {
        "Dummy"
    }

    fn input_shape(&self) -> Option<&[usize]> {
        Some(&gv_core::INPUT_SHAPE)
    }

    fn invoke(&self, _input: &InputTensor) -> Result<OutputScores> {
        Ok(OutputScores {
            shape: vec![1, self.scores.len()],
            values: self.scores.clone(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct DummyLoader {
    scores: Vec<f32>,
}

impl Default for DummyLoader {
    fn default() -> Self {
        Self {
            scores: vec![0.1, 0.2, 0.6, 0.1],
        }
    }
}

impl DummyLoader {
    pub fn with_scores(scores: Vec<f32>) -> Self {
        debug_assert_eq!(scores.len(), DiseaseClass::ALL.len());
        Self { scores }
    }
}

#[async_trait]
impl ModelLoader for DummyLoader {
    fn name(&self) -> &str {
        "dummy"
    }

    fn requires_artifact(&self) -> bool {
        false
    }

    async fn load(&self, _path: &Path) -> Result<Arc<dyn ModelHandle>> {
        Ok(Arc::new(DummyModel::new(self.scores.clone())))
    }
}
