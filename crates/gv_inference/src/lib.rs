pub mod pipeline;
pub mod preprocess;
pub mod runner;

pub use pipeline::{Classification, Pipeline, PipelineConfig};
pub use preprocess::{load_image, load_image_opt, LoadedImage};
pub use runner::predict;

pub mod prelude {
    pub use super::{load_image, predict, Classification, Pipeline, PipelineConfig};
    pub use gv_core::{ClassScore, DiseaseClass, Error, InputTensor, Prediction, Result};
}
