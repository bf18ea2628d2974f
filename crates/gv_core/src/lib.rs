pub mod error;
pub mod fetch;
pub mod models;
pub mod types;

pub use error::Error;
pub use fetch::ModelFetcher;
pub use models::{ModelHandle, ModelLoader};
pub use types::{
    ClassScore, DiseaseClass, InputTensor, OutputScores, Prediction, INPUT_CHANNELS, INPUT_SHAPE,
    INPUT_SIZE, PIXEL_SCALE,
};

pub type Result<T> = std::result::Result<T, Error>;
