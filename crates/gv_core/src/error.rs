use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Model fetch error: {0}")]
    Fetch(String),

    #[error("Model load error: {0}")]
    ModelLoad(String),

    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),

    #[error("Image decode error: {0}")]
    Decode(#[from] image::ImageError),

    #[error("Image encode error: {0}")]
    Encode(String),

    #[error("Input shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("Model returned {actual} scores, expected {expected}")]
    OutputWidth { expected: usize, actual: usize },

    #[error("Inference error: {0}")]
    Inference(String),

    #[error("External error: {0}")]
    External(#[from] anyhow::Error),
}

impl Error {
    /// True for errors caused by the uploaded file rather than the model or the server.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::UnsupportedFormat(_) | Error::Decode(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
