use std::sync::Arc;

use gv_core::{Error, ModelLoader, Result};

pub mod dummy;
pub mod tflite;

pub use dummy::{DummyLoader, DummyModel};
pub use tflite::{TfliteLoader, TfliteModel};

pub const AVAILABLE_BACKENDS: &[&str] = &["tflite", "dummy"];

pub fn create_loader(name: &str) -> Result<Arc<dyn ModelLoader>> {
    match name.to_lowercase().as_str() {
        "tflite" => Ok(Arc::new(TfliteLoader)),
        "dummy" => Ok(Arc::new(DummyLoader::default())),
        other => Err(Error::ModelLoad(format!(
            "Unknown model backend: {}. Available backends: {}",
            other,
            AVAILABLE_BACKENDS.join(", ")
        ))),
    }
}
