use std::sync::Arc;

use gv_inference::Pipeline;

pub const DEFAULT_BODY_LIMIT: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct WebConfig {
    /// Largest accepted request body, in bytes.
    pub body_limit: usize,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }
}

pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub config: WebConfig,
}

impl AppState {
    pub fn new(pipeline: Arc<Pipeline>, config: WebConfig) -> Self {
        Self { pipeline, config }
    }
}
