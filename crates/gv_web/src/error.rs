use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WebError {
    #[error("{0}")]
    Pipeline(#[from] gv_core::Error),

    #[error("Invalid upload: {0}")]
    BadRequest(String),
}

impl WebError {
    pub fn status(&self) -> StatusCode {
        match self {
            WebError::BadRequest(_) => StatusCode::BAD_REQUEST,
            WebError::Pipeline(gv_core::Error::UnsupportedFormat(_)) => {
                StatusCode::UNSUPPORTED_MEDIA_TYPE
            }
            WebError::Pipeline(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
            WebError::Pipeline(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<MultipartError> for WebError {
    fn from(e: MultipartError) -> Self {
        WebError::BadRequest(e.body_text())
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let unsupported = WebError::from(gv_core::Error::UnsupportedFormat("Gif".to_string()));
        assert_eq!(unsupported.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);

        let width = WebError::from(gv_core::Error::OutputWidth {
            expected: 4,
            actual: 3,
        });
        assert_eq!(width.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let missing = WebError::BadRequest("no file".to_string());
        assert_eq!(missing.status(), StatusCode::BAD_REQUEST);
    }
}
