use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

pub mod chart;
pub mod error;
pub mod handlers;
pub mod page;
pub mod state;

pub use error::WebError;
pub use state::{AppState, WebConfig};

pub fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::permissive();
    let body_limit = state.config.body_limit;

    Router::new()
        .route("/", get(handlers::index).post(handlers::upload))
        .route("/api/predict", post(handlers::api_predict))
        .route("/health", get(handlers::health))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(Arc::new(state))
}

/// Bind `addr` and serve the app until the process is stopped.
pub async fn serve(addr: SocketAddr, state: AppState) -> gv_core::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("🌐 Listening on http://{}", listener.local_addr()?);
    axum::serve(listener, create_app(state)).await?;
    Ok(())
}

pub mod prelude {
    pub use crate::{create_app, serve, AppState, WebConfig};
    pub use gv_core::{Error, Prediction, Result};
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use gv_inference::{Pipeline, PipelineConfig};
    use gv_model::{ModelConfig, ModelProvider};
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;
    use tower::ServiceExt;

    const BOUNDARY: &str = "gv-test-boundary";

    fn app() -> Router {
        let config = ModelConfig {
            backend: "dummy".to_string(),
            ..ModelConfig::default()
        };
        let provider = Arc::new(ModelProvider::new(config).unwrap());
        let pipeline = Arc::new(Pipeline::new(provider, PipelineConfig::default()));
        create_app(AppState::new(pipeline, WebConfig::default()))
    }

    fn png(width: u32, height: u32) -> Vec<u8> {
        let image = RgbImage::from_pixel(width, height, Rgb([40, 160, 70]));
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(image)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    fn multipart_request(uri: &str, field: &str, content: &[u8]) -> Request<Body> {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"leaf.png\"\r\nContent-Type: image/png\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(content);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn body_string(response: axum::response::Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_index_shows_upload_form() {
        let response = app()
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let html = body_string(response).await;
        assert!(html.contains(page::PAGE_TITLE));
        assert!(html.contains(r#"name="file""#));
    }

    #[tokio::test]
    async fn test_upload_renders_preview_and_chart() {
        let response = app()
            .oneshot(multipart_request("/", "file", &png(512, 512)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let html = body_string(response).await;
        assert!(html.contains("data:image/png;base64,"));
        assert!(html.contains(r#"width="256" height="256""#));
        assert!(html.contains(page::UPLOAD_SUCCESS));
        assert!(html.contains(chart::CHART_TITLE));
        for label in ["BlackMeasles", "BlackRot", "HealthyGrapes", "LeafBlight"] {
            assert!(html.contains(label));
        }
    }

    #[tokio::test]
    async fn test_upload_without_file_shows_form_only() {
        let response = app()
            .oneshot(multipart_request("/", "other", b"ignored"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let html = body_string(response).await;
        assert!(!html.contains(chart::CHART_TITLE));
        assert!(!html.contains(page::UPLOAD_SUCCESS));
    }

    #[tokio::test]
    async fn test_upload_of_non_image_shows_error() {
        let response = app()
            .oneshot(multipart_request("/", "file", b"plain text, not a leaf"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);

        let html = body_string(response).await;
        assert!(html.contains(r#"class="error""#));
        assert!(html.contains("Unsupported image format"));
    }

    #[tokio::test]
    async fn test_api_predict() {
        let response = app()
            .oneshot(multipart_request("/api/predict", "file", &png(300, 200)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        let rows = json["predictions"].as_array().unwrap();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0]["label"], "BlackMeasles");
        assert_eq!(rows[3]["label"], "LeafBlight");
        let total: f64 = rows.iter().map(|r| r["percentage"].as_f64().unwrap()).sum();
        assert!((total - 100.0).abs() < 1e-3);
    }

    #[tokio::test]
    async fn test_api_predict_requires_file() {
        let response = app()
            .oneshot(multipart_request("/api/predict", "other", b""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let json: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert!(json["error"].as_str().unwrap().contains("No file uploaded"));
    }

    #[tokio::test]
    async fn test_health_reports_model_name() {
        let app = app();
        let health = || Request::get("/health").body(Body::empty()).unwrap();

        let response = app.clone().oneshot(health()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(json["status"], "ok");
        assert!(json["model"].is_null());
        assert_eq!(json.as_object().unwrap().len(), 2);

        let response = app
            .clone()
            .oneshot(multipart_request("/api/predict", "file", &png(64, 64)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app.oneshot(health()).await.unwrap();
        let json: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["model"], "Dummy");
    }
}
