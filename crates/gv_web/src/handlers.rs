use std::sync::Arc;

use axum::extract::{Multipart, State};
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use gv_core::Prediction;
use gv_inference::Classification;
use serde_json::{json, Value};
use tracing::warn;

use crate::chart;
use crate::error::WebError;
use crate::page::{self, Outcome};
use crate::AppState;

/// Multipart field carrying the uploaded image.
pub const UPLOAD_FIELD: &str = "file";

async fn read_upload(mut multipart: Multipart) -> Result<Option<Vec<u8>>, WebError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some(UPLOAD_FIELD) {
            let bytes = field.bytes().await?;
            return Ok(Some(bytes.to_vec()));
        }
    }
    Ok(None)
}

async fn classify_upload(
    state: &AppState,
    multipart: Multipart,
) -> Result<Option<Arc<Classification>>, WebError> {
    let upload = read_upload(multipart).await?;
    Ok(state.pipeline.classify_opt(upload).await?)
}

pub async fn index() -> Html<String> {
    Html(page::render_page(&Outcome::Empty))
}

pub async fn upload(State(state): State<Arc<AppState>>, multipart: Multipart) -> Response {
    let result = match classify_upload(&state, multipart).await {
        Ok(Some(classification)) => chart::render_bar_chart(&classification.prediction)
            .map(|svg| (classification, svg))
            .map(Some)
            .map_err(WebError::from),
        Ok(None) => Ok(None),
        Err(e) => Err(e),
    };

    match result {
        Ok(Some((classification, chart_svg))) => Html(page::render_page(&Outcome::Classified {
            classification: &classification,
            chart_svg: &chart_svg,
        }))
        .into_response(),
        Ok(None) => Html(page::render_page(&Outcome::Empty)).into_response(),
        Err(e) => {
            warn!("Upload failed: {}", e);
            let message = e.to_string();
            (e.status(), Html(page::render_page(&Outcome::Failed(&message)))).into_response()
        }
    }
}

pub async fn api_predict(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<Prediction>, WebError> {
    let classification = classify_upload(&state, multipart)
        .await?
        .ok_or_else(|| WebError::BadRequest("No file uploaded".to_string()))?;
    Ok(Json(classification.prediction.clone()))
}

/// `model` is the loaded model's name, `null` until the first classification loads it.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    let model = state.pipeline.provider().loaded().map(|handle| handle.name().to_string());
    Json(json!({
        "status": "ok",
        "model": model,
    }))
}
