use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap},
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use crate::api::AppState;
use crate::api::middleware::api_key::ApiKeyAuth;
use crate::error::{AppError, AppResult};
use crate::ocr::PredictError;

/// POST /ocr  (Content-Type: image/*, body is the raw image)
pub async fn recognize(
    State(state): State<Arc<AppState>>,
    _auth: ApiKeyAuth,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<Value>> {
    let is_image = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("image/"));
    if !is_image {
        return Err(AppError::Validation("Only image uploads are supported".to_string()));
    }

    if body.is_empty() {
        return Err(AppError::Validation("Image body is empty".to_string()));
    }

    if body.len() > state.max_upload_bytes {
        return Err(AppError::PayloadTooLarge(format!(
            "Image exceeds {} bytes",
            state.max_upload_bytes
        )));
    }

    let engine = state.engine.clone();
    let started = Instant::now();
    let texts = tokio::task::spawn_blocking(move || engine.predict(&body))
        .await
        .map_err(|e| AppError::Internal(format!("Prediction task failed: {}", e)))?
        .map_err(|e| match e {
            PredictError::Decode(_) => AppError::Validation(e.to_string()),
            PredictError::Unavailable => AppError::Unavailable(e.to_string()),
            PredictError::Processing(_) => AppError::Internal(e.to_string()),
        })?;
    let elapsed_ms = started.elapsed().as_millis() as u64;

    tracing::info!("OCR recognized {} lines in {} ms", texts.len(), elapsed_ms);

    Ok(Json(json!({
        "texts": texts,
        "elapsed_ms": elapsed_ms,
    })))
}
