use axum::{extract::State, http::header, response::IntoResponse};
use std::sync::Arc;
use crate::api::AppState;

pub async fn prometheus_metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let cache = state.whitelist.cache_info().await;
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.to_prometheus_text(&cache),
    )
}
