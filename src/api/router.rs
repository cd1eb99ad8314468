use axum::{extract::DefaultBodyLimit, routing::{delete, get, post, put}, Router};
use std::sync::Arc;
use super::AppState;
use super::handlers;

pub fn routes(state: Arc<AppState>) -> Router {
    let upload_limit = state.max_upload_bytes;

    Router::new()
        // Health (public)
        .route("/health", get(handlers::health::health_check))
        // Prometheus metrics (public)
        .route("/metrics", get(handlers::metrics::prometheus_metrics))
        // OCR (gated)
        .route(
            "/ocr",
            post(handlers::ocr::recognize).layer(DefaultBodyLimit::max(upload_limit)),
        )
        // Whitelist administration (gated)
        .route("/whitelist/list", get(handlers::whitelist::list))
        .route("/whitelist/add", post(handlers::whitelist::add))
        .route("/whitelist/remove/{*spec}", delete(handlers::whitelist::remove))
        .route("/whitelist/update/{*spec}", put(handlers::whitelist::update))
        .route("/whitelist/refresh-cache", post(handlers::whitelist::refresh_cache))
        .route("/whitelist/cache-info", get(handlers::whitelist::cache_info))
        // Audit log (gated)
        .route("/audit-log", get(handlers::audit_log::list))
        .with_state(state)
}
