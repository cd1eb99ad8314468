use anyhow::Result;
use axum::Router;
use axum::http::{HeaderName, HeaderValue, Method, header};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use std::sync::Arc;
use std::net::SocketAddr;
use crate::auth::AuthorizationGate;
use crate::config::Config;
use crate::db::DbPool;
use crate::metrics::GateMetrics;
use crate::ocr::PredictionEngine;
use crate::whitelist::WhitelistService;

pub mod router;
pub mod middleware;
pub mod handlers;

pub struct AppState {
    pub db: DbPool,
    pub whitelist: WhitelistService,
    pub gate: Arc<AuthorizationGate>,
    pub metrics: Arc<GateMetrics>,
    pub engine: Arc<dyn PredictionEngine>,
    pub trust_forwarded_for: bool,
    pub max_upload_bytes: usize,
}

pub async fn serve(
    cfg: Config,
    db: DbPool,
    whitelist: WhitelistService,
    gate: Arc<AuthorizationGate>,
    metrics: Arc<GateMetrics>,
    engine: Arc<dyn PredictionEngine>,
) -> Result<()> {
    let bind_addr = format!("{}:{}", cfg.api.bind, cfg.api.port);
    let state = Arc::new(AppState {
        db,
        whitelist,
        gate,
        metrics,
        engine,
        trust_forwarded_for: cfg.api.trust_forwarded_for,
        max_upload_bytes: cfg.ocr.max_upload_bytes,
    });
    let cors = build_cors_layer(&cfg.api.cors_allowed_origins);
    let app = build_app(state, cors);

    // ConnectInfo carries the TCP peer address used when no forwarded header is trusted.
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("API listening on http://{}", bind_addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    ).await?;
    Ok(())
}

fn build_cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();

    if origins.is_empty() {
        tracing::warn!("No valid CORS origins configured; CORS will block all cross-origin requests");
        return CorsLayer::new();
    }

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            HeaderName::from_static(middleware::api_key::API_KEY_HEADER),
            header::CONTENT_TYPE,
        ])
}

pub fn build_app(state: Arc<AppState>, cors: CorsLayer) -> Router {
    Router::new()
        .merge(router::routes(state))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
