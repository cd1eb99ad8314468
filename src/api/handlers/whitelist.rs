use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use crate::api::AppState;
use crate::api::middleware::api_key::ApiKeyAuth;
use crate::db::models::UpsertOutcome;
use crate::error::AppResult;
use crate::whitelist::CacheInfo;

#[derive(Deserialize)]
pub struct AddRequest {
    ip_address: String,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateRequest {
    #[serde(default)]
    description: Option<String>,
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    _auth: ApiKeyAuth,
) -> AppResult<Json<Value>> {
    let entries = state.whitelist.list().await?;
    let total = entries.len();
    Ok(Json(json!({ "data": entries, "total": total })))
}

pub async fn add(
    State(state): State<Arc<AppState>>,
    _auth: ApiKeyAuth,
    Json(body): Json<AddRequest>,
) -> AppResult<Json<Value>> {
    let outcome = state
        .whitelist
        .add(&body.ip_address, body.description.as_deref(), "api")
        .await?;

    let message = match outcome {
        UpsertOutcome::Inserted => format!("IP {} added to whitelist", body.ip_address.trim()),
        UpsertOutcome::Reactivated => format!("IP {} reactivated", body.ip_address.trim()),
    };

    Ok(Json(json!({
        "success": true,
        "outcome": outcome,
        "message": message,
    })))
}

pub async fn remove(
    State(state): State<Arc<AppState>>,
    _auth: ApiKeyAuth,
    Path(spec): Path<String>,
) -> AppResult<Json<Value>> {
    state.whitelist.remove(&spec).await?;

    Ok(Json(json!({
        "success": true,
        "message": format!("IP {} removed from whitelist", spec),
    })))
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    _auth: ApiKeyAuth,
    Path(spec): Path<String>,
    Json(body): Json<UpdateRequest>,
) -> AppResult<Json<Value>> {
    state
        .whitelist
        .update_description(&spec, body.description.as_deref())
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": format!("IP {} description updated", spec),
    })))
}

pub async fn refresh_cache(
    State(state): State<Arc<AppState>>,
    _auth: ApiKeyAuth,
) -> AppResult<Json<Value>> {
    let size = state.whitelist.refresh_cache().await?;
    Ok(Json(json!({ "success": true, "cache_size": size })))
}

pub async fn cache_info(
    State(state): State<Arc<AppState>>,
    _auth: ApiKeyAuth,
) -> AppResult<Json<CacheInfo>> {
    Ok(Json(state.whitelist.cache_info().await))
}
