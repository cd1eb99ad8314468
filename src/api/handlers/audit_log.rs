use axum::{extract::{Query, State}, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::api::AppState;
use crate::api::middleware::api_key::ApiKeyAuth;
use crate::error::AppResult;

#[derive(Deserialize)]
pub struct AuditLogParams {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub client_ip: Option<String>,
    pub success: Option<bool>,
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    _auth: ApiKeyAuth,
    Query(params): Query<AuditLogParams>,
) -> AppResult<Json<Value>> {
    let page = params.page.unwrap_or(1).max(1);
    let per_page = params.per_page.unwrap_or(50).clamp(1, 200);
    let offset = (page - 1) * per_page;

    let mut conditions: Vec<&str> = Vec::new();
    if params.client_ip.is_some() {
        conditions.push("client_ip = ?");
    }
    if params.success.is_some() {
        conditions.push("success = ?");
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    let count_sql = format!("SELECT COUNT(*) FROM audit_log {}", where_clause);
    let mut count_query = sqlx::query_as::<_, (i64,)>(&count_sql);
    if let Some(ref v) = params.client_ip { count_query = count_query.bind(v); }
    if let Some(v) = params.success { count_query = count_query.bind(v); }
    let (total,) = count_query.fetch_one(&state.db).await?;

    let data_sql = format!(
        "SELECT id, time, client_ip, method, path, key_hash_prefix, success, user_agent \
         FROM audit_log {} ORDER BY time DESC, id DESC LIMIT ? OFFSET ?",
        where_clause
    );
    let mut data_query =
        sqlx::query_as::<_, (i64, String, String, String, String, String, bool, Option<String>)>(&data_sql);
    if let Some(ref v) = params.client_ip { data_query = data_query.bind(v); }
    if let Some(v) = params.success { data_query = data_query.bind(v); }
    data_query = data_query.bind(per_page).bind(offset);
    let rows = data_query.fetch_all(&state.db).await?;

    let data: Vec<Value> = rows
        .into_iter()
        .map(|(id, time, client_ip, method, path, key_hash_prefix, success, user_agent)| {
            json!({
                "id": id,
                "time": time,
                "client_ip": client_ip,
                "method": method,
                "path": path,
                "key_hash_prefix": key_hash_prefix,
                "success": success,
                "user_agent": user_agent,
            })
        })
        .collect();

    Ok(Json(json!({
        "data": data,
        "total": total,
        "page": page,
        "per_page": per_page,
    })))
}
