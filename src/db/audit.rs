use chrono::Utc;
use crate::db::DbPool;

/// One access attempt against a gated route. Holds only a short hash
/// prefix of the presented credential, never the credential itself.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub client_ip: String,
    pub method: String,
    pub path: String,
    pub key_hash_prefix: String,
    pub success: bool,
    pub user_agent: Option<String>,
}

/// Write an audit row. Callers log failures; an audit outage must not
/// change the access decision.
pub async fn record(db: &DbPool, entry: &AuditEntry) -> Result<(), sqlx::Error> {
    let now = Utc::now().to_rfc3339();

    sqlx::query(
        "INSERT INTO audit_log (time, client_ip, method, path, key_hash_prefix, success, user_agent)
         VALUES (?, ?, ?, ?, ?, ?, ?)"
    )
    .bind(&now)
    .bind(&entry.client_ip)
    .bind(&entry.method)
    .bind(&entry.path)
    .bind(&entry.key_hash_prefix)
    .bind(entry.success)
    .bind(entry.user_agent.as_deref())
    .execute(db)
    .await?;

    Ok(())
}
