use chrono::Utc;
use crate::db::models::{UpsertOutcome, WhitelistEntry};
use crate::db::DbPool;
use crate::error::GateError;
use super::matcher;

/// Durable CRUD over `ip_whitelist`. Knows nothing about caching.
///
/// Mutations are crate-private: `WhitelistService` is the only writer, so
/// every successful write has exactly one place that syncs the cache.
#[derive(Clone)]
pub struct WhitelistStore {
    db: DbPool,
}

impl WhitelistStore {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    pub fn pool(&self) -> &DbPool {
        &self.db
    }

    pub async fn list_all(&self) -> Result<Vec<WhitelistEntry>, GateError> {
        let rows = sqlx::query_as::<_, WhitelistEntry>(
            "SELECT id, address_spec, description, is_active, created_at, updated_at, created_by
             FROM ip_whitelist"
        )
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    pub async fn list_active(&self) -> Result<Vec<WhitelistEntry>, GateError> {
        let rows = sqlx::query_as::<_, WhitelistEntry>(
            "SELECT id, address_spec, description, is_active, created_at, updated_at, created_by
             FROM ip_whitelist WHERE is_active = 1"
        )
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    /// Insert `address_spec` as active, or reactivate its inactive row.
    ///
    /// The spec is stored in canonical form, so textual variants of the same
    /// address or network share one row. A single `INSERT .. ON CONFLICT`
    /// statement takes the write lock up front; concurrent adds of the same
    /// spec serialize on it instead of failing with a busy error.
    pub(crate) async fn upsert_active(
        &self,
        address_spec: &str,
        description: Option<&str>,
        created_by: &str,
    ) -> Result<UpsertOutcome, GateError> {
        let spec = matcher::canonicalize(address_spec)
            .ok_or_else(|| GateError::InvalidSpec(address_spec.trim().to_string()))?;

        let now = Utc::now().to_rfc3339();

        // No row back means the spec exists and is already active.
        let inserted: Option<(bool,)> = sqlx::query_as(
            "INSERT INTO ip_whitelist (address_spec, description, is_active, created_at, updated_at, created_by)
             VALUES (?, ?, 1, ?, ?, ?)
             ON CONFLICT(address_spec) DO UPDATE
                 SET is_active = 1, description = excluded.description, updated_at = excluded.updated_at
                 WHERE ip_whitelist.is_active = 0
             RETURNING created_at = updated_at"
        )
        .bind(&spec)
        .bind(description)
        .bind(&now)
        .bind(&now)
        .bind(created_by)
        .fetch_optional(&self.db)
        .await?;

        match inserted {
            Some((true,)) => Ok(UpsertOutcome::Inserted),
            Some((false,)) => Ok(UpsertOutcome::Reactivated),
            None => Err(GateError::AlreadyActive(spec)),
        }
    }

    pub(crate) async fn deactivate(&self, address_spec: &str) -> Result<(), GateError> {
        let spec = lookup_key(address_spec);
        let result = sqlx::query(
            "UPDATE ip_whitelist SET is_active = 0, updated_at = ?
             WHERE address_spec = ? AND is_active = 1"
        )
        .bind(Utc::now().to_rfc3339())
        .bind(&spec)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(GateError::NotFound(spec));
        }
        Ok(())
    }

    pub(crate) async fn update_description(
        &self,
        address_spec: &str,
        description: Option<&str>,
    ) -> Result<(), GateError> {
        let spec = lookup_key(address_spec);
        let result = sqlx::query(
            "UPDATE ip_whitelist SET description = ?, updated_at = ? WHERE address_spec = ?"
        )
        .bind(description)
        .bind(Utc::now().to_rfc3339())
        .bind(&spec)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(GateError::NotFound(spec));
        }
        Ok(())
    }
}

/// Stored rows are canonical; an unparsable spec can only match nothing.
fn lookup_key(address_spec: &str) -> String {
    matcher::canonicalize(address_spec).unwrap_or_else(|| address_spec.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::EntryState;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn store() -> WhitelistStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to create in-memory SQLite pool");
        crate::db::migrate(&pool).await.expect("Migration failed");
        WhitelistStore::new(pool)
    }

    #[tokio::test]
    async fn test_insert_then_duplicate_is_already_active() {
        let store = store().await;
        let first = store.upsert_active("203.0.113.5", Some("office"), "cli").await.unwrap();
        assert_eq!(first, UpsertOutcome::Inserted);

        let second = store.upsert_active("203.0.113.5", Some("office"), "cli").await;
        assert!(matches!(second, Err(GateError::AlreadyActive(_))));
        assert_eq!(store.list_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_spec_never_touches_storage() {
        let store = store().await;
        let result = store.upsert_active("not-an-ip", None, "api").await;
        assert!(matches!(result, Err(GateError::InvalidSpec(_))));
        assert!(store.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_deactivate_keeps_row_and_reactivation_reuses_it() {
        let store = store().await;
        store.upsert_active("10.0.0.0/24", Some("lab"), "cli").await.unwrap();
        store.deactivate("10.0.0.0/24").await.unwrap();

        let rows = store.list_all().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].state(), EntryState::Inactive);
        assert!(store.list_active().await.unwrap().is_empty());

        let outcome = store.upsert_active("10.0.0.0/24", Some("lab v2"), "api").await.unwrap();
        assert_eq!(outcome, UpsertOutcome::Reactivated);

        let rows = store.list_all().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].is_active);
        assert_eq!(rows[0].description.as_deref(), Some("lab v2"));
        // provenance belongs to the original insert
        assert_eq!(rows[0].created_by.as_deref(), Some("cli"));
    }

    #[tokio::test]
    async fn test_deactivate_missing_or_inactive_is_not_found() {
        let store = store().await;
        assert!(matches!(store.deactivate("198.51.100.9").await, Err(GateError::NotFound(_))));

        store.upsert_active("198.51.100.9", None, "cli").await.unwrap();
        store.deactivate("198.51.100.9").await.unwrap();
        assert!(matches!(store.deactivate("198.51.100.9").await, Err(GateError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_update_description_ignores_active_state() {
        let store = store().await;
        store.upsert_active("192.0.2.1", None, "cli").await.unwrap();
        store.deactivate("192.0.2.1").await.unwrap();
        store.update_description("192.0.2.1", Some("retired")).await.unwrap();

        let rows = store.list_all().await.unwrap();
        assert_eq!(rows[0].description.as_deref(), Some("retired"));
        assert!(!rows[0].is_active);

        let missing = store.update_description("192.0.2.2", Some("x")).await;
        assert!(matches!(missing, Err(GateError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_textual_variants_share_one_row() {
        let store = store().await;
        store.upsert_active("2001:DB8::1", None, "cli").await.unwrap();

        let dup = store.upsert_active("2001:db8:0:0::1", None, "cli").await;
        assert!(matches!(dup, Err(GateError::AlreadyActive(ref s)) if s == "2001:db8::1"));

        store.upsert_active("10.0.0.5/24", None, "cli").await.unwrap();
        let dup = store.upsert_active("::ffff:10.0.0.0/120", None, "cli").await;
        assert!(matches!(dup, Err(GateError::AlreadyActive(_))));

        let specs: Vec<String> = store.list_all().await.unwrap().into_iter().map(|r| r.address_spec).collect();
        assert_eq!(specs.len(), 2);
        assert!(specs.contains(&"2001:db8::1".to_string()));
        assert!(specs.contains(&"10.0.0.0/24".to_string()));

        store.update_description("2001:0DB8::0001", Some("v6 host")).await.unwrap();
        store.deactivate("2001:DB8::1").await.unwrap();
        store.deactivate("10.0.0.0/24").await.unwrap();
        assert!(store.list_active().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_spec_is_trimmed() {
        let store = store().await;
        store.upsert_active("  127.0.0.1 ", None, "cli").await.unwrap();
        let rows = store.list_all().await.unwrap();
        assert_eq!(rows[0].address_spec, "127.0.0.1");
        store.deactivate("127.0.0.1").await.unwrap();
    }
}
