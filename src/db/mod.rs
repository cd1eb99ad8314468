use anyhow::Result;
use chrono::Utc;
use sqlx::SqlitePool;
use crate::auth::api_key;
use crate::config::Config;
use std::str::FromStr;

pub mod models;
pub mod audit;

pub type DbPool = SqlitePool;

pub async fn init(cfg: &Config) -> Result<DbPool> {
    let db_url = format!("sqlite://{}?mode=rwc", cfg.database.path);

    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(20)
        .connect_with(
            sqlx::sqlite::SqliteConnectOptions::from_str(&db_url)?
                .create_if_missing(true)
        )
        .await?;

    migrate(&pool).await?;

    sqlx::query("PRAGMA journal_mode=WAL")
        .execute(&pool)
        .await?;

    sqlx::query("PRAGMA synchronous=NORMAL")
        .execute(&pool)
        .await?;

    tracing::info!("Database connected: {}", cfg.database.path);
    Ok(pool)
}

/// Apply the embedded schema migrations.
pub async fn migrate(pool: &DbPool) -> Result<()> {
    sqlx::migrate!("./src/db/migrations").run(pool).await?;
    Ok(())
}

/// Insert the configured bootstrap API key if no keys exist yet.
pub async fn seed_api_key(pool: &DbPool, cfg: &Config) -> Result<()> {
    let Some(key) = cfg.auth.bootstrap_api_key.as_deref() else {
        return Ok(());
    };

    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM api_keys")
        .fetch_one(pool)
        .await?;

    if count.0 == 0 {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO api_keys (key_hash, description, is_active, expires_at, created_at, updated_at)
             VALUES (?, 'bootstrap', 1, NULL, ?, ?)"
        )
        .bind(api_key::hash_key(key))
        .bind(&now)
        .bind(&now)
        .execute(pool)
        .await?;

        tracing::warn!("Inserted bootstrap API key from configuration; rotate it once real keys are issued");
    }

    Ok(())
}
