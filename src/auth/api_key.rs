use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{TimeDelta, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};
use crate::db::models::ApiKeyRecord;
use crate::db::DbPool;
use crate::error::GateError;

/// Number of hex characters of the key hash written to the audit log.
const AUDIT_PREFIX_LEN: usize = 8;

/// 32 random bytes, base64url without padding.
pub fn generate() -> String {
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// SHA-256 of the key, lowercase hex. Only this is ever stored.
pub fn hash_key(key: &str) -> String {
    hex::encode(Sha256::digest(key.as_bytes()))
}

/// Short, non-reversible tag of a presented key for audit rows.
pub fn hash_prefix(key: &str) -> String {
    let mut hash = hash_key(key);
    hash.truncate(AUDIT_PREFIX_LEN);
    hash
}

/// Read side of the `api_keys` table.
#[derive(Clone)]
pub struct CredentialStore {
    db: DbPool,
}

impl CredentialStore {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    pub async fn find(&self, key: &str) -> Result<Option<ApiKeyRecord>, sqlx::Error> {
        sqlx::query_as::<_, ApiKeyRecord>(
            "SELECT id, key_hash, description, is_active, expires_at, created_at, updated_at
             FROM api_keys WHERE key_hash = ?"
        )
        .bind(hash_key(key))
        .fetch_optional(&self.db)
        .await
    }

    /// True when the key exists, is active and has not expired.
    pub async fn validate(&self, key: &str) -> Result<bool, sqlx::Error> {
        if key.is_empty() {
            return Ok(false);
        }
        Ok(self
            .find(key)
            .await?
            .is_some_and(|record| record.is_valid_at(Utc::now())))
    }

    /// Create a new active key. The plaintext is returned once and not kept.
    pub async fn issue(
        &self,
        description: Option<&str>,
        valid_days: Option<i64>,
    ) -> Result<(String, ApiKeyRecord), GateError> {
        let now = Utc::now();
        let expires_at = match valid_days {
            Some(days) => Some(
                TimeDelta::try_days(days)
                    .and_then(|delta| now.checked_add_signed(delta))
                    .ok_or(GateError::InvalidExpiry(days))?,
            ),
            None => None,
        };
        let key = generate();

        let record = sqlx::query_as::<_, ApiKeyRecord>(
            "INSERT INTO api_keys (key_hash, description, is_active, expires_at, created_at, updated_at)
             VALUES (?, ?, 1, ?, ?, ?)
             RETURNING id, key_hash, description, is_active, expires_at, created_at, updated_at"
        )
        .bind(hash_key(&key))
        .bind(description)
        .bind(expires_at.map(|t| t.to_rfc3339()))
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .fetch_one(&self.db)
        .await?;

        tracing::info!("Issued API key id={} expires_at={:?}", record.id, record.expires_at);
        Ok((key, record))
    }

    /// Deactivate a key by id. Returns false if no active key had that id.
    pub async fn revoke(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE api_keys SET is_active = 0, updated_at = ? WHERE id = ? AND is_active = 1"
        )
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() > 0 {
            tracing::info!("Revoked API key id={}", id);
        }
        Ok(result.rows_affected() > 0)
    }
}
