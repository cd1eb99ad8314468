use std::sync::Arc;
use crate::db::models::{UpsertOutcome, WhitelistEntry};
use crate::error::GateError;
use super::cache::{CacheInfo, WhitelistCache};
use super::store::WhitelistStore;

/// The only write path into the whitelist table.
///
/// After each successful mutation the cache is reloaded from the store. If
/// that reload fails the cache is invalidated instead, so the next read goes
/// back to the store rather than answering from the pre-write state.
#[derive(Clone)]
pub struct WhitelistService {
    store: WhitelistStore,
    cache: Arc<WhitelistCache>,
}

impl WhitelistService {
    pub fn new(store: WhitelistStore, cache: Arc<WhitelistCache>) -> Self {
        Self { store, cache }
    }

    pub fn store(&self) -> &WhitelistStore {
        &self.store
    }

    pub fn cache(&self) -> &Arc<WhitelistCache> {
        &self.cache
    }

    pub async fn add(
        &self,
        address_spec: &str,
        description: Option<&str>,
        created_by: &str,
    ) -> Result<UpsertOutcome, GateError> {
        let outcome = self
            .store
            .upsert_active(address_spec, description, created_by)
            .await
            .inspect_err(|e| tracing::warn!("Whitelist add of {} rejected: {}", address_spec, e))?;

        match outcome {
            UpsertOutcome::Inserted => tracing::info!("IP {} added to whitelist by {}", address_spec.trim(), created_by),
            UpsertOutcome::Reactivated => tracing::info!("IP {} reactivated by {}", address_spec.trim(), created_by),
        }

        self.sync_cache().await;
        Ok(outcome)
    }

    pub async fn remove(&self, address_spec: &str) -> Result<(), GateError> {
        self.store
            .deactivate(address_spec)
            .await
            .inspect_err(|e| tracing::warn!("Whitelist removal of {} rejected: {}", address_spec, e))?;

        tracing::info!("IP {} removed from whitelist", address_spec.trim());
        self.sync_cache().await;
        Ok(())
    }

    pub async fn update_description(
        &self,
        address_spec: &str,
        description: Option<&str>,
    ) -> Result<(), GateError> {
        self.store
            .update_description(address_spec, description)
            .await
            .inspect_err(|e| tracing::warn!("Description update of {} rejected: {}", address_spec, e))?;

        tracing::info!("IP {} description updated", address_spec.trim());
        // Descriptions do not affect matching, but cache snapshots show them.
        self.sync_cache().await;
        Ok(())
    }

    /// Administrative reload that ignores the TTL.
    pub async fn refresh_cache(&self) -> Result<usize, GateError> {
        let size = self.cache.refresh_from_store(&self.store).await?;
        tracing::info!("IP whitelist cache refreshed manually");
        Ok(size)
    }

    pub async fn list(&self) -> Result<Vec<WhitelistEntry>, GateError> {
        self.store.list_all().await
    }

    pub async fn cache_info(&self) -> CacheInfo {
        self.cache.info().await
    }

    /// Insert `specs` when the table has never held a row.
    pub async fn seed_defaults(&self, specs: &[String]) -> Result<usize, GateError> {
        if !self.store.list_all().await?.is_empty() {
            return Ok(0);
        }

        let mut added = 0;
        for spec in specs {
            match self.add(spec, Some("default entry"), "system").await {
                Ok(_) => added += 1,
                Err(GateError::Storage(e)) => return Err(GateError::Storage(e)),
                Err(e) => tracing::warn!("Skipping seed entry {}: {}", spec, e),
            }
        }
        tracing::info!("Seeded {} default whitelist entries", added);
        Ok(added)
    }

    async fn sync_cache(&self) {
        if let Err(e) = self.cache.refresh_from_store(&self.store).await {
            tracing::error!("Cache refresh after whitelist write failed, invalidating: {}", e);
            self.cache.invalidate().await;
        }
    }
}
