use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, OwnedMutexGuard};
use crate::db::models::WhitelistEntry;
use crate::error::GateError;
use super::matcher;
use super::store::WhitelistStore;

#[derive(Debug, Clone, Serialize)]
pub struct CachedEntry {
    pub description: Option<String>,
    pub is_active: bool,
}

type EntryMap = Arc<HashMap<String, CachedEntry>>;

#[derive(Default)]
struct CacheState {
    /// Swapped as a whole on refresh; readers hold an `Arc` to one version.
    entries: EntryMap,
    last_refresh: Option<DateTime<Utc>>,
    refreshed_at: Option<Instant>,
    last_refresh_failed: bool,
    refresh_count: u64,
    failed_refreshes: u64,
}

impl CacheState {
    fn is_valid(&self, ttl: Duration) -> bool {
        self.refreshed_at.is_some_and(|at| at.elapsed() < ttl)
    }

    fn replace(&mut self, rows: Vec<WhitelistEntry>) {
        let entries: HashMap<String, CachedEntry> = rows
            .into_iter()
            .filter(|row| row.is_active)
            .map(|row| {
                (row.address_spec, CachedEntry {
                    description: row.description,
                    is_active: row.is_active,
                })
            })
            .collect();

        self.entries = Arc::new(entries);
        self.last_refresh = Some(Utc::now());
        self.refreshed_at = Some(Instant::now());
        self.last_refresh_failed = false;
        self.refresh_count += 1;
    }

    fn mark_failed(&mut self) {
        self.last_refresh_failed = true;
        self.failed_refreshes += 1;
    }
}

/// Read-only diagnostic snapshot of the cache.
#[derive(Debug, Clone, Serialize)]
pub struct CacheInfo {
    pub cache_size: usize,
    pub last_refresh: Option<DateTime<Utc>>,
    pub is_valid: bool,
    pub ttl_seconds: u64,
    pub refresh_count: u64,
    pub failed_refreshes: u64,
    pub last_refresh_failed: bool,
}

/// In-memory projection of the active whitelist rows.
///
/// One instance per process, constructed at startup and shared through
/// `Arc`. Every path that checks staleness, reads the store and swaps the
/// map runs under the same mutex, so stale readers queued behind a refresh
/// see its result instead of refreshing again.
pub struct WhitelistCache {
    state: Arc<Mutex<CacheState>>,
    ttl: Duration,
    refresh_timeout: Duration,
}

impl WhitelistCache {
    pub fn new(ttl: Duration, refresh_timeout: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(CacheState::default())),
            ttl,
            refresh_timeout,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Replace the whole map with `active_entries`. Inactive rows are dropped.
    pub async fn refresh(&self, active_entries: Vec<WhitelistEntry>) {
        let mut state = self.state.lock().await;
        state.replace(active_entries);
        tracing::info!("IP whitelist cache updated: {} active entries", state.entries.len());
    }

    /// Reload from `store.list_active()` regardless of TTL.
    pub async fn refresh_from_store(&self, store: &WhitelistStore) -> Result<usize, GateError> {
        let guard = self.state.clone().lock_owned().await;
        let entries = self.refresh_locked(guard, store).await?;
        Ok(entries.len())
    }

    /// Force the next read to go back to the store.
    pub async fn invalidate(&self) {
        let mut state = self.state.lock().await;
        state.refreshed_at = None;
    }

    /// Whitelist decision for `candidate_ip`, refreshing first when the
    /// cache is empty or stale. A failed refresh denies this call and leaves
    /// the previous entries in place for the next attempt.
    pub async fn is_allowed(&self, candidate_ip: &str, store: &WhitelistStore) -> bool {
        let guard = self.state.clone().lock_owned().await;

        let entries = if guard.is_valid(self.ttl) {
            let entries = guard.entries.clone();
            drop(guard);
            entries
        } else {
            match self.refresh_locked(guard, store).await {
                Ok(entries) => entries,
                Err(e) => {
                    tracing::error!("IP whitelist cache refresh failed, denying {}: {}", candidate_ip, e);
                    return false;
                }
            }
        };

        matcher::is_member(candidate_ip, entries.keys().map(String::as_str))
    }

    pub async fn info(&self) -> CacheInfo {
        let state = self.state.lock().await;
        CacheInfo {
            cache_size: state.entries.len(),
            last_refresh: state.last_refresh,
            is_valid: state.is_valid(self.ttl),
            ttl_seconds: self.ttl.as_secs(),
            refresh_count: state.refresh_count,
            failed_refreshes: state.failed_refreshes,
            last_refresh_failed: state.last_refresh_failed,
        }
    }

    /// Store read and swap run in a spawned task that owns the lock guard,
    /// so a caller dropping its future cannot abandon a half-done refresh.
    async fn refresh_locked(
        &self,
        guard: OwnedMutexGuard<CacheState>,
        store: &WhitelistStore,
    ) -> Result<EntryMap, GateError> {
        let store = store.clone();
        let timeout = self.refresh_timeout;

        let task = tokio::spawn(async move {
            let mut state = guard;
            let loaded = match tokio::time::timeout(timeout, store.list_active()).await {
                Ok(Ok(rows)) => Ok(rows),
                Ok(Err(e)) => Err(GateError::RefreshFailure(e.to_string())),
                Err(_) => Err(GateError::RefreshFailure(format!(
                    "store read timed out after {} ms",
                    timeout.as_millis()
                ))),
            };

            match loaded {
                Ok(rows) => {
                    state.replace(rows);
                    tracing::info!("IP whitelist cache updated: {} active entries", state.entries.len());
                    Ok(state.entries.clone())
                }
                Err(e) => {
                    state.mark_failed();
                    Err(e)
                }
            }
        });

        task.await
            .map_err(|e| GateError::RefreshFailure(format!("refresh task failed: {}", e)))?
    }
}
