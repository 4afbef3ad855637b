//! Memoization of completion calls, keyed by a fingerprint of their inputs.
//!
//! Entries live at `{cache_dir}/{sha256-hex}.json` (see [`CacheKey`]). An
//! entry is written once, after the first well-formed completion for its key,
//! and is never rewritten. Failed or malformed completions are not stored.
//! There is no TTL; entries stay until [`ResponseCache::clear`] or
//! [`ResponseCache::remove`].
//!
//! With per-key locking on (the default), concurrent first-time callers for
//! the same key queue on a per-key async mutex, so the completion runs once.
//! Without it, they race and the last write wins.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{CleanBitesError, Result};
use crate::store::ContentStore;

use super::CacheKey;

/// Default upper bound for a single completion call.
pub const DEFAULT_COMPUTE_TIMEOUT: Duration = Duration::from_secs(90);

/// Persistent, content-addressed response cache.
pub struct ResponseCache {
    store: ContentStore,
    /// Lazily created per-key guards. Never pruned.
    locks: DashMap<String, Arc<Mutex<()>>>,
    per_key_locking: bool,
    compute_timeout: Duration,
    counters: Counters,
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    failures: AtomicU64,
}

impl ResponseCache {
    /// Create a cache over `store` with per-key locking and the default
    /// compute timeout.
    pub fn new(store: ContentStore) -> Self {
        Self {
            store,
            locks: DashMap::new(),
            per_key_locking: true,
            compute_timeout: DEFAULT_COMPUTE_TIMEOUT,
            counters: Counters::default(),
        }
    }

    /// Set the upper bound for each completion call.
    pub fn with_compute_timeout(mut self, timeout: Duration) -> Self {
        self.compute_timeout = timeout;
        self
    }

    /// Enable or disable per-key mutual exclusion around miss handling.
    pub fn with_per_key_locking(mut self, enabled: bool) -> Self {
        self.per_key_locking = enabled;
        self
    }

    /// Return the cached value for `(prompt_text, data_text)`, or run
    /// `compute` and cache its output.
    ///
    /// `compute` yields raw completion text, which must parse as JSON. A
    /// parse failure returns [`CleanBitesError::ResponseFormat`] and nothing
    /// is cached, so a later call retries. `compute` is dropped (and thereby
    /// cancelled) if it exceeds the compute timeout.
    pub async fn get_or_compute<F, Fut>(
        &self,
        prompt_text: &str,
        data_text: &str,
        compute: F,
    ) -> Result<Value>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String>>,
    {
        let key = CacheKey::derive(prompt_text, data_text);

        if let Some(value) = self.lookup(&key)? {
            return Ok(value);
        }

        let lock = self.per_key_locking.then(|| self.lock_for(&key));
        let _guard = match &lock {
            Some(lock) => Some(lock.lock().await),
            None => None,
        };

        // Another caller may have filled the entry while we waited.
        if lock.is_some() {
            if let Some(value) = self.lookup(&key)? {
                return Ok(value);
            }
        }

        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        debug!(key = %key.short(), "Response cache miss, computing");

        match self.compute_and_store(&key, compute).await {
            Ok(value) => Ok(value),
            Err(e) => {
                self.counters.failures.fetch_add(1, Ordering::Relaxed);
                warn!(key = %key.short(), error = %e, "Completion failed, nothing cached");
                Err(e)
            }
        }
    }

    async fn compute_and_store<F, Fut>(&self, key: &CacheKey, compute: F) -> Result<Value>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String>>,
    {
        let raw = tokio::time::timeout(self.compute_timeout, compute())
            .await
            .map_err(|_| CleanBitesError::Timeout(self.compute_timeout))??;

        let value: Value = serde_json::from_str(raw.trim()).map_err(|e| {
            CleanBitesError::ResponseFormat(format!("completion is not valid JSON: {e}"))
        })?;

        self.store.put(key.as_str(), &value)?;
        info!(key = %key.short(), "Cached completion");
        Ok(value)
    }

    fn lookup(&self, key: &CacheKey) -> Result<Option<Value>> {
        let cached = self.store.get::<Value>(key.as_str())?;
        if cached.is_some() {
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
            debug!(key = %key.short(), "Response cache hit");
        }
        Ok(cached)
    }

    fn lock_for(&self, key: &CacheKey) -> Arc<Mutex<()>> {
        self.locks
            .entry(key.as_str().to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Whether a response is cached for `(prompt_text, data_text)`.
    pub fn contains(&self, prompt_text: &str, data_text: &str) -> bool {
        self.store
            .exists(CacheKey::derive(prompt_text, data_text).as_str())
    }

    /// Remove one entry. Returns `false` if it was not cached.
    pub fn remove(&self, key: &CacheKey) -> Result<bool> {
        self.store.remove(key.as_str())
    }

    /// Remove every cached response and return how many were removed.
    pub fn clear(&self) -> Result<usize> {
        let removed = self.store.clear()?;
        info!(removed, "Cleared response cache");
        Ok(removed)
    }

    /// Entry count on disk plus counters since process start.
    pub fn stats(&self) -> Result<CacheStats> {
        Ok(CacheStats {
            total_entries: self.store.len()?,
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            failures: self.counters.failures.load(Ordering::Relaxed),
        })
    }

    /// Underlying document store.
    pub fn store(&self) -> &ContentStore {
        &self.store
    }
}

/// Aggregate cache statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Entries currently on disk.
    pub total_entries: usize,
    /// Lookups answered from the cache.
    pub hits: u64,
    /// Lookups that had to run a completion.
    pub misses: u64,
    /// Completions that failed or returned non-JSON.
    pub failures: u64,
}
