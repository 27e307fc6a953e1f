//! Two-tier response cache: a short-lived fresh entry answered directly,
//! and a longer-lived stale entry consulted only when the upstream fails.

use crate::clock::Clock;
use crate::types::{QueryParams, TrendResponse};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Bumped whenever the cached payload shape changes, so entries written by
/// an older build are never confused with the current format.
pub const CACHE_SCHEMA_VERSION: &str = "v4";

/// Identity of one logical query for caching purposes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    key: String,
}

impl Fingerprint {
    pub fn new(params: &QueryParams) -> Self {
        let key = format!(
            "trend:{}:{}:{}:{}:{}",
            CACHE_SCHEMA_VERSION,
            params.keyword_key(),
            params.country(),
            params.window_days(),
            params.baseline_days(),
        );
        Self { key }
    }

    pub fn fresh_key(&self) -> &str {
        &self.key
    }

    pub fn stale_key(&self) -> String {
        format!("{}:stale", self.key)
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.key)
    }
}

/// A backend failure. Backends map their native errors into this; the
/// [`ResponseCache`] layer guarantees it never escapes to the engine.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct CacheBackendError(pub String);

/// Minimal key/value surface the cache needs from a backend.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheBackendError>;
    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64)
        -> Result<(), CacheBackendError>;
    /// Remaining lifetime in seconds, `None` when the key is absent.
    async fn ttl(&self, key: &str) -> Result<Option<i64>, CacheBackendError>;
    async fn delete(&self, key: &str) -> Result<(), CacheBackendError>;
}

/// Wrapper stored under the stale key, carrying its wall-clock write time.
#[derive(Debug, Serialize, Deserialize)]
struct StaleEnvelope {
    data: TrendResponse,
    cached_at: DateTime<Utc>,
}

/// A stale read, annotated with its age.
#[derive(Debug)]
pub struct StaleHit {
    pub response: TrendResponse,
    pub cached_at: DateTime<Utc>,
    pub age_seconds: i64,
}

/// The engine-facing cache.
///
/// Every operation is infallible at the call site: backend failures are
/// logged and degrade to a miss (reads) or a no-op (writes). A broken cache
/// slows the service down; it must never fail a request.
#[derive(Clone)]
pub struct ResponseCache {
    store: Arc<dyn CacheStore>,
    clock: Arc<dyn Clock>,
    fresh_ttl_secs: u64,
    stale_ttl_secs: u64,
}

impl ResponseCache {
    pub fn new(
        store: Arc<dyn CacheStore>,
        clock: Arc<dyn Clock>,
        fresh_ttl_secs: u64,
        stale_ttl_secs: u64,
    ) -> Self {
        Self { store, clock, fresh_ttl_secs, stale_ttl_secs }
    }

    pub fn fresh_ttl_secs(&self) -> u64 {
        self.fresh_ttl_secs
    }

    pub async fn get_fresh(&self, fingerprint: &Fingerprint) -> Option<TrendResponse> {
        let raw = match self.store.get(fingerprint.fresh_key()).await {
            Ok(raw) => raw?,
            Err(err) => {
                tracing::warn!(key = %fingerprint, error = %err, "cache read failed, treating as miss");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(response) => Some(response),
            Err(err) => {
                tracing::warn!(key = %fingerprint, error = %err, "cached payload unreadable, treating as miss");
                None
            }
        }
    }

    pub async fn get_stale(&self, fingerprint: &Fingerprint) -> Option<StaleHit> {
        let stale_key = fingerprint.stale_key();
        let raw = match self.store.get(&stale_key).await {
            Ok(raw) => raw?,
            Err(err) => {
                tracing::warn!(key = %stale_key, error = %err, "stale cache read failed, treating as miss");
                return None;
            }
        };
        let envelope: StaleEnvelope = match serde_json::from_str(&raw) {
            Ok(envelope) => envelope,
            Err(err) => {
                tracing::warn!(key = %stale_key, error = %err, "stale payload unreadable, treating as miss");
                return None;
            }
        };
        let age_seconds = (self.clock.now() - envelope.cached_at).num_seconds().max(0);
        Some(StaleHit { response: envelope.data, cached_at: envelope.cached_at, age_seconds })
    }

    /// Write both tiers. Failures are logged; the response already exists
    /// and the request must still succeed.
    pub async fn set(&self, fingerprint: &Fingerprint, response: &TrendResponse) {
        let fresh_json = match serde_json::to_string(response) {
            Ok(json) => json,
            Err(err) => {
                tracing::error!(key = %fingerprint, error = %err, "response not serializable, skipping cache write");
                return;
            }
        };
        if let Err(err) =
            self.store.set_ex(fingerprint.fresh_key(), &fresh_json, self.fresh_ttl_secs).await
        {
            tracing::warn!(key = %fingerprint, error = %err, "fresh cache write failed");
        }

        let envelope =
            StaleEnvelope { data: response.clone(), cached_at: self.clock.now() };
        match serde_json::to_string(&envelope) {
            Ok(stale_json) => {
                if let Err(err) = self
                    .store
                    .set_ex(&fingerprint.stale_key(), &stale_json, self.stale_ttl_secs)
                    .await
                {
                    tracing::warn!(key = %fingerprint, error = %err, "stale cache write failed");
                }
            }
            Err(err) => {
                tracing::error!(key = %fingerprint, error = %err, "stale envelope not serializable");
            }
        }
    }

    /// Remaining lifetime of the fresh entry, or −1 when absent.
    pub async fn ttl(&self, fingerprint: &Fingerprint) -> i64 {
        match self.store.ttl(fingerprint.fresh_key()).await {
            Ok(Some(secs)) if secs >= 0 => secs,
            Ok(_) => -1,
            Err(err) => {
                tracing::warn!(key = %fingerprint, error = %err, "cache ttl lookup failed");
                -1
            }
        }
    }

    /// Drop the fresh entry only; the stale entry keeps covering outages.
    pub async fn delete(&self, fingerprint: &Fingerprint) {
        if let Err(err) = self.store.delete(fingerprint.fresh_key()).await {
            tracing::warn!(key = %fingerprint, error = %err, "cache delete failed");
        }
    }
}

/// In-process [`CacheStore`] with clock-driven expiry.
///
/// Serves tests and single-node deployments; multi-process deployments use
/// the Redis backend.
#[derive(Debug)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, MemoryEntry>>,
    clock: Arc<dyn Clock>,
}

#[derive(Debug, Clone)]
struct MemoryEntry {
    value: String,
    expires_at: DateTime<Utc>,
}

impl MemoryStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { entries: Mutex::new(HashMap::new()), clock }
    }

    fn live_entry(&self, key: &str) -> Option<MemoryEntry> {
        let now = self.clock.now();
        let mut entries = self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        match entries.get(key) {
            Some(entry) if entry.expires_at > now => Some(entry.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheBackendError> {
        Ok(self.live_entry(key).map(|entry| entry.value))
    }

    async fn set_ex(
        &self,
        key: &str,
        value: &str,
        ttl_secs: u64,
    ) -> Result<(), CacheBackendError> {
        let expires_at = self.clock.now() + chrono::Duration::seconds(ttl_secs as i64);
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(key.to_string(), MemoryEntry { value: value.to_string(), expires_at });
        Ok(())
    }

    async fn ttl(&self, key: &str) -> Result<Option<i64>, CacheBackendError> {
        let now = self.clock.now();
        Ok(self.live_entry(key).map(|entry| (entry.expires_at - now).num_seconds()))
    }

    async fn delete(&self, key: &str) -> Result<(), CacheBackendError> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).remove(key);
        Ok(())
    }
}
