//! In-memory fetch-through cache with per-read TTLs.
//!
//! # Design
//! Entries store JSON values and the instant they were written. Freshness is
//! decided when an entry is read, against the TTL the reader supplies, so
//! nothing runs in the background. A failing producer never writes, and two
//! concurrent misses on the same key may both hit the network.
//!
//! Every `clear` or invalidation bumps a generation counter. A fetch that
//! started before the bump still returns its value but does not store it,
//! so a read begun under one session cannot repopulate the cache after
//! the session changed.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::Result;

/// Cache keys for the client's cache-eligible reads.
pub mod keys {
    pub const DASHBOARD: &str = "dashboard";
    pub const DASHBOARD_STATS: &str = "dashboard:stats";
    pub const REPAYMENTS: &str = "repayments";
    pub const PROFILE: &str = "profile";
    pub const LOANS: &str = "loans";
    pub const LOAN_PRODUCTS: &str = "loan-products";
    pub const LOAN_APPLICATIONS: &str = "loan-applications";

    pub fn loan_product(id: u64) -> String {
        format!("{LOAN_PRODUCTS}:{id}")
    }

    pub fn loan_applications_page(page: u32) -> String {
        format!("{LOAN_APPLICATIONS}:page={page}")
    }

    pub fn loan_application(id: u64) -> String {
        format!("{LOAN_APPLICATIONS}:{id}")
    }
}

/// Default TTLs per resource.
pub mod ttl {
    use std::time::Duration;

    pub const DASHBOARD: Duration = Duration::from_secs(30);
    pub const REPAYMENTS: Duration = Duration::from_secs(30);
    pub const LOANS: Duration = Duration::from_secs(30);
    pub const LOAN_APPLICATIONS: Duration = Duration::from_secs(30);
    pub const PROFILE: Duration = Duration::from_secs(5 * 60);
    pub const LOAN_PRODUCTS: Duration = Duration::from_secs(10 * 60);
}

/// Source of "now" for freshness checks.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Reads tokio's clock, so paused-time tests move it with `time::advance`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<Instant>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Arc::new(Mutex::new(Instant::now())),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: serde_json::Value,
    stored_at: Instant,
}

pub struct ResponseCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    // Only changed while `entries` is locked.
    generation: AtomicU64,
    clock: Arc<dyn Clock>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            generation: AtomicU64::new(0),
            clock,
        }
    }

    /// Return the fresh value under `key`, or run `producer`, store its
    /// result and return it.
    ///
    /// A cached value that no longer deserializes as `T` counts as a miss.
    pub async fn fetch_through<T, F, Fut>(&self, key: &str, ttl: Duration, producer: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if let Some(value) = self.fresh(key, ttl) {
            match serde_json::from_value(value) {
                Ok(hit) => {
                    debug!(key, "cache hit");
                    return Ok(hit);
                }
                Err(e) => debug!(key, error = %e, "cached value has a different shape, refetching"),
            }
        }

        debug!(key, "cache miss");
        let generation = self.generation.load(Ordering::SeqCst);
        let value = producer().await?;
        match serde_json::to_value(&value) {
            Ok(json) => self.insert_if_current(key, json, generation),
            Err(e) => warn!(key, error = %e, "response not cacheable"),
        }
        Ok(value)
    }

    /// The stored value under `key`, regardless of age.
    pub fn peek(&self, key: &str) -> Option<serde_json::Value> {
        self.lock().get(key).map(|entry| entry.value.clone())
    }

    /// Store `value` under `key`, stamped with the current time.
    pub fn insert(&self, key: &str, value: serde_json::Value) {
        let stored_at = self.clock.now();
        self.lock()
            .insert(key.to_string(), CacheEntry { value, stored_at });
    }

    /// Remove one exact key. Returns whether it was present.
    pub fn invalidate(&self, key: &str) -> bool {
        let mut entries = self.lock();
        self.bump_generation();
        entries.remove(key).is_some()
    }

    /// Remove every key starting with `prefix`. Returns how many were removed.
    pub fn invalidate_prefix(&self, prefix: &str) -> usize {
        let mut entries = self.lock();
        self.bump_generation();
        let before = entries.len();
        entries.retain(|k, _| !k.starts_with(prefix));
        let removed = before - entries.len();
        if removed > 0 {
            debug!(prefix, removed, "cache entries invalidated");
        }
        removed
    }

    pub fn clear(&self) {
        let mut entries = self.lock();
        self.bump_generation();
        entries.clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn insert_if_current(&self, key: &str, value: serde_json::Value, generation: u64) {
        let stored_at = self.clock.now();
        let mut entries = self.lock();
        if self.generation.load(Ordering::SeqCst) != generation {
            debug!(key, "cache changed while fetching, result not stored");
            return;
        }
        entries.insert(key.to_string(), CacheEntry { value, stored_at });
    }

    fn bump_generation(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    fn fresh(&self, key: &str, ttl: Duration) -> Option<serde_json::Value> {
        let now = self.clock.now();
        self.lock()
            .get(key)
            .filter(|entry| now.saturating_duration_since(entry.stored_at) < ttl)
            .map(|entry| entry.value.clone())
    }

    // The map is never left half-updated, so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ResponseCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseCache")
            .field("entries", &self.len())
            .finish()
    }
}
