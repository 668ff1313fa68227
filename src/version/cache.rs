//! Short-lived in-memory cache for discovered versions
//!
//! Entries are keyed by repository and replaced wholesale on refresh. The lock is
//! only held while reading or writing the map, never across a network call, so
//! two concurrent misses for the same repository may both fetch.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::config::DEFAULT_CACHE_TTL_SECS;
use crate::version::types::Versions;

/// Source of the current time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub versions: Versions,
    pub fetched_at: DateTime<Utc>,
}

pub struct DiscoveryCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl DiscoveryCache {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            clock,
        }
    }

    /// Returns the cached versions if an entry exists and has not expired.
    pub fn get(&self, key: &str) -> Option<Versions> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        let entry = entries.get(key)?;

        let age = self
            .clock
            .now()
            .signed_duration_since(entry.fetched_at)
            .to_std()
            .unwrap_or_default();

        if age >= self.ttl {
            debug!("Cache entry for {} expired ({:?} old)", key, age);
            return None;
        }

        Some(entry.versions.clone())
    }

    /// Store the full version collection for `key`, replacing any previous entry.
    pub fn insert(&self, key: &str, versions: Versions) {
        let entry = CacheEntry {
            versions,
            fetched_at: self.clock.now(),
        };
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert(key.to_string(), entry);
    }

    pub fn invalidate(&self, key: &str) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.remove(key);
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

impl Default for DiscoveryCache {
    fn default() -> Self {
        Self::new(
            Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            Arc::new(SystemClock),
        )
    }
}
