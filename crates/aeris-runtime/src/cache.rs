//! Tiered response cache.
//!
//! Avoids redundant backend calls for recently-seen, semantically
//! equivalent requests. Keys are identity keys from
//! `aeris_core::normalize`; TTLs come from the capability's tier, never
//! from the caller.
//!
//! A lookup past expiry is treated as absent and the entry is evicted
//! lazily; a stale reading must never be served as fresh, because a stale
//! "good" air-quality value could mask a real hazard.
//!
//! Sharded: one lock per shard, so concurrent lookups for unrelated keys
//! do not serialize. Entries are immutable once stored; last-writer-wins
//! on racing puts is acceptable.

use aeris_core::{CacheConfig, CacheTier, Clock, TierTtls};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use parking_lot::RwLock;
use serde_json::Value as JsonValue;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

#[derive(Debug, Clone)]
struct CacheEntry {
    value: JsonValue,
    stored_at: DateTime<Utc>,
    ttl: ChronoDuration,
    tier: CacheTier,
}

impl CacheEntry {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now - self.stored_at < self.ttl
    }
}

/// Sharded key-value store with tier-driven expiry.
pub struct ResponseCache {
    shards: Vec<RwLock<HashMap<String, CacheEntry>>>,
    ttls: TierTtls,
    clock: Arc<dyn Clock>,
}

impl ResponseCache {
    /// Create a cache from config.
    pub fn new(config: &CacheConfig, clock: Arc<dyn Clock>) -> Self {
        let shard_count = config.shards.max(1);
        let shards = (0..shard_count)
            .map(|_| RwLock::new(HashMap::new()))
            .collect();

        Self {
            shards,
            ttls: config.ttls.clone(),
            clock,
        }
    }

    fn shard(&self, key: &str) -> &RwLock<HashMap<String, CacheEntry>> {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        let index = (hasher.finish() as usize) % self.shards.len();
        &self.shards[index]
    }

    /// Fetch a fresh value for the key, or absent.
    ///
    /// An expired entry is evicted here and never returned.
    pub fn get(&self, key: &str) -> Option<JsonValue> {
        let now = self.clock.now();
        let shard = self.shard(key);

        {
            let entries = shard.read();
            match entries.get(key) {
                Some(entry) if entry.is_fresh(now) => {
                    tracing::debug!(key = %key, tier = %entry.tier, "cache hit");
                    return Some(entry.value.clone());
                }
                Some(_) => {}
                None => return None,
            }
        }

        // Expired: evict lazily. Re-check freshness under the write lock in
        // case a racing put stored a newer entry.
        let mut entries = shard.write();
        if let Some(entry) = entries.get(key) {
            if entry.is_fresh(now) {
                return Some(entry.value.clone());
            }
            entries.remove(key);
        }
        None
    }

    /// Store a value at the given tier.
    pub fn put(&self, key: &str, value: JsonValue, tier: CacheTier) {
        let ttl = ChronoDuration::from_std(self.ttls.ttl(tier)).unwrap_or(ChronoDuration::MAX);
        let entry = CacheEntry {
            value,
            stored_at: self.clock.now(),
            ttl,
            tier,
        };
        self.shard(key).write().insert(key.to_string(), entry);
    }

    /// Number of entries across all shards, expired ones included.
    pub fn entry_count(&self) -> usize {
        self.shards.iter().map(|s| s.read().len()).sum()
    }
}
