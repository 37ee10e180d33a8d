use std::time::{Duration, Instant};

use moka::{ops::compute::Op, sync::Cache, Expiry};
use strum_macros::{AsRefStr, Display};

use crate::model::{AccountSnapshot, JarSnapshot};

/// Identifier namespaces sharing one cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr, Display)]
pub enum CacheCategory {
    AccountInfo,
    JarInfo,
}

/// Value held by the lookup cache.
#[derive(Debug, Clone, PartialEq)]
pub enum Snapshot {
    Account(AccountSnapshot),
    Jar(JarSnapshot),
}

/// Builds the composite cache key. An empty key addresses the category as a
/// singleton slot.
pub fn composite_key(category: CacheCategory, key: &str) -> String {
    if key.is_empty() {
        category.to_string()
    } else {
        format!("{category}:{key}")
    }
}

/// Process-local snapshot cache keyed by `(category, identifier)`.
pub trait LookupCache: Send + Sync {
    fn try_get(&self, category: CacheCategory, key: &str) -> Option<Snapshot>;

    /// Unconditional overwrite; it does not order against concurrent
    /// `update` calls.
    fn set(&self, category: CacheCategory, key: &str, value: Snapshot, ttl: Duration);

    /// Replaces an existing entry with `f(current)` as one atomic step and
    /// returns the stored value. Absent keys are left untouched and yield
    /// `None`.
    fn update(
        &self,
        category: CacheCategory,
        key: &str,
        ttl: Duration,
        f: &mut dyn FnMut(Snapshot) -> Snapshot,
    ) -> Option<Snapshot>;
}

#[derive(Debug, Clone)]
struct CacheEntry {
    snapshot: Snapshot,
    ttl: Duration,
}

struct PerEntryTtl;

impl Expiry<String, CacheEntry> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &CacheEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &CacheEntry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

pub struct InMemoryLookupCache {
    entries: Cache<String, CacheEntry>,
}

impl InMemoryLookupCache {
    /// Unbounded; entries leave only when their TTL elapses.
    pub fn new() -> Self {
        Self {
            entries: Cache::builder().expire_after(PerEntryTtl).build(),
        }
    }
}

impl Default for InMemoryLookupCache {
    fn default() -> Self {
        Self::new()
    }
}

impl LookupCache for InMemoryLookupCache {
    fn try_get(&self, category: CacheCategory, key: &str) -> Option<Snapshot> {
        self.entries
            .get(&composite_key(category, key))
            .map(|entry| entry.snapshot)
    }

    fn set(&self, category: CacheCategory, key: &str, value: Snapshot, ttl: Duration) {
        self.entries.insert(
            composite_key(category, key),
            CacheEntry {
                snapshot: value,
                ttl,
            },
        );
    }

    fn update(
        &self,
        category: CacheCategory,
        key: &str,
        ttl: Duration,
        f: &mut dyn FnMut(Snapshot) -> Snapshot,
    ) -> Option<Snapshot> {
        let mut stored = None;
        self.entries
            .entry(composite_key(category, key))
            .and_compute_with(|current| match current {
                Some(entry) => {
                    let snapshot = f(entry.into_value().snapshot);
                    stored = Some(snapshot.clone());
                    Op::Put(CacheEntry { snapshot, ttl })
                }
                None => Op::Nop,
            });
        stored
    }
}
