//! Bounded in-process store backed by moka.

use async_trait::async_trait;
use moka::future::Cache;

use crate::cache::store::ensure_stamped;
use crate::cache::{CacheEntry, CacheKey, CacheStore};
use crate::error::Error;

/// Concurrent in-memory cache store.
///
/// Capacity is counted in bytes: each entry weighs its key, header and body
/// bytes, and moka evicts the least useful entries once the total passes
/// `capacity_bytes`. Entries never expire on time alone, since expired
/// entries are still served when the origin fails.
#[derive(Clone)]
pub struct MemoryStore {
    cache: Cache<CacheKey, CacheEntry>,
}

impl MemoryStore {
    /// Create a store holding at most `capacity_bytes` of cached responses.
    pub fn new(capacity_bytes: u64) -> Self {
        Self { cache: Cache::builder().weigher(weigh).max_capacity(capacity_bytes).build() }
    }
}

/// Approximate retained size of an entry. Saturates at `u32::MAX`.
fn weigh(key: &CacheKey, entry: &CacheEntry) -> u32 {
    let headers: usize = entry.headers.iter().map(|(name, value)| name.as_str().len() + value.len()).sum();
    let total = key.as_str().len() + headers + entry.body.len();
    u32::try_from(total).unwrap_or(u32::MAX)
}

#[async_trait]
impl CacheStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>, Error> {
        Ok(self.cache.get(key).await)
    }

    async fn put(&self, key: &CacheKey, entry: CacheEntry) -> Result<(), Error> {
        self.cache.insert(key.clone(), ensure_stamped(entry)).await;
        Ok(())
    }
}
