use async_trait::async_trait;

use crate::cache::{CacheEntry, CacheKey};
use crate::error::Error;

/// Key-value capability the proxy caches through.
///
/// Implementations must be safe for concurrent `get`/`put` from independent
/// requests. Racing writes to the same key resolve by last-write-wins.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// A name for logs and the metrics endpoint.
    ///
    /// # Example
    /// - "memory"
    /// - "sqlite"
    fn name(&self) -> &'static str;

    /// Return the stored entry, or `None` on a miss.
    ///
    /// Must not block indefinitely. Callers treat an error as a miss.
    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>, Error>;

    /// Store `entry` under `key`, replacing any previous entry.
    ///
    /// An entry without a storage timestamp is stamped with the current time
    /// so its age can be computed on later reads.
    async fn put(&self, key: &CacheKey, entry: CacheEntry) -> Result<(), Error>;
}

/// Stamp an entry at write time unless the caller already did.
pub(crate) fn ensure_stamped(entry: CacheEntry) -> CacheEntry {
    if entry.stored_at.is_some() { entry } else { entry.stamped(chrono::Utc::now()) }
}
