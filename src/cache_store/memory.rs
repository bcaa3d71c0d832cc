use async_trait::async_trait;
use fieldx::fxstruct;
use moka::future::Cache;
use moka::policy::EvictionPolicy;
use moka::Expiry;
use std::fmt::Debug;
use std::time::Duration;
use std::time::Instant;
use tracing::instrument;

use super::decode_book;
use super::encode_book;
use crate::error::config_err;
use crate::error::CacheError;
use crate::error::CatalogError;
use crate::traits::CacheStore;
use crate::types::Book;

// Serialized the same way as the Redis payload so both stores share one codec and one set of failure modes.
#[derive(Clone, Debug)]
struct CachedPayload {
    payload: String,
    ttl:     Duration,
}

struct PerEntryTtl;

impl Expiry<String, CachedPayload> for PerEntryTtl {
    fn expire_after_create(&self, _key: &String, value: &CachedPayload, _created_at: Instant) -> Option<Duration> {
        Some(value.ttl)
    }

    // Overwriting an entry restarts its clock.
    fn expire_after_update(
        &self,
        _key: &String,
        value: &CachedPayload,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// In-process cache store on top of [moka](https://crates.io/crates/moka). Entries expire individually after the
/// TTL passed to [`put()`](CacheStore::put).
///
/// ```ignore
/// let cache = MemoryCacheStore::builder()
///     .name("books")
///     .max_capacity(100_000)
///     .build()?;
/// ```
#[fxstruct(sync, no_new, builder)]
pub struct MemoryCacheStore {
    /// Cache name. Most useful for debugging and logging.
    #[fieldx(get(clone), builder(into), default("books".to_string()))]
    name: String,

    #[fieldx(get(copy), default(10_000))]
    max_capacity: u64,

    #[fieldx(lazy, get(clone), builder(off))]
    cache: Cache<String, CachedPayload>,
}

impl MemoryCacheStore {
    pub fn with_capacity(max_capacity: u64) -> Result<Self, CatalogError> {
        Self::builder()
            .max_capacity(max_capacity)
            .build()
            .map_err(|err| config_err!("memory cache store: {err}"))
    }

    fn build_cache(&self) -> Cache<String, CachedPayload> {
        Cache::builder()
            .max_capacity(self.max_capacity())
            .name(&self.name())
            .eviction_policy(EvictionPolicy::tiny_lfu())
            .expire_after(PerEntryTtl)
            .build()
    }

    /// Number of live entries. Pending maintenance is run first so the figure is exact.
    pub async fn entry_count(&self) -> u64 {
        let cache = self.cache();
        cache.run_pending_tasks().await;
        cache.entry_count()
    }
}

impl Debug for MemoryCacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCacheStore")
            .field("name", &self.name())
            .field("max_capacity", &self.max_capacity())
            .finish()
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    #[instrument(level = "trace", skip(self, book))]
    async fn put(&self, key: &str, book: &Book, ttl: Duration) -> Result<(), CacheError> {
        let payload = encode_book(book)?;
        self.cache().insert(key.to_string(), CachedPayload { payload, ttl }).await;
        Ok(())
    }

    #[instrument(level = "trace", skip(self))]
    async fn get(&self, key: &str) -> Result<Option<Book>, CacheError> {
        self.cache()
            .get(key)
            .await
            .map(|cached| decode_book(&cached.payload))
            .transpose()
    }

    #[instrument(level = "trace", skip(self))]
    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.cache().remove(key).await.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BookId;
    use crate::types::NewBook;

    fn dune() -> Book {
        Book::new(BookId::from("dune"), NewBook::new("Dune", "Herbert", 1965))
    }

    #[tokio::test]
    async fn test_put_get_delete() {
        let store = MemoryCacheStore::with_capacity(100).unwrap();
        assert_eq!(store.get("dune").await.unwrap(), None);

        store.put("dune", &dune(), Duration::from_secs(60)).await.unwrap();
        assert_eq!(store.get("dune").await.unwrap(), Some(dune()));

        assert!(store.delete("dune").await.unwrap());
        // Deleting a missing key is a no-op.
        assert!(!store.delete("dune").await.unwrap());
        assert_eq!(store.get("dune").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_entries_expire() {
        let store = MemoryCacheStore::with_capacity(100).unwrap();
        store.put("dune", &dune(), Duration::from_millis(50)).await.unwrap();
        assert!(store.get("dune").await.unwrap().is_some());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(store.get("dune").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_overwrite_replaces_value() {
        let store = MemoryCacheStore::with_capacity(100).unwrap();
        store.put("dune", &dune(), Duration::from_secs(60)).await.unwrap();

        let mut updated = dune();
        updated.year = 1966;
        store.put("dune", &updated, Duration::from_secs(60)).await.unwrap();

        assert_eq!(store.get("dune").await.unwrap().map(|b| b.year), Some(1966));
        assert_eq!(store.entry_count().await, 1);
    }
}
