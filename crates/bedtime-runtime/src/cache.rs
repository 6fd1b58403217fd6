//! Story cache.
//!
//! Results are cached under their [`StoryKey`] so a repeated request is
//! answered without touching the model. The orchestrator treats every cache
//! error as a miss (on read) or ignores it (on write), so a cache outage
//! degrades latency and cost, never correctness.

use async_trait::async_trait;
use bedtime_core::{GenerationResult, StoryKey};
use moka::future::Cache;
use moka::Expiry;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Default entry bound for [`MemoryStoryCache`].
pub const DEFAULT_MAX_ENTRIES: u64 = 10_000;

/// Errors from a story cache backend.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache unavailable: {0}")]
    Unavailable(String),

    #[error("Cached value could not be (de)serialized: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Key-value store for generated stories with per-entry expiry.
#[async_trait]
pub trait StoryCache: Send + Sync {
    /// Look up a result. `Ok(None)` is a miss.
    async fn get(&self, key: &StoryKey) -> Result<Option<GenerationResult>, CacheError>;

    /// Store a result for `ttl`.
    async fn set(
        &self,
        key: StoryKey,
        result: &GenerationResult,
        ttl: Duration,
    ) -> Result<(), CacheError>;
}

/// A serialized result and how long it lives.
#[derive(Clone)]
struct Entry {
    json: Arc<str>,
    ttl: Duration,
}

/// Expire each entry after its own TTL, restarting on overwrite.
struct PerEntryTtl;

impl Expiry<StoryKey, Entry> for PerEntryTtl {
    fn expire_after_create(&self, _key: &StoryKey, entry: &Entry, _now: Instant) -> Option<Duration> {
        Some(entry.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &StoryKey,
        entry: &Entry,
        _now: Instant,
        _remaining: Option<Duration>,
    ) -> Option<Duration> {
        Some(entry.ttl)
    }
}

/// In-process cache backed by moka.
///
/// Values are stored as JSON, the same shape a networked cache would hold,
/// so every hit hands back an independent copy.
#[derive(Clone)]
pub struct MemoryStoryCache {
    cache: Cache<StoryKey, Entry>,
}

impl MemoryStoryCache {
    pub fn new(max_entries: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_entries)
            .expire_after(PerEntryTtl)
            .build();

        Self { cache }
    }

    /// Drop every entry.
    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }

    /// Approximate number of live entries.
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}

impl Default for MemoryStoryCache {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES)
    }
}

impl std::fmt::Debug for MemoryStoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStoryCache")
            .field("entries", &self.cache.entry_count())
            .finish()
    }
}

#[async_trait]
impl StoryCache for MemoryStoryCache {
    async fn get(&self, key: &StoryKey) -> Result<Option<GenerationResult>, CacheError> {
        match self.cache.get(key).await {
            Some(entry) => Ok(Some(serde_json::from_str(&entry.json)?)),
            None => Ok(None),
        }
    }

    async fn set(
        &self,
        key: StoryKey,
        result: &GenerationResult,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        if ttl.is_zero() {
            return Ok(());
        }

        let json: Arc<str> = serde_json::to_string(result)?.into();
        self.cache.insert(key, Entry { json, ttl }).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bedtime_core::{Gender, Story, StoryRequest, StorySource};

    fn result(name: &str) -> (StoryKey, GenerationResult) {
        let request = StoryRequest::new(name, ["owls"], "dreams", Gender::Neutral);
        let story = Story::new("A Hoot", "The owl said goodnight.", StorySource::Primary);
        (StoryKey::for_request(&request), GenerationResult::new(request, story))
    }

    #[tokio::test]
    async fn test_miss_then_hit() {
        let cache = MemoryStoryCache::default();
        let (key, value) = result("Ada");

        assert!(cache.get(&key).await.unwrap().is_none());

        cache.set(key.clone(), &value, Duration::from_secs(60)).await.unwrap();
        assert_eq!(cache.get(&key).await.unwrap(), Some(value));
    }

    #[tokio::test]
    async fn test_entries_expire_individually() {
        let cache = MemoryStoryCache::default();
        let (short_key, short) = result("Ada");
        let (long_key, long) = result("Bo");

        cache.set(short_key.clone(), &short, Duration::from_millis(50)).await.unwrap();
        cache.set(long_key.clone(), &long, Duration::from_secs(60)).await.unwrap();

        tokio::time::sleep(Duration::from_millis(150)).await;

        assert!(cache.get(&short_key).await.unwrap().is_none());
        assert!(cache.get(&long_key).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_zero_ttl_is_not_stored() {
        let cache = MemoryStoryCache::default();
        let (key, value) = result("Ada");

        cache.set(key.clone(), &value, Duration::ZERO).await.unwrap();
        assert!(cache.get(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_overwrite_replaces_value() {
        let cache = MemoryStoryCache::default();
        let (key, first) = result("Ada");
        let (_, mut second) = result("Ada");
        second.story.title = "Another Hoot".to_string();

        cache.set(key.clone(), &first, Duration::from_secs(60)).await.unwrap();
        cache.set(key.clone(), &second, Duration::from_secs(60)).await.unwrap();

        let stored = cache.get(&key).await.unwrap().unwrap();
        assert_eq!(stored.story.title, "Another Hoot");
    }
}
