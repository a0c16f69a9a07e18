//! Two-tier key/value cache used for credentials, tenant/scope lookups, and
//! cached provider model lists.
//!
//! L1 is an in-process [`moka`] cache with a per-entry expiry. L2, when
//! configured, is a shared Redis connection: reads check L1 first, fall
//! through to L2 on miss, and repopulate L1 on an L2 hit. Values that fail
//! to deserialize out of L2 are treated as an L1-only miss rather than a
//! hard error, matching the "unserializable values fall back to L1 only"
//! rule.

use std::sync::Arc;
use std::time::{Duration, Instant};

use moka::Expiry;
use moka::future::Cache as MokaCache;
use serde::Serialize;
use serde::de::DeserializeOwned;

pub type CacheResult<T> = Result<T, CacheError>;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
}

#[derive(Clone)]
struct Entry {
    bytes: Arc<[u8]>,
    ttl: Duration,
}

struct PerEntryExpiry;

impl Expiry<String, Entry> for PerEntryExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &Entry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

#[derive(Debug, Default, Clone)]
pub struct CacheStats {
    pub l1_hits: u64,
    pub l1_misses: u64,
    pub l2_hits: u64,
    pub l2_misses: u64,
    pub entries: u64,
}

/// A namespaced two-tier cache instance. A process typically holds two of
/// these: a short-TTL scope/credential cache and a long-TTL model-list /
/// provider-service cache (spec §4.4).
pub struct Cache {
    name: &'static str,
    default_ttl: Duration,
    l1: MokaCache<String, Entry>,
    l2: Option<redis::aio::ConnectionManager>,
    l1_hits: std::sync::atomic::AtomicU64,
    l1_misses: std::sync::atomic::AtomicU64,
    l2_hits: std::sync::atomic::AtomicU64,
    l2_misses: std::sync::atomic::AtomicU64,
}

impl Cache {
    pub fn new(name: &'static str, default_ttl: Duration, l2: Option<redis::aio::ConnectionManager>) -> Self {
        let l1 = MokaCache::builder()
            .expire_after(PerEntryExpiry)
            .max_capacity(100_000)
            .build();
        Self {
            name,
            default_ttl,
            l1,
            l2,
            l1_hits: Default::default(),
            l1_misses: Default::default(),
            l2_hits: Default::default(),
            l2_misses: Default::default(),
        }
    }

    /// Connects to Redis for use as L2. Returns `Ok(None)` when `url` is
    /// `None` or `force_memory_cache` is set, matching the original's
    /// `FORCE_MEMORY_CACHE` escape hatch (kept for tests).
    pub async fn connect_l2(
        url: Option<&str>,
        force_memory_cache: bool,
    ) -> CacheResult<Option<redis::aio::ConnectionManager>> {
        if force_memory_cache {
            return Ok(None);
        }
        let Some(url) = url else { return Ok(None) };
        let client = redis::Client::open(url)?;
        let manager = client.get_connection_manager().await?;
        Ok(Some(manager))
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> CacheResult<Option<T>> {
        if let Some(entry) = self.l1.get(key).await {
            self.l1_hits.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            return Ok(Some(serde_json::from_slice(&entry.bytes)?));
        }
        self.l1_misses.fetch_add(1, std::sync::atomic::Ordering::Relaxed);

        let Some(l2) = self.l2.clone() else {
            return Ok(None);
        };
        let mut conn = l2;
        let raw: Option<Vec<u8>> = redis::AsyncCommands::get(&mut conn, namespaced(self.name, key)).await?;
        match raw {
            Some(bytes) => {
                self.l2_hits.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                match serde_json::from_slice::<T>(&bytes) {
                    Ok(value) => {
                        self.l1
                            .insert(
                                key.to_string(),
                                Entry {
                                    bytes: Arc::from(bytes.into_boxed_slice()),
                                    ttl: self.default_ttl,
                                },
                            )
                            .await;
                        Ok(Some(value))
                    }
                    // Deserialization failure on the shared tier: fall back
                    // to "not cached" rather than erroring the caller.
                    Err(_) => Ok(None),
                }
            }
            None => {
                self.l2_misses.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                Ok(None)
            }
        }
    }

    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) -> CacheResult<()> {
        let bytes = serde_json::to_vec(value)?;
        self.l1
            .insert(
                key.to_string(),
                Entry {
                    bytes: Arc::from(bytes.clone().into_boxed_slice()),
                    ttl,
                },
            )
            .await;

        if let Some(mut conn) = self.l2.clone() {
            let ttl_secs = ttl.as_secs().max(1);
            let _: () = redis::AsyncCommands::set_ex(&mut conn, namespaced(self.name, key), bytes, ttl_secs).await?;
        }
        Ok(())
    }

    pub async fn delete(&self, key: &str) -> CacheResult<()> {
        self.l1.invalidate(key).await;
        if let Some(mut conn) = self.l2.clone() {
            let _: () = redis::AsyncCommands::del(&mut conn, namespaced(self.name, key)).await?;
        }
        Ok(())
    }

    /// Invalidates every key whose suffix (after the cache's namespace)
    /// starts with `prefix`. Requires scanning both tiers, per spec §4.4.
    pub async fn invalidate_prefix(&self, prefix: &str) -> CacheResult<()> {
        let matching: Vec<String> = self
            .l1
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| (*k).clone())
            .collect();
        for key in matching {
            self.l1.invalidate(&key).await;
        }

        if let Some(mut conn) = self.l2.clone() {
            let pattern = format!("{}:{prefix}*", self.name);
            let mut cursor: u64 = 0;
            loop {
                let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                    .arg(cursor)
                    .arg("MATCH")
                    .arg(&pattern)
                    .arg("COUNT")
                    .arg(200)
                    .query_async(&mut conn)
                    .await?;
                if !keys.is_empty() {
                    let _: () = redis::AsyncCommands::del(&mut conn, keys).await?;
                }
                cursor = next;
                if cursor == 0 {
                    break;
                }
            }
        }
        Ok(())
    }

    pub async fn clear(&self) {
        self.l1.invalidate_all();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            l1_hits: self.l1_hits.load(std::sync::atomic::Ordering::Relaxed),
            l1_misses: self.l1_misses.load(std::sync::atomic::Ordering::Relaxed),
            l2_hits: self.l2_hits.load(std::sync::atomic::Ordering::Relaxed),
            l2_misses: self.l2_misses.load(std::sync::atomic::Ordering::Relaxed),
            entries: self.l1.entry_count(),
        }
    }
}

fn namespaced(cache_name: &str, key: &str) -> String {
    format!("{cache_name}:{key}")
}

/// Cache key families enumerated in spec §4.4. Centralized so call sites
/// never hand-format a namespaced key.
pub mod keys {
    pub fn user(secret: &str) -> String {
        format!("user:{secret}")
    }

    /// `secret` must already have the `forge-` prefix stripped.
    pub fn forge_scope(secret_no_prefix: &str) -> String {
        format!("forge_scope:{secret_no_prefix}")
    }

    pub fn provider_service(tenant_id: &str) -> String {
        format!("provider_service:{tenant_id}")
    }

    pub fn provider_keys(tenant_id: &str) -> String {
        format!("provider_keys:{tenant_id}")
    }

    pub fn models(provider: &str, base_url_hash: &str) -> String {
        format!("models:{provider}:{base_url_hash}")
    }

    pub fn oauth_token(opaque_credential_hash: &str) -> String {
        format!("oauth_token:{opaque_credential_hash}")
    }
}

/// The two cache instances the gateway keeps alive for its whole process
/// lifetime: a short-TTL auth/credential cache and a long-TTL model-list /
/// provider-service-instance cache.
pub struct CacheLayer {
    pub scope: Cache,
    pub long: Cache,
}

impl CacheLayer {
    pub const SCOPE_TTL: Duration = Duration::from_secs(5 * 60);
    pub const LONG_TTL: Duration = Duration::from_secs(60 * 60);

    pub fn new(l2: Option<redis::aio::ConnectionManager>) -> Self {
        Self {
            scope: Cache::new("scope", Self::SCOPE_TTL, l2.clone()),
            long: Cache::new("long", Self::LONG_TTL, l2),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn l1_only_roundtrip() {
        let cache = Cache::new("test", Duration::from_secs(60), None);
        cache.set("k", &"v".to_string(), Duration::from_secs(60)).await.unwrap();
        let got: Option<String> = cache.get("k").await.unwrap();
        assert_eq!(got.as_deref(), Some("v"));
        assert_eq!(cache.stats().l1_hits, 1);
    }

    #[tokio::test]
    async fn delete_removes_entry() {
        let cache = Cache::new("test", Duration::from_secs(60), None);
        cache.set("k", &1u32, Duration::from_secs(60)).await.unwrap();
        cache.delete("k").await.unwrap();
        let got: Option<u32> = cache.get("k").await.unwrap();
        assert_eq!(got, None);
    }

    #[tokio::test]
    async fn invalidate_prefix_scans_l1() {
        let cache = Cache::new("test", Duration::from_secs(60), None);
        cache.set("tenant:1:a", &1u32, Duration::from_secs(60)).await.unwrap();
        cache.set("tenant:1:b", &2u32, Duration::from_secs(60)).await.unwrap();
        cache.set("tenant:2:a", &3u32, Duration::from_secs(60)).await.unwrap();
        cache.invalidate_prefix("tenant:1:").await.unwrap();
        assert_eq!(cache.get::<u32>("tenant:1:a").await.unwrap(), None);
        assert_eq!(cache.get::<u32>("tenant:2:a").await.unwrap(), Some(3));
    }
}
