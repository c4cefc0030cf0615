//! Two-tier TTL cache for geocoding and forecast results.
//!
//! `TtlCache` fronts an optional external store (Redis) and an always-present
//! in-process `MemoryStore`. The backend is chosen once, at construction, from
//! configuration. Backend failures never reach callers:
//!
//! - read error on the external store: logged, reported as a miss (the
//!   in-memory store is *not* consulted)
//! - write error on the external store: logged, value kept in memory instead
//! - external miss: the in-memory store is checked, since it holds whatever
//!   failed to reach the external store earlier
//!
//! Values are stored as JSON under `"{namespace}:{key}"`.

mod keys;
mod memory;
mod redis_store;

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::CacheConfig;
use crate::errors::CacheError;

pub use keys::{geocoding_key, normalize_query, weather_key};
pub use memory::MemoryStore;
pub use redis_store::RedisStore;

/// City ↔ coordinate mappings rarely change.
pub const GEOCODING_TTL: Duration = Duration::from_secs(3600);
/// Forecast data is refreshed upstream frequently.
pub const WEATHER_TTL: Duration = Duration::from_secs(600);

/// Key prefix separating the cache kinds within one physical store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Namespace {
    Geo,
    Weather,
}

impl Namespace {
    fn prefix(self) -> &'static str {
        match self {
            Namespace::Geo => "geo",
            Namespace::Weather => "weather",
        }
    }

    fn key(self, key: &str) -> String {
        format!("{}:{}", self.prefix(), key)
    }
}

/// A networked key/value store with native expiry.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError>;
}

/// Decide whether to try the external store, returning its URL if so.
///
/// Skipped when forced off, when no URL is configured, or when a hosted
/// deployment points at a loopback address (a leftover local default that can
/// never be reached there). `force_external` overrides the loopback rule.
pub fn external_backend_url(config: &CacheConfig) -> Option<&str> {
    if config.memory_only {
        return None;
    }
    let url = config.redis_url.as_deref().map(str::trim)?;
    if url.is_empty() {
        return None;
    }
    if config.hosted && !config.force_external && is_loopback_url(url) {
        return None;
    }
    Some(url)
}

fn is_loopback_url(url: &str) -> bool {
    let Ok(parsed) = reqwest::Url::parse(url) else {
        return false;
    };
    let host = parsed
        .host_str()
        .unwrap_or_default()
        .trim_start_matches('[')
        .trim_end_matches(']');
    host.eq_ignore_ascii_case("localhost")
        || host.parse::<IpAddr>().is_ok_and(|ip| ip.is_loopback())
}

/// The cache used by the lookup pipeline. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct TtlCache {
    external: Option<Arc<dyn CacheBackend>>,
    fallback: MemoryStore,
}

impl TtlCache {
    /// In-memory only.
    pub fn memory() -> Self {
        Self {
            external: None,
            fallback: MemoryStore::new(),
        }
    }

    pub fn with_external(external: Arc<dyn CacheBackend>) -> Self {
        Self {
            external: Some(external),
            fallback: MemoryStore::new(),
        }
    }

    /// Build the cache for this process. Never fails and never touches the
    /// network: an unusable Redis URL falls back to memory, an unreachable
    /// Redis shows up as logged errors on first use.
    pub fn from_config(config: &CacheConfig) -> Self {
        let Some(url) = external_backend_url(config) else {
            tracing::info!("No external cache configured for this context, using in-memory cache");
            return Self::memory();
        };

        match RedisStore::open(url, config.timeout) {
            Ok(store) => {
                tracing::info!("Using Redis cache (timeout {:?})", config.timeout);
                Self::with_external(Arc::new(store))
            }
            Err(e) => {
                tracing::warn!("Unusable REDIS_URL, using in-memory cache: {}", e);
                Self::memory()
            }
        }
    }

    /// Name of the primary backend, for the health endpoint.
    pub fn backend_name(&self) -> &'static str {
        if self.external.is_some() {
            "redis"
        } else {
            "memory"
        }
    }

    pub async fn get<T: DeserializeOwned>(&self, namespace: Namespace, key: &str) -> Option<T> {
        let full_key = namespace.key(key);

        let raw = match &self.external {
            None => self.fallback.get(&full_key).await,
            Some(external) => match external.get(&full_key).await {
                Ok(Some(raw)) => Some(raw),
                Ok(None) => self.fallback.get(&full_key).await,
                Err(e) => {
                    tracing::warn!("Cache read failed for {}, treating as miss: {}", full_key, e);
                    None
                }
            },
        };

        let Some(raw) = raw else {
            tracing::debug!("Cache miss for {}", full_key);
            return None;
        };

        match serde_json::from_str(&raw) {
            Ok(value) => {
                tracing::debug!("Cache hit for {}", full_key);
                Some(value)
            }
            Err(e) => {
                tracing::warn!(
                    "Discarding unreadable cache entry {}: {}",
                    full_key,
                    CacheError::from(e)
                );
                None
            }
        }
    }

    pub async fn set<T: Serialize>(
        &self,
        namespace: Namespace,
        key: &str,
        value: &T,
        ttl: Duration,
    ) {
        let full_key = namespace.key(key);

        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::error!("Could not serialize cache entry {}: {}", full_key, e);
                return;
            }
        };

        if let Some(external) = &self.external {
            match external.set(&full_key, raw.clone(), ttl).await {
                Ok(()) => return,
                Err(e) => tracing::error!(
                    "Cache write failed for {}, keeping value in memory: {}",
                    full_key,
                    e
                ),
            }
        }

        self.fallback.set(&full_key, raw, ttl).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tokio::sync::Mutex;

    /// Working external store that records what it was given.
    #[derive(Default)]
    struct RecordingBackend {
        entries: Mutex<HashMap<String, (String, Duration)>>,
    }

    #[async_trait]
    impl CacheBackend for RecordingBackend {
        async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
            Ok(self.entries.lock().await.get(key).map(|(v, _)| v.clone()))
        }

        async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
            self.entries
                .lock()
                .await
                .insert(key.to_string(), (value, ttl));
            Ok(())
        }
    }

    /// Reads succeed (always empty), writes fail.
    struct WriteFailingBackend;

    #[async_trait]
    impl CacheBackend for WriteFailingBackend {
        async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
            Ok(None)
        }

        async fn set(&self, _key: &str, _value: String, _ttl: Duration) -> Result<(), CacheError> {
            Err(CacheError::Timeout(Duration::from_secs(2)))
        }
    }

    /// Every operation fails.
    struct DownBackend;

    #[async_trait]
    impl CacheBackend for DownBackend {
        async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
            Err(CacheError::Timeout(Duration::from_secs(2)))
        }

        async fn set(&self, _key: &str, _value: String, _ttl: Duration) -> Result<(), CacheError> {
            Err(CacheError::Timeout(Duration::from_secs(2)))
        }
    }

    fn cache_config(url: Option<&str>) -> CacheConfig {
        CacheConfig {
            redis_url: url.map(str::to_string),
            timeout: Duration::from_secs(2),
            ..CacheConfig::default()
        }
    }

    // --- backend selection ---

    #[test]
    fn test_no_url_means_memory() {
        assert_eq!(external_backend_url(&cache_config(None)), None);
    }

    #[test]
    fn test_memory_only_flag_wins() {
        let mut config = cache_config(Some("redis://cache.internal:6379/0"));
        config.memory_only = true;
        config.force_external = true;
        assert_eq!(external_backend_url(&config), None);
    }

    #[test]
    fn test_loopback_allowed_locally() {
        let config = cache_config(Some("redis://localhost:6379/0"));
        assert_eq!(
            external_backend_url(&config),
            Some("redis://localhost:6379/0")
        );
    }

    #[test]
    fn test_loopback_skipped_when_hosted() {
        for url in [
            "redis://localhost:6379/0",
            "redis://127.0.0.1:6379",
            "redis://[::1]:6379",
        ] {
            let mut config = cache_config(Some(url));
            config.hosted = true;
            assert_eq!(external_backend_url(&config), None, "{}", url);
        }
    }

    #[test]
    fn test_force_flag_overrides_loopback_rule() {
        let mut config = cache_config(Some("redis://localhost:6379/0"));
        config.hosted = true;
        config.force_external = true;
        assert_eq!(
            external_backend_url(&config),
            Some("redis://localhost:6379/0")
        );
    }

    #[test]
    fn test_remote_url_used_when_hosted() {
        let mut config = cache_config(Some("rediss://default:pw@eu1.upstash.io:6379"));
        config.hosted = true;
        assert_eq!(
            external_backend_url(&config),
            Some("rediss://default:pw@eu1.upstash.io:6379")
        );
    }

    #[test]
    fn test_from_config_tls_url_when_hosted_is_redis() {
        let mut config = cache_config(Some("rediss://default:pw@eu1.upstash.io:6379"));
        config.hosted = true;
        assert_eq!(TtlCache::from_config(&config).backend_name(), "redis");
    }

    #[test]
    fn test_from_config_without_url_is_memory() {
        assert_eq!(TtlCache::from_config(&cache_config(None)).backend_name(), "memory");
    }

    #[test]
    fn test_from_config_invalid_url_is_memory() {
        let cache = TtlCache::from_config(&cache_config(Some("not a redis url")));
        assert_eq!(cache.backend_name(), "memory");
    }

    #[test]
    fn test_from_config_does_not_require_reachable_redis() {
        let cache = TtlCache::from_config(&cache_config(Some("redis://127.0.0.1:1/0")));
        assert_eq!(cache.backend_name(), "redis");
    }

    // --- get/set policy ---

    #[tokio::test]
    async fn test_memory_round_trip() {
        let cache = TtlCache::memory();
        cache
            .set(Namespace::Weather, "1,2", &vec![1, 2, 3], WEATHER_TTL)
            .await;
        let value: Option<Vec<i32>> = cache.get(Namespace::Weather, "1,2").await;
        assert_eq!(value, Some(vec![1, 2, 3]));
    }

    #[tokio::test]
    async fn test_external_round_trip_uses_prefixed_key_and_ttl() {
        let backend = Arc::new(RecordingBackend::default());
        let cache = TtlCache::with_external(backend.clone());

        cache
            .set(Namespace::Geo, "lages", &"value", GEOCODING_TTL)
            .await;

        let stored = backend.entries.lock().await.get("geo:lages").cloned();
        assert_eq!(stored, Some(("\"value\"".to_string(), GEOCODING_TTL)));

        let value: Option<String> = cache.get(Namespace::Geo, "lages").await;
        assert_eq!(value.as_deref(), Some("value"));
        // Successful external writes do not also land in memory.
        assert_eq!(cache.fallback.len().await, 0);
    }

    #[tokio::test]
    async fn test_namespaces_do_not_collide() {
        let cache = TtlCache::memory();
        cache.set(Namespace::Geo, "k", &1, GEOCODING_TTL).await;
        cache.set(Namespace::Weather, "k", &2, WEATHER_TTL).await;

        assert_eq!(cache.get::<i32>(Namespace::Geo, "k").await, Some(1));
        assert_eq!(cache.get::<i32>(Namespace::Weather, "k").await, Some(2));
    }

    #[tokio::test]
    async fn test_failed_external_write_is_kept_in_memory() {
        let cache = TtlCache::with_external(Arc::new(WriteFailingBackend));
        cache
            .set(Namespace::Weather, "1,2", &"snapshot", WEATHER_TTL)
            .await;

        let value: Option<String> = cache.get(Namespace::Weather, "1,2").await;
        assert_eq!(value.as_deref(), Some("snapshot"));
    }

    #[tokio::test]
    async fn test_external_read_error_is_a_miss() {
        let cache = TtlCache::with_external(Arc::new(DownBackend));
        cache
            .set(Namespace::Weather, "1,2", &"snapshot", WEATHER_TTL)
            .await;
        // The write landed in memory, but a failed read must not fall through to it.
        assert_eq!(cache.fallback.len().await, 1);
        let value: Option<String> = cache.get(Namespace::Weather, "1,2").await;
        assert_eq!(value, None);
    }

    #[tokio::test]
    async fn test_unreadable_entry_is_a_miss() {
        let cache = TtlCache::memory();
        cache
            .fallback
            .set("weather:1,2", "{not json".to_string(), WEATHER_TTL)
            .await;
        let value: Option<Vec<i32>> = cache.get(Namespace::Weather, "1,2").await;
        assert_eq!(value, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_memory_entry_expires() {
        let cache = TtlCache::memory();
        cache.set(Namespace::Weather, "1,2", &42, WEATHER_TTL).await;

        tokio::time::advance(WEATHER_TTL - Duration::from_secs(1)).await;
        assert_eq!(cache.get::<i32>(Namespace::Weather, "1,2").await, Some(42));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(cache.get::<i32>(Namespace::Weather, "1,2").await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fallback_write_after_failure_expires() {
        let cache = TtlCache::with_external(Arc::new(WriteFailingBackend));
        cache.set(Namespace::Geo, "lages", &1, GEOCODING_TTL).await;

        tokio::time::advance(GEOCODING_TTL).await;
        assert_eq!(cache.get::<i32>(Namespace::Geo, "lages").await, None);
    }
}
