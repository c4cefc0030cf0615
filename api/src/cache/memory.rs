//! In-process fallback store.
//!
//! Entries carry their own stored-at instant and TTL. Expiry is lazy: a `get`
//! that finds a dead entry removes it before reporting a miss. Time comes from
//! `tokio::time::Instant`, so tests can drive expiry with a paused clock.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    stored_at: Instant,
    ttl: Duration,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        now.duration_since(self.stored_at) < self.ttl
    }
}

/// Shared, TTL-aware string map. Clones share the same entries.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();

        match entries.get(key).map(|entry| entry.is_live(now)) {
            Some(true) => entries.get(key).map(|entry| entry.value.clone()),
            Some(false) => {
                entries.remove(key);
                tracing::debug!("Evicted expired in-memory entry {}", key);
                None
            }
            None => None,
        }
    }

    pub async fn set(&self, key: &str, value: String, ttl: Duration) {
        let entry = Entry {
            value,
            stored_at: Instant::now(),
            ttl,
        };
        self.entries.lock().await.insert(key.to_string(), entry);
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}
