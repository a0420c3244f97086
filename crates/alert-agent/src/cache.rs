use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// A single cached value which expires `ttl` after it was set, and which may
/// be invalidated explicitly when the underlying data changes.
#[derive(Debug)]
pub struct TtlCache<T> {
    ttl: Duration,
    entry: RwLock<Option<CachedValue<T>>>,
}

#[derive(Debug)]
struct CachedValue<T> {
    value: T,
    expires_at: Instant,
}

impl<T: Clone> TtlCache<T> {
    pub fn new(ttl: Duration) -> TtlCache<T> {
        TtlCache {
            ttl,
            entry: RwLock::new(None),
        }
    }

    /// Returns the cached value, if there is one and it hasn't expired.
    pub async fn get(&self) -> Option<T> {
        let entry = self.entry.read().await;
        match entry.as_ref() {
            Some(cached) if cached.expires_at > Instant::now() => Some(cached.value.clone()),
            _ => None,
        }
    }

    pub async fn set(&self, value: T) {
        let expires_at = Instant::now() + self.ttl;
        *self.entry.write().await = Some(CachedValue { value, expires_at });
    }

    pub async fn invalidate(&self) {
        self.entry.write().await.take();
    }
}
