//! Process-local session cache with per-entry TTL.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

use super::SessionCache;
use crate::clock::Clock;
use crate::error::StoreError;
use crate::models::Session;

#[derive(Clone)]
struct CacheEntry {
    session: Session,
    expires_at: DateTime<Utc>,
}

/// `SessionCache` backed by a concurrent map; entries past their TTL read as
/// misses and are evicted lazily.
pub struct InMemorySessionCache {
    entries: DashMap<String, CacheEntry>,
    clock: Arc<dyn Clock>,
}

impl InMemorySessionCache {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry whose TTL has elapsed
    pub fn evict_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        before - self.entries.len()
    }
}

#[async_trait]
impl SessionCache for InMemorySessionCache {
    async fn set(
        &self,
        key: &str,
        session: &Session,
        ttl: std::time::Duration,
    ) -> Result<(), StoreError> {
        let ttl = Duration::from_std(ttl).map_err(|e| StoreError::Cache(e.to_string()))?;
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                session: session.clone(),
                expires_at: self.clock.now() + ttl,
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Session>, StoreError> {
        let now = self.clock.now();
        let hit = self
            .entries
            .get(key)
            .map(|entry| (entry.expires_at > now, entry.session.clone()));

        match hit {
            Some((true, session)) => Ok(Some(session)),
            Some((false, _)) => {
                self.entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MockClock;
    use uuid::Uuid;

    fn session(now: DateTime<Utc>) -> Session {
        Session::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "digest".into(),
            now,
            now + Duration::hours(1),
            None,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn entries_expire_with_ttl() {
        let clock = MockClock::default();
        let cache = InMemorySessionCache::new(Arc::new(clock.clone()));
        let session = session(clock.now());

        cache
            .set("k", &session, std::time::Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some(session));

        clock.advance(Duration::seconds(60));
        assert_eq!(cache.get("k").await.unwrap(), None);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let clock = MockClock::default();
        let cache = InMemorySessionCache::new(Arc::new(clock.clone()));
        cache
            .set("k", &session(clock.now()), std::time::Duration::from_secs(60))
            .await
            .unwrap();

        cache.delete("k").await.unwrap();
        cache.delete("k").await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn evict_expired_drops_stale_entries() {
        let clock = MockClock::default();
        let cache = InMemorySessionCache::new(Arc::new(clock.clone()));
        let s = session(clock.now());
        cache.set("short", &s, std::time::Duration::from_secs(10)).await.unwrap();
        cache.set("long", &s, std::time::Duration::from_secs(600)).await.unwrap();

        clock.advance(Duration::seconds(11));
        assert_eq!(cache.evict_expired(), 1);
        assert_eq!(cache.len(), 1);
    }
}
