//! Session Store adapter: durable store plus optional write-through cache.
//!
//! The durable store is the source of truth. The cache is populated on
//! create and on durable hits, with the session's remaining lifetime as TTL,
//! and invalidated after every durable delete.

use std::sync::Arc;

use uuid::Uuid;

use super::{SessionCache, SessionStore};
use crate::auth::hash_token;
use crate::clock::Clock;
use crate::error::{AppError, NotFoundError};
use crate::models::Session;

const CACHE_PREFIX: &str = "session:";

#[derive(Clone)]
pub struct SessionRepository {
    store: Arc<dyn SessionStore>,
    cache: Option<Arc<dyn SessionCache>>,
    clock: Arc<dyn Clock>,
}

impl SessionRepository {
    pub fn new(
        store: Arc<dyn SessionStore>,
        cache: Option<Arc<dyn SessionCache>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { store, cache, clock }
    }

    fn cache_key(token_hash: &str) -> String {
        format!("{}{}", CACHE_PREFIX, token_hash)
    }

    /// Persist a new session, then seed the cache.
    ///
    /// # Errors
    /// `AppError::Store` if the durable write fails
    pub async fn create(&self, session: &Session) -> Result<(), AppError> {
        self.store.create(session).await?;
        self.populate_cache(session).await;
        Ok(())
    }

    /// Cache-first lookup; a miss falls back to the durable store
    pub async fn find_by_token(&self, token: &str) -> Result<Session, AppError> {
        let token_hash = hash_token(token);

        if let Some(cache) = &self.cache {
            match cache.get(&Self::cache_key(&token_hash)).await {
                Ok(Some(session)) => return Ok(session),
                Ok(None) => {}
                Err(e) => tracing::warn!(error = %e, "Session cache lookup failed, using store"),
            }
        }

        let session = self.load(&token_hash).await?;
        self.populate_cache(&session).await;
        Ok(session)
    }

    /// Durable-store lookup that never trusts the cache
    pub async fn find_by_token_durable(&self, token: &str) -> Result<Session, AppError> {
        self.load(&hash_token(token)).await
    }

    /// Refresh last-access time on the durable row
    pub async fn touch(&self, token: &str) -> Result<(), AppError> {
        self.store.touch(&hash_token(token), self.clock.now()).await?;
        Ok(())
    }

    /// Remove a session. Deleting an absent token is not an error.
    pub async fn delete_by_token(&self, token: &str) -> Result<bool, AppError> {
        let token_hash = hash_token(token);
        let removed = self.store.delete_by_token_hash(&token_hash).await?;
        self.invalidate(&token_hash).await?;
        Ok(removed)
    }

    pub async fn delete_for_account(&self, account_id: Uuid) -> Result<usize, AppError> {
        let removed = self.store.delete_for_account(account_id).await?;
        for token_hash in &removed {
            self.invalidate(token_hash).await?;
        }
        Ok(removed.len())
    }

    pub async fn delete_expired(&self) -> Result<usize, AppError> {
        let removed = self.store.delete_expired(self.clock.now()).await?;
        for token_hash in &removed {
            self.invalidate(token_hash).await?;
        }
        Ok(removed.len())
    }

    async fn load(&self, token_hash: &str) -> Result<Session, AppError> {
        self.store
            .find_by_token_hash(token_hash)
            .await?
            .ok_or(AppError::NotFound(NotFoundError::Session))
    }

    // The durable write already succeeded; a failed cache fill only costs a
    // later miss.
    async fn populate_cache(&self, session: &Session) {
        let Some(cache) = &self.cache else {
            return;
        };
        let Some(ttl) = session.remaining_ttl(self.clock.now()) else {
            return;
        };
        if let Err(e) = cache
            .set(&Self::cache_key(&session.token_hash), session, ttl)
            .await
        {
            tracing::warn!(session_id = %session.id, error = %e, "Failed to cache session");
        }
    }

    async fn invalidate(&self, token_hash: &str) -> Result<(), AppError> {
        if let Some(cache) = &self.cache {
            cache.delete(&Self::cache_key(token_hash)).await?;
        }
        Ok(())
    }
}
