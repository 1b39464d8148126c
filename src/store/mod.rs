/// Storage contracts
///
/// The orchestrator only sees these traits. Postgres adapters back them in
/// production; the in-memory adapters back them in tests and local runs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::auth::{LockoutPolicy, LockoutTransition};
use crate::error::StoreError;
use crate::models::{Account, PasswordResetToken, Session};

pub mod cache;
pub mod memory;
pub mod postgres;
mod session_repository;

pub use cache::InMemorySessionCache;
pub use memory::{InMemoryAccountStore, InMemorySessionStore};
pub use postgres::{PgAccountStore, PgSessionStore};
pub use session_repository::SessionRepository;

/// Durable account records and their single-use password reset tokens
///
/// Every mutating method is a single read-modify-write serialized per
/// account (row lock or equivalent) and is either fully applied or not at all.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// # Errors
    /// `StoreError::UniqueViolation` when the email is already taken
    async fn insert(&self, account: &Account) -> Result<(), StoreError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, StoreError>;

    /// Apply `policy.on_failed_login` to the current row and persist it.
    /// Returns `None` if the account no longer exists.
    async fn record_failed_login(
        &self,
        id: Uuid,
        policy: &LockoutPolicy,
        now: DateTime<Utc>,
    ) -> Result<Option<(Account, LockoutTransition)>, StoreError>;

    /// Reset lockout and stamp the login time, unless the row is locked at
    /// write time, in which case it is returned untouched.
    async fn record_successful_login(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<Account>, StoreError>;

    async fn insert_reset_token(&self, token: &PasswordResetToken) -> Result<(), StoreError>;

    /// Consume an unused, unexpired reset token and install `password_hash`
    /// on its account, clearing lockout state, as one atomic step. Returns the
    /// account id, or `None` (with nothing written) if the token was not valid.
    async fn redeem_reset_token(
        &self,
        token_hash: &str,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Uuid>, StoreError>;
}

/// Durable session records, keyed by token digest
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create(&self, session: &Session) -> Result<(), StoreError>;

    async fn find_by_token_hash(&self, token_hash: &str) -> Result<Option<Session>, StoreError>;

    async fn touch(&self, token_hash: &str, now: DateTime<Utc>) -> Result<bool, StoreError>;

    /// Returns whether a row was removed
    async fn delete_by_token_hash(&self, token_hash: &str) -> Result<bool, StoreError>;

    /// Returns the token digests of the removed rows
    async fn delete_for_account(&self, account_id: Uuid) -> Result<Vec<String>, StoreError>;

    /// Remove sessions with `expires_at <= now`; returns their token digests
    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<Vec<String>, StoreError>;
}

/// Fast lookup cache in front of the session store
///
/// A hint only: misses fall back to the durable store.
#[async_trait]
pub trait SessionCache: Send + Sync {
    async fn set(
        &self,
        key: &str,
        session: &Session,
        ttl: std::time::Duration,
    ) -> Result<(), StoreError>;

    async fn get(&self, key: &str) -> Result<Option<Session>, StoreError>;

    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}
