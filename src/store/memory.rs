//! In-memory store adapters.
//!
//! Each store keeps its rows behind one async mutex, so every trait method is
//! a serialized read-modify-write, matching the row-lock semantics of the
//! Postgres adapters.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{AccountStore, SessionStore};
use crate::auth::{LockoutPolicy, LockoutTransition};
use crate::error::StoreError;
use crate::models::{Account, PasswordResetToken, Session};

#[derive(Default)]
struct AccountTable {
    rows: HashMap<Uuid, Account>,
    by_email: HashMap<String, Uuid>,
    reset_tokens: HashMap<String, PasswordResetToken>,
}

#[derive(Default)]
pub struct InMemoryAccountStore {
    table: Mutex<AccountTable>,
}

impl InMemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccountStore for InMemoryAccountStore {
    async fn insert(&self, account: &Account) -> Result<(), StoreError> {
        let mut table = self.table.lock().await;
        if table.by_email.contains_key(&account.email) {
            return Err(StoreError::UniqueViolation(format!(
                "accounts.email {}",
                account.email
            )));
        }
        table.by_email.insert(account.email.clone(), account.id);
        table.rows.insert(account.id, account.clone());
        Ok(())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        let table = self.table.lock().await;
        Ok(table
            .by_email
            .get(email)
            .and_then(|id| table.rows.get(id))
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, StoreError> {
        Ok(self.table.lock().await.rows.get(&id).cloned())
    }

    async fn record_failed_login(
        &self,
        id: Uuid,
        policy: &LockoutPolicy,
        now: DateTime<Utc>,
    ) -> Result<Option<(Account, LockoutTransition)>, StoreError> {
        let mut table = self.table.lock().await;
        let Some(account) = table.rows.get_mut(&id) else {
            return Ok(None);
        };

        let transition = policy.on_failed_login(account.lockout(), now);
        if transition.changed() {
            account.apply_lockout(transition.state(), now);
        }
        Ok(Some((account.clone(), transition)))
    }

    async fn record_successful_login(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<Account>, StoreError> {
        let mut table = self.table.lock().await;
        let Some(account) = table.rows.get_mut(&id) else {
            return Ok(None);
        };

        if !account.lockout().is_locked(now) {
            account.record_login(now);
        }
        Ok(Some(account.clone()))
    }

    async fn insert_reset_token(&self, token: &PasswordResetToken) -> Result<(), StoreError> {
        let mut table = self.table.lock().await;
        if !table.rows.contains_key(&token.account_id) {
            return Err(StoreError::Database(format!(
                "password_reset_tokens.account_id {} has no account",
                token.account_id
            )));
        }
        if table.reset_tokens.contains_key(&token.token_hash) {
            return Err(StoreError::UniqueViolation(
                "password_reset_tokens.token_hash".to_string(),
            ));
        }
        table
            .reset_tokens
            .insert(token.token_hash.clone(), token.clone());
        Ok(())
    }

    async fn redeem_reset_token(
        &self,
        token_hash: &str,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Uuid>, StoreError> {
        let mut table = self.table.lock().await;
        let AccountTable {
            rows, reset_tokens, ..
        } = &mut *table;

        let Some(token) = reset_tokens.get_mut(token_hash).filter(|t| t.is_valid(now)) else {
            return Ok(None);
        };
        let Some(account) = rows.get_mut(&token.account_id) else {
            return Ok(None);
        };

        account.set_password_hash(password_hash.to_string(), now);
        token.mark_used();
        Ok(Some(account.id))
    }
}

#[derive(Default)]
pub struct InMemorySessionStore {
    rows: Mutex<HashMap<String, Session>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.rows.lock().await.len()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create(&self, session: &Session) -> Result<(), StoreError> {
        let mut rows = self.rows.lock().await;
        if rows.contains_key(&session.token_hash) {
            return Err(StoreError::UniqueViolation("sessions.token_hash".to_string()));
        }
        rows.insert(session.token_hash.clone(), session.clone());
        Ok(())
    }

    async fn find_by_token_hash(&self, token_hash: &str) -> Result<Option<Session>, StoreError> {
        Ok(self.rows.lock().await.get(token_hash).cloned())
    }

    async fn touch(&self, token_hash: &str, now: DateTime<Utc>) -> Result<bool, StoreError> {
        let mut rows = self.rows.lock().await;
        match rows.get_mut(token_hash) {
            Some(session) => {
                session.last_accessed_at = now;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_by_token_hash(&self, token_hash: &str) -> Result<bool, StoreError> {
        Ok(self.rows.lock().await.remove(token_hash).is_some())
    }

    async fn delete_for_account(&self, account_id: Uuid) -> Result<Vec<String>, StoreError> {
        let mut rows = self.rows.lock().await;
        let removed: Vec<String> = rows
            .values()
            .filter(|s| s.account_id == account_id)
            .map(|s| s.token_hash.clone())
            .collect();
        for hash in &removed {
            rows.remove(hash);
        }
        Ok(removed)
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<Vec<String>, StoreError> {
        let mut rows = self.rows.lock().await;
        let expired: Vec<String> = rows
            .values()
            .filter(|s| !s.is_usable(now))
            .map(|s| s.token_hash.clone())
            .collect();
        for hash in &expired {
            rows.remove(hash);
        }
        Ok(expired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn account(email: &str) -> Account {
        Account::new(email.to_string(), "hash".to_string(), Utc::now())
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let store = InMemoryAccountStore::new();
        store.insert(&account("dup@example.com")).await.unwrap();

        let result = store.insert(&account("dup@example.com")).await;
        assert!(matches!(result, Err(StoreError::UniqueViolation(_))));
    }

    #[tokio::test]
    async fn failed_logins_lock_at_threshold() {
        let store = InMemoryAccountStore::new();
        let account = account("lock@example.com");
        store.insert(&account).await.unwrap();
        let policy = LockoutPolicy::default();
        let now = Utc::now();

        for _ in 0..4 {
            let (_, transition) = store
                .record_failed_login(account.id, &policy, now)
                .await
                .unwrap()
                .unwrap();
            assert!(matches!(transition, LockoutTransition::Counted(_)));
        }
        let (updated, transition) = store
            .record_failed_login(account.id, &policy, now)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(transition, LockoutTransition::Locked(_)));
        assert_eq!(updated.failed_attempts, 5);
        assert!(updated.lockout().is_locked(now));
    }

    #[tokio::test]
    async fn successful_login_does_not_clear_an_active_lock() {
        let store = InMemoryAccountStore::new();
        let account = account("held@example.com");
        store.insert(&account).await.unwrap();
        let policy = LockoutPolicy::new(1, Duration::minutes(15));
        let now = Utc::now();

        store.record_failed_login(account.id, &policy, now).await.unwrap();
        let after = store
            .record_successful_login(account.id, now)
            .await
            .unwrap()
            .unwrap();
        assert!(after.lockout().is_locked(now));
        assert!(after.last_login_at.is_none());
    }

    #[tokio::test]
    async fn missing_account_yields_none() {
        let store = InMemoryAccountStore::new();
        let policy = LockoutPolicy::default();
        assert!(store
            .record_failed_login(Uuid::new_v4(), &policy, Utc::now())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn expired_sessions_are_purged() {
        let store = InMemorySessionStore::new();
        let now = Utc::now();
        let live = Session::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "live".into(),
            now,
            now + Duration::hours(1),
            None,
        )
        .unwrap();
        let stale = Session::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "stale".into(),
            now - Duration::hours(2),
            now - Duration::hours(1),
            None,
        )
        .unwrap();
        store.create(&live).await.unwrap();
        store.create(&stale).await.unwrap();

        let removed = store.delete_expired(now).await.unwrap();
        assert_eq!(removed, vec!["stale".to_string()]);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn reset_token_redeemed_once() {
        let store = InMemoryAccountStore::new();
        let account = account("reset@example.com");
        store.insert(&account).await.unwrap();
        let now = Utc::now();
        let token = PasswordResetToken::new(account.id, "h".into(), now, now + Duration::hours(1));
        store.insert_reset_token(&token).await.unwrap();

        assert_eq!(
            store.redeem_reset_token("h", "new-hash", now).await.unwrap(),
            Some(account.id)
        );
        assert!(store
            .redeem_reset_token("h", "other-hash", now)
            .await
            .unwrap()
            .is_none());

        let stored = store.find_by_id(account.id).await.unwrap().unwrap();
        assert_eq!(stored.password_hash, "new-hash");
    }

    #[tokio::test]
    async fn redeeming_clears_lockout() {
        let store = InMemoryAccountStore::new();
        let account = account("locked@example.com");
        store.insert(&account).await.unwrap();
        let now = Utc::now();
        let policy = LockoutPolicy::default();
        for _ in 0..5 {
            store.record_failed_login(account.id, &policy, now).await.unwrap();
        }
        let token = PasswordResetToken::new(account.id, "h".into(), now, now + Duration::hours(1));
        store.insert_reset_token(&token).await.unwrap();

        store.redeem_reset_token("h", "new-hash", now).await.unwrap();

        let stored = store.find_by_id(account.id).await.unwrap().unwrap();
        assert_eq!(stored.failed_attempts, 0);
        assert!(stored.locked_until.is_none());
    }

    #[tokio::test]
    async fn expired_reset_token_changes_nothing() {
        let store = InMemoryAccountStore::new();
        let account = account("late@example.com");
        store.insert(&account).await.unwrap();
        let now = Utc::now();
        let token = PasswordResetToken::new(account.id, "h".into(), now, now + Duration::hours(1));
        store.insert_reset_token(&token).await.unwrap();

        assert!(store
            .redeem_reset_token("h", "new-hash", now + Duration::hours(1))
            .await
            .unwrap()
            .is_none());
        let stored = store.find_by_id(account.id).await.unwrap().unwrap();
        assert_eq!(stored.password_hash, "hash");
    }

    #[tokio::test]
    async fn reset_token_requires_an_account() {
        let store = InMemoryAccountStore::new();
        let now = Utc::now();
        let token = PasswordResetToken::new(Uuid::new_v4(), "h".into(), now, now + Duration::hours(1));
        assert!(matches!(
            store.insert_reset_token(&token).await,
            Err(StoreError::Database(_))
        ));
    }
}
