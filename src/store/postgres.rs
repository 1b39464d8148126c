//! Postgres store adapters.
//!
//! Lockout transitions run inside a transaction holding `SELECT ... FOR UPDATE`
//! on the account row, so concurrent attempts on one account serialize and
//! each one is a single committed write (or none, if the task is dropped).
//! Reset-token redemption likewise spends the token and writes the new
//! password in one transaction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::{AccountStore, SessionStore};
use crate::auth::{AccountState, LockoutPolicy, LockoutTransition};
use crate::error::StoreError;
use crate::models::{Account, PasswordResetToken, Session};

const ACCOUNT_COLUMNS: &str = "id, email, password_hash, status, failed_attempts, locked_until, \
     last_login_at, created_at, updated_at";

const SESSION_COLUMNS: &str =
    "id, account_id, token_hash, created_at, last_accessed_at, expires_at, client";

#[derive(FromRow)]
struct AccountRow {
    id: Uuid,
    email: String,
    password_hash: String,
    status: String,
    failed_attempts: i32,
    locked_until: Option<DateTime<Utc>>,
    last_login_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<AccountRow> for Account {
    type Error = StoreError;

    fn try_from(row: AccountRow) -> Result<Self, Self::Error> {
        Ok(Account {
            id: row.id,
            email: row.email,
            password_hash: row.password_hash,
            status: row.status.parse::<AccountState>().map_err(StoreError::Database)?,
            failed_attempts: u32::try_from(row.failed_attempts)
                .map_err(|e| StoreError::Database(e.to_string()))?,
            locked_until: row.locked_until,
            last_login_at: row.last_login_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct SessionRow {
    id: Uuid,
    account_id: Uuid,
    token_hash: String,
    created_at: DateTime<Utc>,
    last_accessed_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    client: Option<String>,
}

impl From<SessionRow> for Session {
    fn from(row: SessionRow) -> Self {
        Session {
            id: row.id,
            account_id: row.account_id,
            token_hash: row.token_hash,
            created_at: row.created_at,
            last_accessed_at: row.last_accessed_at,
            expires_at: row.expires_at,
            client: row.client,
        }
    }
}

fn attempts_column(failed_attempts: u32) -> i32 {
    i32::try_from(failed_attempts).unwrap_or(i32::MAX)
}

#[derive(Clone)]
pub struct PgAccountStore {
    pool: PgPool,
}

impl PgAccountStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn write_lockout(
        executor: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        account: &Account,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE accounts
            SET status = $2, failed_attempts = $3, locked_until = $4,
                last_login_at = $5, updated_at = $6
            WHERE id = $1
            "#,
        )
        .bind(account.id)
        .bind(account.status.as_str())
        .bind(attempts_column(account.failed_attempts))
        .bind(account.locked_until)
        .bind(account.last_login_at)
        .bind(account.updated_at)
        .execute(executor)
        .await?;
        Ok(())
    }

    async fn lock_row(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        id: Uuid,
    ) -> Result<Option<Account>, StoreError> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {} FROM accounts WHERE id = $1 FOR UPDATE",
            ACCOUNT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(tx)
        .await?;
        row.map(Account::try_from).transpose()
    }
}

#[async_trait]
impl AccountStore for PgAccountStore {
    async fn insert(&self, account: &Account) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO accounts (id, email, password_hash, status, failed_attempts,
                                  locked_until, last_login_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(account.id)
        .bind(&account.email)
        .bind(&account.password_hash)
        .bind(account.status.as_str())
        .bind(attempts_column(account.failed_attempts))
        .bind(account.locked_until)
        .bind(account.last_login_at)
        .bind(account.created_at)
        .bind(account.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {} FROM accounts WHERE email = $1",
            ACCOUNT_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Account::try_from).transpose()
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, StoreError> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {} FROM accounts WHERE id = $1",
            ACCOUNT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Account::try_from).transpose()
    }

    async fn record_failed_login(
        &self,
        id: Uuid,
        policy: &LockoutPolicy,
        now: DateTime<Utc>,
    ) -> Result<Option<(Account, LockoutTransition)>, StoreError> {
        let mut tx = self.pool.begin().await?;
        let Some(mut account) = Self::lock_row(&mut tx, id).await? else {
            return Ok(None);
        };

        let transition = policy.on_failed_login(account.lockout(), now);
        if transition.changed() {
            account.apply_lockout(transition.state(), now);
            Self::write_lockout(&mut tx, &account).await?;
        }
        tx.commit().await?;

        Ok(Some((account, transition)))
    }

    async fn record_successful_login(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<Account>, StoreError> {
        let mut tx = self.pool.begin().await?;
        let Some(mut account) = Self::lock_row(&mut tx, id).await? else {
            return Ok(None);
        };

        if !account.lockout().is_locked(now) {
            account.record_login(now);
            Self::write_lockout(&mut tx, &account).await?;
        }
        tx.commit().await?;

        Ok(Some(account))
    }

    async fn insert_reset_token(&self, token: &PasswordResetToken) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO password_reset_tokens (id, account_id, token_hash, created_at,
                                               expires_at, used)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(token.id)
        .bind(token.account_id)
        .bind(&token.token_hash)
        .bind(token.created_at)
        .bind(token.expires_at)
        .bind(token.used)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn redeem_reset_token(
        &self,
        token_hash: &str,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Uuid>, StoreError> {
        let mut tx = self.pool.begin().await?;

        let account_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            UPDATE password_reset_tokens
            SET used = true
            WHERE token_hash = $1 AND used = false AND expires_at > $2
            RETURNING account_id
            "#,
        )
        .bind(token_hash)
        .bind(now)
        .fetch_optional(&mut tx)
        .await?;
        // Dropping `tx` without commit rolls the token back
        let Some(account_id) = account_id else {
            return Ok(None);
        };

        let updated = sqlx::query(
            r#"
            UPDATE accounts
            SET password_hash = $2, status = 'active', failed_attempts = 0,
                locked_until = NULL, updated_at = $3
            WHERE id = $1
            "#,
        )
        .bind(account_id)
        .bind(password_hash)
        .bind(now)
        .execute(&mut tx)
        .await?;
        if updated.rows_affected() != 1 {
            return Ok(None);
        }

        tx.commit().await?;
        Ok(Some(account_id))
    }
}

#[derive(Clone)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn create(&self, session: &Session) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO sessions (id, account_id, token_hash, created_at,
                                  last_accessed_at, expires_at, client)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(session.id)
        .bind(session.account_id)
        .bind(&session.token_hash)
        .bind(session.created_at)
        .bind(session.last_accessed_at)
        .bind(session.expires_at)
        .bind(&session.client)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_by_token_hash(&self, token_hash: &str) -> Result<Option<Session>, StoreError> {
        let row = sqlx::query_as::<_, SessionRow>(&format!(
            "SELECT {} FROM sessions WHERE token_hash = $1",
            SESSION_COLUMNS
        ))
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Session::from))
    }

    async fn touch(&self, token_hash: &str, now: DateTime<Utc>) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE sessions SET last_accessed_at = $2 WHERE token_hash = $1")
            .bind(token_hash)
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn delete_by_token_hash(&self, token_hash: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM sessions WHERE token_hash = $1")
            .bind(token_hash)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_for_account(&self, account_id: Uuid) -> Result<Vec<String>, StoreError> {
        let removed = sqlx::query_scalar::<_, String>(
            "DELETE FROM sessions WHERE account_id = $1 RETURNING token_hash",
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(removed)
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<Vec<String>, StoreError> {
        let removed = sqlx::query_scalar::<_, String>(
            "DELETE FROM sessions WHERE expires_at <= $1 RETURNING token_hash",
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        Ok(removed)
    }
}
