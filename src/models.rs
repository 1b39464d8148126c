/// Persistent records of the credential subsystem
///
/// Account lock status is derived: `Account::state` reads the stored lockout
/// fields against the clock, so an elapsed lock reads as active before any
/// write clears it.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::auth::{AccountState, LockoutState};
use crate::error::ValidationError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Account {
    pub id: Uuid,
    /// Trimmed, lower-cased, unique
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Last persisted status; use `state()` for the live value
    pub status: AccountState,
    pub failed_attempts: u32,
    pub locked_until: Option<DateTime<Utc>>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    pub fn new(email: String, password_hash: String, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            email,
            password_hash,
            status: AccountState::Active,
            failed_attempts: 0,
            locked_until: None,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn lockout(&self) -> LockoutState {
        LockoutState {
            failed_attempts: self.failed_attempts,
            locked_until: self.locked_until,
        }
    }

    /// The single accessor for whether the account is locked right now
    pub fn state(&self, now: DateTime<Utc>) -> AccountState {
        self.lockout().state(now)
    }

    pub fn apply_lockout(&mut self, lockout: LockoutState, now: DateTime<Utc>) {
        self.failed_attempts = lockout.failed_attempts;
        self.locked_until = lockout.locked_until;
        self.status = lockout.state(now);
        self.updated_at = now;
    }

    pub fn record_login(&mut self, now: DateTime<Utc>) {
        self.apply_lockout(LockoutState::default(), now);
        self.last_login_at = Some(now);
    }

    pub fn set_password_hash(&mut self, password_hash: String, now: DateTime<Utc>) {
        self.password_hash = password_hash;
        self.apply_lockout(LockoutState::default(), now);
    }
}

/// Server-side record backing an issued session token
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    /// Equals the token's `jti` claim
    pub id: Uuid,
    pub account_id: Uuid,
    /// SHA-256 of the token string
    #[serde(skip_serializing)]
    pub token_hash: String,
    pub created_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Device or client descriptor, e.g. a user agent
    pub client: Option<String>,
}

impl Session {
    /// # Errors
    /// `ValidationError::InvalidFormat` unless `expires_at` is after `created_at`
    pub fn new(
        id: Uuid,
        account_id: Uuid,
        token_hash: String,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
        client: Option<String>,
    ) -> Result<Self, ValidationError> {
        if expires_at <= created_at {
            return Err(ValidationError::InvalidFormat("session expiry".to_string()));
        }
        Ok(Self {
            id,
            account_id,
            token_hash,
            created_at,
            last_accessed_at: created_at,
            expires_at,
            client,
        })
    }

    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    /// Time left before expiry, `None` once expired
    pub fn remaining_ttl(&self, now: DateTime<Utc>) -> Option<std::time::Duration> {
        (self.expires_at - now).to_std().ok().filter(|ttl| !ttl.is_zero())
    }
}

/// Single-use password reset credential
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordResetToken {
    pub id: Uuid,
    pub account_id: Uuid,
    pub token_hash: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
}

impl PasswordResetToken {
    pub fn new(
        account_id: Uuid,
        token_hash: String,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            account_id,
            token_hash,
            created_at,
            expires_at,
            used: false,
        }
    }

    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        !self.used && now < self.expires_at
    }

    /// One-way: there is no way back to unused
    pub fn mark_used(&mut self) {
        self.used = true;
    }
}
