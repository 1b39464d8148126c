/// Authentication Orchestrator
///
/// Composes the validator, hasher, lockout policy, token service and stores
/// into the register / login / logout / validate operations exposed to the
/// HTTP layer. All collaborators are injected through `AuthDependencies`.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::jwt::{SessionTokenService, VerifiedToken};
use crate::auth::lockout::{LockoutPolicy, LockoutTransition};
use crate::auth::password::PasswordHasher;
use crate::auth::reset_token::{generate_reset_token, hash_token};
use crate::auth::strength::PasswordStrengthValidator;
use crate::clock::Clock;
use crate::configuration::{SecuritySettings, TokenSettings};
use crate::error::{AppError, AuthError, ConflictError, NotFoundError, StoreError, ValidationError};
use crate::models::{Account, PasswordResetToken, Session};
use crate::store::{
    AccountStore, InMemoryAccountStore, InMemorySessionCache, InMemorySessionStore,
    PgAccountStore, PgSessionStore, SessionCache, SessionRepository, SessionStore,
};
use crate::validators::{normalize_email, parse_email};

// Verified against when the email is unknown so both paths cost one bcrypt run
const TIMING_DUMMY_PASSWORD: &str = "timing-equalization-Dummy1!";

/// External collaborators of the orchestrator
#[derive(Clone)]
pub struct AuthDependencies {
    pub accounts: Arc<dyn AccountStore>,
    pub sessions: Arc<dyn SessionStore>,
    pub cache: Option<Arc<dyn SessionCache>>,
    pub clock: Arc<dyn Clock>,
}

impl AuthDependencies {
    pub fn postgres(pool: PgPool, clock: Arc<dyn Clock>, with_cache: bool) -> Self {
        Self {
            accounts: Arc::new(PgAccountStore::new(pool.clone())),
            sessions: Arc::new(PgSessionStore::new(pool)),
            cache: with_cache.then(|| local_cache(&clock)),
            clock,
        }
    }

    pub fn in_memory(clock: Arc<dyn Clock>, with_cache: bool) -> Self {
        Self {
            accounts: Arc::new(InMemoryAccountStore::new()),
            sessions: Arc::new(InMemorySessionStore::new()),
            cache: with_cache.then(|| local_cache(&clock)),
            clock,
        }
    }
}

fn local_cache(clock: &Arc<dyn Clock>) -> Arc<dyn SessionCache> {
    Arc::new(InMemorySessionCache::new(clock.clone()))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegisteredAccount {
    pub account_id: Uuid,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub account_id: Uuid,
    pub email: String,
    pub expires_at: DateTime<Utc>,
}

pub struct AuthService {
    accounts: Arc<dyn AccountStore>,
    sessions: SessionRepository,
    clock: Arc<dyn Clock>,
    hasher: PasswordHasher,
    validator: PasswordStrengthValidator,
    tokens: SessionTokenService,
    lockout: LockoutPolicy,
    reset_token_ttl: Duration,
    strict_revocation: bool,
    dummy_hash: String,
}

impl AuthService {
    /// # Errors
    /// Fails only if the timing-equalization digest cannot be computed
    pub fn new(
        deps: AuthDependencies,
        token_settings: &TokenSettings,
        security: &SecuritySettings,
    ) -> Result<Self, AppError> {
        let hasher = PasswordHasher::new(security.bcrypt_cost);
        let dummy_hash = hasher.hash(TIMING_DUMMY_PASSWORD)?;

        Ok(Self {
            sessions: SessionRepository::new(deps.sessions, deps.cache, deps.clock.clone()),
            tokens: SessionTokenService::new(token_settings, deps.clock.clone()),
            accounts: deps.accounts,
            clock: deps.clock,
            hasher,
            validator: PasswordStrengthValidator::new(),
            lockout: LockoutPolicy::new(
                security.lockout_threshold,
                Duration::minutes(security.lockout_minutes),
            ),
            reset_token_ttl: Duration::seconds(security.reset_token_ttl_seconds),
            strict_revocation: security.strict_revocation,
            dummy_hash,
        })
    }

    pub fn lockout_policy(&self) -> &LockoutPolicy {
        &self.lockout
    }

    /// Create an account in the active state.
    ///
    /// # Errors
    /// - `ValidationError` for a malformed email or a weak password (with
    ///   every violated rule)
    /// - `ConflictError::EmailExists` if the normalized email is taken
    pub async fn register(
        &self,
        email: &str,
        password: &str,
    ) -> Result<RegisteredAccount, AppError> {
        let email = parse_email(email)?;

        if self.accounts.find_by_email(&email).await?.is_some() {
            return Err(ConflictError::EmailExists.into());
        }

        self.check_strength(password)?;
        let password_hash = self.hash_blocking(password).await?;

        let account = Account::new(email, password_hash, self.clock.now());
        match self.accounts.insert(&account).await {
            Ok(()) => {}
            // Lost a race with a concurrent registration of the same address
            Err(StoreError::UniqueViolation(_)) => return Err(ConflictError::EmailExists.into()),
            Err(e) => return Err(e.into()),
        }

        tracing::info!(account_id = %account.id, "Account registered");

        Ok(RegisteredAccount {
            account_id: account.id,
            email: account.email,
        })
    }

    /// Authenticate and open a session.
    ///
    /// # Errors
    /// - `AuthError::InvalidCredentials` for an unknown email or wrong password
    /// - `AuthError::AccountLocked` while a lockout is in force (the password
    ///   is not checked)
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        client: Option<String>,
    ) -> Result<LoginResponse, AppError> {
        let email = normalize_email(email);

        let Some(account) = self.accounts.find_by_email(&email).await? else {
            self.verify_blocking(self.dummy_hash.clone(), password).await?;
            tracing::warn!("Login attempt for unknown email");
            return Err(AuthError::InvalidCredentials.into());
        };

        if let Some(remaining_minutes) = account.lockout().remaining_minutes(self.clock.now()) {
            tracing::warn!(
                account_id = %account.id,
                remaining_minutes,
                "Login rejected, account locked"
            );
            return Err(AuthError::AccountLocked { remaining_minutes }.into());
        }

        if !self
            .verify_blocking(account.password_hash.clone(), password)
            .await?
        {
            self.register_failure(account.id).await?;
            return Err(AuthError::InvalidCredentials.into());
        }

        // Stamped before the session exists; a failed session write below
        // leaves the same row state as any other successful login.
        let now = self.clock.now();
        let account = self
            .accounts
            .record_successful_login(account.id, now)
            .await?
            .ok_or(NotFoundError::Account)?;

        // A concurrent failure may have locked the row after our first read
        if let Some(remaining_minutes) = account.lockout().remaining_minutes(now) {
            return Err(AuthError::AccountLocked { remaining_minutes }.into());
        }

        let issued = self.tokens.issue(account.id, &account.email)?;
        let session = Session::new(
            issued.session_id,
            account.id,
            hash_token(&issued.token),
            issued.issued_at,
            issued.expires_at,
            client,
        )?;
        self.sessions.create(&session).await?;

        tracing::info!(
            account_id = %account.id,
            session_id = %session.id,
            "Account logged in"
        );

        Ok(LoginResponse {
            token: issued.token,
            account_id: account.id,
            email: account.email,
            expires_at: issued.expires_at,
        })
    }

    /// Revoke the session backing `token`. Unknown tokens are not an error.
    pub async fn logout(&self, token: &str) -> Result<(), AppError> {
        if self.sessions.delete_by_token(token).await? {
            tracing::info!("Session revoked");
        } else {
            tracing::debug!("Logout for unknown or already revoked session");
        }
        Ok(())
    }

    /// Stateless verification of signature and expiry claim
    pub fn validate_token(&self, token: &str) -> Result<VerifiedToken, AppError> {
        self.tokens.verify(token).map_err(AppError::from)
    }

    /// Token verification plus a revocation check against the session record.
    /// Refreshes the session's last-access time on success.
    ///
    /// # Errors
    /// - token errors as in `validate_token`
    /// - `AuthError::SessionNotFound` once the session was revoked
    /// - `AuthError::TokenExpired` if the session record has expired
    pub async fn validate_session(&self, token: &str) -> Result<VerifiedToken, AppError> {
        let verified = self.validate_token(token)?;

        let lookup = if self.strict_revocation {
            self.sessions.find_by_token_durable(token).await
        } else {
            self.sessions.find_by_token(token).await
        };
        let session = lookup.map_err(|e| match e {
            AppError::NotFound(_) => AppError::Auth(AuthError::SessionNotFound),
            other => other,
        })?;

        if session.account_id != verified.account_id {
            return Err(AuthError::SessionNotFound.into());
        }
        if !session.is_usable(self.clock.now()) {
            return Err(AuthError::TokenExpired.into());
        }

        self.sessions.touch(token).await?;
        Ok(verified)
    }

    /// Revoke every session of an account; returns how many were removed
    pub async fn logout_all(&self, account_id: Uuid) -> Result<usize, AppError> {
        let removed = self.sessions.delete_for_account(account_id).await?;
        tracing::info!(account_id = %account_id, removed, "All sessions revoked");
        Ok(removed)
    }

    /// Mint a single-use reset token for a known email.
    ///
    /// Unknown emails yield `Ok(None)` so callers cannot probe for accounts.
    pub async fn request_password_reset(&self, email: &str) -> Result<Option<String>, AppError> {
        let email = normalize_email(email);
        let Some(account) = self.accounts.find_by_email(&email).await? else {
            tracing::debug!("Password reset requested for unknown email");
            return Ok(None);
        };

        let token = generate_reset_token();
        let now = self.clock.now();
        let record =
            PasswordResetToken::new(account.id, hash_token(&token), now, now + self.reset_token_ttl);
        self.accounts.insert_reset_token(&record).await?;

        tracing::info!(account_id = %account.id, "Password reset token issued");
        Ok(Some(token))
    }

    /// Consume a reset token and set a new password.
    ///
    /// The token is spent in the same store operation that writes the new
    /// digest, so a failure leaves the token usable. Clears any lockout and
    /// revokes all of the account's sessions.
    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<(), AppError> {
        self.check_strength(new_password)?;
        let password_hash = self.hash_blocking(new_password).await?;

        let account_id = self
            .accounts
            .redeem_reset_token(&hash_token(token), &password_hash, self.clock.now())
            .await?
            .ok_or(AuthError::InvalidResetToken)?;

        let revoked = self.sessions.delete_for_account(account_id).await?;
        tracing::info!(
            account_id = %account_id,
            revoked_sessions = revoked,
            "Password reset"
        );
        Ok(())
    }

    /// Delete sessions whose expiry has passed; returns how many were removed
    pub async fn cleanup_expired_sessions(&self) -> Result<usize, AppError> {
        let removed = self.sessions.delete_expired().await?;
        if removed > 0 {
            tracing::info!(removed, "Expired sessions removed");
        }
        Ok(removed)
    }

    fn check_strength(&self, password: &str) -> Result<(), ValidationError> {
        let validation = self.validator.validate(password);
        if validation.valid {
            Ok(())
        } else {
            Err(ValidationError::WeakPassword(validation.violations))
        }
    }

    async fn register_failure(&self, account_id: Uuid) -> Result<(), AppError> {
        let outcome = self
            .accounts
            .record_failed_login(account_id, &self.lockout, self.clock.now())
            .await?;

        match outcome {
            Some((account, LockoutTransition::Locked(state))) => {
                tracing::warn!(
                    account_id = %account.id,
                    failed_attempts = state.failed_attempts,
                    locked_until = ?state.locked_until,
                    "Account locked after repeated failed logins"
                );
            }
            Some((account, transition)) => {
                tracing::warn!(
                    account_id = %account.id,
                    failed_attempts = transition.state().failed_attempts,
                    "Failed login"
                );
            }
            None => {
                tracing::warn!(account_id = %account_id, "Failed login for vanished account");
            }
        }
        Ok(())
    }

    async fn hash_blocking(&self, password: &str) -> Result<String, AppError> {
        let hasher = self.hasher;
        let password = password.to_owned();
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| AppError::Internal(format!("hashing task failed: {}", e)))?
            .map_err(AppError::from)
    }

    async fn verify_blocking(&self, digest: String, password: &str) -> Result<bool, AppError> {
        let hasher = self.hasher;
        let password = password.to_owned();
        tokio::task::spawn_blocking(move || hasher.verify(&digest, &password))
            .await
            .map_err(|e| AppError::Internal(format!("verification task failed: {}", e)))
    }
}
