/// Error Handling Module
///
/// One taxonomy for the whole credential subsystem:
/// 1. Domain-specific error types (validation, conflict, not-found, auth, store)
/// 2. Leaf-service errors (hasher, token service) folded into the domain types
/// 3. A unified `AppError` used for control flow with `?`
/// 4. HTTP response mapping with structured error logging

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use thiserror::Error;

use crate::auth::PasswordViolation;

/// ============================================================================
/// 1. DOMAIN-SPECIFIC ERROR TYPES
/// ============================================================================

/// Bad input shape or a password that fails the strength rules
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{0} is empty")]
    EmptyField(String),
    #[error("{0} has invalid format")]
    InvalidFormat(String),
    #[error("{0} is too short (minimum {1} characters)")]
    TooShort(String, usize),
    #[error("{0} is too long (maximum {1} characters)")]
    TooLong(String, usize),
    #[error("password is too weak: {}", describe_violations(.0))]
    WeakPassword(Vec<PasswordViolation>),
}

fn describe_violations(violations: &[PasswordViolation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// No matching record
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotFoundError {
    #[error("account not found")]
    Account,
    #[error("session not found")]
    Session,
}

/// Uniqueness conflicts
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConflictError {
    #[error("email is already registered")]
    EmailExists,
}

/// Authentication failures
///
/// Credential mismatches are deliberately uninformative. Lockout carries the
/// remaining minutes since the account's existence is already implied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Account is locked, try again in {remaining_minutes} minute(s)")]
    AccountLocked { remaining_minutes: i64 },
    #[error("Token has expired")]
    TokenExpired,
    #[error("Token signature is invalid")]
    InvalidSignature,
    #[error("Token is malformed")]
    MalformedToken,
    #[error("Session not found")]
    SessionNotFound,
    #[error("Password reset token is invalid or expired")]
    InvalidResetToken,
    #[error("Missing authentication token")]
    MissingToken,
}

/// Persistence and cache I/O failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("Duplicate entry: {0}")]
    UniqueViolation(String),
    #[error("Database error: {0}")]
    Database(String),
    #[error("Database unavailable: {0}")]
    Unavailable(String),
    #[error("Cache error: {0}")]
    Cache(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
                StoreError::UniqueViolation(db.message().to_string())
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StoreError::Unavailable(err.to_string())
            }
            _ => StoreError::Database(err.to_string()),
        }
    }
}

/// ============================================================================
/// 2. LEAF-SERVICE ERRORS
/// ============================================================================

/// Password hasher failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HashError {
    #[error("cannot hash an empty password")]
    EmptyInput,
    #[error("password exceeds {0} bytes")]
    TooLong(usize),
    #[error("password hashing failed: {0}")]
    Backend(String),
}

/// Session token verification failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("token signature does not match")]
    InvalidSignature,
    #[error("token has expired")]
    Expired,
    #[error("token cannot be parsed")]
    Malformed,
    #[error("token encoding failed: {0}")]
    Encoding(String),
}

/// ============================================================================
/// 3. UNIFIED APPLICATION ERROR TYPE
/// ============================================================================

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    NotFound(#[from] NotFoundError),
    #[error(transparent)]
    Conflict(#[from] ConflictError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<HashError> for AppError {
    fn from(err: HashError) -> Self {
        match err {
            HashError::EmptyInput => {
                AppError::Validation(ValidationError::EmptyField("password".to_string()))
            }
            HashError::TooLong(max) => {
                AppError::Validation(ValidationError::TooLong("password".to_string(), max))
            }
            HashError::Backend(msg) => AppError::Internal(msg),
        }
    }
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::InvalidSignature => AppError::Auth(AuthError::InvalidSignature),
            TokenError::Expired => AppError::Auth(AuthError::TokenExpired),
            TokenError::Malformed => AppError::Auth(AuthError::MalformedToken),
            TokenError::Encoding(msg) => AppError::Internal(msg),
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Store(err.into())
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

/// ============================================================================
/// 4. HTTP RESPONSE MAPPING
/// ============================================================================

/// Error response body
#[derive(Debug, serde::Serialize)]
pub struct ErrorResponse {
    /// Unique error ID, also attached to the log event
    pub error_id: String,
    pub message: String,
    /// Error code for client-side handling
    pub code: String,
    pub status: u16,
    /// Structured extras (violation list, remaining lockout minutes)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    pub timestamp: String,
}

impl ErrorResponse {
    pub fn new(error_id: String, message: String, code: String, status: u16) -> Self {
        Self {
            error_id,
            message,
            code,
            status,
            details: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// Converts errors to HTTP responses and logs them under one request ID
pub trait ErrorHandler {
    fn error_response(&self, request_id: &str) -> (StatusCode, ErrorResponse);
    fn log_error(&self, request_id: &str);
}

impl AppError {
    fn classify(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::Validation(e) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", e.to_string()),
            AppError::NotFound(e) => (StatusCode::NOT_FOUND, "NOT_FOUND", e.to_string()),
            AppError::Conflict(e) => (StatusCode::CONFLICT, "EMAIL_EXISTS", e.to_string()),
            AppError::Auth(e) => match e {
                AuthError::InvalidCredentials => (
                    StatusCode::UNAUTHORIZED,
                    "INVALID_CREDENTIALS",
                    "Invalid credentials".to_string(),
                ),
                AuthError::AccountLocked { .. } => {
                    (StatusCode::LOCKED, "ACCOUNT_LOCKED", e.to_string())
                }
                AuthError::TokenExpired
                | AuthError::InvalidSignature
                | AuthError::MalformedToken
                | AuthError::SessionNotFound => (
                    StatusCode::UNAUTHORIZED,
                    "TOKEN_INVALID",
                    "Invalid or expired token".to_string(),
                ),
                AuthError::InvalidResetToken => {
                    (StatusCode::BAD_REQUEST, "RESET_TOKEN_INVALID", e.to_string())
                }
                AuthError::MissingToken => {
                    (StatusCode::UNAUTHORIZED, "MISSING_TOKEN", e.to_string())
                }
            },
            AppError::Store(StoreError::Unavailable(_)) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "SERVICE_UNAVAILABLE",
                "Storage temporarily unavailable".to_string(),
            ),
            AppError::Store(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "STORE_ERROR",
                "Storage error occurred".to_string(),
            ),
            AppError::Config(_) | AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "Internal server error".to_string(),
            ),
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            AppError::Validation(ValidationError::WeakPassword(violations)) => {
                Some(serde_json::json!({ "violations": violations }))
            }
            AppError::Auth(AuthError::AccountLocked { remaining_minutes }) => {
                Some(serde_json::json!({ "remaining_minutes": remaining_minutes }))
            }
            _ => None,
        }
    }
}

impl ErrorHandler for AppError {
    fn error_response(&self, request_id: &str) -> (StatusCode, ErrorResponse) {
        let (status, code, message) = self.classify();
        let mut body =
            ErrorResponse::new(request_id.to_string(), message, code.to_string(), status.as_u16());
        if let Some(details) = self.details() {
            body = body.with_details(details);
        }
        (status, body)
    }

    fn log_error(&self, request_id: &str) {
        match self {
            AppError::Validation(e) => {
                tracing::warn!(request_id = request_id, error = %e, "Validation error");
            }
            AppError::Conflict(e) => {
                tracing::warn!(request_id = request_id, error = %e, "Conflict");
            }
            AppError::NotFound(e) => {
                tracing::info!(request_id = request_id, error = %e, "Not found");
            }
            AppError::Auth(e) => {
                tracing::warn!(request_id = request_id, error = %e, "Authentication error");
            }
            AppError::Store(e) => {
                tracing::error!(request_id = request_id, error = %e, "Store error");
            }
            AppError::Config(msg) | AppError::Internal(msg) => {
                tracing::error!(request_id = request_id, error = %msg, "Internal error");
            }
        }
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let request_id = uuid::Uuid::new_v4().to_string();
        self.log_error(&request_id);

        let (status, body) = <Self as ErrorHandler>::error_response(self, &request_id);
        HttpResponse::build(status).json(body)
    }

    fn status_code(&self) -> StatusCode {
        self.classify().0
    }
}

/// ============================================================================
/// 5. ERROR CONTEXT
/// ============================================================================

/// Per-operation context attached to log events
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub request_id: String,
    pub operation: &'static str,
}

impl ErrorContext {
    pub fn new(operation: &'static str) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            operation,
        }
    }

    /// Logs the error under this context and hands it back for `?` chaining
    pub fn record(&self, error: AppError) -> AppError {
        match &error {
            AppError::Store(_) | AppError::Config(_) | AppError::Internal(_) => {
                tracing::error!(
                    request_id = %self.request_id,
                    operation = self.operation,
                    error = %error,
                    "Operation failed"
                );
            }
            _ => {
                tracing::debug!(
                    request_id = %self.request_id,
                    operation = self.operation,
                    error = %error,
                    "Operation rejected"
                );
            }
        }
        error
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display() {
        let err = ValidationError::EmptyField("email".to_string());
        assert_eq!(err.to_string(), "email is empty");
    }

    #[test]
    fn test_weak_password_lists_every_violation() {
        let err = ValidationError::WeakPassword(vec![
            PasswordViolation::TooShort { min: 8 },
            PasswordViolation::MissingDigit,
        ]);
        let text = err.to_string();
        assert!(text.contains("at least 8 characters"));
        assert!(text.contains("digit"));
    }

    #[test]
    fn test_hash_error_conversion() {
        let app_err: AppError = HashError::EmptyInput.into();
        assert!(matches!(app_err, AppError::Validation(ValidationError::EmptyField(_))));
    }

    #[test]
    fn test_token_error_conversion() {
        let app_err: AppError = TokenError::Expired.into();
        assert!(matches!(app_err, AppError::Auth(AuthError::TokenExpired)));

        let app_err: AppError = TokenError::InvalidSignature.into();
        assert!(matches!(app_err, AppError::Auth(AuthError::InvalidSignature)));
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AppError::Conflict(ConflictError::EmailExists).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::Auth(AuthError::AccountLocked { remaining_minutes: 3 }).status_code(),
            StatusCode::LOCKED
        );
        assert_eq!(
            AppError::Store(StoreError::Unavailable("down".into())).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_credential_errors_are_uninformative() {
        let (_, body) =
            <AppError as ErrorHandler>::error_response(&AuthError::InvalidCredentials.into(), "id");
        assert_eq!(body.message, "Invalid credentials");
        assert!(body.details.is_none());
    }

    #[test]
    fn test_lockout_response_carries_remaining_minutes() {
        let err: AppError = AuthError::AccountLocked { remaining_minutes: 7 }.into();
        let (status, body) = <AppError as ErrorHandler>::error_response(&err, "req-1");
        assert_eq!(status, StatusCode::LOCKED);
        assert_eq!(body.error_id, "req-1");
        assert_eq!(body.details, Some(serde_json::json!({ "remaining_minutes": 7 })));
    }
}
