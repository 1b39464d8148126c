/// Session token claims
///
/// Payload of a signed session token: account identity plus the standard
/// RFC 7519 time and issuer claims. `jti` is the id of the Session row
/// minted alongside the token.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TokenError;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Subject (account ID as UUID string)
    pub sub: String,
    pub email: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    pub iss: String,
    /// Session ID
    pub jti: String,
}

impl Claims {
    pub fn new(
        account_id: Uuid,
        email: &str,
        session_id: Uuid,
        issued_at: DateTime<Utc>,
        ttl: Duration,
        issuer: &str,
    ) -> Self {
        Self {
            sub: account_id.to_string(),
            email: email.to_string(),
            exp: (issued_at + ttl).timestamp(),
            iat: issued_at.timestamp(),
            iss: issuer.to_string(),
            jti: session_id.to_string(),
        }
    }

    pub fn account_id(&self) -> Result<Uuid, TokenError> {
        Uuid::parse_str(&self.sub).map_err(|_| TokenError::Malformed)
    }

    pub fn session_id(&self) -> Result<Uuid, TokenError> {
        Uuid::parse_str(&self.jti).map_err(|_| TokenError::Malformed)
    }

    pub fn expires_at(&self) -> Result<DateTime<Utc>, TokenError> {
        DateTime::from_timestamp(self.exp, 0).ok_or(TokenError::Malformed)
    }

    /// Usable iff `now` is strictly before the expiry claim
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now.timestamp() >= self.exp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims_at(now: DateTime<Utc>) -> Claims {
        Claims::new(
            Uuid::new_v4(),
            "test@example.com",
            Uuid::new_v4(),
            now,
            Duration::hours(24),
            "test",
        )
    }

    #[test]
    fn test_claims_creation() {
        let now = Utc::now();
        let claims = claims_at(now);

        assert_eq!(claims.email, "test@example.com");
        assert_eq!(claims.iss, "test");
        assert_eq!(claims.exp - claims.iat, 24 * 3600);
        assert!(!claims.is_expired(now));
    }

    #[test]
    fn test_expiry_boundary() {
        let now = Utc::now();
        let claims = claims_at(now);
        let expires_at = claims.expires_at().unwrap();

        assert!(!claims.is_expired(expires_at - Duration::seconds(1)));
        assert!(claims.is_expired(expires_at));
    }

    #[test]
    fn test_id_extraction() {
        let account_id = Uuid::new_v4();
        let session_id = Uuid::new_v4();
        let claims = Claims::new(
            account_id,
            "a@example.com",
            session_id,
            Utc::now(),
            Duration::minutes(5),
            "test",
        );

        assert_eq!(claims.account_id().unwrap(), account_id);
        assert_eq!(claims.session_id().unwrap(), session_id);
    }

    #[test]
    fn test_invalid_account_id() {
        let mut claims = claims_at(Utc::now());
        claims.sub = "invalid-uuid".to_string();

        assert_eq!(claims.account_id(), Err(TokenError::Malformed));
    }
}
