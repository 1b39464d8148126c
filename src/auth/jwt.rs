/// Session Token Service
///
/// Mints and verifies HS256-signed session tokens. Verification is stateless:
/// it needs only the server secret and the clock.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{crypto, decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use crate::auth::claims::Claims;
use crate::clock::Clock;
use crate::configuration::TokenSettings;
use crate::error::TokenError;

const ALGORITHM: Algorithm = Algorithm::HS256;

/// A freshly minted token and the times baked into it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub token: String,
    pub session_id: Uuid,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Identity recovered from a valid token
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct VerifiedToken {
    pub account_id: Uuid,
    pub email: String,
    pub session_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct SessionTokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl SessionTokenService {
    pub fn new(settings: &TokenSettings, clock: Arc<dyn Clock>) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(settings.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(settings.secret.as_bytes()),
            issuer: settings.issuer.clone(),
            ttl: Duration::seconds(settings.session_ttl_seconds),
            clock,
        }
    }

    /// Issue a token for a new session
    pub fn issue(&self, account_id: Uuid, email: &str) -> Result<IssuedToken, TokenError> {
        self.issue_for_session(Uuid::new_v4(), account_id, email)
    }

    /// Issue a token bound to a known session ID
    pub fn issue_for_session(
        &self,
        session_id: Uuid,
        account_id: Uuid,
        email: &str,
    ) -> Result<IssuedToken, TokenError> {
        // Claims carry whole seconds; truncate so the returned times match them
        let now = self.clock.now();
        let issued_at = DateTime::from_timestamp(now.timestamp(), 0).unwrap_or(now);
        let claims = Claims::new(account_id, email, session_id, issued_at, self.ttl, &self.issuer);

        let token = encode(&Header::new(ALGORITHM), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Encoding(e.to_string()))?;

        Ok(IssuedToken {
            token,
            session_id,
            issued_at,
            expires_at: issued_at + self.ttl,
        })
    }

    /// Verify integrity, then parse, then check expiry against the clock
    ///
    /// # Errors
    /// - `TokenError::Malformed` if the token is not three dot-separated parts
    ///   or its payload cannot be parsed
    /// - `TokenError::InvalidSignature` if the signature does not match the
    ///   header and payload, or the token was minted for another issuer
    /// - `TokenError::Expired` if the expiry claim is not in the future
    pub fn verify(&self, token: &str) -> Result<VerifiedToken, TokenError> {
        let (message, signature) = token.rsplit_once('.').ok_or(TokenError::Malformed)?;
        if signature.is_empty() || message.split('.').count() != 2 {
            return Err(TokenError::Malformed);
        }

        // Signature first, so a tampered header or payload reads as tampering
        let signature_ok = crypto::verify(signature, message.as_bytes(), &self.decoding_key, ALGORITHM)
            .map_err(|_| TokenError::Malformed)?;
        if !signature_ok {
            tracing::debug!("Session token signature mismatch");
            return Err(TokenError::InvalidSignature);
        }

        let mut validation = Validation::new(ALGORITHM);
        validation.validate_exp = false;
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["exp", "sub", "iss"]);

        let claims = decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::warn!("Session token rejected: {}", e);
                match e.kind() {
                    jsonwebtoken::errors::ErrorKind::InvalidSignature
                    | jsonwebtoken::errors::ErrorKind::InvalidIssuer => TokenError::InvalidSignature,
                    _ => TokenError::Malformed,
                }
            })?;

        if claims.is_expired(self.clock.now()) {
            return Err(TokenError::Expired);
        }

        Ok(VerifiedToken {
            account_id: claims.account_id()?,
            email: claims.email.clone(),
            session_id: claims.session_id()?,
            expires_at: claims.expires_at()?,
        })
    }
}
