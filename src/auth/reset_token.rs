/// Opaque token helpers
///
/// Password-reset tokens are cryptographically random 64-character strings.
/// Only their SHA-256 digest is persisted; the same digest keys Session rows
/// so raw bearer tokens never reach the store.

use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use sha2::{Digest, Sha256};

pub const RESET_TOKEN_LENGTH: usize = 64;

/// Generate a new password-reset token
///
/// Returned in plaintext for delivery to the account holder.
pub fn generate_reset_token() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(RESET_TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

/// SHA-256 hex digest used as the storage key for any bearer secret
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}
