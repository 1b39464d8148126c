/// Password Hashing and Verification
///
/// bcrypt digests are self-describing (`$2b$<cost>$<salt+hash>`), so nothing
/// besides the digest string has to be stored.

use bcrypt::{hash, verify, DEFAULT_COST};

use crate::auth::strength::MAX_PASSWORD_BYTES;
use crate::error::HashError;

const MIN_COST: u32 = 4;
const MAX_COST: u32 = 31;

/// One-way hashing of plaintext credentials with a configurable bcrypt cost
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    cost: u32,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new(DEFAULT_COST)
    }
}

impl PasswordHasher {
    /// `cost` is clamped to bcrypt's accepted range (4..=31)
    pub fn new(cost: u32) -> Self {
        Self {
            cost: cost.clamp(MIN_COST, MAX_COST),
        }
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }

    /// Hash a password with a fresh random salt
    ///
    /// # Errors
    /// - `HashError::EmptyInput` for an empty password
    /// - `HashError::TooLong` past 72 bytes, which bcrypt would silently drop
    /// - `HashError::Backend` if bcrypt fails
    pub fn hash(&self, password: &str) -> Result<String, HashError> {
        if password.is_empty() {
            return Err(HashError::EmptyInput);
        }
        if password.len() > MAX_PASSWORD_BYTES {
            return Err(HashError::TooLong(MAX_PASSWORD_BYTES));
        }

        hash(password, self.cost).map_err(|e| HashError::Backend(e.to_string()))
    }

    /// Verify a password against a digest
    ///
    /// Never fails: malformed digests, empty or over-long inputs and
    /// mismatches all read as `false`.
    pub fn verify(&self, digest: &str, password: &str) -> bool {
        if digest.is_empty() || password.is_empty() || password.len() > MAX_PASSWORD_BYTES {
            return false;
        }
        verify(password, digest).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hasher() -> PasswordHasher {
        PasswordHasher::new(4)
    }

    #[test]
    fn test_hash_password() {
        let password = "ValidPassword123!";
        let digest = hasher().hash(password).expect("Failed to hash password");

        assert_ne!(password, digest);
        assert!(digest.starts_with("$2b$04$"));
    }

    #[test]
    fn test_verify_password() {
        let digest = hasher().hash("ValidPassword123!").expect("Failed to hash password");
        assert!(hasher().verify(&digest, "ValidPassword123!"));
    }

    #[test]
    fn test_verify_wrong_password() {
        let digest = hasher().hash("ValidPassword123!").expect("Failed to hash password");
        assert!(!hasher().verify(&digest, "WrongPassword123!"));
    }

    #[test]
    fn test_same_password_hashes_differently() {
        let first = hasher().hash("Repeat123!").unwrap();
        let second = hasher().hash("Repeat123!").unwrap();

        assert_ne!(first, second);
        assert!(hasher().verify(&first, "Repeat123!"));
        assert!(hasher().verify(&second, "Repeat123!"));
    }

    #[test]
    fn test_empty_password_rejected() {
        assert_eq!(hasher().hash(""), Err(HashError::EmptyInput));
    }

    #[test]
    fn test_verify_never_fails_on_bad_input() {
        let digest = hasher().hash("Something1!").unwrap();
        assert!(!hasher().verify("not-a-bcrypt-digest", "Something1!"));
        assert!(!hasher().verify("", "Something1!"));
        assert!(!hasher().verify(&digest, ""));
        assert!(!hasher().verify("$2b$04$short", "Something1!"));
    }

    #[test]
    fn test_passwords_sharing_72_byte_prefix_do_not_match() {
        let first = format!("Aa1!{}", "x".repeat(68));
        let second = format!("{}Z", first);

        let digest = hasher().hash(&first).unwrap();
        assert!(hasher().verify(&digest, &first));
        assert!(!hasher().verify(&digest, &second));
        assert_eq!(hasher().hash(&second), Err(HashError::TooLong(72)));
    }

    #[test]
    fn test_cost_is_clamped() {
        assert_eq!(PasswordHasher::new(1).cost(), MIN_COST);
        assert_eq!(PasswordHasher::default().cost(), DEFAULT_COST);
    }
}
