/// Authentication module
///
/// Password hashing and strength rules, the account lockout state machine,
/// session token issuance/verification, and the orchestrator composing them.

mod claims;
mod jwt;
mod lockout;
mod password;
mod reset_token;
mod service;
mod strength;

pub use claims::Claims;
pub use jwt::{IssuedToken, SessionTokenService, VerifiedToken};
pub use lockout::{
    AccountState, LockoutPolicy, LockoutState, LockoutTransition, DEFAULT_LOCKOUT_MINUTES,
    DEFAULT_LOCKOUT_THRESHOLD,
};
pub use password::PasswordHasher;
pub use reset_token::{generate_reset_token, hash_token};
pub use service::{AuthDependencies, AuthService, LoginResponse, RegisteredAccount};
pub use strength::{
    PasswordStrengthValidator, PasswordValidation, PasswordViolation, MAX_PASSWORD_BYTES,
    MIN_PASSWORD_LENGTH, SPECIAL_CHARACTERS,
};
