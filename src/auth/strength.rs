/// Password Strength Validation
///
/// Rule checks and the advisory strength score are both derived from one
/// `CharacterProfile`, so the two never disagree about what the password holds.
/// Every unmet rule is reported; nothing short-circuits.

use serde::Serialize;
use std::fmt;

pub const MIN_PASSWORD_LENGTH: usize = 8;
/// bcrypt only reads the first 72 bytes of its input
pub const MAX_PASSWORD_BYTES: usize = 72;
const STRONG_LENGTH: usize = 12;

/// Characters that satisfy the special-character rule
pub const SPECIAL_CHARACTERS: &str = "!@#$%^&*()_+-=[]{}|;:,.<>?";

/// A single unmet password requirement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum PasswordViolation {
    TooShort { min: usize },
    TooLong { max: usize },
    MissingUppercase,
    MissingLowercase,
    MissingDigit,
    MissingSpecial,
}

impl fmt::Display for PasswordViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PasswordViolation::TooShort { min } => {
                write!(f, "must be at least {} characters long", min)
            }
            PasswordViolation::TooLong { max } => {
                write!(f, "must be at most {} bytes long", max)
            }
            PasswordViolation::MissingUppercase => write!(f, "must contain an uppercase letter"),
            PasswordViolation::MissingLowercase => write!(f, "must contain a lowercase letter"),
            PasswordViolation::MissingDigit => write!(f, "must contain a digit"),
            PasswordViolation::MissingSpecial => {
                write!(f, "must contain one of {}", SPECIAL_CHARACTERS)
            }
        }
    }
}

/// Outcome of a strength check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PasswordValidation {
    pub valid: bool,
    pub violations: Vec<PasswordViolation>,
    /// Advisory score in 0..=6, not a gate
    pub score: u8,
}

/// Character-class counts gathered in a single pass
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct CharacterProfile {
    length: usize,
    bytes: usize,
    uppercase: usize,
    lowercase: usize,
    digits: usize,
    special: usize,
}

impl CharacterProfile {
    fn classify(password: &str) -> Self {
        let mut profile = CharacterProfile {
            bytes: password.len(),
            ..CharacterProfile::default()
        };
        for c in password.chars() {
            profile.length += 1;
            if c.is_uppercase() {
                profile.uppercase += 1;
            } else if c.is_lowercase() {
                profile.lowercase += 1;
            } else if c.is_ascii_digit() {
                profile.digits += 1;
            } else if SPECIAL_CHARACTERS.contains(c) {
                profile.special += 1;
            }
        }
        profile
    }

    fn violations(&self) -> Vec<PasswordViolation> {
        let mut violations = Vec::new();
        if self.length < MIN_PASSWORD_LENGTH {
            violations.push(PasswordViolation::TooShort { min: MIN_PASSWORD_LENGTH });
        }
        if self.bytes > MAX_PASSWORD_BYTES {
            violations.push(PasswordViolation::TooLong { max: MAX_PASSWORD_BYTES });
        }
        if self.uppercase == 0 {
            violations.push(PasswordViolation::MissingUppercase);
        }
        if self.lowercase == 0 {
            violations.push(PasswordViolation::MissingLowercase);
        }
        if self.digits == 0 {
            violations.push(PasswordViolation::MissingDigit);
        }
        if self.special == 0 {
            violations.push(PasswordViolation::MissingSpecial);
        }
        violations
    }

    fn score(&self) -> u8 {
        [
            self.length >= MIN_PASSWORD_LENGTH,
            self.length >= STRONG_LENGTH,
            self.uppercase > 0,
            self.lowercase > 0,
            self.digits > 0,
            self.special > 0,
        ]
        .iter()
        .filter(|met| **met)
        .count() as u8
    }
}

/// Rule-based password acceptance
#[derive(Debug, Default, Clone, Copy)]
pub struct PasswordStrengthValidator;

impl PasswordStrengthValidator {
    pub fn new() -> Self {
        Self
    }

    pub fn validate(&self, password: &str) -> PasswordValidation {
        let profile = CharacterProfile::classify(password);
        let violations = profile.violations();
        PasswordValidation {
            valid: violations.is_empty(),
            violations,
            score: profile.score(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validate(password: &str) -> PasswordValidation {
        PasswordStrengthValidator::new().validate(password)
    }

    #[test]
    fn test_valid_password() {
        let result = validate("Abc123!@");
        assert!(result.valid);
        assert!(result.violations.is_empty());
        assert_eq!(result.score, 5);
    }

    #[test]
    fn test_reports_every_violation_at_once() {
        let result = validate("abc");
        assert!(!result.valid);
        assert_eq!(
            result.violations,
            vec![
                PasswordViolation::TooShort { min: 8 },
                PasswordViolation::MissingUppercase,
                PasswordViolation::MissingDigit,
                PasswordViolation::MissingSpecial,
            ]
        );
    }

    #[test]
    fn test_empty_password() {
        let result = validate("");
        assert!(!result.valid);
        assert_eq!(result.violations.len(), 5);
        assert_eq!(result.score, 0);
    }

    #[test]
    fn test_missing_special() {
        let result = validate("ValidPassword123");
        assert_eq!(result.violations, vec![PasswordViolation::MissingSpecial]);
    }

    #[test]
    fn test_too_long_password() {
        let long_password = "Aa1!".repeat(19);
        let result = validate(&long_password);
        assert_eq!(
            result.violations,
            vec![PasswordViolation::TooLong { max: MAX_PASSWORD_BYTES }]
        );
    }

    #[test]
    fn test_byte_limit_boundary() {
        let at_limit = format!("Aa1!{}", "x".repeat(68));
        assert_eq!(at_limit.len(), 72);
        assert!(validate(&at_limit).valid);

        let over_limit = format!("{}y", at_limit);
        assert!(!validate(&over_limit).valid);
    }

    #[test]
    fn test_multibyte_characters_count_toward_byte_limit() {
        // 40 characters, 76 bytes
        let password = format!("Aa1!{}", "é".repeat(36));
        assert_eq!(password.chars().count(), 40);
        assert_eq!(
            validate(&password).violations,
            vec![PasswordViolation::TooLong { max: MAX_PASSWORD_BYTES }]
        );
    }

    #[test]
    fn test_non_listed_symbol_is_not_special() {
        let result = validate("Abcdefg1~");
        assert_eq!(result.violations, vec![PasswordViolation::MissingSpecial]);
    }

    #[test]
    fn test_score_rewards_length_and_diversity() {
        assert_eq!(validate("abcdefgh").score, 2);
        assert_eq!(validate("Abcdefgh1!xyz").score, 6);
        assert!(validate("Abc123!@").score < validate("Abc123!@wxyz").score);
    }

    #[test]
    fn test_minimum_length_counts_characters() {
        let result = validate("Ünïcödé1!");
        assert!(result.valid);
    }
}
