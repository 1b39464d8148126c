/// Account Lockout State Machine
///
/// Pure transitions over the stored lockout fields plus a clock reading.
/// Stores apply a transition inside the same critical section as the read
/// that produced its input, so each login attempt is one atomic write.
///
/// ```text
/// active --fail (n+1 < threshold)--> active  (n+1)
/// active --fail (n+1 = threshold)--> locked  (until = now + duration)
/// locked --now >= until-----------> active  (derived, no write)
/// any    --success----------------> active  (0, until cleared)
/// ```

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_LOCKOUT_THRESHOLD: u32 = 5;
pub const DEFAULT_LOCKOUT_MINUTES: i64 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountState {
    Active,
    Locked,
}

impl AccountState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountState::Active => "active",
            AccountState::Locked => "locked",
        }
    }
}

impl fmt::Display for AccountState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(AccountState::Active),
            "locked" => Ok(AccountState::Locked),
            other => Err(format!("unknown account state '{}'", other)),
        }
    }
}

/// The persisted inputs of the state machine
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LockoutState {
    pub failed_attempts: u32,
    pub locked_until: Option<DateTime<Utc>>,
}

impl LockoutState {
    /// Locked iff an expiry is set and still in the future
    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        matches!(self.locked_until, Some(until) if until > now)
    }

    pub fn state(&self, now: DateTime<Utc>) -> AccountState {
        if self.is_locked(now) {
            AccountState::Locked
        } else {
            AccountState::Active
        }
    }

    /// Stored fields still describe a lock that has already elapsed
    pub fn has_stale_lock(&self, now: DateTime<Utc>) -> bool {
        matches!(self.locked_until, Some(until) if until <= now)
    }

    /// Whole minutes left on the lock, rounded up; `None` when not locked
    pub fn remaining_minutes(&self, now: DateTime<Utc>) -> Option<i64> {
        match self.locked_until {
            Some(until) if until > now => {
                let millis = (until - now).num_milliseconds();
                Some(((millis + 59_999) / 60_000).max(1))
            }
            _ => None,
        }
    }
}

/// Result of applying a failed login to a `LockoutState`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockoutTransition {
    /// Counter incremented, still below the threshold
    Counted(LockoutState),
    /// Counter reached the threshold on this attempt
    Locked(LockoutState),
    /// The account was already locked when the attempt was applied
    AlreadyLocked(LockoutState),
}

impl LockoutTransition {
    pub fn state(&self) -> LockoutState {
        match self {
            LockoutTransition::Counted(s)
            | LockoutTransition::Locked(s)
            | LockoutTransition::AlreadyLocked(s) => *s,
        }
    }

    /// Whether the stored fields must be rewritten
    pub fn changed(&self) -> bool {
        !matches!(self, LockoutTransition::AlreadyLocked(_))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LockoutPolicy {
    threshold: u32,
    duration: Duration,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self::new(
            DEFAULT_LOCKOUT_THRESHOLD,
            Duration::minutes(DEFAULT_LOCKOUT_MINUTES),
        )
    }
}

impl LockoutPolicy {
    pub fn new(threshold: u32, duration: Duration) -> Self {
        Self {
            threshold: threshold.max(1),
            duration,
        }
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn on_failed_login(&self, current: LockoutState, now: DateTime<Utc>) -> LockoutTransition {
        // Attempts racing in behind the one that locked must not extend the lock
        if current.is_locked(now) {
            return LockoutTransition::AlreadyLocked(current);
        }

        let previous = if current.has_stale_lock(now) {
            0
        } else {
            current.failed_attempts
        };
        let failed_attempts = previous.saturating_add(1);

        if failed_attempts >= self.threshold {
            LockoutTransition::Locked(LockoutState {
                failed_attempts,
                locked_until: Some(now + self.duration),
            })
        } else {
            LockoutTransition::Counted(LockoutState {
                failed_attempts,
                locked_until: None,
            })
        }
    }

    pub fn on_successful_login(&self) -> LockoutState {
        LockoutState::default()
    }
}
