//! Bounded-retry guard
//!
//! Automation runs hit task points that are not yet open and have to
//! be retried. The guard caps repeated attempts at one key so a
//! transient condition cannot turn into an unbounded loop; it must be
//! invoked at every such retry point to be effective.

use thiserror::Error;

/// Default attempt cap per tracked key
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

#[derive(Debug, Error)]
pub enum LoopGuardError {
    #[error("Retry limit of {max_attempts} exceeded for '{key}'")]
    LoopExceeded { key: String, max_attempts: u32 },
}

/// Tracks consecutive attempts at a single key
///
/// The counter resets to 1 whenever the key changes; an attempt that
/// would push an unchanged key past `max_attempts` fails instead.
#[derive(Debug)]
pub struct LoopGuard {
    tracked_key: Option<String>,
    attempt_count: u32,
    max_attempts: u32,
}

impl LoopGuard {
    pub fn new() -> Self {
        Self::with_max_attempts(DEFAULT_MAX_ATTEMPTS)
    }

    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            tracked_key: None,
            attempt_count: 0,
            max_attempts,
        }
    }

    /// Record one attempt at `key`, returning the attempt count so far
    pub fn record_attempt(&mut self, key: &str) -> Result<u32, LoopGuardError> {
        if self.tracked_key.as_deref() == Some(key) {
            if self.attempt_count >= self.max_attempts {
                return Err(LoopGuardError::LoopExceeded {
                    key: key.to_string(),
                    max_attempts: self.max_attempts,
                });
            }
            self.attempt_count += 1;
        } else {
            self.tracked_key = Some(key.to_string());
            self.attempt_count = 1;
        }
        Ok(self.attempt_count)
    }

    pub fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    pub fn tracked_key(&self) -> Option<&str> {
        self.tracked_key.as_deref()
    }
}

impl Default for LoopGuard {
    fn default() -> Self {
        Self::new()
    }
}
