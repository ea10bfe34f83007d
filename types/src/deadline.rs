//! Per-request deadlines.
//!
//! A handler checks its deadline before committing. An expired deadline aborts
//! the enclosing store transaction, so balances and share counts revert.

use crate::error::CoreError;
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug)]
pub struct Deadline {
    at: Option<Instant>,
}

impl Deadline {
    /// Deadline `timeout` from now.
    pub fn after(timeout: Duration) -> Self {
        Self {
            at: Instant::now().checked_add(timeout),
        }
    }

    /// A deadline that never expires (background jobs, tests).
    pub fn unbounded() -> Self {
        Self { at: None }
    }

    pub fn is_expired(&self) -> bool {
        matches!(self.at, Some(at) if Instant::now() >= at)
    }

    /// Time left, or `None` when unbounded.
    pub fn remaining(&self) -> Option<Duration> {
        self.at.map(|at| at.saturating_duration_since(Instant::now()))
    }

    /// Fail with [`CoreError::DeadlineExceeded`] once expired.
    pub fn check(&self) -> Result<(), CoreError> {
        if self.is_expired() {
            Err(CoreError::DeadlineExceeded)
        } else {
            Ok(())
        }
    }

    /// The tighter of this deadline and `timeout` from now.
    pub fn min_timeout(&self, timeout: Duration) -> Duration {
        match self.remaining() {
            Some(left) => left.min(timeout),
            None => timeout,
        }
    }
}

impl Default for Deadline {
    fn default() -> Self {
        Self::unbounded()
    }
}
