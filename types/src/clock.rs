//! Time source abstraction.
//!
//! Engines read the current time through [`Clock`] so tests can drive time
//! deterministically (see `chama-nullables::NullClock`).

use crate::time::Timestamp;

pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Wall-clock time.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}
