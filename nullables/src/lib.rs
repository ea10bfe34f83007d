//! Nullable infrastructure for deterministic testing.
//!
//! Every external dependency of the engines (storage, clock, conferencing,
//! notifications, calendar) sits behind a trait. This crate provides
//! test-friendly implementations that:
//! - Return deterministic values
//! - Can be controlled programmatically
//! - Never touch the filesystem or network
//!
//! Usage: swap real implementations for nullables in tests.

pub mod calendar;
pub mod clock;
pub mod conferencing;
pub mod notify;
pub mod store;

pub use calendar::NullCalendar;
pub use clock::NullClock;
pub use conferencing::NullConferencing;
pub use notify::NullNotifier;
pub use store::MemoryStore;

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock a mutex, recovering the data if a panicking test poisoned it.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
