//! Bounded lock acquisition.
//!
//! Store operations never block on external IO, so contention windows are
//! short; a bounded spin with a small sleep is enough to turn a wedged lock
//! into a `Timeout` error instead of a hang.

use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::error::LedgerError;

const RETRY_INTERVAL: Duration = Duration::from_millis(1);

/// Acquire `mutex` within `timeout`, or fail with `LedgerError::Timeout`.
///
/// A poisoned mutex surfaces as `LedgerError::Internal`; the stores treat
/// poisoning as fatal for the guarded record rather than ignoring it.
pub fn lock_with_timeout<'a, T>(
    mutex: &'a Mutex<T>,
    timeout: Duration,
    what: &str,
) -> Result<MutexGuard<'a, T>, LedgerError> {
    let deadline = Instant::now() + timeout;
    loop {
        match mutex.try_lock() {
            Ok(guard) => return Ok(guard),
            Err(std::sync::TryLockError::Poisoned(_)) => {
                return Err(LedgerError::internal(format!("{what}: lock poisoned")));
            }
            Err(std::sync::TryLockError::WouldBlock) => {
                if Instant::now() >= deadline {
                    return Err(LedgerError::timeout(what.to_string()));
                }
                std::thread::sleep(RETRY_INTERVAL);
            }
        }
    }
}
