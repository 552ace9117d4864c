//! Lock helpers.

use std::sync::{Mutex, MutexGuard};

/// Lock a mutex, recovering the guard if a holder panicked.
///
/// Every critical section in this crate leaves its data consistent
/// before running user code, so poisoning carries no information here.
#[inline]
pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}
