//! Managed-loop wake-up.
//!
//! Native threads call `notify()` after every accepted delivery; the
//! managed loop blocks in `wait()` between pumps. Multiple notifications
//! before the loop wakes are coalesced into one wake-up.
//!
//! # Implementors
//!
//! - `EventFdNotifier` (Linux default): an eventfd counter. The fd can be
//!   registered with an external epoll/poll loop through `raw_fd()`.
//! - `CondvarNotifier` (portable fallback): a counter behind a condvar.

use std::time::Duration;

use portcall_core::error::Result;

use crate::config::NotifierKind;

mod condvar;
pub use condvar::CondvarNotifier;

cfg_if::cfg_if! {
    if #[cfg(target_os = "linux")] {
        mod eventfd;
        pub use eventfd::EventFdNotifier;
    }
}

/// Wakes the managed loop when deliveries are available.
///
/// **Contract:**
/// - `notify()` must never block.
/// - `wait()` returns `Ok(true)` if at least one notification arrived
///   since the previous `wait()`, `Ok(false)` on timeout.
pub trait Notifier: Send + Sync {
    fn notify(&self) -> Result<()>;

    fn wait(&self, timeout: Duration) -> Result<bool>;

    /// Pollable descriptor, if this notifier has one.
    fn raw_fd(&self) -> Option<i32> {
        None
    }
}

/// Build the notifier selected by the configuration.
pub fn create(kind: NotifierKind) -> Result<Box<dyn Notifier>> {
    match kind {
        NotifierKind::Condvar => Ok(Box::new(CondvarNotifier::new())),
        NotifierKind::EventFd => create_eventfd(),
    }
}

cfg_if::cfg_if! {
    if #[cfg(target_os = "linux")] {
        fn create_eventfd() -> Result<Box<dyn Notifier>> {
            Ok(Box::new(EventFdNotifier::create()?))
        }
    } else {
        fn create_eventfd() -> Result<Box<dyn Notifier>> {
            portcall_core::log_warn!("eventfd notifier unavailable on this platform, using condvar");
            Ok(Box::new(CondvarNotifier::new()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn exercise(n: Arc<dyn Notifier>) {
        // nothing pending
        assert!(!n.wait(Duration::from_millis(5)).unwrap());

        // coalesced
        n.notify().unwrap();
        n.notify().unwrap();
        assert!(n.wait(Duration::from_millis(5)).unwrap());
        assert!(!n.wait(Duration::from_millis(5)).unwrap());

        // cross-thread wake
        let other = Arc::clone(&n);
        let h = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            other.notify().unwrap();
        });
        assert!(n.wait(Duration::from_secs(5)).unwrap());
        h.join().unwrap();
    }

    #[test]
    fn test_condvar_notifier() {
        exercise(Arc::from(create(NotifierKind::Condvar).unwrap()));
    }

    #[test]
    fn test_eventfd_notifier() {
        let n: Arc<dyn Notifier> = Arc::from(create(NotifierKind::EventFd).unwrap());
        #[cfg(target_os = "linux")]
        assert!(n.raw_fd().is_some());
        exercise(n);
    }
}
