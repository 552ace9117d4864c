//! One-shot completion primitive.
//!
//! `completion()` returns a `Completer` (write side, held by the registry)
//! and a `Completion` (read side, held by the caller). The value is written
//! at most once: `Completer::complete` consumes the completer. Dropping an
//! unused completer marks the completion abandoned, which is how context
//! teardown releases waiting callers.
//!
//! The read side can be consumed either by blocking (`wait`,
//! `wait_timeout`) or by polling it as a `Future`.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Condvar, Mutex};
use std::task::{Context, Poll, Waker};
use std::time::{Duration, Instant};

use crate::sync::lock;

/// The completer was dropped without delivering a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Abandoned;

impl fmt::Display for Abandoned {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "completion abandoned")
    }
}

impl std::error::Error for Abandoned {}

/// Why a bounded wait returned without a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitError {
    Abandoned,
    TimedOut,
}

enum Slot<T> {
    Pending(Option<Waker>),
    Ready(T),
    Taken,
    Abandoned,
}

struct Shared<T> {
    slot: Mutex<Slot<T>>,
    ready: Condvar,
}

impl<T> Shared<T> {
    fn settle(&self, next: Slot<T>) {
        let waker = {
            let mut slot = lock(&self.slot);
            match std::mem::replace(&mut *slot, next) {
                Slot::Pending(waker) => waker,
                // Already settled: keep the first outcome.
                prev => {
                    *slot = prev;
                    return;
                }
            }
        };
        self.ready.notify_all();
        if let Some(w) = waker {
            w.wake();
        }
    }
}

/// Write side of a completion.
pub struct Completer<T> {
    shared: Option<Arc<Shared<T>>>,
}

/// Read side of a completion.
pub struct Completion<T> {
    shared: Arc<Shared<T>>,
}

/// Create a linked completer/completion pair.
pub fn completion<T>() -> (Completer<T>, Completion<T>) {
    let shared = Arc::new(Shared {
        slot: Mutex::new(Slot::Pending(None)),
        ready: Condvar::new(),
    });
    (
        Completer {
            shared: Some(Arc::clone(&shared)),
        },
        Completion { shared },
    )
}

impl<T> Completer<T> {
    /// Deliver the value and wake the reader.
    pub fn complete(mut self, value: T) {
        if let Some(shared) = self.shared.take() {
            shared.settle(Slot::Ready(value));
        }
    }
}

impl<T> Drop for Completer<T> {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.take() {
            shared.settle(Slot::Abandoned);
        }
    }
}

impl<T> Completion<T> {
    /// Has an outcome (value or abandonment) been recorded?
    pub fn is_settled(&self) -> bool {
        !matches!(*lock(&self.shared.slot), Slot::Pending(_))
    }

    /// Take the value if it has arrived. `None` while still pending.
    pub fn try_take(&self) -> Option<Result<T, Abandoned>> {
        let mut slot = lock(&self.shared.slot);
        take_settled(&mut slot)
    }

    /// Block the calling thread until the value arrives.
    pub fn wait(self) -> Result<T, Abandoned> {
        let mut slot = lock(&self.shared.slot);
        loop {
            if let Some(outcome) = take_settled(&mut slot) {
                return outcome;
            }
            slot = self
                .shared
                .ready
                .wait(slot)
                .unwrap_or_else(|e| e.into_inner());
        }
    }

    /// Block for at most `timeout`.
    pub fn wait_timeout(&self, timeout: Duration) -> Result<T, WaitError> {
        let deadline = Instant::now() + timeout;
        let mut slot = lock(&self.shared.slot);
        loop {
            if let Some(outcome) = take_settled(&mut slot) {
                return outcome.map_err(|_| WaitError::Abandoned);
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(WaitError::TimedOut);
            }
            slot = self
                .shared
                .ready
                .wait_timeout(slot, deadline - now)
                .unwrap_or_else(|e| e.into_inner())
                .0;
        }
    }
}

fn take_settled<T>(slot: &mut Slot<T>) -> Option<Result<T, Abandoned>> {
    match slot {
        Slot::Pending(_) => None,
        Slot::Abandoned | Slot::Taken => Some(Err(Abandoned)),
        Slot::Ready(_) => match std::mem::replace(slot, Slot::Taken) {
            Slot::Ready(v) => Some(Ok(v)),
            _ => unreachable!(),
        },
    }
}

impl<T> Future for Completion<T> {
    type Output = Result<T, Abandoned>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut slot = lock(&self.shared.slot);
        if let Some(outcome) = take_settled(&mut slot) {
            return Poll::Ready(outcome);
        }
        *slot = Slot::Pending(Some(cx.waker().clone()));
        Poll::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::task::Wake;
    use std::thread;

    struct CountingWaker(AtomicUsize);

    impl Wake for CountingWaker {
        fn wake(self: Arc<Self>) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_complete_then_wait() {
        let (tx, rx) = completion();
        tx.complete(5);
        assert!(rx.is_settled());
        assert_eq!(rx.wait(), Ok(5));
    }

    #[test]
    fn test_complete_from_other_thread() {
        let (tx, rx) = completion();
        let h = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            tx.complete("done");
        });
        assert_eq!(rx.wait(), Ok("done"));
        h.join().unwrap();
    }

    #[test]
    fn test_drop_completer_abandons() {
        let (tx, rx) = completion::<i32>();
        drop(tx);
        assert_eq!(rx.wait(), Err(Abandoned));
    }

    #[test]
    fn test_wait_timeout() {
        let (_tx, rx) = completion::<i32>();
        assert_eq!(rx.wait_timeout(Duration::from_millis(5)), Err(WaitError::TimedOut));
        assert!(rx.try_take().is_none());
    }

    #[test]
    fn test_value_taken_once() {
        let (tx, rx) = completion();
        tx.complete(1);
        assert_eq!(rx.try_take(), Some(Ok(1)));
        assert_eq!(rx.try_take(), Some(Err(Abandoned)));
    }

    #[test]
    fn test_future_wakes_on_complete() {
        let (tx, mut rx) = completion();
        let counter = Arc::new(CountingWaker(AtomicUsize::new(0)));
        let waker = Waker::from(Arc::clone(&counter));
        let mut cx = Context::from_waker(&waker);

        assert!(Pin::new(&mut rx).poll(&mut cx).is_pending());
        tx.complete(9);
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
        assert_eq!(Pin::new(&mut rx).poll(&mut cx), Poll::Ready(Ok(9)));
    }
}
