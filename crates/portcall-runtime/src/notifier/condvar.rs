//! `CondvarNotifier`: portable `Notifier` implementation.

use std::sync::{Condvar, Mutex};
use std::time::Duration;

use portcall_core::error::Result;

use super::Notifier;
use crate::sync::lock;

#[derive(Default)]
pub struct CondvarNotifier {
    pending: Mutex<u64>,
    signal: Condvar,
}

impl CondvarNotifier {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Notifier for CondvarNotifier {
    fn notify(&self) -> Result<()> {
        *lock(&self.pending) += 1;
        self.signal.notify_all();
        Ok(())
    }

    fn wait(&self, timeout: Duration) -> Result<bool> {
        let guard = lock(&self.pending);
        let (mut pending, _) = self
            .signal
            .wait_timeout_while(guard, timeout, |p| *p == 0)
            .unwrap_or_else(|e| e.into_inner());
        let fired = *pending > 0;
        *pending = 0;
        Ok(fired)
    }
}
