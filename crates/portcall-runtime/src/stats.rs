//! Dispatch counters.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct DispatchStats {
    pub calls_async: AtomicU64,
    pub calls_sync: AtomicU64,
    pub calls_stream: AtomicU64,
    /// Deliveries that resolved a pending async call
    pub delivered_completed: AtomicU64,
    /// Deliveries queued on a broadcast port
    pub delivered_queued: AtomicU64,
    /// Deliveries to retired, closed or unknown ports
    pub delivered_dropped: AtomicU64,
    pub callbacks_invoked: AtomicU64,
    pub callbacks_failed: AtomicU64,
    pub sync_buffers_freed: AtomicU64,
}

/// Point-in-time copy of `DispatchStats`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub calls_async: u64,
    pub calls_sync: u64,
    pub calls_stream: u64,
    pub delivered_completed: u64,
    pub delivered_queued: u64,
    pub delivered_dropped: u64,
    pub callbacks_invoked: u64,
    pub callbacks_failed: u64,
    pub sync_buffers_freed: u64,
}

#[inline]
pub(crate) fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

impl DispatchStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        let get = |c: &AtomicU64| c.load(Ordering::Relaxed);
        StatsSnapshot {
            calls_async: get(&self.calls_async),
            calls_sync: get(&self.calls_sync),
            calls_stream: get(&self.calls_stream),
            delivered_completed: get(&self.delivered_completed),
            delivered_queued: get(&self.delivered_queued),
            delivered_dropped: get(&self.delivered_dropped),
            callbacks_invoked: get(&self.callbacks_invoked),
            callbacks_failed: get(&self.callbacks_failed),
            sync_buffers_freed: get(&self.sync_buffers_freed),
        }
    }

    pub fn record_call_async(&self) {
        bump(&self.calls_async);
    }

    pub fn record_call_sync(&self) {
        bump(&self.calls_sync);
    }

    pub fn record_call_stream(&self) {
        bump(&self.calls_stream);
    }

    pub fn record_callback(&self, ok: bool) {
        if ok {
            bump(&self.callbacks_invoked);
        } else {
            bump(&self.callbacks_failed);
        }
    }

    pub fn record_sync_free(&self) {
        bump(&self.sync_buffers_freed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot() {
        let stats = DispatchStats::default();
        stats.record_call_async();
        stats.record_call_async();
        stats.record_callback(false);
        stats.record_sync_free();
        let snap = stats.snapshot();
        assert_eq!(snap.calls_async, 2);
        assert_eq!(snap.callbacks_failed, 1);
        assert_eq!(snap.callbacks_invoked, 0);
        assert_eq!(snap.sync_buffers_freed, 1);
    }
}
