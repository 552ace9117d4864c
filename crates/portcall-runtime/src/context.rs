//! Dispatcher context: owner of every port and registry.
//!
//! One context is created when the native module is loaded and torn down
//! when it is unloaded. Native threads only ever see `NativePort` handles,
//! which hold a weak reference: posting after teardown is a dropped
//! delivery, not a crash.
//!
//! Delivery routing for `post(port, value)`:
//!
//! 1. A pending single-use port: resolve its completion and retire it.
//! 2. An open broadcast port: queue the value in arrival order.
//! 3. Anything else: drop the value and log it.
//!
//! The notifier fires after every accepted delivery.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use portcall_core::error::{BridgeError, Result};
use portcall_core::{log_debug, log_trace, log_warn, PortId, WireObject};

use crate::callback::CallbackTable;
use crate::completion::Completion;
use crate::config::DispatcherConfig;
use crate::names::PortNameRegistry;
use crate::notifier::{self, Notifier};
use crate::port::PortInbox;
use crate::registry::CompletionRegistry;
use crate::stats::{bump, DispatchStats};
use crate::sync::lock;

/// What happened to a posted value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Resolved a pending single-use port.
    Completed,
    /// Queued on an open broadcast port.
    Queued,
    /// No live port had that id; the value was discarded.
    Dropped,
}

struct OpenPort {
    name: String,
    inbox: Arc<PortInbox>,
}

pub struct DispatcherContext {
    config: DispatcherConfig,
    next_port: AtomicI64,
    pending: CompletionRegistry,
    ports: Mutex<HashMap<PortId, OpenPort>>,
    names: PortNameRegistry,
    callbacks: CallbackTable,
    notifier: Box<dyn Notifier>,
    stats: DispatchStats,
    reverse_id: PortId,
    reverse_inbox: Arc<PortInbox>,
    closed: AtomicBool,
}

impl DispatcherContext {
    /// Validate `config`, create the notifier and open the reverse-call port.
    pub fn new(config: DispatcherConfig) -> Result<Arc<Self>> {
        config.validate()?;
        let notifier = notifier::create(config.notifier)?;

        let reverse_id = PortId::new(0);
        let reverse_inbox = Arc::new(PortInbox::new());
        let mut ports = HashMap::new();
        ports.insert(
            reverse_id,
            OpenPort {
                name: config.reverse_port_name.clone(),
                inbox: Arc::clone(&reverse_inbox),
            },
        );

        log_debug!(
            "context up: notifier={} max_pending={} reverse={}",
            config.notifier,
            config.max_pending_calls,
            reverse_id
        );

        Ok(Arc::new(Self {
            pending: CompletionRegistry::new(config.max_pending_calls),
            config,
            next_port: AtomicI64::new(reverse_id.raw() + 1),
            ports: Mutex::new(ports),
            names: PortNameRegistry::new(),
            callbacks: CallbackTable::new(),
            notifier,
            stats: DispatchStats::default(),
            reverse_id,
            reverse_inbox,
            closed: AtomicBool::new(false),
        }))
    }

    fn alloc_port(&self) -> PortId {
        PortId::new(self.next_port.fetch_add(1, Ordering::Relaxed))
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(BridgeError::ContextClosed);
        }
        Ok(())
    }

    /// Open a port that accepts exactly one delivery.
    pub fn open_single_use(self: &Arc<Self>) -> Result<(NativePort, Completion<WireObject>)> {
        self.ensure_open()?;
        let id = self.alloc_port();
        let completion = self.pending.register(id)?;
        // Lost the race with shutdown(): its abandon_all() may have run
        // before the insert above.
        if self.is_closed() {
            self.pending.cancel(id);
            return Err(BridgeError::ContextClosed);
        }
        Ok((self.native_port(id), completion))
    }

    /// Open a broadcast port named after `debug_name`.
    pub fn open_broadcast(self: &Arc<Self>, debug_name: &str) -> Result<BroadcastPort> {
        self.ensure_open()?;
        let id = self.alloc_port();
        let name = self.names.next(debug_name);
        let inbox = Arc::new(PortInbox::new());
        lock(&self.ports).insert(
            id,
            OpenPort {
                name: name.clone(),
                inbox: Arc::clone(&inbox),
            },
        );
        if self.is_closed() {
            self.close_port(id);
            return Err(BridgeError::ContextClosed);
        }
        log_trace!("opened broadcast {} as {}", name, id);
        Ok(BroadcastPort {
            id,
            name,
            inbox,
            ctx: Arc::downgrade(self),
        })
    }

    /// Deliver `value` to `port`. Safe from any thread.
    pub fn post(&self, port: PortId, value: WireObject) -> Delivery {
        if self.is_closed() {
            self.dropped(port, "context closed");
            return Delivery::Dropped;
        }

        let value = match self.pending.resolve(port, value) {
            Ok(()) => {
                bump(&self.stats.delivered_completed);
                self.wake();
                return Delivery::Completed;
            }
            Err(value) => value,
        };

        let inbox = lock(&self.ports).get(&port).map(|p| Arc::clone(&p.inbox));
        if let Some(inbox) = inbox {
            if inbox.push(value) {
                bump(&self.stats.delivered_queued);
                self.wake();
                return Delivery::Queued;
            }
        }

        self.dropped(port, "no live port");
        Delivery::Dropped
    }

    fn wake(&self) {
        if let Err(e) = self.notifier.notify() {
            log_warn!("notifier failed: {}", e);
        }
    }

    fn dropped(&self, port: PortId, why: &str) {
        bump(&self.stats.delivered_dropped);
        let issued = !port.is_none() && port.raw() < self.next_port.load(Ordering::Relaxed);
        if !issued {
            log_warn!("delivery to {} dropped: never issued", port);
        } else if self.config.warn_on_dropped {
            log_warn!("delivery to {} dropped: {}", port, why);
        } else {
            log_trace!("delivery to {} dropped: {}", port, why);
        }
    }

    /// Retire `port`, single-use or broadcast. A pending call on it sees
    /// its completion abandoned. The reverse-call port cannot be closed
    /// this way.
    pub fn close_port(&self, port: PortId) -> bool {
        if port == self.reverse_id {
            return false;
        }
        let removed = lock(&self.ports).remove(&port);
        let was_broadcast = match removed {
            Some(p) => {
                p.inbox.close();
                log_trace!("closed broadcast {} ({})", p.name, port);
                true
            }
            None => false,
        };
        let was_pending = self.pending.cancel(port);
        was_broadcast || was_pending
    }

    /// Whether `port` would accept a delivery right now.
    pub fn is_open(&self, port: PortId) -> bool {
        self.pending.contains(port) || lock(&self.ports).contains_key(&port)
    }

    pub fn port_name(&self, port: PortId) -> Option<String> {
        lock(&self.ports).get(&port).map(|p| p.name.clone())
    }

    /// Async calls still waiting for their delivery.
    pub fn pending_calls(&self) -> usize {
        self.pending.len()
    }

    /// Open broadcast ports, not counting the reverse-call port.
    pub fn open_ports(&self) -> usize {
        let ports = lock(&self.ports);
        ports.len() - usize::from(ports.contains_key(&self.reverse_id))
    }

    pub fn callbacks(&self) -> &CallbackTable {
        &self.callbacks
    }

    /// Handle native code posts reverse calls to.
    pub fn reverse_port(self: &Arc<Self>) -> NativePort {
        self.native_port(self.reverse_id)
    }

    /// Next queued reverse-call message, if any.
    pub fn take_reverse_call(&self) -> Option<WireObject> {
        self.reverse_inbox.try_recv()
    }

    /// Block until a delivery is accepted anywhere or `timeout` passes.
    pub fn wait_for_delivery(&self, timeout: Duration) -> Result<bool> {
        self.notifier.wait(timeout)
    }

    pub fn notifier(&self) -> &dyn Notifier {
        self.notifier.as_ref()
    }

    pub fn stats(&self) -> &DispatchStats {
        &self.stats
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn native_port(self: &Arc<Self>, id: PortId) -> NativePort {
        NativePort {
            id,
            ctx: Arc::downgrade(self),
        }
    }

    /// Tear down: abandon pending calls, close every port, forget every
    /// callback. Idempotent.
    pub fn shutdown(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let abandoned = self.pending.abandon_all();
        let ports: Vec<_> = lock(&self.ports).drain().collect();
        for (_, p) in &ports {
            p.inbox.close();
        }
        self.callbacks.clear();
        self.wake();
        log_debug!(
            "context down: {} pending calls abandoned, {} ports closed",
            abandoned,
            ports.len()
        );
    }
}

impl Drop for DispatcherContext {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for DispatcherContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatcherContext")
            .field("pending_calls", &self.pending_calls())
            .field("open_ports", &self.open_ports())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Port handle given to native code. Cheap to clone, `Send`, and valid
/// after the context is gone (posts are then dropped).
#[derive(Debug, Clone)]
pub struct NativePort {
    id: PortId,
    ctx: Weak<DispatcherContext>,
}

impl NativePort {
    pub fn id(&self) -> PortId {
        self.id
    }

    pub fn post(&self, value: WireObject) -> Delivery {
        match self.ctx.upgrade() {
            Some(ctx) => ctx.post(self.id, value),
            None => {
                log_trace!("delivery to {} dropped: context gone", self.id);
                Delivery::Dropped
            }
        }
    }

    /// True once the port no longer accepts deliveries.
    pub fn is_closed(&self) -> bool {
        self.ctx.upgrade().map_or(true, |ctx| !ctx.is_open(self.id))
    }
}

/// Managed end of a broadcast port. Dropping it closes the port.
pub struct BroadcastPort {
    id: PortId,
    name: String,
    inbox: Arc<PortInbox>,
    ctx: Weak<DispatcherContext>,
}

impl BroadcastPort {
    pub fn id(&self) -> PortId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn native_port(&self) -> NativePort {
        NativePort {
            id: self.id,
            ctx: self.ctx.clone(),
        }
    }

    /// Next value in arrival order. `None` once closed and drained.
    pub fn recv(&self) -> Option<WireObject> {
        self.inbox.recv()
    }

    pub fn try_recv(&self) -> Option<WireObject> {
        self.inbox.try_recv()
    }

    /// `Err(())` on timeout.
    #[allow(clippy::result_unit_err)]
    pub fn recv_timeout(&self, timeout: Duration) -> std::result::Result<Option<WireObject>, ()> {
        self.inbox.recv_timeout(timeout)
    }

    pub fn is_closed(&self) -> bool {
        self.inbox.is_closed()
    }

    /// Close the port and discard anything still queued. Returns `false`
    /// if it was already closed.
    pub fn close(&self) -> bool {
        let was_open = self.inbox.close();
        if let Some(ctx) = self.ctx.upgrade() {
            ctx.close_port(self.id);
        }
        let discarded = self.inbox.discard();
        if discarded > 0 {
            log_trace!("{}: {} undelivered values discarded", self.name, discarded);
        }
        was_open
    }
}

impl Drop for BroadcastPort {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for BroadcastPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BroadcastPort")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("queued", &self.inbox.len())
            .field("closed", &self.inbox.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NotifierKind;
    use std::thread;

    fn ctx() -> Arc<DispatcherContext> {
        DispatcherContext::new(DispatcherConfig::new().notifier(NotifierKind::Condvar)).unwrap()
    }

    #[test]
    fn test_single_use_delivers_once() {
        let ctx = ctx();
        let (port, completion) = ctx.open_single_use().unwrap();
        assert_eq!(ctx.pending_calls(), 1);

        assert_eq!(port.post(WireObject::Int(300)), Delivery::Completed);
        assert_eq!(port.post(WireObject::Int(301)), Delivery::Dropped);
        assert_eq!(completion.wait(), Ok(WireObject::Int(300)));
        assert!(port.is_closed());

        let snap = ctx.stats().snapshot();
        assert_eq!(snap.delivered_completed, 1);
        assert_eq!(snap.delivered_dropped, 1);
    }

    #[test]
    fn test_broadcast_preserves_order() {
        let ctx = ctx();
        let port = ctx.open_broadcast("ticks").unwrap();
        assert_eq!(port.name(), "ticks#0");
        assert_eq!(ctx.port_name(port.id()).as_deref(), Some("ticks#0"));

        let native = port.native_port();
        let h = thread::spawn(move || {
            for i in 0..100 {
                assert_eq!(native.post(WireObject::Int(i)), Delivery::Queued);
            }
        });
        for i in 0..100 {
            assert_eq!(port.recv(), Some(WireObject::Int(i)));
        }
        h.join().unwrap();
    }

    #[test]
    fn test_dropping_broadcast_closes_port() {
        let ctx = ctx();
        let port = ctx.open_broadcast("s").unwrap();
        let native = port.native_port();
        assert_eq!(ctx.open_ports(), 1);

        drop(port);
        assert_eq!(ctx.open_ports(), 0);
        assert!(native.is_closed());
        assert!(!ctx.is_open(native.id()));
        assert_eq!(native.post(WireObject::Null), Delivery::Dropped);
    }

    #[test]
    fn test_unknown_port_is_dropped() {
        let ctx = ctx();
        assert_eq!(ctx.post(PortId::new(9_999), WireObject::Null), Delivery::Dropped);
        assert_eq!(ctx.post(PortId::NONE, WireObject::Null), Delivery::Dropped);
        assert_eq!(ctx.stats().snapshot().delivered_dropped, 2);
    }

    #[test]
    fn test_reverse_port_cannot_be_closed() {
        let ctx = ctx();
        let rev = ctx.reverse_port();
        assert!(!ctx.close_port(rev.id()));
        assert_eq!(ctx.port_name(rev.id()).as_deref(), Some("portcall.reverse"));

        assert_eq!(rev.post(WireObject::Int(1)), Delivery::Queued);
        assert_eq!(ctx.take_reverse_call(), Some(WireObject::Int(1)));
        assert_eq!(ctx.take_reverse_call(), None);
    }

    #[test]
    fn test_delivery_wakes_notifier() {
        let ctx = ctx();
        let (port, _completion) = ctx.open_single_use().unwrap();
        let h = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            port.post(WireObject::Null);
        });
        assert!(ctx.wait_for_delivery(Duration::from_secs(5)).unwrap());
        h.join().unwrap();
    }

    #[test]
    fn test_shutdown_abandons_and_closes() {
        let ctx = ctx();
        let (port, completion) = ctx.open_single_use().unwrap();
        let stream = ctx.open_broadcast("s").unwrap();
        stream.native_port().post(WireObject::Int(1));

        ctx.shutdown();
        assert!(completion.wait().is_err());
        assert_eq!(stream.recv(), Some(WireObject::Int(1)));
        assert_eq!(stream.recv(), None);
        assert_eq!(port.post(WireObject::Null), Delivery::Dropped);
        assert_eq!(
            ctx.open_single_use().err(),
            Some(BridgeError::ContextClosed)
        );
        assert!(ctx.open_broadcast("s").is_err());
    }

    #[test]
    fn test_post_after_context_dropped() {
        let ctx = ctx();
        let (port, completion) = ctx.open_single_use().unwrap();
        drop(ctx);
        assert_eq!(port.post(WireObject::Null), Delivery::Dropped);
        assert!(port.is_closed());
        assert!(completion.wait().is_err());
    }

    #[test]
    fn test_pending_limit() {
        let ctx = DispatcherContext::new(
            DispatcherConfig::new()
                .notifier(NotifierKind::Condvar)
                .max_pending_calls(1),
        )
        .unwrap();
        let _first = ctx.open_single_use().unwrap();
        assert_eq!(
            ctx.open_single_use().err(),
            Some(BridgeError::RegistryFull { limit: 1 })
        );
    }

    #[test]
    fn test_invalid_config_rejected() {
        let err = DispatcherContext::new(DispatcherConfig::new().max_pending_calls(0)).err();
        assert!(matches!(err, Some(BridgeError::InvalidConfig(_))));
    }
}
