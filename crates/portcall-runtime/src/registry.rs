//! Completion registry: single-use port → pending completion.
//!
//! Deliveries race with registration and teardown, so every operation
//! takes the table lock. Resolution removes the entry under the lock and
//! completes it after the lock is released: exactly one delivery can win
//! a given port, and the caller's wake-up never runs inside the lock.

use std::collections::HashMap;
use std::sync::Mutex;

use portcall_core::error::{BridgeError, Result};
use portcall_core::{PortId, WireObject};

use crate::completion::{completion, Completer, Completion};
use crate::sync::lock;

pub struct CompletionRegistry {
    entries: Mutex<HashMap<PortId, Completer<WireObject>>>,
    limit: usize,
}

impl CompletionRegistry {
    /// `limit` caps the number of calls waiting for a delivery.
    pub fn new(limit: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            limit,
        }
    }

    /// Bind `port` to a fresh completion.
    pub fn register(&self, port: PortId) -> Result<Completion<WireObject>> {
        let mut entries = lock(&self.entries);
        if entries.len() >= self.limit {
            return Err(BridgeError::RegistryFull { limit: self.limit });
        }
        if entries.contains_key(&port) {
            return Err(BridgeError::DuplicatePort(port));
        }
        let (completer, completion) = completion();
        entries.insert(port, completer);
        Ok(completion)
    }

    /// Resolve and retire `port`. Gives the value back if the port is not
    /// registered (never was, or already resolved).
    pub fn resolve(&self, port: PortId, value: WireObject) -> std::result::Result<(), WireObject> {
        let completer = lock(&self.entries).remove(&port);
        match completer {
            Some(c) => {
                c.complete(value);
                Ok(())
            }
            None => Err(value),
        }
    }

    /// Retire `port` without a value. The waiting caller sees the
    /// completion as abandoned.
    pub fn cancel(&self, port: PortId) -> bool {
        let completer = lock(&self.entries).remove(&port);
        completer.is_some()
    }

    /// Abandon every pending completion. Returns how many were pending.
    pub fn abandon_all(&self) -> usize {
        let drained: Vec<_> = lock(&self.entries).drain().collect();
        drained.len()
    }

    pub fn contains(&self, port: PortId) -> bool {
        lock(&self.entries).contains_key(&port)
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::Abandoned;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_register_resolve() {
        let reg = CompletionRegistry::new(8);
        let c = reg.register(PortId::new(1)).unwrap();
        assert!(reg.contains(PortId::new(1)));

        assert!(reg.resolve(PortId::new(1), WireObject::Int(3)).is_ok());
        assert!(!reg.contains(PortId::new(1)));
        assert_eq!(c.wait(), Ok(WireObject::Int(3)));
    }

    #[test]
    fn test_second_delivery_is_rejected() {
        let reg = CompletionRegistry::new(8);
        let c = reg.register(PortId::new(1)).unwrap();
        assert!(reg.resolve(PortId::new(1), WireObject::Int(1)).is_ok());
        assert_eq!(
            reg.resolve(PortId::new(1), WireObject::Int(2)),
            Err(WireObject::Int(2))
        );
        assert_eq!(c.wait(), Ok(WireObject::Int(1)));
    }

    #[test]
    fn test_unregistered_port() {
        let reg = CompletionRegistry::new(8);
        assert_eq!(
            reg.resolve(PortId::new(77), WireObject::Null),
            Err(WireObject::Null)
        );
    }

    #[test]
    fn test_limit_and_duplicates() {
        let reg = CompletionRegistry::new(1);
        let _c = reg.register(PortId::new(1)).unwrap();
        assert!(matches!(
            reg.register(PortId::new(2)),
            Err(BridgeError::RegistryFull { limit: 1 })
        ));

        let reg = CompletionRegistry::new(4);
        let _c = reg.register(PortId::new(5)).unwrap();
        assert!(matches!(
            reg.register(PortId::new(5)),
            Err(BridgeError::DuplicatePort(_))
        ));
    }

    #[test]
    fn test_cancel_and_abandon_all() {
        let reg = CompletionRegistry::new(8);
        let a = reg.register(PortId::new(1)).unwrap();
        let b = reg.register(PortId::new(2)).unwrap();
        assert!(reg.cancel(PortId::new(1)));
        assert_eq!(a.wait(), Err(Abandoned));
        assert_eq!(reg.abandon_all(), 1);
        assert_eq!(b.wait(), Err(Abandoned));
        assert!(reg.is_empty());
    }

    #[test]
    fn test_racing_deliveries_resolve_once() {
        let reg = Arc::new(CompletionRegistry::new(8));
        let c = reg.register(PortId::new(9)).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let reg = Arc::clone(&reg);
                thread::spawn(move || reg.resolve(PortId::new(9), WireObject::Int(i)).is_ok())
            })
            .collect();
        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();

        assert_eq!(winners, 1);
        assert!(matches!(c.wait(), Ok(WireObject::Int(_))));
    }
}
