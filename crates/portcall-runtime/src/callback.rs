//! Callback table for reverse invocation.
//!
//! Managed functions shared with native code are registered here and
//! handed out as `CallbackRef` tokens. A reverse-call message names a
//! token; the dispatcher resolves it here and applies the function.
//!
//! Signatures form a closed set (`ManagedFn`) so arity is checked before
//! anything is invoked.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use portcall_core::error::{BridgeError, Result};
use portcall_core::{CallbackRef, WireObject};

use crate::sync::lock;

type Nullary = Box<dyn Fn() + Send + Sync>;
type Unary = Box<dyn Fn(WireObject) + Send + Sync>;
type Binary = Box<dyn Fn(WireObject, WireObject) + Send + Sync>;
type Variadic = Box<dyn Fn(Vec<WireObject>) + Send + Sync>;

/// A managed function callable from native code.
pub enum ManagedFn {
    Nullary(Nullary),
    Unary(Unary),
    Binary(Binary),
    /// Any number of arguments; no arity check.
    Variadic(Variadic),
}

impl ManagedFn {
    pub fn nullary(f: impl Fn() + Send + Sync + 'static) -> Self {
        ManagedFn::Nullary(Box::new(f))
    }

    pub fn unary(f: impl Fn(WireObject) + Send + Sync + 'static) -> Self {
        ManagedFn::Unary(Box::new(f))
    }

    pub fn binary(f: impl Fn(WireObject, WireObject) + Send + Sync + 'static) -> Self {
        ManagedFn::Binary(Box::new(f))
    }

    pub fn variadic(f: impl Fn(Vec<WireObject>) + Send + Sync + 'static) -> Self {
        ManagedFn::Variadic(Box::new(f))
    }

    /// Fixed argument count, `None` for variadic functions.
    pub fn arity(&self) -> Option<usize> {
        match self {
            ManagedFn::Nullary(_) => Some(0),
            ManagedFn::Unary(_) => Some(1),
            ManagedFn::Binary(_) => Some(2),
            ManagedFn::Variadic(_) => None,
        }
    }

    /// Apply to `args`. `callback` only labels the arity error.
    pub fn apply(&self, callback: CallbackRef, args: Vec<WireObject>) -> Result<()> {
        if let Some(expected) = self.arity() {
            if args.len() != expected {
                return Err(BridgeError::ArityMismatch {
                    callback,
                    expected,
                    got: args.len(),
                });
            }
        }
        let mut args = args.into_iter();
        match self {
            ManagedFn::Nullary(f) => f(),
            ManagedFn::Unary(f) => f(args.next().unwrap_or(WireObject::Null)),
            ManagedFn::Binary(f) => {
                let a = args.next().unwrap_or(WireObject::Null);
                let b = args.next().unwrap_or(WireObject::Null);
                f(a, b)
            }
            ManagedFn::Variadic(f) => f(args.collect()),
        }
        Ok(())
    }
}

pub struct CallbackTable {
    next_id: AtomicU64,
    fns: Mutex<HashMap<CallbackRef, Arc<ManagedFn>>>,
}

impl Default for CallbackTable {
    fn default() -> Self {
        Self::new()
    }
}

impl CallbackTable {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            fns: Mutex::new(HashMap::new()),
        }
    }

    /// Register `f` and return the token to share with native code.
    pub fn register(&self, f: ManagedFn) -> CallbackRef {
        let r = CallbackRef(self.next_id.fetch_add(1, Ordering::Relaxed));
        lock(&self.fns).insert(r, Arc::new(f));
        r
    }

    /// Forget `r`. Later reverse calls naming it fail as unresolved.
    pub fn unregister(&self, r: CallbackRef) -> bool {
        lock(&self.fns).remove(&r).is_some()
    }

    pub fn resolve(&self, r: CallbackRef) -> Option<Arc<ManagedFn>> {
        lock(&self.fns).get(&r).cloned()
    }

    /// Resolve `r` and apply it. The table lock is released before the
    /// function runs, so callbacks may register or unregister callbacks.
    pub fn invoke(&self, r: CallbackRef, args: Vec<WireObject>) -> Result<()> {
        let f = self.resolve(r).ok_or(BridgeError::UnresolvedCallback(r))?;
        f.apply(r, args)
    }

    pub fn len(&self) -> usize {
        lock(&self.fns).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        lock(&self.fns).clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicI64;

    #[test]
    fn test_binary_callback() {
        let table = CallbackTable::new();
        let sum = Arc::new(AtomicI64::new(0));
        let s = Arc::clone(&sum);
        let r = table.register(ManagedFn::binary(move |a, b| {
            s.store(a.as_int().unwrap() + b.as_int().unwrap(), Ordering::SeqCst);
        }));

        table
            .invoke(r, vec![WireObject::Int(10), WireObject::Int(20)])
            .unwrap();
        assert_eq!(sum.load(Ordering::SeqCst), 30);
    }

    #[test]
    fn test_arity_mismatch() {
        let table = CallbackTable::new();
        let r = table.register(ManagedFn::unary(|_| panic!("must not run")));
        assert_eq!(
            table.invoke(r, vec![]),
            Err(BridgeError::ArityMismatch {
                callback: r,
                expected: 1,
                got: 0
            })
        );
    }

    #[test]
    fn test_variadic_gets_all_args() {
        let table = CallbackTable::new();
        let seen = Arc::new(AtomicI64::new(-1));
        let s = Arc::clone(&seen);
        let r = table.register(ManagedFn::variadic(move |args| {
            s.store(args.len() as i64, Ordering::SeqCst);
        }));
        table.invoke(r, vec![WireObject::Null; 4]).unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_unresolved() {
        let table = CallbackTable::new();
        let r = table.register(ManagedFn::nullary(|| {}));
        assert!(table.unregister(r));
        assert_eq!(
            table.invoke(r, vec![]),
            Err(BridgeError::UnresolvedCallback(r))
        );
        assert!(table.is_empty());
    }

    #[test]
    fn test_tokens_are_distinct() {
        let table = CallbackTable::new();
        let a = table.register(ManagedFn::nullary(|| {}));
        let b = table.register(ManagedFn::nullary(|| {}));
        assert_ne!(a, b);
        assert_eq!(table.len(), 2);
    }
}
