//! # portcall-runtime
//!
//! Shared state behind the dispatcher: ports, the completion registry,
//! broadcast port naming, the callback table and the managed-loop
//! notifier, all owned by one `DispatcherContext`.
//!
//! ## Modules
//!
//! - `completion` - One-shot completion primitive (blocking and `Future`)
//! - `registry` - Single-use port → pending completion
//! - `port` - Broadcast port inbox
//! - `names` - Unique broadcast port names
//! - `callback` - Reverse-call function table
//! - `notifier` - Managed-loop wake-up (eventfd, condvar)
//! - `config` - Configuration with env overrides
//! - `stats` - Dispatch counters
//! - `context` - `DispatcherContext` and port handles

pub mod completion;
pub mod registry;
pub mod port;
pub mod names;
pub mod callback;
pub mod notifier;
pub mod config;
pub mod stats;
pub mod context;

mod sync;

// Re-exports for convenience
pub use completion::{completion, Abandoned, Completer, Completion, WaitError};
pub use registry::CompletionRegistry;
pub use port::PortInbox;
pub use names::PortNameRegistry;
pub use callback::{CallbackTable, ManagedFn};
pub use notifier::{CondvarNotifier, Notifier};
pub use config::{DispatcherConfig, NotifierKind};
pub use stats::{DispatchStats, StatsSnapshot};
pub use context::{BroadcastPort, Delivery, DispatcherContext, NativePort};

#[cfg(target_os = "linux")]
pub use notifier::EventFdNotifier;
