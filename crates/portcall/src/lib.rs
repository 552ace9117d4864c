//! # portcall - call dispatch across a native boundary
//!
//! Lets a managed runtime call functions in a separately compiled native
//! module, and lets that module call back, over thread-safe ports.
//!
//! ## Call shapes
//!
//! - **Async** (`execute_async`): native code posts one result to a
//!   single-use port; the caller holds a `DeferredResult`.
//! - **Sync** (`execute_sync`): native code returns a raw buffer on the
//!   calling thread; it is decoded and always freed.
//! - **Stream** (`execute_stream`): native code posts elements to a
//!   broadcast port, then the end-of-stream value; the caller pulls a
//!   `CallStream`.
//! - **Reverse** (`invoke_callback`, `pump`): native code posts
//!   `[callback, args...]` to the reverse port; the managed loop runs it.
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use portcall::{Dispatcher, NormalTask, TaggedCodec, WireObject};
//! use portcall::tagged::{decode_i64, decode_string};
//!
//! let dispatcher = Dispatcher::from_env()?;
//! let codec = Arc::new(TaggedCodec::<i64, String>::new(decode_i64, decode_string));
//!
//! let sum = dispatcher.execute_async(NormalTask::new("add", codec, |port| {
//!     std::thread::spawn(move || {
//!         port.post(WireObject::success(WireObject::Int(100 + 200)));
//!     });
//! }))?;
//! assert_eq!(sum.wait()?, 300);
//! ```
//!
//! ## Errors
//!
//! Application errors reach the caller unchanged as
//! `DispatchError::Application`. Native aborts become
//! `DispatchError::Fatal`, undecodable deliveries `DispatchError::Protocol`,
//! and teardown `DispatchError::Disconnected`.

pub mod task;
pub mod deferred;
pub mod stream;
pub mod dispatcher;

pub use task::{Dispatched, NormalTask, StreamTask, SyncTask, TaskKind};
pub use deferred::{CallResult, DeferredResult};
pub use stream::CallStream;
pub use dispatcher::Dispatcher;

// Re-export the layers below
pub use portcall_core::{
    codec, log_debug, log_error, log_info, log_trace, log_warn, tagged, BridgeError,
    CallbackRef, Codec, ControlSignal, DecodeError, DispatchError, FatalError, PortId, Result,
    SyncCodec, TaggedCodec, WireObject, WireSyncReturn,
};
pub use portcall_runtime::{
    BroadcastPort, Delivery, DispatcherConfig, DispatcherContext, ManagedFn, NativePort,
    NotifierKind, StatsSnapshot,
};
