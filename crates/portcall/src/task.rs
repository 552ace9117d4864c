//! Task descriptors.
//!
//! A task describes one call about to be issued: the native entry point,
//! already bound to its marshalled arguments, the codec for its results,
//! and a debug name. The dispatcher consumes the task when it issues the
//! call; only the codec outlives it.

use std::fmt;
use std::sync::Arc;

use portcall_core::{Codec, DispatchError, SyncCodec};
use portcall_runtime::NativePort;

use crate::deferred::DeferredResult;
use crate::stream::CallStream;

/// Native entry point for port-delivered calls. Receives the port the
/// result (or stream elements) must be posted to.
pub type PortEntry = Box<dyn FnOnce(NativePort) + Send>;

/// Native entry point for sync calls. Runs on the calling thread and
/// returns a native-owned buffer.
pub type SyncEntry<W> = Box<dyn FnOnce() -> W>;

/// A call whose single result is delivered on a port.
pub struct NormalTask<C: Codec> {
    pub native_entry: PortEntry,
    pub codec: Arc<C>,
    pub debug_name: String,
}

impl<C: Codec> NormalTask<C> {
    pub fn new(
        debug_name: impl Into<String>,
        codec: Arc<C>,
        native_entry: impl FnOnce(NativePort) + Send + 'static,
    ) -> Self {
        Self {
            native_entry: Box::new(native_entry),
            codec,
            debug_name: debug_name.into(),
        }
    }
}

/// A call that returns a raw buffer on the calling thread.
pub struct SyncTask<C: SyncCodec> {
    pub native_entry: SyncEntry<C::WireSync>,
    pub codec: Arc<C>,
    pub debug_name: String,
}

impl<C: SyncCodec> SyncTask<C> {
    pub fn new(
        debug_name: impl Into<String>,
        codec: Arc<C>,
        native_entry: impl FnOnce() -> C::WireSync + 'static,
    ) -> Self {
        Self {
            native_entry: Box::new(native_entry),
            codec,
            debug_name: debug_name.into(),
        }
    }
}

/// A call that delivers zero or more elements on a broadcast port,
/// terminated by the end-of-stream control value.
pub struct StreamTask<C: Codec> {
    pub native_entry: PortEntry,
    pub codec: Arc<C>,
    pub debug_name: String,
}

impl<C: Codec> StreamTask<C> {
    pub fn new(
        debug_name: impl Into<String>,
        codec: Arc<C>,
        native_entry: impl FnOnce(NativePort) + Send + 'static,
    ) -> Self {
        Self {
            native_entry: Box::new(native_entry),
            codec,
            debug_name: debug_name.into(),
        }
    }
}

/// The three call shapes, for callers that pick the shape at runtime.
///
/// All variants share one codec type, so it must support sync decoding.
/// Codecs without it go through `execute_async`/`execute_stream`.
pub enum TaskKind<C: SyncCodec> {
    Normal(NormalTask<C>),
    Sync(SyncTask<C>),
    Stream(StreamTask<C>),
}

impl<C: SyncCodec> TaskKind<C> {
    pub fn debug_name(&self) -> &str {
        match self {
            TaskKind::Normal(t) => &t.debug_name,
            TaskKind::Sync(t) => &t.debug_name,
            TaskKind::Stream(t) => &t.debug_name,
        }
    }
}

impl<C: SyncCodec> From<NormalTask<C>> for TaskKind<C> {
    fn from(t: NormalTask<C>) -> Self {
        TaskKind::Normal(t)
    }
}

impl<C: SyncCodec> From<SyncTask<C>> for TaskKind<C> {
    fn from(t: SyncTask<C>) -> Self {
        TaskKind::Sync(t)
    }
}

impl<C: SyncCodec> From<StreamTask<C>> for TaskKind<C> {
    fn from(t: StreamTask<C>) -> Self {
        TaskKind::Stream(t)
    }
}

/// Result of `Dispatcher::execute`, one variant per call shape.
pub enum Dispatched<C: Codec> {
    Deferred(DeferredResult<C>),
    Ready(Result<C::Output, DispatchError<C::Error>>),
    Stream(CallStream<C>),
}

impl<C: Codec> fmt::Debug for Dispatched<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dispatched::Deferred(d) => f.debug_tuple("Deferred").field(d).finish(),
            Dispatched::Ready(r) => f
                .debug_tuple("Ready")
                .field(&if r.is_ok() { "ok" } else { "err" })
                .finish(),
            Dispatched::Stream(s) => f.debug_tuple("Stream").field(s).finish(),
        }
    }
}

macro_rules! impl_task_debug {
    ($name:ident, $bound:ident) => {
        impl<C: $bound> fmt::Debug for $name<C> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_struct(stringify!($name))
                    .field("debug_name", &self.debug_name)
                    .finish_non_exhaustive()
            }
        }
    };
}

impl_task_debug!(NormalTask, Codec);
impl_task_debug!(SyncTask, SyncCodec);
impl_task_debug!(StreamTask, Codec);
