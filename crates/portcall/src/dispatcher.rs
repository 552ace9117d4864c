//! The dispatcher: issues calls in each shape and runs reverse calls.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use portcall_core::error::{BridgeError, Result};
use portcall_core::{
    log_debug, log_error, log_trace, CallbackRef, Codec, DecodeError, DispatchError, FatalError,
    SyncCodec, WireObject,
};
use portcall_runtime::{
    DispatchStats, DispatcherConfig, DispatcherContext, ManagedFn, NativePort, StatsSnapshot,
};

use crate::deferred::{lift, CallResult, DeferredResult};
use crate::stream::CallStream;
use crate::task::{Dispatched, NormalTask, StreamTask, SyncTask, TaskKind};

/// Releases a sync return buffer when dropped, so the buffer is freed on
/// every path out of the decode attempt, unwinding included.
struct FreeOnDrop<'a, C: SyncCodec> {
    codec: &'a C,
    raw: Option<C::WireSync>,
    stats: &'a DispatchStats,
}

impl<'a, C: SyncCodec> FreeOnDrop<'a, C> {
    fn raw(&self) -> Option<&C::WireSync> {
        self.raw.as_ref()
    }
}

impl<C: SyncCodec> Drop for FreeOnDrop<'_, C> {
    fn drop(&mut self) {
        if let Some(raw) = self.raw.take() {
            self.codec.free_wire_sync(raw);
            self.stats.record_sync_free();
        }
    }
}

fn fatal_from_panic<E>(task: &str, payload: Box<dyn std::any::Any + Send>) -> DispatchError<E> {
    let fatal = FatalError::from_panic(task, payload);
    log_error!("{}", fatal);
    DispatchError::Fatal(fatal)
}

/// Entry point for every call crossing the boundary.
///
/// Cheap to clone; clones share one `DispatcherContext`. Pending deferred
/// results and open streams hold the context too, so it is torn down when
/// the last of these is gone, or explicitly with `shutdown()`.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    ctx: Arc<DispatcherContext>,
}

impl Dispatcher {
    pub fn new(config: DispatcherConfig) -> Result<Self> {
        Ok(Self {
            ctx: DispatcherContext::new(config)?,
        })
    }

    /// Configuration from `PORTCALL_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::new(DispatcherConfig::from_env())
    }

    pub fn with_context(ctx: Arc<DispatcherContext>) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &Arc<DispatcherContext> {
        &self.ctx
    }

    /// Share a managed function with native code.
    pub fn register_callback(&self, f: ManagedFn) -> CallbackRef {
        self.ctx.callbacks().register(f)
    }

    pub fn unregister_callback(&self, callback: CallbackRef) -> bool {
        self.ctx.callbacks().unregister(callback)
    }

    /// Port native code posts reverse calls to.
    pub fn reverse_port(&self) -> NativePort {
        self.ctx.reverse_port()
    }

    /// Issue a call whose result arrives later on a single-use port.
    ///
    /// The native entry runs on the calling thread and is expected to hand
    /// the work off and return quickly. If it panics, the returned result
    /// is already failed with `DispatchError::Fatal`.
    pub fn execute_async<C: Codec>(&self, task: NormalTask<C>) -> Result<DeferredResult<C>> {
        let NormalTask {
            native_entry,
            codec,
            debug_name,
        } = task;
        let (port, completion) = self.ctx.open_single_use()?;
        let id = port.id();
        self.ctx.stats().record_call_async();
        log_trace!("{}: async call on {}", debug_name, id);

        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(move || native_entry(port))) {
            self.ctx.close_port(id);
            let err = fatal_from_panic(&debug_name, payload);
            return Ok(DeferredResult::failed(codec, debug_name, id, err));
        }
        Ok(DeferredResult::pending(
            Arc::clone(&self.ctx),
            codec,
            debug_name,
            id,
            completion,
        ))
    }

    /// Run a call to completion on the calling thread.
    ///
    /// The returned buffer is freed through the codec exactly once, after
    /// the decode attempt, whatever its outcome. Application errors pass
    /// through; a panic in the native entry or in the decoder, or a
    /// panic-tagged buffer, becomes `DispatchError::Fatal`.
    pub fn execute_sync<C: SyncCodec>(&self, task: SyncTask<C>) -> CallResult<C> {
        let SyncTask {
            native_entry,
            codec,
            debug_name,
        } = task;
        self.ctx.stats().record_call_sync();

        let raw = match panic::catch_unwind(AssertUnwindSafe(native_entry)) {
            Ok(raw) => raw,
            Err(payload) => return Err(fatal_from_panic(&debug_name, payload)),
        };

        let guard = FreeOnDrop {
            codec: codec.as_ref(),
            raw: Some(raw),
            stats: self.ctx.stats(),
        };
        let decoded = panic::catch_unwind(AssertUnwindSafe(|| match guard.raw() {
            Some(raw) => codec.decode_wire_sync(raw),
            None => Err(DecodeError::Malformed("sync buffer already released".into())),
        }));
        drop(guard);

        match decoded {
            Ok(result) => result.map_err(|e| lift(&debug_name, e)),
            Err(payload) => Err(fatal_from_panic(&debug_name, payload)),
        }
    }

    /// Issue a call whose elements arrive on a broadcast port.
    ///
    /// The task is consumed here; only its codec is kept by the stream.
    pub fn execute_stream<C: Codec>(&self, task: StreamTask<C>) -> Result<CallStream<C>> {
        let StreamTask {
            native_entry,
            codec,
            debug_name,
        } = task;
        let port = self.ctx.open_broadcast(&debug_name)?;
        self.ctx.stats().record_call_stream();
        log_trace!("{}: stream call on {} ({})", debug_name, port.id(), port.name());

        let native = port.native_port();
        let mut stream = CallStream::new(Arc::clone(&self.ctx), port, codec, debug_name);
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(move || native_entry(native))) {
            let err = fatal_from_panic(stream.name(), payload);
            stream.fail(err);
        }
        Ok(stream)
    }

    /// Issue `task` in whatever shape it describes.
    pub fn execute<C: SyncCodec>(&self, task: TaskKind<C>) -> Result<Dispatched<C>> {
        log_trace!("{}: dispatching by kind", task.debug_name());
        match task {
            TaskKind::Normal(t) => self.execute_async(t).map(Dispatched::Deferred),
            TaskKind::Sync(t) => Ok(Dispatched::Ready(self.execute_sync(t))),
            TaskKind::Stream(t) => self.execute_stream(t).map(Dispatched::Stream),
        }
    }

    /// Run one reverse call, `[callback, arg1, arg2, ...]`, on the calling
    /// thread. Nothing is sent back to native code.
    ///
    /// A message that is not shaped like a reverse call, or that names an
    /// unknown callback, is logged at error level and returned as `Err`.
    pub fn invoke_callback(&self, message: WireObject) -> Result<()> {
        let result = self.apply_reverse_call(message);
        self.ctx.stats().record_callback(result.is_ok());
        if let Err(e) = &result {
            log_error!("reverse call failed: {}", e);
        }
        result
    }

    fn apply_reverse_call(&self, message: WireObject) -> Result<()> {
        let kind = message.kind();
        let mut items = message
            .into_array()
            .ok_or_else(|| BridgeError::MalformedCallback(format!("expected array, got {}", kind)))?
            .into_iter();
        let callback = match items.next() {
            Some(WireObject::Callback(r)) => r,
            Some(other) => {
                return Err(BridgeError::MalformedCallback(format!(
                    "first element is {}, not a callback",
                    other.kind()
                )))
            }
            None => return Err(BridgeError::MalformedCallback("empty message".into())),
        };
        self.ctx.callbacks().invoke(callback, items.collect())
    }

    /// Run every queued reverse call. Stops at the first failure and
    /// returns it; the failing message is consumed.
    pub fn drain_callbacks(&self) -> Result<usize> {
        let mut n = 0;
        while let Some(message) = self.ctx.take_reverse_call() {
            self.invoke_callback(message)?;
            n += 1;
        }
        Ok(n)
    }

    /// One turn of the managed loop: wait up to `timeout` for a delivery,
    /// then run queued reverse calls. Returns how many ran.
    pub fn pump(&self, timeout: Duration) -> Result<usize> {
        self.ctx.wait_for_delivery(timeout)?;
        self.drain_callbacks()
    }

    /// `pump` with the configured interval.
    pub fn pump_once(&self) -> Result<usize> {
        self.pump(self.ctx.config().pump_interval)
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.ctx.stats().snapshot()
    }

    /// Tear the context down. Pending async calls resolve to
    /// `DispatchError::Disconnected`; streams end the same way.
    pub fn shutdown(&self) {
        log_debug!("dispatcher shutdown requested");
        self.ctx.shutdown();
    }
}
