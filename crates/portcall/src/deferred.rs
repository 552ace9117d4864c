//! Deferred result of an async call.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use portcall_core::{log_error, log_trace, Codec, DecodeError, DispatchError, FatalError, PortId, WireObject};
use portcall_runtime::{Abandoned, Completion, DispatcherContext, WaitError};

/// Outcome of a call as the caller sees it.
pub type CallResult<C> = Result<<C as Codec>::Output, DispatchError<<C as Codec>::Error>>;

/// Map a codec outcome to what the caller sees. Application errors pass
/// through; native panics become fatal; anything unreadable is a
/// protocol violation.
pub(crate) fn lift<E>(task: &str, err: DecodeError<E>) -> DispatchError<E> {
    match err {
        DecodeError::Application(e) => DispatchError::Application(e),
        DecodeError::Panic(message) => {
            let fatal = FatalError::capture(task, message);
            log_error!("{}", fatal);
            DispatchError::Fatal(fatal)
        }
        DecodeError::Malformed(why) => {
            log_error!("{}: malformed delivery: {}", task, why);
            DispatchError::Protocol(format!("{}: {}", task, why))
        }
    }
}

enum State<E> {
    Waiting(Completion<WireObject>),
    /// Failed before native code could deliver (the trigger panicked).
    Failed(Option<DispatchError<E>>),
}

/// Handle to the eventual result of `Dispatcher::execute_async`.
///
/// Resolves exactly once. There is no implicit timeout: if native code
/// never delivers, the result stays pending until the context is torn
/// down, which surfaces as `DispatchError::Disconnected`.
///
/// A pending result keeps the context alive, so dropping the last
/// `Dispatcher` does not cut off a delivery still in flight. Dropping the
/// result before its delivery retires the port.
///
/// Usable either as a blocking handle (`wait`, `wait_timeout`,
/// `try_take`) or as a `Future`.
pub struct DeferredResult<C: Codec> {
    state: State<C::Error>,
    codec: Arc<C>,
    task: String,
    port: PortId,
    ctx: Option<Arc<DispatcherContext>>,
}

impl<C: Codec> DeferredResult<C> {
    pub(crate) fn pending(
        ctx: Arc<DispatcherContext>,
        codec: Arc<C>,
        task: String,
        port: PortId,
        completion: Completion<WireObject>,
    ) -> Self {
        Self {
            state: State::Waiting(completion),
            codec,
            task,
            port,
            ctx: Some(ctx),
        }
    }

    pub(crate) fn failed(
        codec: Arc<C>,
        task: String,
        port: PortId,
        err: DispatchError<C::Error>,
    ) -> Self {
        Self {
            state: State::Failed(Some(err)),
            codec,
            task,
            port,
            ctx: None,
        }
    }

    /// Port native code delivers to.
    pub fn port(&self) -> PortId {
        self.port
    }

    pub fn debug_name(&self) -> &str {
        &self.task
    }

    pub fn is_ready(&self) -> bool {
        match &self.state {
            State::Waiting(c) => c.is_settled(),
            State::Failed(_) => true,
        }
    }

    fn finish(&self, outcome: Result<WireObject, Abandoned>) -> CallResult<C> {
        let raw = outcome.map_err(|_| DispatchError::Disconnected)?;
        self.codec.decode_object(raw).map_err(|e| lift(&self.task, e))
    }

    fn take_failure(&mut self) -> DispatchError<C::Error> {
        match &mut self.state {
            State::Failed(err) => err.take().unwrap_or(DispatchError::Disconnected),
            State::Waiting(_) => DispatchError::Disconnected,
        }
    }

    /// Block until the result arrives.
    pub fn wait(mut self) -> CallResult<C> {
        let state = std::mem::replace(&mut self.state, State::Failed(None));
        match state {
            State::Waiting(completion) => {
                let outcome = completion.wait();
                self.finish(outcome)
            }
            State::Failed(err) => Err(err.unwrap_or(DispatchError::Disconnected)),
        }
    }

    /// Block for at most `timeout`. `None` if the result is still pending.
    pub fn wait_timeout(&mut self, timeout: Duration) -> Option<CallResult<C>> {
        let outcome = match &self.state {
            State::Waiting(c) => c.wait_timeout(timeout),
            State::Failed(_) => return Some(Err(self.take_failure())),
        };
        match outcome {
            Ok(raw) => Some(self.finish(Ok(raw))),
            Err(WaitError::Abandoned) => Some(self.finish(Err(Abandoned))),
            Err(WaitError::TimedOut) => None,
        }
    }

    /// The result if it has arrived, without blocking.
    pub fn try_take(&mut self) -> Option<CallResult<C>> {
        let outcome = match &self.state {
            State::Waiting(c) => c.try_take()?,
            State::Failed(_) => return Some(Err(self.take_failure())),
        };
        Some(self.finish(outcome))
    }
}

impl<C: Codec> Drop for DeferredResult<C> {
    fn drop(&mut self) {
        if let (State::Waiting(c), Some(ctx)) = (&self.state, &self.ctx) {
            if !c.is_settled() && ctx.close_port(self.port) {
                log_trace!("{}: dropped before delivery, {} retired", self.task, self.port);
            }
        }
    }
}

// Nothing is structurally pinned; the completion is polled through its Arc.
impl<C: Codec> Unpin for DeferredResult<C> {}

impl<C: Codec> Future for DeferredResult<C> {
    type Output = CallResult<C>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let outcome = match &mut this.state {
            State::Waiting(c) => match Pin::new(c).poll(cx) {
                Poll::Ready(outcome) => outcome,
                Poll::Pending => return Poll::Pending,
            },
            State::Failed(_) => return Poll::Ready(Err(this.take_failure())),
        };
        Poll::Ready(this.finish(outcome))
    }
}

impl<C: Codec> fmt::Debug for DeferredResult<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredResult")
            .field("task", &self.task)
            .field("port", &self.port)
            .field("ready", &self.is_ready())
            .finish()
    }
}
