//! Pull-driven stream of decoded elements.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use portcall_core::{log_trace, Codec, DispatchError, PortId, WireObject};
use portcall_runtime::{BroadcastPort, DispatcherContext};

use crate::deferred::{lift, CallResult};

/// Elements of a stream call, in native delivery order.
///
/// The stream ends, closing its broadcast port, when:
/// - native code delivers the end-of-stream control value (no element
///   is yielded for it),
/// - an element fails to decode (the error is yielded, then the stream
///   ends),
/// - the consumer calls `close()` or drops the stream.
///
/// An open stream keeps the context alive.
///
/// If the context is torn down before end-of-stream, the stream yields
/// `DispatchError::Disconnected` once and ends.
pub struct CallStream<C: Codec> {
    port: BroadcastPort,
    codec: Arc<C>,
    task: String,
    failure: Option<DispatchError<C::Error>>,
    finished: bool,
    // Released when the stream ends; declared after `port` so the port
    // closes first on drop.
    ctx: Option<Arc<DispatcherContext>>,
}

impl<C: Codec> CallStream<C> {
    pub(crate) fn new(
        ctx: Arc<DispatcherContext>,
        port: BroadcastPort,
        codec: Arc<C>,
        task: String,
    ) -> Self {
        Self {
            port,
            codec,
            task,
            failure: None,
            finished: false,
            ctx: Some(ctx),
        }
    }

    /// Close now and yield `err` as the only remaining item.
    pub(crate) fn fail(&mut self, err: DispatchError<C::Error>) {
        self.port.close();
        self.ctx = None;
        self.failure = Some(err);
    }

    pub fn port(&self) -> PortId {
        self.port.id()
    }

    /// Unique channel name, `<debug_name>#<n>`.
    pub fn name(&self) -> &str {
        self.port.name()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Stop consuming. Later deliveries from native code are dropped.
    pub fn close(&mut self) {
        if !self.finished {
            self.finished = true;
            if self.port.close() {
                log_trace!("{}: closed by consumer", self.port.name());
            }
            self.ctx = None;
        }
    }

    fn end(&mut self) {
        self.finished = true;
        self.port.close();
        self.ctx = None;
    }

    fn accept(&mut self, raw: Option<WireObject>) -> Option<CallResult<C>> {
        let Some(raw) = raw else {
            // Closed underneath us without end-of-stream: teardown.
            self.end();
            return Some(Err(DispatchError::Disconnected));
        };
        if self.codec.is_end_of_stream(&raw) {
            log_trace!("{}: end of stream", self.port.name());
            self.end();
            return None;
        }
        match self.codec.decode_object(raw) {
            Ok(v) => Some(Ok(v)),
            Err(e) => {
                self.end();
                Some(Err(lift(&self.task, e)))
            }
        }
    }

    fn take_failure(&mut self) -> Option<CallResult<C>> {
        let err = self.failure.take()?;
        self.finished = true;
        Some(Err(err))
    }

    /// Like `next`, giving up after `timeout`. `Err(())` on timeout; the
    /// stream stays usable.
    #[allow(clippy::result_unit_err)]
    pub fn next_timeout(&mut self, timeout: Duration) -> Result<Option<CallResult<C>>, ()> {
        if let Some(failed) = self.take_failure() {
            return Ok(Some(failed));
        }
        if self.finished {
            return Ok(None);
        }
        let raw = self.port.recv_timeout(timeout)?;
        Ok(self.accept(raw))
    }
}

impl<C: Codec> Iterator for CallStream<C> {
    type Item = CallResult<C>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(failed) = self.take_failure() {
            return Some(failed);
        }
        if self.finished {
            return None;
        }
        let raw = self.port.recv();
        self.accept(raw)
    }
}

impl<C: Codec> fmt::Debug for CallStream<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallStream")
            .field("task", &self.task)
            .field("port", &self.port)
            .field("finished", &self.finished)
            .finish()
    }
}
