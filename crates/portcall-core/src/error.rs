//! Error types for portcall
//!
//! Three layers:
//!
//! - `BridgeError`: infrastructure failures (registry, context, reverse calls).
//! - `DecodeError<E>`: what a codec reports when a raw value is not a success.
//! - `DispatchError<E>`: what a caller of the dispatcher sees.
//!
//! Application errors (`E`) travel through all layers untouched. Everything
//! the dispatcher fabricates itself is either `Fatal` or `Protocol`.

use core::fmt;
use std::any::Any;
use std::backtrace::Backtrace;

use crate::id::{CallbackRef, PortId};

/// Result type for infrastructure operations
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Infrastructure errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    /// Too many single-use ports are waiting for a delivery.
    RegistryFull { limit: usize },

    /// The dispatcher context has been shut down.
    ContextClosed,

    /// A reverse-call message named a callback that is not registered.
    UnresolvedCallback(CallbackRef),

    /// A reverse-call message did not start with a callback reference.
    MalformedCallback(String),

    /// A callback was invoked with the wrong number of arguments.
    ArityMismatch {
        callback: CallbackRef,
        expected: usize,
        got: usize,
    },

    /// A port identity was registered twice.
    DuplicatePort(PortId),

    /// Configuration rejected by `validate()`.
    InvalidConfig(&'static str),

    /// OS error with errno.
    Os(i32),
}

impl fmt::Display for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BridgeError::RegistryFull { limit } => {
                write!(f, "completion registry full ({} pending calls)", limit)
            }
            BridgeError::ContextClosed => write!(f, "dispatcher context closed"),
            BridgeError::UnresolvedCallback(r) => write!(f, "unresolved callback {}", r),
            BridgeError::MalformedCallback(msg) => write!(f, "malformed reverse call: {}", msg),
            BridgeError::ArityMismatch { callback, expected, got } => write!(
                f,
                "callback {} expects {} argument(s), got {}",
                callback, expected, got
            ),
            BridgeError::DuplicatePort(id) => write!(f, "{} already registered", id),
            BridgeError::InvalidConfig(msg) => write!(f, "invalid config: {}", msg),
            BridgeError::Os(e) => write!(f, "OS error: errno {}", e),
        }
    }
}

impl std::error::Error for BridgeError {}

/// Codec outcome for a raw value that does not decode to a success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError<E> {
    /// A typed application error the caller knows how to handle.
    Application(E),

    /// The native side aborted and encoded its diagnostic text.
    Panic(String),

    /// The raw value does not have the shape this codec expects.
    Malformed(String),
}

/// Unrecoverable native-side failure.
///
/// Carries the original diagnostic text plus a snapshot of the execution
/// context at the point the dispatcher observed the failure.
#[derive(Debug, Clone)]
pub struct FatalError {
    /// Debug name of the task that failed.
    pub task: String,
    /// Original diagnostic text, unmodified.
    pub message: String,
    /// Name of the thread that observed the failure.
    pub thread: String,
    /// Captured backtrace (empty unless `RUST_BACKTRACE` is set).
    pub backtrace: String,
}

impl FatalError {
    /// Build a fatal error and snapshot the current execution context.
    pub fn capture(task: impl Into<String>, message: impl Into<String>) -> Self {
        let thread = std::thread::current()
            .name()
            .unwrap_or("<unnamed>")
            .to_string();
        let backtrace = match Backtrace::capture() {
            bt if bt.status() == std::backtrace::BacktraceStatus::Captured => bt.to_string(),
            _ => String::new(),
        };
        Self {
            task: task.into(),
            message: message.into(),
            thread,
            backtrace,
        }
    }

    /// Build a fatal error from a caught panic payload.
    pub fn from_panic(task: impl Into<String>, payload: Box<dyn Any + Send>) -> Self {
        Self::capture(task, panic_message(payload.as_ref()))
    }
}

impl fmt::Display for FatalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "native abort in '{}' (thread {}): {}",
            self.task, self.thread, self.message
        )
    }
}

impl std::error::Error for FatalError {}

/// Extract the text of a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Error returned to callers of the dispatcher.
#[derive(Debug, Clone)]
pub enum DispatchError<E> {
    /// The native call completed with a typed application error.
    Application(E),

    /// The native side aborted.
    Fatal(FatalError),

    /// A delivery did not follow the port protocol.
    Protocol(String),

    /// The context was torn down before the call delivered.
    Disconnected,
}

impl<E> DispatchError<E> {
    pub fn is_application(&self) -> bool {
        matches!(self, DispatchError::Application(_))
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, DispatchError::Fatal(_))
    }

    /// The application error, if this is one.
    pub fn into_application(self) -> Option<E> {
        match self {
            DispatchError::Application(e) => Some(e),
            _ => None,
        }
    }
}

impl<E: fmt::Display> fmt::Display for DispatchError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchError::Application(e) => write!(f, "{}", e),
            DispatchError::Fatal(e) => write!(f, "{}", e),
            DispatchError::Protocol(msg) => write!(f, "protocol violation: {}", msg),
            DispatchError::Disconnected => write!(f, "dispatcher context disconnected"),
        }
    }
}

impl<E: fmt::Debug + fmt::Display> std::error::Error for DispatchError<E> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = BridgeError::UnresolvedCallback(CallbackRef(9));
        assert_eq!(format!("{}", e), "unresolved callback fn:9");

        let e = BridgeError::ArityMismatch {
            callback: CallbackRef(1),
            expected: 2,
            got: 3,
        };
        assert_eq!(format!("{}", e), "callback fn:1 expects 2 argument(s), got 3");
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("static text");
        assert_eq!(panic_message(payload.as_ref()), "static text");

        let payload: Box<dyn Any + Send> = Box::new(String::from("owned text"));
        assert_eq!(panic_message(payload.as_ref()), "owned text");

        let payload: Box<dyn Any + Send> = Box::new(17u32);
        assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
    }

    #[test]
    fn test_fatal_keeps_original_message() {
        let fatal = FatalError::capture("add", "index out of bounds");
        assert_eq!(fatal.message, "index out of bounds");
        assert_eq!(fatal.task, "add");
        assert!(format!("{}", fatal).contains("index out of bounds"));
    }

    #[test]
    fn test_dispatch_error_helpers() {
        let e: DispatchError<String> = DispatchError::Application("nope".into());
        assert!(e.is_application());
        assert!(!e.is_fatal());
        assert_eq!(e.into_application().as_deref(), Some("nope"));

        let e: DispatchError<String> = DispatchError::Protocol("bad shape".into());
        assert_eq!(format!("{}", e), "protocol violation: bad shape");
    }
}
