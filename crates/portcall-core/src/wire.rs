//! Values that cross the call boundary.
//!
//! `WireObject` is what native code posts to a port. `WireSyncReturn` is
//! the raw buffer a synchronous native call hands back; it is allocated by
//! the native side and must be released exactly once through the codec.
//!
//! Neither type defines the encoding of any particular payload; codecs
//! decide what a given shape means.

use std::alloc::{handle_alloc_error, Layout};
use std::ptr::NonNull;

/// Result tags used by the tagged encodings (`[tag, payload]` objects and
/// `tag byte + payload` sync buffers).
pub mod tag {
    /// The call completed and the payload is the success value.
    pub const SUCCESS: u8 = 0;
    /// The call completed with an application error payload.
    pub const ERROR: u8 = 1;
    /// The native side panicked; the payload is the panic message.
    pub const PANIC: u8 = 2;
}

/// Out-of-band signals carried on a port instead of a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSignal {
    /// The producer of a stream is done. No element is emitted for it.
    EndOfStream,
}

/// A value posted to a port by native code.
#[derive(Debug, Clone, PartialEq)]
pub enum WireObject {
    Null,
    Bool(bool),
    Int(i64),
    Double(f64),
    Str(String),
    Bytes(Vec<u8>),
    Array(Vec<WireObject>),
    /// Reference to a managed function previously shared with native code.
    Callback(crate::id::CallbackRef),
    Control(ControlSignal),
}

impl WireObject {
    /// The end-of-stream sentinel.
    pub const END_OF_STREAM: WireObject = WireObject::Control(ControlSignal::EndOfStream);

    /// Short type name, for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            WireObject::Null => "null",
            WireObject::Bool(_) => "bool",
            WireObject::Int(_) => "int",
            WireObject::Double(_) => "double",
            WireObject::Str(_) => "string",
            WireObject::Bytes(_) => "bytes",
            WireObject::Array(_) => "array",
            WireObject::Callback(_) => "callback",
            WireObject::Control(_) => "control",
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            WireObject::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            WireObject::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            WireObject::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn into_array(self) -> Option<Vec<WireObject>> {
        match self {
            WireObject::Array(items) => Some(items),
            _ => None,
        }
    }

    #[inline]
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, WireObject::Control(ControlSignal::EndOfStream))
    }

    /// Native-side helper: `[SUCCESS, payload]`.
    pub fn success(payload: WireObject) -> Self {
        WireObject::Array(vec![WireObject::Int(tag::SUCCESS as i64), payload])
    }

    /// Native-side helper: `[ERROR, payload]`.
    pub fn error(payload: WireObject) -> Self {
        WireObject::Array(vec![WireObject::Int(tag::ERROR as i64), payload])
    }

    /// Native-side helper: `[PANIC, message]`.
    pub fn panic(message: impl Into<String>) -> Self {
        WireObject::Array(vec![
            WireObject::Int(tag::PANIC as i64),
            WireObject::Str(message.into()),
        ])
    }
}

impl From<i64> for WireObject {
    fn from(v: i64) -> Self {
        WireObject::Int(v)
    }
}

impl From<bool> for WireObject {
    fn from(v: bool) -> Self {
        WireObject::Bool(v)
    }
}

impl From<f64> for WireObject {
    fn from(v: f64) -> Self {
        WireObject::Double(v)
    }
}

impl From<&str> for WireObject {
    fn from(v: &str) -> Self {
        WireObject::Str(v.to_string())
    }
}

impl From<String> for WireObject {
    fn from(v: String) -> Self {
        WireObject::Str(v)
    }
}

impl From<Vec<u8>> for WireObject {
    fn from(v: Vec<u8>) -> Self {
        WireObject::Bytes(v)
    }
}

/// Raw return buffer of a synchronous native call.
///
/// Allocated with the C allocator on the native side. There is no `Drop`
/// impl: ownership is explicit and the buffer must be handed to
/// [`WireSyncReturn::free`] (normally through `SyncCodec::free_wire_sync`)
/// exactly once. `free` consumes the value, so a double free does not
/// type-check.
#[derive(Debug)]
pub struct WireSyncReturn {
    ptr: NonNull<u8>,
    len: usize,
}

// Safety: the buffer is plain bytes exclusively owned by this handle.
unsafe impl Send for WireSyncReturn {}

impl WireSyncReturn {
    /// Native-side allocation: copy `bytes` into a fresh malloc'd buffer.
    pub fn alloc(bytes: &[u8]) -> Self {
        // malloc(0) may return NULL; always ask for at least one byte.
        let size = bytes.len().max(1);
        let raw = unsafe { libc::malloc(size) } as *mut u8;
        let Some(ptr) = NonNull::new(raw) else {
            handle_alloc_error(Layout::array::<u8>(size).unwrap_or(Layout::new::<u8>()));
        };
        unsafe {
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), ptr.as_ptr(), bytes.len());
        }
        Self {
            ptr,
            len: bytes.len(),
        }
    }

    /// Native-side helper: `SUCCESS` tag byte followed by `payload`.
    pub fn success(payload: &[u8]) -> Self {
        Self::tagged(tag::SUCCESS, payload)
    }

    /// Native-side helper: `ERROR` tag byte followed by `payload`.
    pub fn error(payload: &[u8]) -> Self {
        Self::tagged(tag::ERROR, payload)
    }

    /// Native-side helper: `PANIC` tag byte followed by the UTF-8 message.
    pub fn panic(message: &str) -> Self {
        Self::tagged(tag::PANIC, message.as_bytes())
    }

    fn tagged(tag: u8, payload: &[u8]) -> Self {
        let mut bytes = Vec::with_capacity(payload.len() + 1);
        bytes.push(tag);
        bytes.extend_from_slice(payload);
        Self::alloc(&bytes)
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Release the buffer back to the C allocator.
    pub fn free(self) {
        unsafe { libc::free(self.ptr.as_ptr() as *mut libc::c_void) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_return_alloc_and_free() {
        let buf = WireSyncReturn::alloc(b"hello");
        assert_eq!(buf.len(), 5);
        assert_eq!(buf.as_slice(), b"hello");
        buf.free();
    }

    #[test]
    fn test_sync_return_empty() {
        let buf = WireSyncReturn::alloc(&[]);
        assert!(buf.is_empty());
        assert_eq!(buf.as_slice(), &[] as &[u8]);
        buf.free();
    }

    #[test]
    fn test_sync_return_tagged() {
        let buf = WireSyncReturn::panic("boom");
        assert_eq!(buf.as_slice()[0], tag::PANIC);
        assert_eq!(&buf.as_slice()[1..], b"boom");
        buf.free();
    }

    #[test]
    fn test_tagged_objects() {
        let ok = WireObject::success(WireObject::Int(3));
        let items = ok.into_array().unwrap();
        assert_eq!(items[0], WireObject::Int(0));
        assert_eq!(items[1], WireObject::Int(3));
        assert!(WireObject::END_OF_STREAM.is_end_of_stream());
        assert!(!WireObject::Null.is_end_of_stream());
    }
}
