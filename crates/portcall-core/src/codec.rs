//! Codec contract.
//!
//! A codec turns raw boundary values into typed results for one function
//! signature. It is stateless and shared (`Arc<C>`) by every call of that
//! signature.
//!
//! # Implementors
//!
//! - `TaggedCodec` (default): `[tag, payload]` objects and tag-prefixed
//!   sync buffers, with per-signature payload decoders.
//! - Generated codecs: one per exported function signature, produced by
//!   the binding generator (not part of this workspace).

use crate::error::DecodeError;
use crate::wire::WireObject;

/// Decodes values delivered on ports.
///
/// **Contract:**
/// - `decode_object()` must not panic on malformed input; it returns
///   `DecodeError::Malformed` instead.
/// - Typed application errors are returned as `DecodeError::Application`
///   and are passed to the caller unchanged.
pub trait Codec: Send + Sync + 'static {
    /// Success type.
    type Output;
    /// Application error type.
    type Error;

    /// Decode one delivered value.
    fn decode_object(&self, raw: WireObject) -> Result<Self::Output, DecodeError<Self::Error>>;

    /// Whether `raw` is the end-of-stream control value rather than an
    /// element. Only consulted for stream tasks.
    fn is_end_of_stream(&self, raw: &WireObject) -> bool {
        raw.is_end_of_stream()
    }
}

/// Decodes and releases raw synchronous return buffers.
///
/// **Contract:**
/// - `decode_wire_sync()` only borrows the buffer.
/// - `free_wire_sync()` is called by the dispatcher exactly once per
///   buffer, after the decode attempt, whatever its outcome.
pub trait SyncCodec: Codec {
    /// The raw buffer type returned by the native entry point.
    type WireSync;

    fn decode_wire_sync(
        &self,
        raw: &Self::WireSync,
    ) -> Result<Self::Output, DecodeError<Self::Error>>;

    fn free_wire_sync(&self, raw: Self::WireSync);
}
