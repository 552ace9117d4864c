//! `TaggedCodec`: default `Codec` / `SyncCodec` implementation.
//!
//! Async and stream deliveries are `[tag, payload]` arrays. Sync returns
//! are malloc'd buffers whose first byte is the tag. The payload decoders
//! are plain function pointers supplied per signature.
//!
//! | Tag       | Meaning                         | Result                        |
//! |-----------|---------------------------------|-------------------------------|
//! | `SUCCESS` | completed                       | `Ok(success(payload))`        |
//! | `ERROR`   | completed with application error| `Application(error(payload))` |
//! | `PANIC`   | native abort                    | `Panic(message)`              |

use crate::codec::{Codec, SyncCodec};
use crate::error::DecodeError;
use crate::wire::{tag, WireObject, WireSyncReturn};

/// Decodes a payload object; `None` means the payload has the wrong shape.
pub type ObjectDecoder<V> = fn(WireObject) -> Option<V>;

/// Decodes a payload byte slice; `None` means the payload has the wrong shape.
pub type BytesDecoder<V> = fn(&[u8]) -> Option<V>;

pub struct TaggedCodec<T, E> {
    success: ObjectDecoder<T>,
    error: ObjectDecoder<E>,
    sync_success: Option<BytesDecoder<T>>,
    sync_error: Option<BytesDecoder<E>>,
}

impl<T, E> TaggedCodec<T, E> {
    /// Codec for async and stream calls.
    pub fn new(success: ObjectDecoder<T>, error: ObjectDecoder<E>) -> Self {
        Self {
            success,
            error,
            sync_success: None,
            sync_error: None,
        }
    }

    /// Add decoders for synchronous return buffers.
    pub fn with_sync(mut self, success: BytesDecoder<T>, error: BytesDecoder<E>) -> Self {
        self.sync_success = Some(success);
        self.sync_error = Some(error);
        self
    }
}

fn split_tag(raw: WireObject) -> Result<(u8, WireObject), String> {
    let kind = raw.kind();
    let Some(mut items) = raw.into_array() else {
        return Err(format!("expected [tag, payload], got {}", kind));
    };
    if items.len() != 2 {
        return Err(format!("expected [tag, payload], got {} element(s)", items.len()));
    }
    let payload = items.pop().unwrap_or(WireObject::Null);
    match items[0].as_int() {
        Some(t) if (0..=u8::MAX as i64).contains(&t) => Ok((t as u8, payload)),
        _ => Err(format!("bad tag {:?}", items[0])),
    }
}

impl<T, E> Codec for TaggedCodec<T, E>
where
    T: 'static,
    E: 'static,
{
    type Output = T;
    type Error = E;

    fn decode_object(&self, raw: WireObject) -> Result<T, DecodeError<E>> {
        let (t, payload) = split_tag(raw).map_err(DecodeError::Malformed)?;
        match t {
            tag::SUCCESS => {
                let kind = payload.kind();
                (self.success)(payload)
                    .ok_or_else(|| DecodeError::Malformed(format!("bad success payload ({})", kind)))
            }
            tag::ERROR => {
                let kind = payload.kind();
                match (self.error)(payload) {
                    Some(e) => Err(DecodeError::Application(e)),
                    None => Err(DecodeError::Malformed(format!("bad error payload ({})", kind))),
                }
            }
            tag::PANIC => {
                let message = match payload {
                    WireObject::Str(s) => s,
                    other => format!("{:?}", other),
                };
                Err(DecodeError::Panic(message))
            }
            other => Err(DecodeError::Malformed(format!("unknown tag {}", other))),
        }
    }
}

impl<T, E> SyncCodec for TaggedCodec<T, E>
where
    T: 'static,
    E: 'static,
{
    type WireSync = WireSyncReturn;

    fn decode_wire_sync(&self, raw: &WireSyncReturn) -> Result<T, DecodeError<E>> {
        let bytes = raw.as_slice();
        let Some((&t, payload)) = bytes.split_first() else {
            return Err(DecodeError::Malformed("empty sync return".into()));
        };
        let (Some(success), Some(error)) = (self.sync_success, self.sync_error) else {
            return Err(DecodeError::Malformed("codec has no sync decoders".into()));
        };
        match t {
            tag::SUCCESS => success(payload)
                .ok_or_else(|| DecodeError::Malformed("bad sync success payload".into())),
            tag::ERROR => match error(payload) {
                Some(e) => Err(DecodeError::Application(e)),
                None => Err(DecodeError::Malformed("bad sync error payload".into())),
            },
            tag::PANIC => Err(DecodeError::Panic(String::from_utf8_lossy(payload).into_owned())),
            other => Err(DecodeError::Malformed(format!("unknown sync tag {}", other))),
        }
    }

    fn free_wire_sync(&self, raw: WireSyncReturn) {
        raw.free();
    }
}

/// Payload decoder for `i64` objects.
pub fn decode_i64(raw: WireObject) -> Option<i64> {
    raw.as_int()
}

/// Payload decoder for string objects.
pub fn decode_string(raw: WireObject) -> Option<String> {
    match raw {
        WireObject::Str(s) => Some(s),
        _ => None,
    }
}

/// Payload decoder for little-endian `i64` sync buffers.
pub fn decode_i64_le(bytes: &[u8]) -> Option<i64> {
    let arr: [u8; 8] = bytes.try_into().ok()?;
    Some(i64::from_le_bytes(arr))
}

/// Payload decoder for UTF-8 sync buffers.
pub fn decode_utf8(bytes: &[u8]) -> Option<String> {
    std::str::from_utf8(bytes).ok().map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec() -> TaggedCodec<i64, String> {
        TaggedCodec::new(decode_i64, decode_string).with_sync(decode_i64_le, decode_utf8)
    }

    #[test]
    fn test_decode_success() {
        let v = codec().decode_object(WireObject::success(WireObject::Int(300)));
        assert_eq!(v, Ok(300));
    }

    #[test]
    fn test_decode_application_error() {
        let v = codec().decode_object(WireObject::error("overflow".into()));
        assert_eq!(v, Err(DecodeError::Application("overflow".to_string())));
    }

    #[test]
    fn test_decode_panic() {
        let v = codec().decode_object(WireObject::panic("attempt to add with overflow"));
        assert_eq!(
            v,
            Err(DecodeError::Panic("attempt to add with overflow".to_string()))
        );
    }

    #[test]
    fn test_decode_malformed() {
        assert!(matches!(
            codec().decode_object(WireObject::Int(1)),
            Err(DecodeError::Malformed(_))
        ));
        assert!(matches!(
            codec().decode_object(WireObject::Array(vec![WireObject::Int(9), WireObject::Null])),
            Err(DecodeError::Malformed(_))
        ));
        assert!(matches!(
            codec().decode_object(WireObject::success(WireObject::Str("x".into()))),
            Err(DecodeError::Malformed(_))
        ));
    }

    #[test]
    fn test_decode_sync() {
        let c = codec();
        let buf = WireSyncReturn::success(&42i64.to_le_bytes());
        assert_eq!(c.decode_wire_sync(&buf), Ok(42));
        c.free_wire_sync(buf);

        let buf = WireSyncReturn::error(b"denied");
        assert_eq!(
            c.decode_wire_sync(&buf),
            Err(DecodeError::Application("denied".to_string()))
        );
        c.free_wire_sync(buf);
    }

    #[test]
    fn test_sync_without_decoders() {
        let c: TaggedCodec<i64, String> = TaggedCodec::new(decode_i64, decode_string);
        let buf = WireSyncReturn::success(&1i64.to_le_bytes());
        assert!(matches!(c.decode_wire_sync(&buf), Err(DecodeError::Malformed(_))));
        c.free_wire_sync(buf);
    }
}
