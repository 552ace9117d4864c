//! # portcall-core
//!
//! Core types for the portcall call-dispatch layer.
//!
//! This crate holds everything both sides of the call boundary agree on.
//! It has no threads and no global registries; those live in
//! `portcall-runtime`.
//!
//! ## Modules
//!
//! - `id` - Port and callback identifiers
//! - `wire` - Values posted to ports and raw sync return buffers
//! - `codec` - Codec contract (`Codec`, `SyncCodec`)
//! - `tagged` - Default tagged codec
//! - `error` - Error types
//! - `log` - Leveled stderr logging macros
//! - `env` - Environment variable utilities

pub mod id;
pub mod wire;
pub mod codec;
pub mod tagged;
pub mod error;
pub mod log;
pub mod env;

// Re-exports for convenience
pub use id::{CallbackRef, PortId};
pub use wire::{ControlSignal, WireObject, WireSyncReturn};
pub use codec::{Codec, SyncCodec};
pub use tagged::TaggedCodec;
pub use error::{BridgeError, DecodeError, DispatchError, FatalError, Result};
pub use env::{env_get, env_get_bool, env_get_opt, env_get_str};
