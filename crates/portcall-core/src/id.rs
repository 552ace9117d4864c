//! Port and callback identifiers
//!
//! Both are plain integers so they can be handed across the call boundary
//! unchanged. Native code never interprets them; it only hands them back.

use core::fmt;

/// Identity of a port (single-use or broadcast).
///
/// Allocated monotonically by the dispatcher context, never reused while
/// the context lives. Negative values are reserved; `PortId::NONE` marks
/// "no port" in places where a port is optional.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct PortId(i64);

impl PortId {
    /// Sentinel value indicating no port
    pub const NONE: PortId = PortId(-1);

    /// Create a PortId from a raw value
    #[inline]
    pub const fn new(raw: i64) -> Self {
        PortId(raw)
    }

    /// Get the raw value, as passed to native code
    #[inline]
    pub const fn raw(self) -> i64 {
        self.0
    }

    /// Check if this is the NONE sentinel
    #[inline]
    pub const fn is_none(self) -> bool {
        self.0 < 0
    }
}

impl From<i64> for PortId {
    #[inline]
    fn from(raw: i64) -> Self {
        PortId(raw)
    }
}

impl From<PortId> for i64 {
    #[inline]
    fn from(id: PortId) -> Self {
        id.0
    }
}

impl fmt::Debug for PortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            write!(f, "PortId(NONE)")
        } else {
            write!(f, "PortId({})", self.0)
        }
    }
}

impl fmt::Display for PortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            write!(f, "port:none")
        } else {
            write!(f, "port:{}", self.0)
        }
    }
}

/// Opaque reference to a managed function shared with native code.
///
/// Resolved back to a callable through the callback table when a
/// reverse-call message arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct CallbackRef(pub u64);

impl CallbackRef {
    #[inline]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for CallbackRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fn:{}", self.0)
    }
}
