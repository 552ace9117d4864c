//! Dispatcher configuration
//!
//! Compile-time defaults with runtime environment overrides.
//!
//! # Example
//!
//! ```rust,ignore
//! use portcall_runtime::config::DispatcherConfig;
//!
//! let config = DispatcherConfig::from_env()
//!     .max_pending_calls(1024)
//!     .pump_interval(Duration::from_millis(5));
//! ```

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use portcall_core::env::{env_get, env_get_bool, env_get_str};
use portcall_core::error::{BridgeError, Result};
use portcall_core::log_warn;

pub mod defaults {
    /// Upper bound on live single-use ports.
    pub const MAX_PENDING_CALLS: usize = 65_536;
    /// Debug name of the port native code posts reverse calls to.
    pub const REVERSE_PORT_NAME: &str = "portcall.reverse";
    pub const PUMP_INTERVAL_MS: u64 = 10;
    pub const WARN_ON_DROPPED: bool = false;
}

/// How the managed loop is woken when deliveries arrive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifierKind {
    /// Linux eventfd; pollable by an external event loop.
    EventFd,
    /// Mutex + condvar; works everywhere.
    Condvar,
}

impl Default for NotifierKind {
    fn default() -> Self {
        if cfg!(target_os = "linux") {
            NotifierKind::EventFd
        } else {
            NotifierKind::Condvar
        }
    }
}

impl FromStr for NotifierKind {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, ()> {
        match s.trim().to_ascii_lowercase().as_str() {
            "eventfd" => Ok(NotifierKind::EventFd),
            "condvar" => Ok(NotifierKind::Condvar),
            _ => Err(()),
        }
    }
}

impl fmt::Display for NotifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotifierKind::EventFd => write!(f, "eventfd"),
            NotifierKind::Condvar => write!(f, "condvar"),
        }
    }
}

/// Dispatcher configuration with builder pattern.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Maximum concurrently pending async calls
    pub max_pending_calls: usize,
    /// Debug name of the reverse-call port
    pub reverse_port_name: String,
    /// Default wait used by `Dispatcher::pump` callers
    pub pump_interval: Duration,
    pub notifier: NotifierKind,
    /// Log deliveries to unknown ports at warn level instead of trace
    pub warn_on_dropped: bool,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl DispatcherConfig {
    /// Defaults with environment overrides.
    ///
    /// Environment variables (all optional):
    /// - `PORTCALL_MAX_PENDING_CALLS` - Pending async call limit
    /// - `PORTCALL_REVERSE_PORT_NAME` - Reverse-call port debug name
    /// - `PORTCALL_PUMP_INTERVAL_MS` - Pump wait in milliseconds
    /// - `PORTCALL_NOTIFIER` - `eventfd` or `condvar`
    /// - `PORTCALL_WARN_DROPPED` - Warn on dropped deliveries (true/false)
    pub fn from_env() -> Self {
        let notifier = match std::env::var("PORTCALL_NOTIFIER") {
            Ok(v) => v.parse().unwrap_or_else(|_| {
                log_warn!("PORTCALL_NOTIFIER={:?} not recognized, using default", v);
                NotifierKind::default()
            }),
            Err(_) => NotifierKind::default(),
        };
        Self {
            max_pending_calls: env_get("PORTCALL_MAX_PENDING_CALLS", defaults::MAX_PENDING_CALLS),
            reverse_port_name: env_get_str(
                "PORTCALL_REVERSE_PORT_NAME",
                defaults::REVERSE_PORT_NAME,
            ),
            pump_interval: Duration::from_millis(env_get(
                "PORTCALL_PUMP_INTERVAL_MS",
                defaults::PUMP_INTERVAL_MS,
            )),
            notifier,
            warn_on_dropped: env_get_bool("PORTCALL_WARN_DROPPED", defaults::WARN_ON_DROPPED),
        }
    }

    /// Explicit defaults, no environment lookup.
    pub fn new() -> Self {
        Self {
            max_pending_calls: defaults::MAX_PENDING_CALLS,
            reverse_port_name: defaults::REVERSE_PORT_NAME.to_string(),
            pump_interval: Duration::from_millis(defaults::PUMP_INTERVAL_MS),
            notifier: NotifierKind::default(),
            warn_on_dropped: defaults::WARN_ON_DROPPED,
        }
    }

    // Builder methods

    pub fn max_pending_calls(mut self, n: usize) -> Self {
        self.max_pending_calls = n;
        self
    }

    pub fn reverse_port_name(mut self, name: impl Into<String>) -> Self {
        self.reverse_port_name = name.into();
        self
    }

    pub fn pump_interval(mut self, d: Duration) -> Self {
        self.pump_interval = d;
        self
    }

    pub fn notifier(mut self, kind: NotifierKind) -> Self {
        self.notifier = kind;
        self
    }

    pub fn warn_on_dropped(mut self, enable: bool) -> Self {
        self.warn_on_dropped = enable;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_pending_calls == 0 {
            return Err(BridgeError::InvalidConfig("max_pending_calls must be > 0"));
        }
        if self.reverse_port_name.trim().is_empty() {
            return Err(BridgeError::InvalidConfig("reverse_port_name must not be empty"));
        }
        if self.pump_interval.is_zero() {
            return Err(BridgeError::InvalidConfig("pump_interval must be > 0"));
        }
        Ok(())
    }

    /// Print configuration (for debugging)
    pub fn print(&self) {
        eprintln!("portcall configuration:");
        eprintln!("  max_pending_calls:  {}", self.max_pending_calls);
        eprintln!("  reverse_port_name:  {}", self.reverse_port_name);
        eprintln!("  pump_interval:      {:?}", self.pump_interval);
        eprintln!("  notifier:           {}", self.notifier);
        eprintln!("  warn_on_dropped:    {}", self.warn_on_dropped);
    }
}
