//! Leveled stderr logging.
//!
//! Every line is written under the stderr lock so lines from native
//! delivery threads and the managed loop never interleave.
//!
//! # Environment Variables
//!
//! - `PORTCALL_LOG_LEVEL=<level>`: off|error|warn|info|debug|trace or 0..5 (default: warn)
//! - `PORTCALL_LOG_FLUSH=1`: flush stderr after every line
//!
//! ```ignore
//! use portcall_core::{log_debug, log_warn};
//!
//! log_debug!("port {} registered for '{}'", port, name);
//! log_warn!("delivery on unregistered {}", port);
//! ```

use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Once;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Off = 0,
    Error = 1,
    Warn = 2,
    Info = 3,
    Debug = 4,
    Trace = 5,
}

impl LogLevel {
    pub fn from_u8(v: u8) -> Self {
        match v {
            0 => LogLevel::Off,
            1 => LogLevel::Error,
            2 => LogLevel::Warn,
            3 => LogLevel::Info,
            4 => LogLevel::Debug,
            _ => LogLevel::Trace,
        }
    }

    /// Parse a level name or digit.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "off" | "0" => Some(LogLevel::Off),
            "error" | "1" => Some(LogLevel::Error),
            "warn" | "2" => Some(LogLevel::Warn),
            "info" | "3" => Some(LogLevel::Info),
            "debug" | "4" => Some(LogLevel::Debug),
            "trace" | "5" => Some(LogLevel::Trace),
            _ => None,
        }
    }

    fn tag(self) -> &'static str {
        match self {
            LogLevel::Off => "",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

static INIT: Once = Once::new();
static LEVEL: AtomicU8 = AtomicU8::new(LogLevel::Warn as u8);
static FLUSH: AtomicBool = AtomicBool::new(false);

/// Read `PORTCALL_LOG_LEVEL` / `PORTCALL_LOG_FLUSH`. Runs once; called
/// lazily by the first log line.
pub fn init() {
    INIT.call_once(|| {
        if let Some(level) = std::env::var("PORTCALL_LOG_LEVEL")
            .ok()
            .and_then(|v| LogLevel::parse(&v))
        {
            LEVEL.store(level as u8, Ordering::Relaxed);
        }
        FLUSH.store(
            crate::env::env_get_bool("PORTCALL_LOG_FLUSH", false),
            Ordering::Relaxed,
        );
    });
}

#[inline]
pub fn log_level() -> LogLevel {
    init();
    LogLevel::from_u8(LEVEL.load(Ordering::Relaxed))
}

/// Override the level from code. Takes precedence over the environment.
pub fn set_log_level(level: LogLevel) {
    init();
    LEVEL.store(level as u8, Ordering::Relaxed);
}

#[inline]
pub fn level_enabled(level: LogLevel) -> bool {
    level != LogLevel::Off && level <= log_level()
}

#[doc(hidden)]
pub fn _log_impl(level: LogLevel, args: std::fmt::Arguments<'_>) {
    if !level_enabled(level) {
        return;
    }
    let stderr = std::io::stderr();
    let mut handle = stderr.lock();
    let _ = write!(handle, "portcall[{}] ", level.tag());
    let _ = handle.write_fmt(args);
    let _ = handle.write_all(b"\n");
    if FLUSH.load(Ordering::Relaxed) {
        let _ = handle.flush();
    }
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        $crate::log::_log_impl($crate::log::LogLevel::Error, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::log::_log_impl($crate::log::LogLevel::Warn, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::log::_log_impl($crate::log::LogLevel::Info, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        $crate::log::_log_impl($crate::log::LogLevel::Debug, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_trace {
    ($($arg:tt)*) => {
        $crate::log::_log_impl($crate::log::LogLevel::Trace, format_args!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_order() {
        assert!(LogLevel::Error < LogLevel::Warn);
        assert!(LogLevel::Debug < LogLevel::Trace);
        assert_eq!(LogLevel::from_u8(200), LogLevel::Trace);
    }

    #[test]
    fn test_level_parse() {
        assert_eq!(LogLevel::parse("DEBUG"), Some(LogLevel::Debug));
        assert_eq!(LogLevel::parse("1"), Some(LogLevel::Error));
        assert_eq!(LogLevel::parse("loud"), None);
    }

    #[test]
    fn test_macros_compile() {
        // Level is process-global; only check that the macros expand.
        log_error!("error {}", 1);
        log_warn!("warn");
        log_info!("info {}", "x");
        log_debug!("debug");
        log_trace!("trace");
    }
}
