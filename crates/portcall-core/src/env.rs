//! Environment variable helpers used by configuration.
//!
//! ```ignore
//! use portcall_core::env::{env_get, env_get_bool};
//!
//! let limit: usize = env_get("PORTCALL_MAX_PENDING_CALLS", 65536);
//! let warn = env_get_bool("PORTCALL_WARN_DROPPED", true);
//! ```

use std::str::FromStr;

/// Parse `key` as `T`, falling back to `default` when unset or unparsable.
#[inline]
pub fn env_get<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    env_get_opt(key).unwrap_or(default)
}

/// Parse `key` as `T`; `None` when unset or unparsable.
#[inline]
pub fn env_get_opt<T>(key: &str) -> Option<T>
where
    T: FromStr,
{
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// Boolean flag. "1", "true", "yes", "on" are true; "0", "false", "no",
/// "off" are false (case-insensitive). Anything else keeps `default`.
#[inline]
pub fn env_get_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(val) => match val.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => default,
        },
        Err(_) => default,
    }
}

/// String value, or `default` when unset.
#[inline]
pub fn env_get_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_get_default() {
        let val: usize = env_get("__PORTCALL_TEST_UNSET__", 42);
        assert_eq!(val, 42);
        let val: Option<u64> = env_get_opt("__PORTCALL_TEST_UNSET__");
        assert!(val.is_none());
        assert_eq!(env_get_str("__PORTCALL_TEST_UNSET__", "dflt"), "dflt");
    }

    #[test]
    fn test_env_get_parses_and_trims() {
        std::env::set_var("__PORTCALL_TEST_NUM__", " 123 ");
        let val: usize = env_get("__PORTCALL_TEST_NUM__", 0);
        assert_eq!(val, 123);
        std::env::remove_var("__PORTCALL_TEST_NUM__");
    }

    #[test]
    fn test_env_get_invalid_parse() {
        std::env::set_var("__PORTCALL_TEST_BAD__", "lots");
        let val: usize = env_get("__PORTCALL_TEST_BAD__", 99);
        assert_eq!(val, 99);
        std::env::remove_var("__PORTCALL_TEST_BAD__");
    }

    #[test]
    fn test_env_get_bool_variants() {
        std::env::set_var("__PORTCALL_TEST_BOOL__", "YES");
        assert!(env_get_bool("__PORTCALL_TEST_BOOL__", false));

        std::env::set_var("__PORTCALL_TEST_BOOL__", "off");
        assert!(!env_get_bool("__PORTCALL_TEST_BOOL__", true));

        // unrecognized keeps the default either way
        std::env::set_var("__PORTCALL_TEST_BOOL__", "maybe");
        assert!(env_get_bool("__PORTCALL_TEST_BOOL__", true));
        assert!(!env_get_bool("__PORTCALL_TEST_BOOL__", false));

        std::env::remove_var("__PORTCALL_TEST_BOOL__");
    }
}
