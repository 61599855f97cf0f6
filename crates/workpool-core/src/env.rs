//! Environment variable helpers
//!
//! Every `WP_*` knob goes through these so that a malformed value falls
//! back to the compiled-in default instead of aborting start-up.
//!
//! ```ignore
//! let workers: usize = env_get("WP_NUM_WORKERS", 4);
//! let debug = env_get_bool("WP_DEBUG", false);
//! ```

use std::str::FromStr;

/// Parse `key` as `T`, or return `default` when unset or unparsable
#[inline]
pub fn env_get<T: FromStr>(key: &str, default: T) -> T {
    env_get_opt(key).unwrap_or(default)
}

/// Parse `key` as `T`; `None` when unset or unparsable
#[inline]
pub fn env_get_opt<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// Boolean flag: "1", "true", "yes", "on" (any case) are true,
/// "0", "false", "no", "off" are false, anything else is `default`
pub fn env_get_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(val) => match val.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => default,
        },
        Err(_) => default,
    }
}

/// Raw string value, or `default`
#[inline]
pub fn env_get_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    // Each test owns its variable names so they can run in parallel.

    #[test]
    fn test_unset_uses_default() {
        let v: usize = env_get("__WP_TEST_UNSET__", 42);
        assert_eq!(v, 42);
        assert!(env_get_opt::<usize>("__WP_TEST_UNSET__").is_none());
        assert!(env_get_bool("__WP_TEST_UNSET__", true));
        assert_eq!(env_get_str("__WP_TEST_UNSET__", "w"), "w");
    }

    #[test]
    fn test_parse_and_fallback() {
        std::env::set_var("__WP_TEST_NUM__", " 123 ");
        assert_eq!(env_get::<usize>("__WP_TEST_NUM__", 0), 123);

        std::env::set_var("__WP_TEST_NUM__", "lots");
        assert_eq!(env_get::<usize>("__WP_TEST_NUM__", 7), 7);
        std::env::remove_var("__WP_TEST_NUM__");
    }

    #[test]
    fn test_bool_variants() {
        for (raw, expected) in [("1", true), ("TRUE", true), ("on", true), ("no", false), ("0", false)] {
            std::env::set_var("__WP_TEST_BOOL__", raw);
            assert_eq!(env_get_bool("__WP_TEST_BOOL__", !expected), expected, "{}", raw);
        }
        std::env::set_var("__WP_TEST_BOOL__", "maybe");
        assert!(env_get_bool("__WP_TEST_BOOL__", true));
        assert!(!env_get_bool("__WP_TEST_BOOL__", false));
        std::env::remove_var("__WP_TEST_BOOL__");
    }
}
