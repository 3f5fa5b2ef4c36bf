//! Centralized environment-variable loading.
//!
//! Keeps the fallback-chain logic in one place instead of scattering
//! `or_else` calls through business code.

use std::env;

/// Load a `.env` file from the current directory into the environment
/// (without overwriting variables already set). Runs at most once.
pub fn load_dotenv() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let path = env::current_dir()
            .map(|d| d.join(".env"))
            .unwrap_or_else(|_| std::path::PathBuf::from(".env"));
        if let Ok(content) = std::fs::read_to_string(&path) {
            tracing::debug!(path = %path.display(), "loaded .env");
            for line in content.lines() {
                let line = line.trim();
                if line.is_empty() || line.starts_with('#') {
                    continue;
                }
                if let Some(eq_pos) = line.find('=') {
                    let key = line[..eq_pos].trim();
                    let mut value = line[eq_pos + 1..].trim();
                    // Strip inline comment (# not inside quotes)
                    if let Some(hash_pos) = value.find('#') {
                        let before_hash = value[..hash_pos].trim_end();
                        if !before_hash.contains('"') && !before_hash.contains('\'') {
                            value = before_hash;
                        }
                    }
                    if (value.starts_with('"') && value.ends_with('"'))
                        || (value.starts_with('\'') && value.ends_with('\''))
                    {
                        value = &value[1..value.len() - 1];
                    }
                    if !key.is_empty() && env::var(key).is_err() {
                        set_env_var(key, value);
                    }
                }
            }
        }
    });
}

/// Read a primary variable or its aliases, falling back to `default` if
/// none are set or all are empty.
pub fn env_or<F>(primary: &str, aliases: &[&str], default: F) -> String
where
    F: FnOnce() -> String,
{
    env::var(primary)
        .ok()
        .or_else(|| aliases.iter().find_map(|a| env::var(a).ok()))
        .filter(|s| !s.is_empty())
        .unwrap_or_else(default)
}

/// Read a primary variable or its aliases; empty values are treated as unset.
pub fn env_optional(primary: &str, aliases: &[&str]) -> Option<String> {
    env::var(primary)
        .ok()
        .or_else(|| aliases.iter().find_map(|a| env::var(a).ok()))
        .and_then(|s| {
            let s = s.trim().to_string();
            if s.is_empty() {
                None
            } else {
                Some(s)
            }
        })
}

/// Parse a boolean-like env var: `0`/`false`/`no`/`off` is false, anything
/// else set is true, unset falls back to `default`.
pub fn env_bool(primary: &str, aliases: &[&str], default: bool) -> bool {
    let v = env::var(primary)
        .ok()
        .or_else(|| aliases.iter().find_map(|a| env::var(a).ok()));
    match v.as_deref() {
        Some(s) => !matches!(
            s.trim().to_lowercase().as_str(),
            "0" | "false" | "no" | "off"
        ),
        None => default,
    }
}

/// Parse a numeric env var, falling back to `default` on absence or parse failure.
pub fn env_u64(primary: &str, aliases: &[&str], default: u64) -> u64 {
    env_optional(primary, aliases)
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(default)
}

// ─── Centralized env::set_var / remove_var wrappers ────────────────────────
//
// All calls to `std::env::set_var`/`remove_var` should go through these so
// `unsafe` does not appear scattered through business code.
//
// SAFETY contract: callers must only invoke these before spawning additional
// threads (e.g. before constructing a tokio runtime).

#[allow(unsafe_code)]
pub fn set_env_var(key: &str, value: &str) {
    unsafe { env::set_var(key, value) };
}

#[allow(unsafe_code)]
pub fn remove_env_var(key: &str) {
    unsafe { env::remove_var(key) };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_or_falls_back_to_alias_then_default() {
        remove_env_var("WARDLINE_TEST_PRIMARY");
        remove_env_var("WARDLINE_TEST_ALIAS");
        assert_eq!(
            env_or("WARDLINE_TEST_PRIMARY", &["WARDLINE_TEST_ALIAS"], || "default".to_string()),
            "default"
        );
        set_env_var("WARDLINE_TEST_ALIAS", "from-alias");
        assert_eq!(
            env_or("WARDLINE_TEST_PRIMARY", &["WARDLINE_TEST_ALIAS"], || "default".to_string()),
            "from-alias"
        );
        set_env_var("WARDLINE_TEST_PRIMARY", "from-primary");
        assert_eq!(
            env_or("WARDLINE_TEST_PRIMARY", &["WARDLINE_TEST_ALIAS"], || "default".to_string()),
            "from-primary"
        );
        remove_env_var("WARDLINE_TEST_PRIMARY");
        remove_env_var("WARDLINE_TEST_ALIAS");
    }

    #[test]
    fn env_bool_treats_off_variants_as_false() {
        for falsy in ["0", "false", "no", "off", "OFF"] {
            set_env_var("WARDLINE_TEST_BOOL", falsy);
            assert!(!env_bool("WARDLINE_TEST_BOOL", &[], true), "{falsy} should be false");
        }
        set_env_var("WARDLINE_TEST_BOOL", "anything-else");
        assert!(env_bool("WARDLINE_TEST_BOOL", &[], false));
        remove_env_var("WARDLINE_TEST_BOOL");
        assert!(env_bool("WARDLINE_TEST_BOOL", &[], true));
    }

    #[test]
    fn env_u64_falls_back_on_unparsable_value() {
        set_env_var("WARDLINE_TEST_U64", "not-a-number");
        assert_eq!(env_u64("WARDLINE_TEST_U64", &[], 42), 42);
        set_env_var("WARDLINE_TEST_U64", "7");
        assert_eq!(env_u64("WARDLINE_TEST_U64", &[], 42), 7);
        remove_env_var("WARDLINE_TEST_U64");
    }
}
