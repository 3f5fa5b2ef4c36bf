//! Domain-grouped configuration structs.
//!
//! Loaded from environment variables with the fallback logic centralized in
//! [`super::loader`].

use super::env_keys::{approval, observability as obv_keys, rate_limit, SESSION_ENCRYPTION, STATE_DIR};
use super::loader::{env_bool, env_optional, env_or, env_u64};
use std::path::PathBuf;

/// Rate limiter thresholds (connections/sec, RPC calls/sec, auth lockout).
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub conn_limit_per_min: u64,
    pub rpc_limit_per_sec: u64,
    pub auth_failure_threshold: u64,
    pub cleanup_interval_ms: u64,
}

impl RateLimitConfig {
    pub fn from_env() -> Self {
        super::loader::load_dotenv();
        Self {
            conn_limit_per_min: env_u64(rate_limit::WARDLINE_CONN_LIMIT_PER_MIN, &[], 10),
            rpc_limit_per_sec: env_u64(rate_limit::WARDLINE_RPC_LIMIT_PER_SEC, &[], 100),
            auth_failure_threshold: env_u64(rate_limit::WARDLINE_AUTH_FAILURE_THRESHOLD, &[], 5),
            cleanup_interval_ms: env_u64(rate_limit::WARDLINE_CLEANUP_INTERVAL_MS, &[], 60_000),
        }
    }
}

/// WebSocket Origin allowlist.
#[derive(Debug, Clone)]
pub struct OriginConfig {
    /// Literal origins or `*.example.com`-style suffix wildcards.
    pub allowed_origins: Vec<String>,
}

impl OriginConfig {
    pub fn from_env() -> Self {
        super::loader::load_dotenv();
        let raw = env_optional(rate_limit::WARDLINE_ALLOWED_ORIGINS, &[]).unwrap_or_default();
        let allowed_origins = raw
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        Self { allowed_origins }
    }
}

/// Session transcript encryption toggle.
#[derive(Debug, Clone)]
pub struct EncryptionConfig {
    pub enabled: bool,
}

impl EncryptionConfig {
    pub fn from_env() -> Self {
        super::loader::load_dotenv();
        Self {
            enabled: env_bool(SESSION_ENCRYPTION, &[], true),
        }
    }
}

/// Approval coordinator timeout.
#[derive(Debug, Clone)]
pub struct ApprovalConfig {
    pub timeout_ms: u64,
}

impl ApprovalConfig {
    pub fn from_env() -> Self {
        super::loader::load_dotenv();
        Self {
            timeout_ms: env_u64(approval::WARDLINE_APPROVAL_TIMEOUT_MS, &[], 30 * 60 * 1000),
        }
    }
}

/// Logging / audit trail configuration.
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    pub quiet: bool,
    pub log_level: String,
    pub log_json: bool,
    pub audit_log: Option<String>,
}

impl ObservabilityConfig {
    pub fn from_env() -> &'static Self {
        use std::sync::OnceLock;
        static CACHE: OnceLock<ObservabilityConfig> = OnceLock::new();
        CACHE.get_or_init(|| {
            super::loader::load_dotenv();
            Self {
                quiet: env_bool(obv_keys::WARDLINE_QUIET, &[], false),
                log_level: env_or(obv_keys::WARDLINE_LOG_LEVEL, &[], || "wardline=info".to_string()),
                log_json: env_bool(obv_keys::WARDLINE_LOG_JSON, &[], false),
                audit_log: env_optional(obv_keys::WARDLINE_AUDIT_LOG, &[]),
            }
        })
    }
}

/// State directory resolution: `STATE_DIR` env var, falling back to the
/// persisted-state contract default of `$HOME/.clawdbot`.
#[derive(Debug, Clone)]
pub struct StateDirConfig {
    pub dir: PathBuf,
}

impl StateDirConfig {
    pub fn from_env() -> Self {
        super::loader::load_dotenv();
        let dir = match env_optional(STATE_DIR, &[]) {
            Some(explicit) => PathBuf::from(explicit),
            None => {
                let home = env_optional("HOME", &[])
                    .map(PathBuf::from)
                    .or_else(dirs::home_dir)
                    .unwrap_or_else(|| PathBuf::from("."));
                home.join(".clawdbot")
            }
        };
        Self { dir }
    }

    pub fn session_key_path(&self) -> PathBuf {
        self.dir.join(".session-key")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // `STATE_DIR` is process-global; serialize tests that override it so
    // cargo's default multi-threaded runner can't interleave them.
    static STATE_DIR_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn state_dir_honors_env_override() {
        let _guard = STATE_DIR_LOCK.lock().unwrap();
        let tmp = tempfile::tempdir().unwrap();
        super::super::loader::set_env_var(STATE_DIR, tmp.path().to_str().unwrap());
        let cfg = StateDirConfig::from_env();
        assert_eq!(cfg.dir, tmp.path());
        super::super::loader::remove_env_var(STATE_DIR);
    }

    #[test]
    fn state_dir_defaults_to_clawdbot_under_home() {
        let cfg = StateDirConfig {
            dir: PathBuf::from("/home/tester").join(".clawdbot"),
        };
        assert_eq!(cfg.dir, PathBuf::from("/home/tester/.clawdbot"));
        assert_eq!(
            cfg.session_key_path(),
            PathBuf::from("/home/tester/.clawdbot/.session-key")
        );
    }

    #[test]
    fn origin_config_parses_comma_separated_list() {
        let raw = "https://a.example.com, *.trusted.net ,,";
        let allowed: Vec<String> = raw
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        assert_eq!(allowed, vec!["https://a.example.com", "*.trusted.net"]);
    }
}
