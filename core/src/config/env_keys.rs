//! Environment-variable key constants and aliases.
//!
//! Primary variables use `WARDLINE_*`. A few keys are fixed by the external
//! contract (§6 of the spec) and are not prefixed: `SESSION_ENCRYPTION`,
//! `STATE_DIR`, `HOME`.

/// Session transcript encryption toggle (contract-fixed name).
pub const SESSION_ENCRYPTION: &str = "SESSION_ENCRYPTION";

/// State directory override (contract-fixed name).
pub const STATE_DIR: &str = "STATE_DIR";

/// Observability.
pub mod observability {
    pub const WARDLINE_QUIET: &str = "WARDLINE_QUIET";
    pub const WARDLINE_LOG_LEVEL: &str = "WARDLINE_LOG_LEVEL";
    pub const WARDLINE_LOG_JSON: &str = "WARDLINE_LOG_JSON";
    pub const WARDLINE_AUDIT_LOG: &str = "WARDLINE_AUDIT_LOG";
}

/// Rate limiter & origin guard.
pub mod rate_limit {
    pub const WARDLINE_CONN_LIMIT_PER_MIN: &str = "WARDLINE_CONN_LIMIT_PER_MIN";
    pub const WARDLINE_RPC_LIMIT_PER_SEC: &str = "WARDLINE_RPC_LIMIT_PER_SEC";
    pub const WARDLINE_AUTH_FAILURE_THRESHOLD: &str = "WARDLINE_AUTH_FAILURE_THRESHOLD";
    pub const WARDLINE_CLEANUP_INTERVAL_MS: &str = "WARDLINE_CLEANUP_INTERVAL_MS";
    pub const WARDLINE_ALLOWED_ORIGINS: &str = "WARDLINE_ALLOWED_ORIGINS";
}

/// Approval coordinator.
pub mod approval {
    pub const WARDLINE_APPROVAL_TIMEOUT_MS: &str = "WARDLINE_APPROVAL_TIMEOUT_MS";
}
