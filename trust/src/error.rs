//! Error taxonomy for the trust core.
//!
//! Encryption failures are deliberately absent from this enum: `encrypt`/
//! `decrypt` are total functions (see [`crate::encryption`]) and never
//! return a `Result`, so an encryption failure is unrepresentable here by
//! construction.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TrustError {
    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("origin rejected: {reason}")]
    OriginRejected { reason: String },

    #[error("path escapes sandbox root")]
    PathEscapesSandbox,

    #[error("path matches a sensitive-location blocklist entry")]
    SensitivePath,

    #[error("symlink forbidden along resolved path")]
    SymlinkForbidden,

    #[error("approval request timed out")]
    ApprovalTimeout,

    #[error("approval request cancelled: {reason}")]
    ApprovalCancelled { reason: String },

    #[error("approval denied")]
    ApprovalDenied,

    #[error("invalid approval decision: {0}")]
    InvalidDecision(String),

    #[error("approval request not found")]
    ApprovalNotFound,
}
