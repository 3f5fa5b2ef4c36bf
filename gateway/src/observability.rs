//! Observability: tracing init and the JSON Lines audit log.
//!
//! Adapted from the teacher's `observability.rs`: a lazily-resolved,
//! cached log path plus a family of small `audit_*`/`security_*` functions
//! that append structured records. Event names are renamed for this
//! subsystem's own vocabulary (approvals, rate limiting, origin rejection,
//! injection detection) in place of skill-execution events.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use serde_json::json;
use tracing_subscriber::{prelude::*, EnvFilter};
use wardline_core::config::ObservabilityConfig;

static AUDIT_PATH: Mutex<Option<String>> = Mutex::new(None);

/// Initialize tracing. Call once at process startup.
pub fn init_tracing() {
    let cfg = ObservabilityConfig::from_env();

    let level = if cfg.quiet {
        "wardline=warn".to_string()
    } else {
        cfg.log_level.clone()
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let _ = if cfg.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(false),
            )
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false),
            )
            .try_init()
    };
}

fn get_audit_path() -> Option<String> {
    {
        let guard = AUDIT_PATH.lock().ok()?;
        if let Some(ref p) = *guard {
            return Some(p.clone());
        }
    }
    let path = ObservabilityConfig::from_env().audit_log.clone()?;
    if path.is_empty() {
        return None;
    }
    if let Some(parent) = Path::new(&path).parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    {
        let mut guard = AUDIT_PATH.lock().ok()?;
        *guard = Some(path.clone());
    }
    Some(path)
}

fn append_jsonl(path: &str, record: &serde_json::Value) {
    if let Ok(mut f) = OpenOptions::new().create(true).append(true).open(path) {
        if let Ok(line) = serde_json::to_string(record) {
            let _ = writeln!(f, "{line}");
        }
    }
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

pub fn audit_approval_requested(request_id: &str, session_key: &str, run_id: &str, kind: &str) {
    tracing::info!(request_id, session_key, run_id, kind, "approval requested");
    if let Some(path) = get_audit_path() {
        append_jsonl(
            &path,
            &json!({
                "ts": now_rfc3339(),
                "event": "approval_request",
                "request_id": request_id,
                "session_key": session_key,
                "run_id": run_id,
                "kind": kind,
            }),
        );
    }
}

pub fn audit_approval_resolved(request_id: &str, decision: &str) {
    tracing::info!(request_id, decision, "approval resolved");
    if let Some(path) = get_audit_path() {
        append_jsonl(
            &path,
            &json!({
                "ts": now_rfc3339(),
                "event": "approval_resolved",
                "request_id": request_id,
                "decision": decision,
            }),
        );
    }
}

pub fn security_rate_limited(ip: &str, scope: &str, retry_after_ms: u64) {
    tracing::warn!(ip, scope, retry_after_ms, "connection rate limited");
    if let Some(path) = get_audit_path() {
        append_jsonl(
            &path,
            &json!({
                "ts": now_rfc3339(),
                "event": "rate_limited",
                "ip": ip,
                "scope": scope,
                "retry_after_ms": retry_after_ms,
            }),
        );
    }
}

pub fn security_origin_rejected(origin: &str, reason: &str) {
    tracing::warn!(origin, reason, "websocket origin rejected");
    if let Some(path) = get_audit_path() {
        append_jsonl(
            &path,
            &json!({
                "ts": now_rfc3339(),
                "event": "origin_rejected",
                "origin": origin,
                "reason": reason,
            }),
        );
    }
}

pub fn security_injection_detected(risk_level: &str, score: u8, matched_labels: &[String]) {
    tracing::warn!(risk_level, score, matched = ?matched_labels, "prompt injection detected");
    if let Some(path) = get_audit_path() {
        append_jsonl(
            &path,
            &json!({
                "ts": now_rfc3339(),
                "event": "injection_detected",
                "risk_level": risk_level,
                "score": score,
                "matched_labels": matched_labels,
            }),
        );
    }
}
