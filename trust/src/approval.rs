//! Approval Coordinator: a process-wide pending-request registry.
//!
//! Grounded on the teacher's general pattern of a process-wide
//! `Mutex`-guarded registry (the `AUDIT_PATH`/`SECURITY_EVENTS_PATH` statics
//! in its observability module) scaled up to a `HashMap`. The deferred
//! result itself is a `tokio::sync::oneshot` channel per pending request —
//! the single-resolution future the design calls for — with a
//! `tokio::time::sleep`-based timer task per request, abort-cancelable.

use crate::error::TrustError;
use crate::events::{ApprovalEvent, EventEmitter};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::oneshot;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ApprovalKind {
    Exec,
    Write,
    Edit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ApprovalDecision {
    AllowOnce,
    AllowSession,
    AllowAlways,
    Deny,
}

impl ApprovalDecision {
    pub fn approved(self) -> bool {
        !matches!(self, ApprovalDecision::Deny)
    }

    pub fn parse(s: &str) -> Result<Self, TrustError> {
        match s {
            "allow-once" => Ok(ApprovalDecision::AllowOnce),
            "allow-session" => Ok(ApprovalDecision::AllowSession),
            "allow-always" => Ok(ApprovalDecision::AllowAlways),
            "deny" => Ok(ApprovalDecision::Deny),
            other => Err(TrustError::InvalidDecision(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalAction {
    pub kind: ApprovalKind,
    pub command: Option<String>,
    pub file_path: Option<String>,
    /// Truncated to 200 chars with a trailing ellipsis by the caller.
    pub preview: Option<String>,
    pub tool_args: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub request_id: Uuid,
    pub session_key: String,
    pub run_id: String,
    pub action: ApprovalAction,
    pub timestamp_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalOutcome {
    pub approved: bool,
    pub decision: ApprovalDecision,
    pub allowlist_pattern: Option<String>,
}

type Settlement = Result<ApprovalOutcome, TrustError>;

struct PendingEntry {
    session_key: String,
    run_id: String,
    action: ApprovalAction,
    sender: oneshot::Sender<Settlement>,
    timer: tokio::task::JoinHandle<()>,
}

pub const DEFAULT_TIMEOUT_MS: u64 = 30 * 60 * 1000;

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

fn allowlist_pattern_for(action: &ApprovalAction) -> Option<String> {
    match action.kind {
        ApprovalKind::Exec => action
            .command
            .as_deref()
            .and_then(|cmd| cmd.split_whitespace().next())
            .map(str::to_string),
        ApprovalKind::Write | ApprovalKind::Edit => action.file_path.clone(),
    }
}

/// Process-wide registry of pending human-in-the-loop approval requests.
pub struct ApprovalCoordinator {
    pending: Arc<Mutex<HashMap<Uuid, PendingEntry>>>,
    emitter: EventEmitter,
    default_timeout_ms: u64,
}

impl ApprovalCoordinator {
    pub fn new(emitter: EventEmitter, default_timeout_ms: u64) -> Self {
        Self {
            pending: Arc::new(Mutex::new(HashMap::new())),
            emitter,
            default_timeout_ms,
        }
    }

    /// Register a pending approval, emit `approval_request`, and return the
    /// request id together with a receiver the caller awaits exactly once.
    pub fn request_approval(
        &self,
        session_key: String,
        run_id: String,
        action: ApprovalAction,
        timeout_ms: Option<u64>,
    ) -> (Uuid, oneshot::Receiver<Settlement>) {
        let request_id = Uuid::new_v4();
        let timeout = Duration::from_millis(timeout_ms.unwrap_or(self.default_timeout_ms));

        let request = ApprovalRequest {
            request_id,
            session_key: session_key.clone(),
            run_id: run_id.clone(),
            action: action.clone(),
            timestamp_ms: now_ms(),
        };

        let (tx, rx) = oneshot::channel();

        let pending = self.pending.clone();
        let timer = tokio::task::spawn(async move {
            tokio::time::sleep(timeout).await;
            if let Some(entry) = pending.lock().expect("pending registry poisoned").remove(&request_id) {
                let _ = entry.sender.send(Err(TrustError::ApprovalTimeout));
            }
        });

        self.pending.lock().expect("pending registry poisoned").insert(
            request_id,
            PendingEntry {
                session_key,
                run_id,
                action,
                sender: tx,
                timer,
            },
        );

        (self.emitter)(ApprovalEvent::ApprovalRequest(request));

        (request_id, rx)
    }

    /// Settle a pending request with a client-supplied decision. Idempotent
    /// on a second call for the same id: returns `ApprovalNotFound`. The
    /// allowlist pattern for `allow-always` is computed from the action
    /// captured at `request_approval` time, not re-supplied by the caller.
    pub fn resolve_approval(
        &self,
        request_id: Uuid,
        decision: ApprovalDecision,
    ) -> Result<(), TrustError> {
        let entry = self
            .pending
            .lock()
            .expect("pending registry poisoned")
            .remove(&request_id)
            .ok_or(TrustError::ApprovalNotFound)?;

        entry.timer.abort();

        let allowlist_pattern = if matches!(decision, ApprovalDecision::AllowAlways) {
            allowlist_pattern_for(&entry.action)
        } else {
            None
        };

        let outcome = ApprovalOutcome {
            approved: decision.approved(),
            decision,
            allowlist_pattern,
        };

        let session_key = entry.session_key.clone();
        let run_id = entry.run_id.clone();
        let _ = entry.sender.send(Ok(outcome));

        (self.emitter)(ApprovalEvent::ApprovalResolved {
            request_id,
            session_key,
            run_id,
            decision,
        });

        Ok(())
    }

    /// Fail all pending approvals belonging to `session_key` with `Cancelled`.
    pub fn cancel_approvals_for_session(&self, session_key: &str) {
        self.cancel_matching(|entry| entry.session_key == session_key, "Cancelled".to_string());
    }

    /// Fail all pending approvals belonging to `run_id` with
    /// `Cancelled - run aborted`.
    pub fn cancel_approvals_for_run(&self, run_id: &str) {
        self.cancel_matching(
            |entry| entry.run_id == run_id,
            "Cancelled - run aborted".to_string(),
        );
    }

    fn cancel_matching(&self, matches: impl Fn(&PendingEntry) -> bool, reason: String) {
        let mut registry = self.pending.lock().expect("pending registry poisoned");
        let ids: Vec<Uuid> = registry
            .iter()
            .filter(|(_, entry)| matches(entry))
            .map(|(id, _)| *id)
            .collect();
        for id in ids {
            if let Some(entry) = registry.remove(&id) {
                entry.timer.abort();
                let _ = entry.sender.send(Err(TrustError::ApprovalCancelled {
                    reason: reason.clone(),
                }));
            }
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().expect("pending registry poisoned").len()
    }

    pub fn has_pending(&self, request_id: &Uuid) -> bool {
        self.pending
            .lock()
            .expect("pending registry poisoned")
            .contains_key(request_id)
    }
}
