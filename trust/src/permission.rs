//! Permission-Mode Enforcer with interactive approval.
//!
//! Grounded directly on the teacher's `high_risk.rs` (an env-driven,
//! configurable set of operations requiring confirmation) and
//! `goal_boundaries.rs` (a late-extracted, formatted decision block):
//! generalized here from a fixed three-operation confirm-set into the
//! four-mode enforcer this subsystem specifies, with the mode itself
//! supplied by a late-bound getter so UI-driven mode changes take effect on
//! the very next tool call.

use crate::approval::{ApprovalAction, ApprovalCoordinator, ApprovalDecision, ApprovalKind};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionMode {
    Plan,
    Ask,
    Auto,
    DangerouslySkip,
}

impl PermissionMode {
    /// Absence of an explicit mode is equivalent to `auto`.
    pub fn from_str_or_auto(value: Option<&str>) -> Self {
        match value {
            Some("plan") => PermissionMode::Plan,
            Some("ask") => PermissionMode::Ask,
            Some("dangerously-skip") => PermissionMode::DangerouslySkip,
            _ => PermissionMode::Auto,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Read,
    Write,
    Exec,
}

#[derive(Debug, Clone, Default)]
pub struct PermissionContext {
    pub home_dir: Option<PathBuf>,
    pub session_key: Option<String>,
    pub run_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    Allowed,
    /// Terminal denial: the caller must not retry via the approval coordinator.
    Denied { reason: String },
    /// `ask` mode: the caller must consult the approval coordinator.
    DeniedProvisional { reason: String },
}

impl CheckOutcome {
    pub fn is_allowed(&self) -> bool {
        matches!(self, CheckOutcome::Allowed)
    }
}

fn path_is_within_home(file_path: &str, home_dir: &Path) -> bool {
    let expanded = if let Some(rest) = file_path.strip_prefix("~/") {
        home_dir.join(rest)
    } else if file_path == "~" {
        home_dir.to_path_buf()
    } else {
        PathBuf::from(file_path)
    };
    expanded.starts_with(home_dir)
}

/// Evaluate the four ordered rules for one tool invocation.
pub fn check(
    mode: PermissionMode,
    operation: Operation,
    file_path: Option<&str>,
    context: &PermissionContext,
) -> CheckOutcome {
    if matches!(mode, PermissionMode::Auto | PermissionMode::DangerouslySkip) {
        return CheckOutcome::Allowed;
    }

    if let (Some(path), Some(home)) = (file_path, context.home_dir.as_deref()) {
        if path_is_within_home(path, home) {
            return CheckOutcome::Allowed;
        }
    }

    match mode {
        PermissionMode::Plan => match operation {
            Operation::Read => CheckOutcome::Allowed,
            Operation::Write | Operation::Exec => CheckOutcome::Denied {
                reason: "Plan mode: switch to ask or auto mode to write files or run commands."
                    .to_string(),
            },
        },
        PermissionMode::Ask => match operation {
            Operation::Read => CheckOutcome::Allowed,
            Operation::Write | Operation::Exec => CheckOutcome::DeniedProvisional {
                reason: "Ask mode: this action requires approval.".to_string(),
            },
        },
        PermissionMode::Auto | PermissionMode::DangerouslySkip => CheckOutcome::Allowed,
    }
}

const PREVIEW_LIMIT: usize = 200;

fn truncate_preview(content: &str) -> String {
    if content.chars().count() <= PREVIEW_LIMIT {
        content.to_string()
    } else {
        let mut truncated: String = content.chars().take(PREVIEW_LIMIT).collect();
        truncated.push('\u{2026}');
        truncated
    }
}

/// Outcome surfaced to the agent as tool-result content, never as a host
/// exception.
#[derive(Debug, Clone)]
pub enum ToolOutcome<T> {
    Success(T),
    Denied { reason: String },
    TimedOut,
}

/// Adapt an arbitrary agent tool into a permission-checked tool without
/// changing its schema. `call` performs the wrapped tool's real work and is
/// invoked at most once, on approval.
pub async fn guarded_call<T, F, Fut>(
    coordinator: &ApprovalCoordinator,
    mode: PermissionMode,
    operation: Operation,
    kind: ApprovalKind,
    file_path: Option<&str>,
    command: Option<&str>,
    preview_source: Option<&str>,
    tool_args: serde_json::Value,
    context: &PermissionContext,
    call: F,
) -> ToolOutcome<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = T>,
{
    match check(mode, operation, file_path, context) {
        CheckOutcome::Allowed => ToolOutcome::Success(call().await),
        CheckOutcome::Denied { reason } => ToolOutcome::Denied { reason },
        CheckOutcome::DeniedProvisional { reason } => {
            let (Some(session_key), Some(run_id)) =
                (context.session_key.clone(), context.run_id.clone())
            else {
                // No interactive context: surface the denial reason directly.
                return ToolOutcome::Denied { reason };
            };

            let action = ApprovalAction {
                kind,
                command: command.map(str::to_string),
                file_path: file_path.map(str::to_string),
                preview: preview_source.map(truncate_preview),
                tool_args,
            };

            let (_request_id, rx) =
                coordinator.request_approval(session_key, run_id, action, None);

            match rx.await {
                Ok(Ok(outcome)) if outcome.approved => ToolOutcome::Success(call().await),
                Ok(Ok(_outcome)) => ToolOutcome::Denied {
                    reason: "Denied by user.".to_string(),
                },
                Ok(Err(crate::error::TrustError::ApprovalTimeout)) => ToolOutcome::TimedOut,
                Ok(Err(_cancelled)) => ToolOutcome::TimedOut,
                Err(_recv_error) => ToolOutcome::TimedOut,
            }
        }
    }
}

/// Holds the late-bound mode getter and shared coordinator the wrapper
/// consults on every call.
#[derive(Clone)]
pub struct PermissionEnforcer {
    pub mode: Arc<dyn Fn() -> PermissionMode + Send + Sync>,
    pub coordinator: Arc<ApprovalCoordinator>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventEmitter;

    fn noop_emitter() -> EventEmitter {
        Arc::new(|_event| {})
    }

    #[test]
    fn read_is_allowed_in_every_mode() {
        let ctx = PermissionContext::default();
        for mode in [
            PermissionMode::Plan,
            PermissionMode::Ask,
            PermissionMode::Auto,
            PermissionMode::DangerouslySkip,
        ] {
            assert_eq!(check(mode, Operation::Read, None, &ctx), CheckOutcome::Allowed);
        }
    }

    #[test]
    fn plan_mode_denies_write_with_reason() {
        let ctx = PermissionContext::default();
        let outcome = check(PermissionMode::Plan, Operation::Write, Some("/tmp/x"), &ctx);
        match outcome {
            CheckOutcome::Denied { reason } => assert!(reason.contains("Plan mode")),
            other => panic!("expected Denied, got {other:?}"),
        }
    }

    #[test]
    fn ask_mode_denies_write_provisionally() {
        let ctx = PermissionContext::default();
        let outcome = check(PermissionMode::Ask, Operation::Write, Some("/tmp/x"), &ctx);
        assert!(matches!(outcome, CheckOutcome::DeniedProvisional { .. }));
    }

    #[test]
    fn home_directory_path_is_always_allowed() {
        let ctx = PermissionContext {
            home_dir: Some(PathBuf::from("/home/alice")),
            ..Default::default()
        };
        let outcome = check(
            PermissionMode::Plan,
            Operation::Write,
            Some("/home/alice/notes.txt"),
            &ctx,
        );
        assert_eq!(outcome, CheckOutcome::Allowed);
    }

    #[test]
    fn preview_truncates_to_200_chars_with_ellipsis() {
        let long = "a".repeat(250);
        let preview = truncate_preview(&long);
        assert_eq!(preview.chars().count(), PREVIEW_LIMIT + 1);
        assert!(preview.ends_with('\u{2026}'));
    }

    #[tokio::test]
    async fn ask_mode_registers_pending_approval_and_allows_on_allow_once() {
        use crate::approval::ApprovalCoordinator;
        use crate::events::ApprovalEvent;
        use std::sync::mpsc;

        // Capture the generated request id off the emitted `approval_request`
        // event, the only place it is exposed to an external responder.
        let (tx, id_rx) = mpsc::channel::<uuid::Uuid>();
        let emitter: EventEmitter = Arc::new(move |event| {
            if let ApprovalEvent::ApprovalRequest(request) = event {
                let _ = tx.send(request.request_id);
            }
        });

        let coordinator = Arc::new(ApprovalCoordinator::new(emitter, 5_000));
        let ctx = PermissionContext {
            home_dir: None,
            session_key: Some("S".to_string()),
            run_id: Some("R".to_string()),
        };

        let responder_coordinator = coordinator.clone();
        let responder = tokio::spawn(async move {
            let request_id = id_rx.recv().expect("approval_request event fired");
            responder_coordinator
                .resolve_approval(request_id, ApprovalDecision::AllowOnce)
                .unwrap();
        });

        let outcome: ToolOutcome<i32> = guarded_call(
            &coordinator,
            PermissionMode::Ask,
            Operation::Write,
            ApprovalKind::Write,
            Some("/tmp/y"),
            None,
            Some("content"),
            serde_json::json!({}),
            &ctx,
            || async { 42 },
        )
        .await;

        responder.await.unwrap();
        assert!(matches!(outcome, ToolOutcome::Success(42)));
    }

    #[tokio::test]
    async fn ask_mode_deny_decision_yields_denied_content_block() {
        use crate::approval::ApprovalCoordinator;
        use crate::events::ApprovalEvent;
        use std::sync::mpsc;

        let (tx, id_rx) = mpsc::channel::<uuid::Uuid>();
        let emitter: EventEmitter = Arc::new(move |event| {
            if let ApprovalEvent::ApprovalRequest(request) = event {
                let _ = tx.send(request.request_id);
            }
        });

        let coordinator = Arc::new(ApprovalCoordinator::new(emitter, 5_000));
        let ctx = PermissionContext {
            home_dir: None,
            session_key: Some("S".to_string()),
            run_id: Some("R".to_string()),
        };

        let responder_coordinator = coordinator.clone();
        let responder = tokio::spawn(async move {
            let request_id = id_rx.recv().expect("approval_request event fired");
            responder_coordinator
                .resolve_approval(request_id, ApprovalDecision::Deny)
                .unwrap();
        });

        let outcome: ToolOutcome<i32> = guarded_call(
            &coordinator,
            PermissionMode::Ask,
            Operation::Write,
            ApprovalKind::Write,
            Some("/tmp/y"),
            None,
            Some("content"),
            serde_json::json!({}),
            &ctx,
            || async { 42 },
        )
        .await;

        responder.await.unwrap();
        assert!(matches!(outcome, ToolOutcome::Denied { .. }));
    }
}
